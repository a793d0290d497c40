// src/metrics.rs
//! Prometheus counters behind the `metrics` feature. The `record_*` helpers are
//! always callable and compile to nothing without the feature.

use crate::registry::FetchType;

#[cfg(feature = "metrics")]
mod prom {
    use once_cell::sync::Lazy;
    use prometheus::{register_int_counter_vec, IntCounterVec};

    pub static UPDATES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
        register_int_counter_vec!(
            "cryptoinfo_updates_total", "Entity update ticks", &["family", "outcome"] // fetched|cached|reused|fallback|failed
        ).unwrap()
    });

    pub static CACHE_REUSE_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
        register_int_counter_vec!(
            "cryptoinfo_cache_reuse_total", "Ticks served from the shared fetch cache", &["family"]
        ).unwrap()
    });

    pub static FALLBACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
        register_int_counter_vec!(
            "cryptoinfo_fallbacks_total", "Primary endpoint failures that triggered a fallback", &["family"]
        ).unwrap()
    });
}

#[cfg(feature = "metrics")]
pub use prom::{CACHE_REUSE_TOTAL, FALLBACKS_TOTAL, UPDATES_TOTAL};

#[inline]
pub fn record_update(ft: FetchType, outcome: &str) {
    #[cfg(feature = "metrics")]
    UPDATES_TOTAL.with_label_values(&[ft.slug(), outcome]).inc();
    #[cfg(not(feature = "metrics"))]
    let _ = (ft, outcome);
}

#[inline]
pub fn record_cache_reuse(ft: FetchType) {
    #[cfg(feature = "metrics")]
    CACHE_REUSE_TOTAL.with_label_values(&[ft.slug()]).inc();
    #[cfg(not(feature = "metrics"))]
    let _ = ft;
}

#[inline]
pub fn record_fallback(ft: FetchType) {
    #[cfg(feature = "metrics")]
    FALLBACKS_TOTAL.with_label_values(&[ft.slug()]).inc();
    #[cfg(not(feature = "metrics"))]
    let _ = ft;
}

/// Text exposition of every registered metric.
#[cfg(feature = "metrics")]
pub fn gather_text() -> String {
    use prometheus::{Encoder, TextEncoder};
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buf) {
        tracing::warn!("metrics encode failed: {e}");
    }
    String::from_utf8(buf).unwrap_or_default()
}
