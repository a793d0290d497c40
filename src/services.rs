// src/services.rs
use std::sync::Arc;

use crate::cache::SharedFetchCache;
use crate::clock::{Clock, SystemClock};
use crate::providers::Endpoints;
use crate::registry::MetricTypeRegistry;
use crate::sources::SourceIndex;
use crate::template::{TeraRenderer, TemplateRenderer};

/// Process-wide collaborators shared by every entity. Built once and handed to
/// each entity at construction.
pub struct MetricServices {
    pub registry: MetricTypeRegistry,
    pub cache: SharedFetchCache,
    pub sources: SourceIndex,
    pub clock: Arc<dyn Clock>,
    pub renderer: Arc<dyn TemplateRenderer>,
    pub endpoints: Endpoints,
}

impl MetricServices {
    pub fn new(
        clock: Arc<dyn Clock>,
        renderer: Arc<dyn TemplateRenderer>,
        endpoints: Endpoints,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry: MetricTypeRegistry::new(),
            cache: SharedFetchCache::new(clock.clone()),
            sources: SourceIndex::new(),
            clock,
            renderer,
            endpoints,
        })
    }

    /// System clock, tera templates and the public upstream URLs.
    pub fn with_defaults() -> Arc<Self> {
        Self::new(Arc::new(SystemClock), Arc::new(TeraRenderer), Endpoints::default())
    }
}
