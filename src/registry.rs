// src/registry.rs
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Serialize, Serializer};

use crate::attributes::AttrKey;
use crate::sources::SourceRole;

/// Upstream metric families. Each has its own endpoint and extraction rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FetchType {
    PriceMain,
    PriceSimple,
    Dominance,
    ChainSummary,
    ChainControl,
    ChainOrphans,
    ChainBlockTime,
    NompPoolStats,
    MempoolStats,
    MempoolFees,
    MempoolNextBlock,
}

/// How widely one upstream payload can be shared between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// Same payload for every entity of the family.
    Global,
    /// Same payload for every entity of the family polling the same asset.
    PerAsset,
    /// Payload depends on per-entity parameters; never cached.
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Monetary,
    Duration,
}

impl FetchType {
    pub const ALL: [FetchType; 11] = [
        FetchType::PriceMain,
        FetchType::PriceSimple,
        FetchType::Dominance,
        FetchType::ChainSummary,
        FetchType::ChainControl,
        FetchType::ChainOrphans,
        FetchType::ChainBlockTime,
        FetchType::NompPoolStats,
        FetchType::MempoolStats,
        FetchType::MempoolFees,
        FetchType::MempoolNextBlock,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            FetchType::PriceMain => "price_main",
            FetchType::PriceSimple => "price_simple",
            FetchType::Dominance => "dominance",
            FetchType::ChainSummary => "chain_summary",
            FetchType::ChainControl => "chain_control",
            FetchType::ChainOrphans => "chain_orphans",
            FetchType::ChainBlockTime => "chain_block_time",
            FetchType::NompPoolStats => "nomp_pool_stats",
            FetchType::MempoolStats => "mempool_stats",
            FetchType::MempoolFees => "mempool_fees",
            FetchType::MempoolNextBlock => "mempool_next_block",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ft| ft.slug() == slug)
    }

    pub fn is_price(self) -> bool {
        matches!(self, FetchType::PriceMain | FetchType::PriceSimple)
    }

    /// Families served by mempool.space, which only tracks bitcoin.
    pub fn is_mempool(self) -> bool {
        matches!(self, FetchType::MempoolStats | FetchType::MempoolFees | FetchType::MempoolNextBlock)
    }

    pub fn cache_scope(self) -> CacheScope {
        match self {
            FetchType::Dominance | FetchType::ChainSummary => CacheScope::Global,
            ft if ft.is_mempool() => CacheScope::Global,
            FetchType::ChainControl | FetchType::ChainOrphans => CacheScope::PerAsset,
            _ => CacheScope::Private,
        }
    }

    pub fn is_shareable(self) -> bool {
        self.cache_scope() != CacheScope::Private
    }

    /// Structurally different endpoint tried when the primary extraction fails.
    pub fn fallback(self) -> Option<FetchType> {
        match self {
            FetchType::PriceMain => Some(FetchType::PriceSimple),
            FetchType::PriceSimple => Some(FetchType::PriceMain),
            _ => None,
        }
    }

    /// Whether the primary state is a count or height rather than a measurement.
    pub fn integer_state(self) -> bool {
        matches!(
            self,
            FetchType::ChainSummary
                | FetchType::ChainControl
                | FetchType::ChainOrphans
                | FetchType::ChainBlockTime
                | FetchType::MempoolStats
                | FetchType::MempoolFees
                | FetchType::MempoolNextBlock
        )
    }

    pub fn source_roles(self) -> &'static [SourceRole] {
        match self {
            FetchType::ChainSummary => &[SourceRole::Hashrate, SourceRole::LastDifficulty],
            FetchType::NompPoolStats => &[SourceRole::Hashrate],
            FetchType::ChainBlockTime => &[SourceRole::BlockTime],
            FetchType::ChainControl => &[SourceRole::PoolBlocks100, SourceRole::PoolBlocks1000],
            _ => &[],
        }
    }

    pub fn device_class(self) -> Option<DeviceClass> {
        match self {
            FetchType::PriceMain | FetchType::PriceSimple => Some(DeviceClass::Monetary),
            FetchType::ChainBlockTime => Some(DeviceClass::Duration),
            _ => None,
        }
    }
}

impl fmt::Display for FetchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Canonical(FetchType),
    /// Child attribute of an owning family, e.g. `chain_summary.hashrate_calc`.
    Derived { owner: FetchType, attribute: AttrKey },
}

#[derive(Debug)]
struct MetricTypeData {
    slug: String,
    name: String,
    short_id: String,
    kind: MetricKind,
}

/// Interned metric type. Cheap to clone; compared and ordered by slug.
#[derive(Clone)]
pub struct MetricType(Arc<MetricTypeData>);

impl MetricType {
    pub fn slug(&self) -> &str {
        &self.0.slug
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn short_id(&self) -> &str {
        &self.0.short_id
    }

    pub fn kind(&self) -> MetricKind {
        self.0.kind
    }

    pub fn is_derived(&self) -> bool {
        matches!(self.0.kind, MetricKind::Derived { .. })
    }

    /// Family that drives fetching; the owner's family for derived types.
    pub fn fetch_type(&self) -> FetchType {
        match self.0.kind {
            MetricKind::Canonical(ft) => ft,
            MetricKind::Derived { owner, .. } => owner,
        }
    }

    pub fn same_instance(&self, other: &MetricType) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for MetricType {
    fn eq(&self, other: &Self) -> bool {
        self.0.slug == other.0.slug
    }
}

impl Eq for MetricType {}

impl Hash for MetricType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.slug.hash(state);
    }
}

impl PartialOrd for MetricType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetricType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.slug.cmp(&other.0.slug)
    }
}

impl fmt::Debug for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetricType({})", self.0.slug)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.slug)
    }
}

impl Serialize for MetricType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.slug)
    }
}

/// Anything `resolve` accepts: a configured slug or an already resolved type.
pub enum MetricSelector<'a> {
    Slug(&'a str),
    Resolved(MetricType),
}

impl<'a> From<&'a str> for MetricSelector<'a> {
    fn from(s: &'a str) -> Self {
        MetricSelector::Slug(s)
    }
}

impl<'a> From<&'a String> for MetricSelector<'a> {
    fn from(s: &'a String) -> Self {
        MetricSelector::Slug(s.as_str())
    }
}

impl From<MetricType> for MetricSelector<'_> {
    fn from(t: MetricType) -> Self {
        MetricSelector::Resolved(t)
    }
}

impl From<&MetricType> for MetricSelector<'_> {
    fn from(t: &MetricType) -> Self {
        MetricSelector::Resolved(t.clone())
    }
}

#[derive(Default)]
struct Interned {
    by_slug: HashMap<String, MetricType>,
    short_ids: HashSet<String>,
}

pub struct MetricTypeRegistry {
    interned: RwLock<Interned>,
}

/// "chain_block_time" -> "Chain Block Time"
pub fn humanize(slug: &str) -> String {
    slug.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// "chain_block_time" -> "cbt". Canonical codes are alphanumeric only.
pub fn initials(slug: &str) -> String {
    slug.split('_')
        .filter_map(|w| w.chars().next())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl Default for MetricTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricTypeRegistry {
    /// Creates the registry with every canonical family already interned.
    pub fn new() -> Self {
        let mut interned = Interned::default();
        for ft in FetchType::ALL {
            let short_id = initials(ft.slug());
            interned.short_ids.insert(short_id.clone());
            interned.by_slug.insert(
                ft.slug().to_string(),
                MetricType(Arc::new(MetricTypeData {
                    slug: ft.slug().to_string(),
                    name: humanize(ft.slug()),
                    short_id,
                    kind: MetricKind::Canonical(ft),
                })),
            );
        }
        Self { interned: RwLock::new(interned) }
    }

    pub fn intern(&self, ft: FetchType) -> MetricType {
        let interned = self.interned.read().unwrap_or_else(PoisonError::into_inner);
        match interned.by_slug.get(ft.slug()) {
            Some(t) => t.clone(),
            // canonical types are inserted by `new` and never removed
            None => unreachable!("canonical metric type {ft} missing from registry"),
        }
    }

    pub fn lookup(&self, slug: &str) -> Option<MetricType> {
        let interned = self.interned.read().unwrap_or_else(PoisonError::into_inner);
        interned.by_slug.get(slug).cloned()
    }

    /// Unknown or empty slugs resolve to `price_main`.
    pub fn resolve<'a>(&self, selector: impl Into<MetricSelector<'a>>) -> MetricType {
        match selector.into() {
            MetricSelector::Resolved(t) => t,
            MetricSelector::Slug(slug) => {
                let slug = slug.trim().to_ascii_lowercase();
                match FetchType::from_slug(&slug) {
                    Some(ft) => self.intern(ft),
                    None => {
                        if !slug.is_empty() {
                            tracing::debug!("unknown api mode {slug:?}, using price_main");
                        }
                        self.intern(FetchType::PriceMain)
                    }
                }
            }
        }
    }

    /// Interns the child type for `attribute` of `owner`.
    ///
    /// The short id is `<owner short id>_<attribute initials>`; canonical ids never
    /// contain `_`, so the two namespaces cannot collide. A clash between two
    /// attributes of the same owner gets a numeric suffix.
    pub fn intern_derived(&self, owner: &MetricType, attribute: AttrKey) -> MetricType {
        let owner_ft = owner.fetch_type();
        let slug = format!("{}.{}", owner_ft.slug(), attribute.as_str());
        if let Some(t) = self.lookup(&slug) {
            return t;
        }

        let mut interned = self.interned.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(t) = interned.by_slug.get(&slug) {
            return t.clone();
        }
        let base = format!("{}_{}", initials(owner_ft.slug()), initials(attribute.as_str()));
        let mut short_id = base.clone();
        let mut n = 2;
        while interned.short_ids.contains(&short_id) {
            short_id = format!("{base}{n}");
            n += 1;
        }
        interned.short_ids.insert(short_id.clone());

        let t = MetricType(Arc::new(MetricTypeData {
            name: humanize(attribute.as_str()),
            slug: slug.clone(),
            short_id,
            kind: MetricKind::Derived { owner: owner_ft, attribute },
        }));
        interned.by_slug.insert(slug, t.clone());
        t
    }
}
