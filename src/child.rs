// src/child.rs
use chrono::{DateTime, Utc};

use crate::attributes::{AttrKey, AttrValue, AttributeMap};
use crate::config::ChildSensorConfig;
use crate::entity::{EntitySnapshot, NAME_PREFIX};
use crate::registry::MetricType;

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Projection of one attribute of a parent entity. Never fetches; the parent
/// hands it a fresh attribute map after every update.
#[derive(Debug, Clone)]
pub struct ChildEntity {
    parent_id: String,
    attribute: AttrKey,
    metric: MetricType,
    id: String,
    name: String,
    unit: Option<String>,
    state: Option<AttrValue>,
    available: bool,
    last_updated: Option<DateTime<Utc>>,
}

impl ChildEntity {
    /// Identity is `<parent unique id>_<attribute>` and `<parent name> <Attribute>`
    /// unless the config overrides it, so it is stable across restarts.
    pub fn new(
        parent_id: &str,
        parent_name: &str,
        attribute: AttrKey,
        metric: MetricType,
        cfg: &ChildSensorConfig,
    ) -> Self {
        let id = match non_empty(&cfg.unique_id) {
            Some(uid) => uid.to_string(),
            None => format!("{parent_id}_{attribute}"),
        };
        let name = match non_empty(&cfg.id) {
            Some(n) => format!("{NAME_PREFIX}{n}"),
            None => format!("{parent_name} {}", metric.name()),
        };
        Self {
            parent_id: parent_id.to_string(),
            attribute,
            metric,
            id,
            name,
            unit: non_empty(&cfg.unit_of_measurement).map(str::to_string),
            state: None,
            available: false,
            last_updated: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn attribute(&self) -> AttrKey {
        self.attribute
    }

    pub fn metric(&self) -> &MetricType {
        &self.metric
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn state(&self) -> Option<&AttrValue> {
        self.state.as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Reads the bound attribute. Returns true when the state changed.
    pub fn refresh(&mut self, attrs: &AttributeMap, now: DateTime<Utc>) -> bool {
        match attrs.get(&self.attribute).cloned().flatten() {
            Some(value) => {
                self.available = true;
                if self.state.as_ref() == Some(&value) {
                    return false;
                }
                self.state = Some(value);
                self.last_updated = Some(now);
                true
            }
            None => {
                let changed = self.state.is_some() || self.available;
                self.state = None;
                self.available = false;
                changed
            }
        }
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            metric: self.metric.clone(),
            state: self.state.clone(),
            available: self.available,
            last_updated: self.last_updated,
            unit: self.unit.clone(),
            device_class: None,
            attributes: AttributeMap::new(),
        }
    }
}
