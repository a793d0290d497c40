// src/publishing.rs
use crate::entity::EntitySnapshot;

#[async_trait::async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Publish one entity (or child entity) state after a tick.
    async fn publish(&self, snapshot: EntitySnapshot) -> anyhow::Result<()>;
}

/// Writes one JSON line per snapshot to stdout.
pub struct StdoutPublisher;

#[async_trait::async_trait]
impl Publisher for StdoutPublisher {
    async fn publish(&self, snapshot: EntitySnapshot) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string(&snapshot)?);
        Ok(())
    }
}

/// Keeps every snapshot in memory.
#[derive(Default)]
pub struct MemoryPublisher {
    snapshots: tokio::sync::Mutex<Vec<EntitySnapshot>>,
}

impl MemoryPublisher {
    pub async fn take(&self) -> Vec<EntitySnapshot> {
        std::mem::take(&mut *self.snapshots.lock().await)
    }
}

#[async_trait::async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, snapshot: EntitySnapshot) -> anyhow::Result<()> {
        self.snapshots.lock().await.push(snapshot);
        Ok(())
    }
}
