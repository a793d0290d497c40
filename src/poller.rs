// src/poller.rs
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use crate::entity::{Entity, UpdateOutcome};
use crate::providers::Transport;
use crate::publishing::Publisher;

/// Drives every entity on its own schedule and publishes the results.
pub struct Poller<Pu>
where
    Pu: Publisher + Send + Sync + 'static,
{
    pub publisher: Pu,
    pub transport: Arc<dyn Transport>,
    entities: Vec<Entity>,
}

async fn publish_entity<Pu: Publisher>(publisher: &Pu, entity: &Entity) {
    for snapshot in entity.snapshots() {
        let id = snapshot.id.clone();
        if let Err(e) = publisher.publish(snapshot).await {
            tracing::warn!("publish failed for {id}: {e:?}");
        }
    }
}

impl<Pu> Poller<Pu>
where
    Pu: Publisher + Send + Sync + 'static,
{
    pub fn new(entities: Vec<Entity>, publisher: Pu, transport: Arc<dyn Transport>) -> Self {
        Self { publisher, transport, entities }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Updates every entity once, concurrently, then publishes them all.
    pub async fn tick_once(&mut self) -> Vec<UpdateOutcome> {
        let transport = self.transport.as_ref();
        let futs = self
            .entities
            .iter_mut()
            .map(|entity| async move { entity.update(transport).await });
        let outcomes = join_all(futs).await;

        for entity in &self.entities {
            publish_entity(&self.publisher, entity).await;
        }
        outcomes
    }

    /// Runs forever; each entity ticks at its own update frequency.
    pub async fn run(self) {
        let publisher = &self.publisher;
        let transport = self.transport.as_ref();
        tracing::info!("polling {} entities", self.entities.len());

        let loops = self.entities.into_iter().map(|mut entity| async move {
            let mut ticker = interval(Duration::from_secs(entity.update_frequency_secs()));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let outcome = entity.update(transport).await;
                tracing::debug!("{} -> {}", entity.id(), outcome.as_str());
                publish_entity(publisher, &entity).await;
            }
        });
        join_all(loops).await;
    }
}
