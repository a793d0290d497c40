//! Scripted upstream shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use cryptoinfo::clock::ManualClock;
use cryptoinfo::error::FetchError;
use cryptoinfo::providers::{Endpoints, Transport};
use cryptoinfo::services::MetricServices;
use cryptoinfo::template::TeraRenderer;

/// 2024-04-20 00:00:00 UTC
pub const T0: i64 = 1_713_571_200;

#[derive(Clone)]
enum Reply {
    Json(Value),
    Status(u16),
}

/// Answers each URL with the reply of the first route whose pattern it
/// contains, counting calls per pattern. Unrouted URLs get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, Reply)>>,
    calls: Mutex<HashMap<String, usize>>,
    urls: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn set(&self, pattern: &str, reply: Reply) {
        let mut routes = self.routes.lock().unwrap();
        routes.retain(|(p, _)| p != pattern);
        routes.push((pattern.to_string(), reply));
    }

    pub fn json(&self, pattern: &str, body: Value) {
        self.set(pattern, Reply::Json(body));
    }

    pub fn status(&self, pattern: &str, status: u16) {
        self.set(pattern, Reply::Status(status));
    }

    /// Every fetch sleeps this long before answering.
    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self, pattern: &str) -> usize {
        self.calls.lock().unwrap().get(pattern).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.urls.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        self.urls.lock().unwrap().push(url.to_string());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let routes = self.routes.lock().unwrap().clone();
        let Some((pattern, reply)) = routes.into_iter().find(|(p, _)| url.contains(p.as_str())) else {
            return Err(FetchError::Status { status: 404, url: url.to_string() });
        };
        *self.calls.lock().unwrap().entry(pattern).or_default() += 1;
        match reply {
            Reply::Json(v) => Ok(v),
            Reply::Status(status) => Err(FetchError::Status { status, url: url.to_string() }),
        }
    }
}

pub fn services(start: i64) -> (Arc<ManualClock>, Arc<MetricServices>) {
    let clock = Arc::new(ManualClock::new(start));
    let services = MetricServices::new(clock.clone(), Arc::new(TeraRenderer), Endpoints::default());
    (clock, services)
}
