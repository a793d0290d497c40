// src/providers/mod.rs
use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;

#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and decode the body as JSON.
    async fn fetch(&self, url: &str) -> Result<Value, FetchError>;
}

pub mod endpoints;
pub mod http;

pub use endpoints::Endpoints;
pub use http::ReqwestTransport;
