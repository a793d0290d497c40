// src/lib.rs
pub mod types;
pub mod error;
pub mod clock;
pub mod registry;
pub mod attributes;
pub mod cache;
pub mod sources;
pub mod derived;
pub mod template;
pub mod extract;
pub mod providers;
pub mod services;
pub mod config;
pub mod child;
pub mod entity;
pub mod metrics;
pub mod publishing;
pub mod poller;
