// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod batch;
pub mod cache;
pub mod config;
pub mod downstream;
pub mod error;
pub mod extract;
pub mod fakes;
pub mod fetch;
pub mod generate;
pub mod metrics;
pub mod model;
pub mod relevance;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::batch::{BatchJob, BatchOrchestrator, EntityOutcome, JobOptions};
pub use crate::cache::{CacheEntry, SessionCache};
pub use crate::error::{SignalError, SignalResult};
pub use crate::fetch::EntityFetcher;
pub use crate::model::{FetchRequest, FetchResult, NewsItem, Prospect};
