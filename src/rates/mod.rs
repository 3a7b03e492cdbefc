//! Member-state rate tables: fetching, persistence diffing, the in-memory
//! cache and the daily refresh loop.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use eurovat::rates::{RateCache, RateSyncer, Scheduler};
//!
//! let cache = Arc::new(RateCache::new());
//! let syncer = Arc::new(RateSyncer::from_config(&config.sync, store, cache.clone())?);
//! syncer.warm_cache().await?;
//!
//! let scheduler = Scheduler::new(syncer);
//! scheduler.start();
//! // ...
//! scheduler.stop().await;
//! ```

mod cache;
mod json;
mod scheduler;
mod source;
mod sync;
mod tedb;

pub use cache::RateCache;
pub use json::{JsonRateSource, RateValue, parse_rates_json};
pub use scheduler::{Scheduler, duration_until_next_midnight, duration_until_next_midnight_utc};
pub use source::{CountryRates, RateSource, flatten};
pub use sync::{RateSyncer, SyncResult, plan_changes};
pub use tedb::{TedbRateSource, parse_retrieve_rates_response, retrieve_rates_request};
