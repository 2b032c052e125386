//! Named, persistent counters attachable to arbitrary application records.
//!
//! The registry (`Counters`) owns counter rows and their own running value.
//! Any record implementing `Counterable` can carry independent per-owner
//! values for the same counters through `OwnerCounters`.

pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod marker;
pub mod model;
pub mod repo;
pub mod service;

pub use cache::{CounterCache, MemoryCache};
pub use config::{CacheConfig, ConfigError, CookieConfig, CountersConfig, DefaultsConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use marker::{MarkerStore, MemoryMarkerStore};
pub use model::counter::{Counter, CounterId, CounterStats, CounterValidationError, NewCounter};
pub use model::counterable::{AttachedCounter, Counterable, OwnerRef};
pub use repo::counter_repo::{
    CounterError, CounterListQuery, CounterRepository, CounterResult, SqliteCounterRepository,
};
pub use repo::counterable_repo::{CounterableRepository, SqliteCounterableRepository};
pub use repo::{StepDirection, ValueFilter};
pub use service::counter_service::{BulkResult, Counters};
pub use service::counterable_service::OwnerCounters;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
