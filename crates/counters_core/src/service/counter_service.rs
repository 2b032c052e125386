//! Counter registry service.
//!
//! # Responsibility
//! - Provide create/read/step/reset/delete entry points over the registry.
//! - Front `get` with an optional read-through cache.
//! - Gate mutations to once per client via `MarkerStore`.
//!
//! # Invariants
//! - Every successful mutation invalidates the key's cache entry before
//!   returning, so the next `get` in this process observes the write.
//! - Step arithmetic is delegated to the repository's atomic update.

use crate::cache::CounterCache;
use crate::config::CountersConfig;
use crate::marker::MarkerStore;
use crate::model::counter::{Counter, CounterStats, NewCounter};
use crate::repo::counter_repo::{CounterError, CounterListQuery, CounterRepository, CounterResult};
use crate::repo::{StepDirection, ValueFilter};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

const MARKER_VALUE: &str = "1";

/// Per-key outcome of a bulk operation.
pub type BulkResult = BTreeMap<String, bool>;

/// Counter registry over a repository implementation.
pub struct Counters<R: CounterRepository> {
    repo: R,
    config: CountersConfig,
    cache: Option<Arc<dyn CounterCache>>,
}

impl<R: CounterRepository> Counters<R> {
    /// Creates an uncached registry with default configuration.
    pub fn new(repo: R) -> Self {
        Self::with_config(repo, CountersConfig::default())
    }

    pub fn with_config(repo: R, config: CountersConfig) -> Self {
        Self {
            repo,
            config,
            cache: None,
        }
    }

    /// Attaches a cache; it is consulted only while `cache.enabled` is set.
    pub fn with_cache(mut self, cache: Arc<dyn CounterCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &CountersConfig {
        &self.config
    }

    /// Registers a new counter with `value = initial_value`.
    ///
    /// # Errors
    /// - `AlreadyExists` when `key` is taken; the existing row is untouched.
    /// - `Validation` for an empty or malformed key or name.
    pub fn create(&self, counter: NewCounter) -> CounterResult<Counter> {
        match self.repo.insert_counter(&counter) {
            Ok(created) => {
                self.invalidate(&created.key);
                info!(
                    "event=counter_create module=registry status=ok key={} initial_value={} step={}",
                    created.key, created.initial_value, created.step
                );
                Ok(created)
            }
            Err(err) => {
                warn!(
                    "event=counter_create module=registry status=error key={} error={}",
                    counter.key, err
                );
                Err(err)
            }
        }
    }

    /// Registers a counter using the configured default initial value and step.
    pub fn create_with_defaults(
        &self,
        key: impl Into<String>,
        name: impl Into<String>,
    ) -> CounterResult<Counter> {
        let defaults = &self.config.defaults;
        self.create(
            NewCounter::new(key, name)
                .initial_value(defaults.initial_value)
                .step(defaults.step),
        )
    }

    /// Resolves a counter by key, served from the cache when possible.
    ///
    /// Cached rows may lag writes from other processes by up to the TTL.
    pub fn get(&self, key: &str) -> CounterResult<Counter> {
        let cache = self.active_cache();
        let cache_key = self.cache_key(key);

        if let Some(cached) = cache.and_then(|cache| cache.get(&cache_key)) {
            debug!("event=counter_get module=registry status=hit key={key}");
            return Ok(cached);
        }

        let counter = self
            .repo
            .find_counter(key)?
            .ok_or_else(|| CounterError::DoesNotExist(key.to_string()))?;

        if let Some(cache) = cache {
            cache.put(&cache_key, &counter, self.config.cache.ttl());
            debug!("event=counter_get module=registry status=miss key={key}");
        }

        Ok(counter)
    }

    /// Returns the counter's value, or `default` when the key is unknown.
    pub fn get_value(&self, key: &str, default: Option<i64>) -> CounterResult<i64> {
        match (self.get(key), default) {
            (Ok(counter), _) => Ok(counter.value),
            (Err(CounterError::DoesNotExist(_)), Some(default)) => Ok(default),
            (Err(err), _) => Err(err),
        }
    }

    pub fn set_value(&self, key: &str, value: i64) -> CounterResult<bool> {
        let updated = self.repo.set_value(key, value)?;
        self.finish_mutation("counter_set_value", key, updated)
    }

    pub fn set_step(&self, key: &str, step: i64) -> CounterResult<bool> {
        let updated = self.repo.set_step(key, step)?;
        self.finish_mutation("counter_set_step", key, updated)
    }

    /// Adds `step`, or the counter's configured step, to its value.
    pub fn increment(&self, key: &str, step: Option<i64>) -> CounterResult<bool> {
        self.apply_step(key, StepDirection::Up, step)
    }

    /// Subtracts `step`, or the counter's configured step, from its value.
    pub fn decrement(&self, key: &str, step: Option<i64>) -> CounterResult<bool> {
        self.apply_step(key, StepDirection::Down, step)
    }

    /// Restores the counter's value to its initial value.
    pub fn reset(&self, key: &str) -> CounterResult<bool> {
        let updated = self.repo.reset_value(key)?;
        self.finish_mutation("counter_reset", key, updated)
    }

    /// Deletes the counter together with every owner attachment.
    pub fn delete(&self, key: &str) -> CounterResult<bool> {
        let deleted = self.repo.delete_counter(key)?;
        self.finish_mutation("counter_delete", key, deleted)
    }

    /// Increments each key independently; unknown keys report `false`.
    pub fn bulk_increment<I, K>(&self, keys: I, step: Option<i64>) -> CounterResult<BulkResult>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.bulk(keys, |key| self.increment(key, step))
    }

    /// Decrements each key independently; unknown keys report `false`.
    pub fn bulk_decrement<I, K>(&self, keys: I, step: Option<i64>) -> CounterResult<BulkResult>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.bulk(keys, |key| self.decrement(key, step))
    }

    /// Increments once per client: skipped when the client already holds
    /// the key's marker, otherwise the marker is set after a successful write.
    pub fn increment_if_not_has_cookies(
        &self,
        key: &str,
        step: Option<i64>,
        markers: &mut impl MarkerStore,
    ) -> CounterResult<bool> {
        self.apply_step_once(key, StepDirection::Up, step, markers)
    }

    pub fn decrement_if_not_has_cookies(
        &self,
        key: &str,
        step: Option<i64>,
        markers: &mut impl MarkerStore,
    ) -> CounterResult<bool> {
        self.apply_step_once(key, StepDirection::Down, step, markers)
    }

    /// Lists counters in creation order, optionally filtered by a
    /// case-insensitive substring of key or name.
    ///
    /// Matching uses SQLite `LIKE`, so case folding covers ASCII letters
    /// only: `"café"` does not match a search for `"CAFÉ"`.
    pub fn get_all(&self, search: Option<&str>, limit: u32) -> CounterResult<Vec<Counter>> {
        self.repo.list_counters(&CounterListQuery {
            search: search.map(str::to_string),
            value: None,
            limit: Some(limit),
        })
    }

    pub fn get_with_value_greater_than(&self, value: i64) -> CounterResult<Vec<Counter>> {
        self.list_by_value(ValueFilter::GreaterThan(value))
    }

    pub fn get_with_value_less_than(&self, value: i64) -> CounterResult<Vec<Counter>> {
        self.list_by_value(ValueFilter::LessThan(value))
    }

    /// Counters with a positive value.
    pub fn get_active(&self) -> CounterResult<Vec<Counter>> {
        self.list_by_value(ValueFilter::GreaterThan(0))
    }

    /// Counters whose value is exactly zero.
    pub fn get_inactive(&self) -> CounterResult<Vec<Counter>> {
        self.list_by_value(ValueFilter::EqualTo(0))
    }

    pub fn get_stats(&self) -> CounterResult<CounterStats> {
        self.repo.counter_stats()
    }

    fn apply_step(
        &self,
        key: &str,
        direction: StepDirection,
        step: Option<i64>,
    ) -> CounterResult<bool> {
        let updated = self.repo.apply_step(key, direction, step)?;
        self.finish_mutation(
            match direction {
                StepDirection::Up => "counter_increment",
                StepDirection::Down => "counter_decrement",
            },
            key,
            updated,
        )
    }

    fn apply_step_once(
        &self,
        key: &str,
        direction: StepDirection,
        step: Option<i64>,
        markers: &mut impl MarkerStore,
    ) -> CounterResult<bool> {
        let marker = self.marker_name(key);
        if markers.has(&marker) {
            debug!(
                "event=counter_gated module=registry status=skipped key={key} action={}",
                direction.as_str()
            );
            return Ok(false);
        }

        let applied = self.apply_step(key, direction, step)?;
        if applied {
            markers.set(&marker, MARKER_VALUE, self.config.cookies.max_age());
        }
        Ok(applied)
    }

    fn bulk<I, K>(
        &self,
        keys: I,
        mut apply: impl FnMut(&str) -> CounterResult<bool>,
    ) -> CounterResult<BulkResult>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut results = BulkResult::new();
        for key in keys {
            let key = key.as_ref();
            let outcome = match apply(key) {
                Ok(applied) => applied,
                Err(CounterError::DoesNotExist(_)) => false,
                Err(err) => return Err(err),
            };
            results.insert(key.to_string(), outcome);
        }
        Ok(results)
    }

    fn list_by_value(&self, filter: ValueFilter) -> CounterResult<Vec<Counter>> {
        self.repo.list_counters(&CounterListQuery {
            search: None,
            value: Some(filter),
            limit: None,
        })
    }

    fn finish_mutation(&self, event: &str, key: &str, updated: bool) -> CounterResult<bool> {
        if !updated {
            warn!(
                "event={event} module=registry status=error key={key} error_code=counter_not_found"
            );
            return Err(CounterError::DoesNotExist(key.to_string()));
        }

        self.invalidate(key);
        info!("event={event} module=registry status=ok key={key}");
        Ok(true)
    }

    fn invalidate(&self, key: &str) {
        if let Some(cache) = self.cache.as_deref() {
            cache.invalidate(&self.cache_key(key));
        }
    }

    fn active_cache(&self) -> Option<&dyn CounterCache> {
        if self.config.cache.enabled {
            self.cache.as_deref()
        } else {
            None
        }
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}{key}", self.config.cache.prefix)
    }

    fn marker_name(&self, key: &str) -> String {
        format!("{}{key}", self.config.cookies.prefix)
    }
}
