//! Owner-scoped counter service.
//!
//! # Responsibility
//! - Attach registry counters to one owner and keep that owner's own
//!   running value per counter.
//! - Keep an in-memory snapshot of the owner's attachments, refreshed
//!   after every write.
//!
//! # Invariants
//! - First access through `get_counter` (and every mutator) attaches the
//!   counter, seeded from its `initial_value`.
//! - Attaching an already attached counter keeps the existing value.
//! - Owner values never touch the registry's own `value`.

use crate::model::counter::CounterId;
use crate::model::counterable::{AttachedCounter, Counterable, OwnerRef};
use crate::repo::counter_repo::{CounterError, CounterRepository, CounterResult};
use crate::repo::counterable_repo::CounterableRepository;
use crate::repo::{StepDirection, ValueFilter};
use crate::service::counter_service::{BulkResult, Counters};
use log::{debug, info};

/// Counters attached to a single owner.
pub struct OwnerCounters<'reg, R: CounterRepository, A: CounterableRepository> {
    registry: &'reg Counters<R>,
    repo: A,
    owner: OwnerRef,
    attached: Vec<AttachedCounter>,
}

impl<'reg, R: CounterRepository, A: CounterableRepository> OwnerCounters<'reg, R, A> {
    /// Loads the attachment snapshot for `owner`.
    pub fn load(registry: &'reg Counters<R>, repo: A, owner: OwnerRef) -> CounterResult<Self> {
        let attached = repo.list_attached(owner, None)?;
        Ok(Self {
            registry,
            repo,
            owner,
            attached,
        })
    }

    /// Loads the attachment snapshot for an application record.
    pub fn for_owner(
        registry: &'reg Counters<R>,
        repo: A,
        owner: &impl Counterable,
    ) -> CounterResult<Self> {
        Self::load(registry, repo, owner.owner_ref())
    }

    pub fn owner(&self) -> OwnerRef {
        self.owner
    }

    /// Attachments as of the last refresh, in attach order.
    pub fn counters(&self) -> &[AttachedCounter] {
        &self.attached
    }

    /// Reloads the attachment snapshot from storage.
    pub fn refresh(&mut self) -> CounterResult<()> {
        self.attached = self.repo.list_attached(self.owner, None)?;
        Ok(())
    }

    /// Returns the attached counter, attaching it first when missing.
    ///
    /// # Errors
    /// - `AttachmentFailure` when `key` names no registered counter.
    pub fn get_counter(&mut self, key: &str) -> CounterResult<AttachedCounter> {
        if let Some(attached) = self.find_loaded(key) {
            return Ok(attached.clone());
        }

        self.add_counter(key, None)?;
        self.find_loaded(key)
            .cloned()
            .ok_or_else(|| CounterError::AttachmentFailure {
                owner: self.owner,
                key: key.to_string(),
                source: Box::new(CounterError::InvalidData(format!(
                    "attachment for `{key}` missing after attach"
                ))),
            })
    }

    /// Checks storage for an attachment, without attaching.
    pub fn has_counter(&self, key: &str) -> CounterResult<bool> {
        self.repo.has_attachment(self.owner, key)
    }

    /// Returns this owner's value for `key`, attaching the counter first
    /// when missing.
    pub fn get_counter_value(&mut self, key: &str) -> CounterResult<i64> {
        Ok(self.get_counter(key)?.value)
    }

    /// Attaches the counter seeded with `initial_value`, or the counter's own
    /// initial value when `None`.
    ///
    /// Returns `false` when the counter was already attached; its value is
    /// left unchanged.
    pub fn add_counter(&mut self, key: &str, initial_value: Option<i64>) -> CounterResult<bool> {
        let attached = self
            .registry
            .get(key)
            .and_then(|counter| {
                let seed = initial_value.unwrap_or(counter.initial_value);
                self.repo.attach(self.owner, counter.id, seed)
            })
            .map_err(|err| self.attachment_failure(key, err))?;

        self.refresh()?;
        if attached {
            info!(
                "event=counter_attach module=ledger status=ok owner={} key={key}",
                self.owner
            );
        }
        Ok(attached)
    }

    /// Detaches the counter. Unknown counters report `false`.
    pub fn remove_counter(&mut self, key: &str) -> CounterResult<bool> {
        let counter = match self.registry.get(key) {
            Ok(counter) => counter,
            Err(CounterError::DoesNotExist(_)) => return Ok(false),
            Err(err) => return Err(err),
        };

        let removed = self.repo.detach(self.owner, counter.id)?;
        self.refresh()?;
        if removed {
            info!(
                "event=counter_detach module=ledger status=ok owner={} key={key}",
                self.owner
            );
        }
        Ok(removed)
    }

    /// Adds `step`, or the counter's configured step, to this owner's value.
    pub fn increment_counter(&mut self, key: &str, step: Option<i64>) -> CounterResult<bool> {
        self.apply_step(key, StepDirection::Up, step)
    }

    pub fn decrement_counter(&mut self, key: &str, step: Option<i64>) -> CounterResult<bool> {
        self.apply_step(key, StepDirection::Down, step)
    }

    /// Resets this owner's value to `initial_value`, or to the counter's own
    /// initial value when `None`.
    pub fn reset_counter(&mut self, key: &str, initial_value: Option<i64>) -> CounterResult<bool> {
        let updated = self.write_attached(key, |repo, owner, counter_id| {
            repo.reset_value(owner, counter_id, initial_value)
        })?;
        self.finish_write("counter_owner_reset", key, updated)
    }

    pub fn set_counter_value(&mut self, key: &str, value: i64) -> CounterResult<bool> {
        let updated = self.write_attached(key, |repo, owner, counter_id| {
            repo.set_value(owner, counter_id, value)
        })?;
        self.finish_write("counter_owner_set_value", key, updated)
    }

    /// Alias of `counters`.
    pub fn get_all_counters(&self) -> &[AttachedCounter] {
        self.counters()
    }

    pub fn get_counters_with_value_greater_than(
        &self,
        value: i64,
    ) -> CounterResult<Vec<AttachedCounter>> {
        self.repo
            .list_attached(self.owner, Some(ValueFilter::GreaterThan(value)))
    }

    pub fn get_counters_with_value_less_than(
        &self,
        value: i64,
    ) -> CounterResult<Vec<AttachedCounter>> {
        self.repo
            .list_attached(self.owner, Some(ValueFilter::LessThan(value)))
    }

    /// Attachments whose owner value is positive.
    pub fn get_active_counters(&self) -> CounterResult<Vec<AttachedCounter>> {
        self.get_counters_with_value_greater_than(0)
    }

    /// Attachments whose owner value is exactly zero.
    pub fn get_inactive_counters(&self) -> CounterResult<Vec<AttachedCounter>> {
        self.repo
            .list_attached(self.owner, Some(ValueFilter::EqualTo(0)))
    }

    pub fn get_total_counter_value(&self) -> CounterResult<i64> {
        self.repo.total_value(self.owner)
    }

    /// Mean owner value; `0.0` without attachments.
    pub fn get_average_counter_value(&self) -> CounterResult<f64> {
        self.repo.average_value(self.owner)
    }

    pub fn bulk_increment_counters<I, K>(
        &mut self,
        keys: I,
        step: Option<i64>,
    ) -> CounterResult<BulkResult>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.bulk(keys, |ledger, key| ledger.increment_counter(key, step))
    }

    pub fn bulk_decrement_counters<I, K>(
        &mut self,
        keys: I,
        step: Option<i64>,
    ) -> CounterResult<BulkResult>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.bulk(keys, |ledger, key| ledger.decrement_counter(key, step))
    }

    pub fn bulk_reset_counters<I, K>(
        &mut self,
        keys: I,
        initial_value: Option<i64>,
    ) -> CounterResult<BulkResult>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.bulk(keys, |ledger, key| ledger.reset_counter(key, initial_value))
    }

    fn apply_step(
        &mut self,
        key: &str,
        direction: StepDirection,
        step: Option<i64>,
    ) -> CounterResult<bool> {
        let updated = self.write_attached(key, |repo, owner, counter_id| {
            repo.apply_step(owner, counter_id, direction, step)
        })?;
        self.finish_write(
            match direction {
                StepDirection::Up => "counter_owner_increment",
                StepDirection::Down => "counter_owner_decrement",
            },
            key,
            updated,
        )
    }

    /// Runs `write` against the attachment for `key`.
    ///
    /// A write that touches no row means the snapshot is stale (the counter
    /// was detached or deleted and recreated elsewhere); the snapshot is
    /// reloaded, the counter re-resolved, and the write retried once.
    fn write_attached(
        &mut self,
        key: &str,
        mut write: impl FnMut(&A, OwnerRef, CounterId) -> CounterResult<bool>,
    ) -> CounterResult<bool> {
        let counter_id = self.get_counter(key)?.counter.id;
        if write(&self.repo, self.owner, counter_id)? {
            return Ok(true);
        }

        self.refresh()?;
        let counter_id = self.get_counter(key)?.counter.id;
        write(&self.repo, self.owner, counter_id)
    }

    fn bulk<I, K>(
        &mut self,
        keys: I,
        mut apply: impl FnMut(&mut Self, &str) -> CounterResult<bool>,
    ) -> CounterResult<BulkResult>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut results = BulkResult::new();
        for key in keys {
            let key = key.as_ref();
            let outcome = match apply(&mut *self, key) {
                Ok(applied) => applied,
                Err(err) if err.is_missing_counter() => false,
                Err(err) => return Err(err),
            };
            results.insert(key.to_string(), outcome);
        }
        Ok(results)
    }

    fn finish_write(&mut self, event: &str, key: &str, updated: bool) -> CounterResult<bool> {
        self.refresh()?;
        debug!(
            "event={event} module=ledger status={} owner={} key={key}",
            if updated { "ok" } else { "noop" },
            self.owner
        );
        Ok(updated)
    }

    fn find_loaded(&self, key: &str) -> Option<&AttachedCounter> {
        self.attached.iter().find(|attached| attached.key() == key)
    }

    fn attachment_failure(&self, key: &str, err: CounterError) -> CounterError {
        CounterError::AttachmentFailure {
            owner: self.owner,
            key: key.to_string(),
            source: Box::new(err),
        }
    }
}
