//! Counter registry record.
//!
//! # Responsibility
//! - Define the canonical counter shape shared by storage, cache and callers.
//! - Validate caller input before it reaches persistence.
//!
//! # Invariants
//! - `initial_value` is fixed at creation; `reset` returns `value` to it.
//! - `key` is non-empty and contains no whitespace or control characters.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static COUNTER_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s\p{Cc}]+$").expect("valid counter key regex"));

const COUNTER_KEY_MAX_CHARS: usize = 255;

/// Storage row identifier of a counter.
pub type CounterId = i64;

/// Named, persistent numeric accumulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Storage row id, referenced by attachments.
    pub id: CounterId,
    /// Globally unique lookup key.
    pub key: String,
    /// Display label.
    pub name: String,
    /// Value assigned at creation and restored by reset.
    pub initial_value: i64,
    /// Current running total.
    pub value: i64,
    /// Default increment/decrement magnitude.
    pub step: i64,
    pub notes: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Counter {
    /// Returns `name`, falling back to `key` for unnamed counters.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.key.as_str()
        } else {
            self.name.as_str()
        }
    }

    pub fn is_active(&self) -> bool {
        self.value > 0
    }

    pub fn is_inactive(&self) -> bool {
        self.value == 0
    }

    /// Relative change of `value` against `initial_value`, in percent.
    ///
    /// A zero initial value reports `100.0` once the counter went positive
    /// and `0.0` otherwise.
    pub fn percentage_change(&self) -> f64 {
        if self.initial_value == 0 {
            return if self.value > 0 { 100.0 } else { 0.0 };
        }

        (self.value as f64 - self.initial_value as f64) / self.initial_value as f64 * 100.0
    }
}

/// Input for registry `create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCounter {
    pub key: String,
    pub name: String,
    pub initial_value: i64,
    pub step: i64,
    pub notes: Option<String>,
}

impl NewCounter {
    /// Builds a counter definition with `initial_value = 0` and `step = 1`.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            initial_value: 0,
            step: 1,
            notes: None,
        }
    }

    pub fn initial_value(mut self, initial_value: i64) -> Self {
        self.initial_value = initial_value;
        self
    }

    pub fn step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Validates caller-provided fields.
    ///
    /// # Errors
    /// - `EmptyKey` / `InvalidKey` / `KeyTooLong` for unusable keys.
    /// - `EmptyName` when the display label is blank.
    pub fn validate(&self) -> Result<(), CounterValidationError> {
        if self.key.is_empty() {
            return Err(CounterValidationError::EmptyKey);
        }
        if self.key.chars().count() > COUNTER_KEY_MAX_CHARS {
            return Err(CounterValidationError::KeyTooLong {
                max_chars: COUNTER_KEY_MAX_CHARS,
            });
        }
        if !COUNTER_KEY_RE.is_match(&self.key) {
            return Err(CounterValidationError::InvalidKey(self.key.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(CounterValidationError::EmptyName);
        }
        Ok(())
    }
}

/// Aggregate scan over the whole registry.
///
/// Extremes and average are `None` when no counter exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterStats {
    pub total_counters: u64,
    pub total_value: i64,
    pub average_value: Option<f64>,
    pub max_value: Option<i64>,
    pub min_value: Option<i64>,
}

/// Rejected counter definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterValidationError {
    EmptyKey,
    InvalidKey(String),
    KeyTooLong { max_chars: usize },
    EmptyName,
}

impl Display for CounterValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "counter key is required"),
            Self::InvalidKey(key) => write!(
                f,
                "counter key `{key}` must not contain whitespace or control characters"
            ),
            Self::KeyTooLong { max_chars } => {
                write!(f, "counter key exceeds {max_chars} characters")
            }
            Self::EmptyName => write!(f, "counter name is required"),
        }
    }
}

impl Error for CounterValidationError {}

#[cfg(test)]
mod tests {
    use super::{Counter, CounterValidationError, NewCounter};

    fn counter(initial_value: i64, value: i64) -> Counter {
        Counter {
            id: 1,
            key: "downloads".to_string(),
            name: "Downloads".to_string(),
            initial_value,
            value,
            step: 1,
            notes: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn percentage_change_from_zero_initial_value() {
        assert_eq!(counter(0, 5).percentage_change(), 100.0);
        assert_eq!(counter(0, 0).percentage_change(), 0.0);
        assert_eq!(counter(0, -3).percentage_change(), 0.0);
    }

    #[test]
    fn percentage_change_relative_to_initial_value() {
        assert_eq!(counter(10, 15).percentage_change(), 50.0);
        assert_eq!(counter(10, 5).percentage_change(), -50.0);
    }

    #[test]
    fn percentage_change_at_i64_extremes() {
        let change = counter(-1, i64::MAX).percentage_change();
        assert!(change.is_finite());
        assert!(change < 0.0);

        let change = counter(i64::MAX, i64::MIN).percentage_change();
        assert!(change.is_finite());
        assert!((change - -200.0).abs() < 1e-9);
    }

    #[test]
    fn display_name_falls_back_to_key() {
        let mut unnamed = counter(0, 0);
        unnamed.name.clear();
        assert_eq!(unnamed.display_name(), "downloads");
        assert_eq!(counter(0, 0).display_name(), "Downloads");
    }

    #[test]
    fn activity_follows_value_sign() {
        assert!(counter(0, 1).is_active());
        assert!(counter(0, 0).is_inactive());
        assert!(!counter(0, -1).is_active());
        assert!(!counter(0, -1).is_inactive());
    }

    #[test]
    fn validate_rejects_unusable_keys_and_names() {
        assert_eq!(
            NewCounter::new("", "x").validate(),
            Err(CounterValidationError::EmptyKey)
        );
        assert!(matches!(
            NewCounter::new("page views", "x").validate(),
            Err(CounterValidationError::InvalidKey(_))
        ));
        assert_eq!(
            NewCounter::new("views", "  ").validate(),
            Err(CounterValidationError::EmptyName)
        );
        assert!(matches!(
            NewCounter::new("k".repeat(256), "x").validate(),
            Err(CounterValidationError::KeyTooLong { .. })
        ));
        assert!(NewCounter::new("post:views", "Post views").validate().is_ok());
    }
}
