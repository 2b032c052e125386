//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for counters and
//!   counter attachments.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Arithmetic on stored values is a single additive `UPDATE`, never a
//!   read-modify-write in application code.
//! - Repository APIs report missing rows through return values (`Option`,
//!   `bool`); mapping them to semantic errors is left to services.

pub mod counter_repo;
pub mod counterable_repo;

use rusqlite::Row;

use crate::model::counter::Counter;

/// Sign applied to a step by additive updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Up,
    Down,
}

impl StepDirection {
    pub(crate) fn sign(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Up => "increment",
            Self::Down => "decrement",
        }
    }
}

/// Comparison against a stored value, used by scoped listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFilter {
    GreaterThan(i64),
    LessThan(i64),
    EqualTo(i64),
}

impl ValueFilter {
    pub(crate) fn sql_operator(self) -> &'static str {
        match self {
            Self::GreaterThan(_) => ">",
            Self::LessThan(_) => "<",
            Self::EqualTo(_) => "=",
        }
    }

    pub(crate) fn operand(self) -> i64 {
        match self {
            Self::GreaterThan(value) | Self::LessThan(value) | Self::EqualTo(value) => value,
        }
    }
}

pub(crate) const COUNTER_COLUMNS_SQL: &str = "c.id,
    c.key,
    c.name,
    c.initial_value,
    c.value,
    c.step,
    c.notes,
    c.created_at,
    c.updated_at";

pub(crate) fn parse_counter_row(row: &Row<'_>) -> rusqlite::Result<Counter> {
    Ok(Counter {
        id: row.get("id")?,
        key: row.get("key")?,
        name: row.get("name")?,
        initial_value: row.get("initial_value")?,
        value: row.get("value")?,
        step: row.get("step")?,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
