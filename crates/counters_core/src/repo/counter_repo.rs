//! Counter registry repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and arithmetic over the `counters` table.
//! - Own the error taxonomy shared by registry and attachment services.
//!
//! # Invariants
//! - `key` uniqueness is enforced by the storage layer; a violated unique
//!   constraint surfaces as `CounterError::AlreadyExists`.
//! - Increment/decrement run as one `UPDATE ... SET value = value + delta`,
//!   reading the stored `step` inside the same statement when no explicit
//!   step is given.

use crate::db::DbError;
use crate::model::counter::{Counter, CounterStats, CounterValidationError, NewCounter};
use crate::model::counterable::OwnerRef;
use crate::repo::{parse_counter_row, StepDirection, ValueFilter, COUNTER_COLUMNS_SQL};
use rusqlite::types::Value;
use rusqlite::{ffi, params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TOUCH_UPDATED_AT_SQL: &str = "updated_at = (strftime('%s', 'now') * 1000)";

pub type CounterResult<T> = Result<T, CounterError>;

/// Error taxonomy for registry and attachment operations.
#[derive(Debug)]
pub enum CounterError {
    /// Creation targeted a key that is already registered.
    AlreadyExists(String),
    /// Lookup or mutation targeted a key with no backing row.
    DoesNotExist(String),
    /// A step would take the stored value outside the `i64` range; nothing
    /// was written.
    Overflow(String),
    /// An owner-scoped operation could not resolve its counter.
    AttachmentFailure {
        owner: OwnerRef,
        key: String,
        source: Box<CounterError>,
    },
    Validation(CounterValidationError),
    Db(DbError),
    /// Persisted state that cannot be decoded.
    InvalidData(String),
}

impl CounterError {
    /// Returns whether this error means a counter key could not be resolved,
    /// directly or through an attachment.
    pub fn is_missing_counter(&self) -> bool {
        match self {
            Self::DoesNotExist(_) => true,
            Self::AttachmentFailure { source, .. } => source.is_missing_counter(),
            _ => false,
        }
    }
}

impl Display for CounterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyExists(key) => write!(f, "counter `{key}` already exists"),
            Self::DoesNotExist(key) => write!(f, "counter `{key}` does not exist"),
            Self::Overflow(key) => write!(f, "step on counter `{key}` overflows its value"),
            Self::AttachmentFailure { owner, key, .. } => {
                write!(f, "failed to attach counter `{key}` to {owner}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted counter data: {message}"),
        }
    }
}

impl Error for CounterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AttachmentFailure { source, .. } => Some(source.as_ref()),
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::AlreadyExists(_)
            | Self::DoesNotExist(_)
            | Self::Overflow(_)
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<CounterValidationError> for CounterError {
    fn from(value: CounterValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for CounterError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CounterError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::InvalidColumnType(index, name, kind) => Self::InvalidData(format!(
                "column {index} `{name}` holds unexpected {kind} value"
            )),
            other => Self::Db(DbError::Sqlite(other)),
        }
    }
}

/// Listing options for registry scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterListQuery {
    /// Substring matched against `key` or `name` with SQLite `LIKE`
    /// (case-insensitive for ASCII letters only).
    pub search: Option<String>,
    pub value: Option<ValueFilter>,
    pub limit: Option<u32>,
}

impl Default for CounterListQuery {
    fn default() -> Self {
        Self {
            search: None,
            value: None,
            limit: Some(50),
        }
    }
}

/// Repository interface for the counter registry.
pub trait CounterRepository {
    /// Inserts a counter with `value = initial_value` and returns the stored row.
    fn insert_counter(&self, counter: &NewCounter) -> CounterResult<Counter>;
    fn find_counter(&self, key: &str) -> CounterResult<Option<Counter>>;
    /// Returns whether a row was updated.
    fn set_value(&self, key: &str, value: i64) -> CounterResult<bool>;
    fn set_step(&self, key: &str, step: i64) -> CounterResult<bool>;
    /// Atomically adds `step` (or the stored step) in `direction`.
    ///
    /// Fails with `Overflow`, leaving the row untouched, when the result
    /// does not fit in `i64`.
    fn apply_step(
        &self,
        key: &str,
        direction: StepDirection,
        step: Option<i64>,
    ) -> CounterResult<bool>;
    fn reset_value(&self, key: &str) -> CounterResult<bool>;
    /// Deletes the counter; attachments go with it.
    fn delete_counter(&self, key: &str) -> CounterResult<bool>;
    fn list_counters(&self, query: &CounterListQuery) -> CounterResult<Vec<Counter>>;
    fn counter_stats(&self) -> CounterResult<CounterStats>;
}

/// SQLite-backed counter registry.
pub struct SqliteCounterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCounterRepository<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CounterRepository for SqliteCounterRepository<'_> {
    fn insert_counter(&self, counter: &NewCounter) -> CounterResult<Counter> {
        counter.validate()?;

        let inserted = self.conn.execute(
            "INSERT INTO counters (key, name, initial_value, value, step, notes)
             VALUES (?1, ?2, ?3, ?3, ?4, ?5);",
            params![
                counter.key.as_str(),
                counter.name.as_str(),
                counter.initial_value,
                counter.step,
                counter.notes.as_deref(),
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation
                    && err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                return Err(CounterError::AlreadyExists(counter.key.clone()));
            }
            Err(err) => return Err(err.into()),
        }

        self.find_counter(&counter.key)?.ok_or_else(|| {
            CounterError::InvalidData(format!(
                "counter `{}` missing after insert",
                counter.key
            ))
        })
    }

    fn find_counter(&self, key: &str) -> CounterResult<Option<Counter>> {
        let counter = self
            .conn
            .query_row(
                &format!("SELECT {COUNTER_COLUMNS_SQL} FROM counters c WHERE c.key = ?1;"),
                [key],
                parse_counter_row,
            )
            .optional()?;
        Ok(counter)
    }

    fn set_value(&self, key: &str, value: i64) -> CounterResult<bool> {
        let changed = self.conn.execute(
            &format!("UPDATE counters SET value = ?2, {TOUCH_UPDATED_AT_SQL} WHERE key = ?1;"),
            params![key, value],
        )?;
        Ok(changed > 0)
    }

    fn set_step(&self, key: &str, step: i64) -> CounterResult<bool> {
        let changed = self.conn.execute(
            &format!("UPDATE counters SET step = ?2, {TOUCH_UPDATED_AT_SQL} WHERE key = ?1;"),
            params![key, step],
        )?;
        Ok(changed > 0)
    }

    fn apply_step(
        &self,
        key: &str,
        direction: StepDirection,
        step: Option<i64>,
    ) -> CounterResult<bool> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE counters
                 SET value = value + (?2 * COALESCE(?3, step)), {TOUCH_UPDATED_AT_SQL}
                 WHERE key = ?1
                   AND typeof(value + (?2 * COALESCE(?3, step))) = 'integer';"
            ),
            params![key, direction.sign(), step],
        )?;
        if changed > 0 {
            return Ok(true);
        }

        // SQLite promotes overflowing integer arithmetic to REAL, which the
        // guard above refuses to store.
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM counters WHERE key = ?1);",
            [key],
            |row| row.get(0),
        )?;
        if exists == 1 {
            return Err(CounterError::Overflow(key.to_string()));
        }
        Ok(false)
    }

    fn reset_value(&self, key: &str) -> CounterResult<bool> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE counters SET value = initial_value, {TOUCH_UPDATED_AT_SQL} WHERE key = ?1;"
            ),
            [key],
        )?;
        Ok(changed > 0)
    }

    fn delete_counter(&self, key: &str) -> CounterResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM counters WHERE key = ?1;", [key])?;
        Ok(changed > 0)
    }

    fn list_counters(&self, query: &CounterListQuery) -> CounterResult<Vec<Counter>> {
        let mut sql = format!("SELECT {COUNTER_COLUMNS_SQL} FROM counters c WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(search) = query.search.as_deref().filter(|value| !value.is_empty()) {
            sql.push_str(" AND (c.key LIKE ? ESCAPE '\\' OR c.name LIKE ? ESCAPE '\\')");
            let pattern = like_pattern(search);
            bind_values.push(Value::Text(pattern.clone()));
            bind_values.push(Value::Text(pattern));
        }

        if let Some(filter) = query.value {
            sql.push_str(&format!(" AND c.value {} ?", filter.sql_operator()));
            bind_values.push(Value::Integer(filter.operand()));
        }

        sql.push_str(" ORDER BY c.id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut counters = Vec::new();
        while let Some(row) = rows.next()? {
            counters.push(parse_counter_row(row)?);
        }

        Ok(counters)
    }

    fn counter_stats(&self) -> CounterResult<CounterStats> {
        let stats = self.conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(value), 0),
                AVG(value),
                MAX(value),
                MIN(value)
             FROM counters;",
            [],
            |row| {
                Ok(CounterStats {
                    total_counters: row.get::<_, i64>(0)?.unsigned_abs(),
                    total_value: row.get(1)?,
                    average_value: row.get(2)?,
                    max_value: row.get(3)?,
                    min_value: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }
}

/// Builds a `LIKE` substring pattern with `%`, `_` and `\` escaped.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for ch in search.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("views"), "%views%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
