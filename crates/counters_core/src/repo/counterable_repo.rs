//! Counter attachment repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist owner-scoped counter values in the `counterables` join table.
//! - Provide owner-scoped listings and aggregates.
//!
//! # Invariants
//! - At most one row exists per `(owner_type, owner_id, counter_id)`; the
//!   unique constraint makes repeated attaches a no-op.
//! - Rows disappear with their counter (`ON DELETE CASCADE`).
//! - Pivot arithmetic is a single additive `UPDATE`.

use crate::model::counter::CounterId;
use crate::model::counterable::{AttachedCounter, OwnerRef};
use crate::repo::counter_repo::{CounterError, CounterResult};
use crate::repo::{parse_counter_row, StepDirection, ValueFilter, COUNTER_COLUMNS_SQL};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const OWNER_MATCH_SQL: &str = "owner_type = ?1 AND owner_id = ?2";
const STORED_STEP_SQL: &str =
    "(SELECT c.step FROM counters c WHERE c.id = counterables.counter_id)";

/// Repository interface for owner-scoped counter attachments.
pub trait CounterableRepository {
    /// Links `counter_id` to `owner` seeded with `value`.
    ///
    /// Returns `false` without touching the existing row when the link is
    /// already present.
    fn attach(&self, owner: OwnerRef, counter_id: CounterId, value: i64) -> CounterResult<bool>;
    fn detach(&self, owner: OwnerRef, counter_id: CounterId) -> CounterResult<bool>;
    fn has_attachment(&self, owner: OwnerRef, key: &str) -> CounterResult<bool>;
    /// Lists the owner's attachments in attach order.
    fn list_attached(
        &self,
        owner: OwnerRef,
        filter: Option<ValueFilter>,
    ) -> CounterResult<Vec<AttachedCounter>>;
    /// Atomically adds `step` (or the counter's stored step) in `direction`.
    ///
    /// Fails with `Overflow`, leaving the row untouched, when the result
    /// does not fit in `i64`.
    fn apply_step(
        &self,
        owner: OwnerRef,
        counter_id: CounterId,
        direction: StepDirection,
        step: Option<i64>,
    ) -> CounterResult<bool>;
    fn set_value(&self, owner: OwnerRef, counter_id: CounterId, value: i64)
        -> CounterResult<bool>;
    /// Resets to `value`, or to the counter's `initial_value` when `None`.
    fn reset_value(
        &self,
        owner: OwnerRef,
        counter_id: CounterId,
        value: Option<i64>,
    ) -> CounterResult<bool>;
    fn total_value(&self, owner: OwnerRef) -> CounterResult<i64>;
    fn average_value(&self, owner: OwnerRef) -> CounterResult<f64>;
}

/// SQLite-backed attachment ledger.
pub struct SqliteCounterableRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCounterableRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CounterableRepository for SqliteCounterableRepository<'_> {
    fn attach(&self, owner: OwnerRef, counter_id: CounterId, value: i64) -> CounterResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO counterables (owner_type, owner_id, counter_id, value)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (owner_type, owner_id, counter_id) DO NOTHING;",
            params![owner.owner_type, owner.owner_id, counter_id, value],
        )?;
        Ok(inserted > 0)
    }

    fn detach(&self, owner: OwnerRef, counter_id: CounterId) -> CounterResult<bool> {
        let removed = self.conn.execute(
            &format!("DELETE FROM counterables WHERE {OWNER_MATCH_SQL} AND counter_id = ?3;"),
            params![owner.owner_type, owner.owner_id, counter_id],
        )?;
        Ok(removed > 0)
    }

    fn has_attachment(&self, owner: OwnerRef, key: &str) -> CounterResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM counterables ca
                INNER JOIN counters c ON c.id = ca.counter_id
                WHERE ca.owner_type = ?1 AND ca.owner_id = ?2 AND c.key = ?3
            );",
            params![owner.owner_type, owner.owner_id, key],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_attached(
        &self,
        owner: OwnerRef,
        filter: Option<ValueFilter>,
    ) -> CounterResult<Vec<AttachedCounter>> {
        let mut sql = format!(
            "SELECT
                {COUNTER_COLUMNS_SQL},
                ca.value AS pivot_value,
                ca.created_at AS attached_at,
                ca.updated_at AS pivot_updated_at
             FROM counterables ca
             INNER JOIN counters c ON c.id = ca.counter_id
             WHERE ca.owner_type = ? AND ca.owner_id = ?"
        );
        let mut bind_values = vec![
            Value::Text(owner.owner_type.to_string()),
            Value::Integer(owner.owner_id),
        ];

        if let Some(filter) = filter {
            sql.push_str(&format!(" AND ca.value {} ?", filter.sql_operator()));
            bind_values.push(Value::Integer(filter.operand()));
        }
        sql.push_str(" ORDER BY ca.id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut attached = Vec::new();
        while let Some(row) = rows.next()? {
            attached.push(parse_attached_row(row)?);
        }

        Ok(attached)
    }

    fn apply_step(
        &self,
        owner: OwnerRef,
        counter_id: CounterId,
        direction: StepDirection,
        step: Option<i64>,
    ) -> CounterResult<bool> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE counterables
                 SET
                    value = value + (?4 * COALESCE(?5, {STORED_STEP_SQL})),
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE {OWNER_MATCH_SQL} AND counter_id = ?3
                   AND typeof(value + (?4 * COALESCE(?5, {STORED_STEP_SQL}))) = 'integer';"
            ),
            params![
                owner.owner_type,
                owner.owner_id,
                counter_id,
                direction.sign(),
                step
            ],
        )?;
        if changed > 0 {
            return Ok(true);
        }

        // Overflowing arithmetic is promoted to REAL and refused by the guard.
        let key: Option<String> = self
            .conn
            .query_row(
                "SELECT c.key
                 FROM counterables ca
                 INNER JOIN counters c ON c.id = ca.counter_id
                 WHERE ca.owner_type = ?1 AND ca.owner_id = ?2 AND ca.counter_id = ?3;",
                params![owner.owner_type, owner.owner_id, counter_id],
                |row| row.get(0),
            )
            .optional()?;
        match key {
            Some(key) => Err(CounterError::Overflow(key)),
            None => Ok(false),
        }
    }

    fn set_value(
        &self,
        owner: OwnerRef,
        counter_id: CounterId,
        value: i64,
    ) -> CounterResult<bool> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE counterables
                 SET value = ?4, updated_at = (strftime('%s', 'now') * 1000)
                 WHERE {OWNER_MATCH_SQL} AND counter_id = ?3;"
            ),
            params![owner.owner_type, owner.owner_id, counter_id, value],
        )?;
        Ok(changed > 0)
    }

    fn reset_value(
        &self,
        owner: OwnerRef,
        counter_id: CounterId,
        value: Option<i64>,
    ) -> CounterResult<bool> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE counterables
                 SET
                    value = COALESCE(
                        ?4,
                        (SELECT c.initial_value FROM counters c WHERE c.id = counterables.counter_id)
                    ),
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE {OWNER_MATCH_SQL} AND counter_id = ?3;"
            ),
            params![owner.owner_type, owner.owner_id, counter_id, value],
        )?;
        Ok(changed > 0)
    }

    fn total_value(&self, owner: OwnerRef) -> CounterResult<i64> {
        let total = self.conn.query_row(
            &format!("SELECT COALESCE(SUM(value), 0) FROM counterables WHERE {OWNER_MATCH_SQL};"),
            params![owner.owner_type, owner.owner_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn average_value(&self, owner: OwnerRef) -> CounterResult<f64> {
        let average: Option<f64> = self.conn.query_row(
            &format!("SELECT AVG(value) FROM counterables WHERE {OWNER_MATCH_SQL};"),
            params![owner.owner_type, owner.owner_id],
            |row| row.get(0),
        )?;
        Ok(average.unwrap_or(0.0))
    }
}

fn parse_attached_row(row: &Row<'_>) -> rusqlite::Result<AttachedCounter> {
    Ok(AttachedCounter {
        counter: parse_counter_row(row)?,
        value: row.get("pivot_value")?,
        attached_at: row.get("attached_at")?,
        updated_at: row.get("pivot_updated_at")?,
    })
}
