//! Dialect-specific SQL for the [`RowStore`](crate::RowStore) operations.
//!
//! Every statement is rendered with positional bind parameters; table and
//! column names come from the static [`TableDef`]s and are never taken from
//! caller input.

use crate::schema::{SqlDialect, TableDef};
use crate::types::{Filter, Record, SqlValue};

/// A rendered SQL statement with its bind values in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

impl Statement {
    fn new(sql: String, binds: Vec<SqlValue>) -> Self {
        Self { sql, binds }
    }
}

fn text(value: &str) -> SqlValue {
    SqlValue::Text(Some(value.to_string()))
}

impl SqlDialect {
    /// Renders a filter as a predicate using bind parameter `index`.
    fn predicate(self, filter: Filter<'_>, index: usize) -> String {
        let lhs = match filter {
            Filter::Column { column, .. } => column.to_string(),
            Filter::PayloadField { field, .. } => self.payload_field(field),
        };
        format!("{lhs} = {}", self.placeholder(index))
    }

    /// Atomic insert-or-replace keyed by the table's primary key.
    ///
    /// Both dialects accept `ON CONFLICT ... DO UPDATE SET col = excluded.col`.
    #[must_use]
    pub fn upsert(self, table: &TableDef, record: &Record) -> Statement {
        let key = table.key_column();
        let mut columns = Vec::with_capacity(record.len());
        let mut placeholders = Vec::with_capacity(record.len());
        let mut updates = Vec::with_capacity(record.len());
        let mut binds = Vec::with_capacity(record.len());

        for (i, (column, value)) in record.iter().enumerate() {
            columns.push(column);
            placeholders.push(self.placeholder(i + 1));
            if column != key {
                updates.push(format!("{column} = excluded.{column}"));
            }
            binds.push(value.clone());
        }

        let conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
            table.name,
            columns.join(", "),
            placeholders.join(", "),
            key,
            conflict
        );
        Statement::new(sql, binds)
    }

    /// Selects every column of the first row matching `filter`.
    ///
    /// Payload-field matches are not unique, so on expiring tables rows
    /// without expiry come first, then the latest `expires_at`.
    #[must_use]
    pub fn select_one(self, table: &TableDef, filter: Filter<'_>) -> Statement {
        let columns: Vec<&str> = table.column_names().collect();
        let order = match filter {
            Filter::PayloadField { .. } if table.has_expiry() => {
                " ORDER BY (expires_at IS NULL) DESC, expires_at DESC"
            }
            _ => "",
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE {}{} LIMIT 1",
            columns.join(", "),
            table.name,
            self.predicate(filter, 1),
            order
        );
        Statement::new(sql, vec![text(filter.value())])
    }

    /// Updates one column of the row with primary key `key`.
    #[must_use]
    pub fn update_by_key(
        self,
        table: &TableDef,
        key: &str,
        column: &str,
        value: SqlValue,
    ) -> Statement {
        let sql = format!(
            "UPDATE {} SET {} = {} WHERE {} = {}",
            table.name,
            column,
            self.placeholder(1),
            table.key_column(),
            self.placeholder(2)
        );
        Statement::new(sql, vec![value, text(key)])
    }

    /// Deletes every row matching `filter`.
    #[must_use]
    pub fn delete_where(self, table: &TableDef, filter: Filter<'_>) -> Statement {
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            table.name,
            self.predicate(filter, 1)
        );
        Statement::new(sql, vec![text(filter.value())])
    }

    /// Deletes every row that expired strictly before `now`.
    #[must_use]
    pub fn delete_expired(self, table: &TableDef, now: i64) -> Statement {
        let sql = format!(
            "DELETE FROM {} WHERE expires_at IS NOT NULL AND expires_at < {}",
            table.name,
            self.placeholder(1)
        );
        Statement::new(sql, vec![SqlValue::BigInt(Some(now))])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::{ACCESS_TOKENS, CLIENTS, DEVICE_CODES, SESSIONS};

    fn token_record() -> Record {
        Record::new()
            .with("id", text("at-1"))
            .with("grant_id", text("g-1"))
            .with("expires_at", SqlValue::BigInt(Some(100)))
            .with("payload", SqlValue::Json(Some(json!({"grantId": "g-1"}))))
    }

    #[test]
    fn test_postgres_upsert() {
        let stmt = SqlDialect::Postgres.upsert(&ACCESS_TOKENS, &token_record());
        assert_eq!(
            stmt.sql,
            "INSERT INTO access_tokens (id, grant_id, expires_at, payload) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET grant_id = excluded.grant_id, \
             expires_at = excluded.expires_at, payload = excluded.payload"
        );
        assert_eq!(stmt.binds.len(), 4);
        assert_eq!(stmt.binds[0], text("at-1"));
    }

    #[test]
    fn test_sqlite_upsert_uses_question_marks() {
        let stmt = SqlDialect::Sqlite.upsert(&ACCESS_TOKENS, &token_record());
        assert!(stmt.sql.contains("VALUES (?, ?, ?, ?)"));
        assert!(stmt.sql.contains("ON CONFLICT (id) DO UPDATE SET"));
    }

    #[test]
    fn test_client_upsert_conflicts_on_client_id() {
        let record = Record::new()
            .with("client_id", text("client-1"))
            .with("client_secret", text("s"));
        let stmt = SqlDialect::Postgres.upsert(&CLIENTS, &record);
        assert!(stmt.sql.ends_with(
            "ON CONFLICT (client_id) DO UPDATE SET client_secret = excluded.client_secret"
        ));
    }

    #[test]
    fn test_select_by_payload_field() {
        let pg = SqlDialect::Postgres.select_one(&DEVICE_CODES, Filter::payload_field("userCode", "ABCD"));
        assert_eq!(
            pg.sql,
            "SELECT id, grant_id, expires_at, payload FROM device_codes \
             WHERE payload->>'userCode' = $1 \
             ORDER BY (expires_at IS NULL) DESC, expires_at DESC LIMIT 1"
        );
        assert_eq!(pg.binds, vec![text("ABCD")]);

        let lite = SqlDialect::Sqlite.select_one(&SESSIONS, Filter::payload_field("uid", "u1"));
        assert_eq!(
            lite.sql,
            "SELECT id, expires_at, payload FROM sessions \
             WHERE json_extract(payload, '$.uid') = ? \
             ORDER BY (expires_at IS NULL) DESC, expires_at DESC LIMIT 1"
        );
    }

    #[test]
    fn test_update_by_key_binds_value_then_key() {
        let stmt = SqlDialect::Postgres.update_by_key(
            &CLIENTS,
            "client-1",
            "payload",
            SqlValue::Json(Some(json!({}))),
        );
        assert_eq!(
            stmt.sql,
            "UPDATE clients SET payload = $1 WHERE client_id = $2"
        );
        assert_eq!(stmt.binds[1], text("client-1"));
    }

    #[test]
    fn test_delete_statements() {
        let by_grant = SqlDialect::Sqlite.delete_where(&ACCESS_TOKENS, Filter::column("grant_id", "g-1"));
        assert_eq!(by_grant.sql, "DELETE FROM access_tokens WHERE grant_id = ?");

        let expired = SqlDialect::Postgres.delete_expired(&SESSIONS, 1_700_000_000);
        assert_eq!(
            expired.sql,
            "DELETE FROM sessions WHERE expires_at IS NOT NULL AND expires_at < $1"
        );
        assert_eq!(expired.binds, vec![SqlValue::BigInt(Some(1_700_000_000))]);
    }
}
