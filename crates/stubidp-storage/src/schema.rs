//! Relational schema for the eight OIDC model tables.
//!
//! Table shapes are declared once as static [`TableDef`]s and rendered into
//! dialect-specific DDL by [`SqlDialect`]. This is the only layer (together
//! with [`crate::query`]) that knows the two dialects apart.
//!
//! # Table Structure
//!
//! Every table except `clients` follows the same layout:
//!
//! ```text
//! id          TEXT PRIMARY KEY
//! <relation>  TEXT            -- grant_id, or client_id/account_id on grants
//! expires_at  BIGINT          -- Unix seconds, NULL for "never"
//! payload     JSON
//! ```
//!
//! `clients` is keyed by `client_id` and promotes the well-known client
//! metadata fields into their own columns, keeping the rest in `payload`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Storage type of a column, independent of dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Plain text.
    Text,
    /// 64-bit integer (Unix seconds for `expires_at`).
    BigInt,
    /// A JSON document.
    Json,
}

/// What a column holds relative to the caller's payload map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// The primary key.
    Key,
    /// The opaque payload map (residual map for clients).
    Payload,
    /// Absolute expiry in Unix seconds.
    ExpiresAt,
    /// Copied from the named payload field so it can be indexed and filtered.
    /// The payload keeps the field.
    Relation(&'static str),
    /// Moved out of the payload into its own column (clients only).
    Promoted(&'static str),
}

/// A column in a [`TableDef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub role: ColumnRole,
}

impl ColumnDef {
    const fn new(name: &'static str, ty: ColumnType, role: ColumnRole) -> Self {
        Self { name, ty, role }
    }

    const fn key(name: &'static str) -> Self {
        Self::new(name, ColumnType::Text, ColumnRole::Key)
    }

    const fn payload() -> Self {
        Self::new("payload", ColumnType::Json, ColumnRole::Payload)
    }

    const fn expires_at() -> Self {
        Self::new("expires_at", ColumnType::BigInt, ColumnRole::ExpiresAt)
    }

    const fn relation(name: &'static str, field: &'static str) -> Self {
        Self::new(name, ColumnType::Text, ColumnRole::Relation(field))
    }

    const fn promoted(name: &'static str, ty: ColumnType) -> Self {
        // Client columns use the snake_case payload field name as column name.
        Self::new(name, ty, ColumnRole::Promoted(name))
    }
}

/// What an index covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexTarget {
    /// A top-level column.
    Column(&'static str),
    /// A string field nested in the `payload` JSON column.
    PayloadField(&'static str),
}

/// A secondary index in a [`TableDef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    pub name: &'static str,
    pub target: IndexTarget,
}

impl IndexDef {
    const fn column(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            target: IndexTarget::Column(column),
        }
    }

    const fn payload_field(name: &'static str, field: &'static str) -> Self {
        Self {
            name,
            target: IndexTarget::PayloadField(field),
        }
    }
}

/// Declarative shape of one model table.
#[derive(Debug, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub indexes: &'static [IndexDef],
}

impl TableDef {
    /// The primary key column.
    #[must_use]
    pub fn key_column(&self) -> &'static str {
        self.columns
            .iter()
            .find(|c| c.role == ColumnRole::Key)
            .map_or("id", |c| c.name)
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns `true` if the table has a column with the given name.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns `true` if rows of this table can expire.
    #[must_use]
    pub fn has_expiry(&self) -> bool {
        self.columns.iter().any(|c| c.role == ColumnRole::ExpiresAt)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

// =============================================================================
// Table Definitions
// =============================================================================

pub static CLIENTS: TableDef = TableDef {
    name: "clients",
    columns: &[
        ColumnDef::key("client_id"),
        ColumnDef::promoted("client_secret", ColumnType::Text),
        ColumnDef::promoted("redirect_uris", ColumnType::Json),
        ColumnDef::promoted("response_types", ColumnType::Json),
        ColumnDef::promoted("grant_types", ColumnType::Json),
        ColumnDef::promoted("token_endpoint_auth_method", ColumnType::Text),
        ColumnDef::promoted("client_name", ColumnType::Text),
        ColumnDef::promoted("logo_uri", ColumnType::Text),
        ColumnDef::promoted("policy_uri", ColumnType::Text),
        ColumnDef::promoted("tos_uri", ColumnType::Text),
        ColumnDef::promoted("initiate_login_uri", ColumnType::Text),
        ColumnDef::promoted("post_logout_redirect_uris", ColumnType::Json),
        ColumnDef::promoted("id_token_signed_response_alg", ColumnType::Text),
        ColumnDef::promoted("userinfo_signed_response_alg", ColumnType::Text),
        ColumnDef::payload(),
    ],
    indexes: &[],
};

pub static SESSIONS: TableDef = TableDef {
    name: "sessions",
    columns: &[
        ColumnDef::key("id"),
        ColumnDef::expires_at(),
        ColumnDef::payload(),
    ],
    indexes: &[
        IndexDef::payload_field("sessions_uid_idx", "uid"),
        IndexDef::column("sessions_expires_at_idx", "expires_at"),
    ],
};

pub static ACCESS_TOKENS: TableDef = TableDef {
    name: "access_tokens",
    columns: &[
        ColumnDef::key("id"),
        ColumnDef::relation("grant_id", "grantId"),
        ColumnDef::expires_at(),
        ColumnDef::payload(),
    ],
    indexes: &[
        IndexDef::column("access_tokens_grant_id_idx", "grant_id"),
        IndexDef::column("access_tokens_expires_at_idx", "expires_at"),
    ],
};

pub static AUTHORIZATION_CODES: TableDef = TableDef {
    name: "authorization_codes",
    columns: &[
        ColumnDef::key("id"),
        ColumnDef::relation("grant_id", "grantId"),
        ColumnDef::expires_at(),
        ColumnDef::payload(),
    ],
    indexes: &[
        IndexDef::column("authorization_codes_grant_id_idx", "grant_id"),
        IndexDef::column("authorization_codes_expires_at_idx", "expires_at"),
    ],
};

pub static REFRESH_TOKENS: TableDef = TableDef {
    name: "refresh_tokens",
    columns: &[
        ColumnDef::key("id"),
        ColumnDef::relation("grant_id", "grantId"),
        ColumnDef::expires_at(),
        ColumnDef::payload(),
    ],
    indexes: &[
        IndexDef::column("refresh_tokens_grant_id_idx", "grant_id"),
        IndexDef::column("refresh_tokens_expires_at_idx", "expires_at"),
    ],
};

pub static DEVICE_CODES: TableDef = TableDef {
    name: "device_codes",
    columns: &[
        ColumnDef::key("id"),
        ColumnDef::relation("grant_id", "grantId"),
        ColumnDef::expires_at(),
        ColumnDef::payload(),
    ],
    indexes: &[
        IndexDef::column("device_codes_grant_id_idx", "grant_id"),
        IndexDef::payload_field("device_codes_user_code_idx", "userCode"),
        IndexDef::column("device_codes_expires_at_idx", "expires_at"),
    ],
};

pub static BACKCHANNEL_AUTHENTICATION_REQUESTS: TableDef = TableDef {
    name: "backchannel_authentication_requests",
    columns: &[
        ColumnDef::key("id"),
        ColumnDef::relation("grant_id", "grantId"),
        ColumnDef::expires_at(),
        ColumnDef::payload(),
    ],
    indexes: &[
        IndexDef::column("backchannel_auth_grant_id_idx", "grant_id"),
        IndexDef::column("backchannel_auth_expires_at_idx", "expires_at"),
    ],
};

pub static GRANTS: TableDef = TableDef {
    name: "grants",
    columns: &[
        ColumnDef::key("id"),
        ColumnDef::relation("client_id", "clientId"),
        ColumnDef::relation("account_id", "accountId"),
        ColumnDef::expires_at(),
        ColumnDef::payload(),
    ],
    indexes: &[
        IndexDef::column("grants_client_id_idx", "client_id"),
        IndexDef::column("grants_account_id_idx", "account_id"),
        IndexDef::column("grants_expires_at_idx", "expires_at"),
    ],
};

/// All model tables, in creation order.
pub static ALL_TABLES: [&TableDef; 8] = [
    &CLIENTS,
    &SESSIONS,
    &ACCESS_TOKENS,
    &AUTHORIZATION_CODES,
    &REFRESH_TOKENS,
    &DEVICE_CODES,
    &BACKCHANNEL_AUTHENTICATION_REQUESTS,
    &GRANTS,
];

// =============================================================================
// Dialects
// =============================================================================

/// The relational engine backing the tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    /// Server-based PostgreSQL.
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    /// Embedded, file-based SQLite.
    Sqlite,
}

impl SqlDialect {
    /// Column type keyword for this dialect.
    #[must_use]
    pub fn column_type(self, ty: ColumnType) -> &'static str {
        match (self, ty) {
            (_, ColumnType::Text) => "TEXT",
            (Self::Postgres, ColumnType::BigInt) => "BIGINT",
            (Self::Sqlite, ColumnType::BigInt) => "INTEGER",
            (Self::Postgres, ColumnType::Json) => "JSONB",
            (Self::Sqlite, ColumnType::Json) => "TEXT",
        }
    }

    /// Bind placeholder for the 1-based parameter `index`.
    #[must_use]
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::Sqlite => "?".to_string(),
        }
    }

    /// Expression extracting a string field from the `payload` column.
    ///
    /// `field` always comes from a static table definition, never from
    /// caller input.
    #[must_use]
    pub fn payload_field(self, field: &str) -> String {
        match self {
            Self::Postgres => format!("payload->>'{field}'"),
            Self::Sqlite => format!("json_extract(payload, '$.{field}')"),
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for a table.
    #[must_use]
    pub fn create_table(self, table: &TableDef) -> String {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let mut col = format!("{} {}", c.name, self.column_type(c.ty));
                if c.role == ColumnRole::Key {
                    col.push_str(" PRIMARY KEY");
                }
                col
            })
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            table.name,
            columns.join(", ")
        )
    }

    /// `CREATE INDEX IF NOT EXISTS` statements for a table.
    #[must_use]
    pub fn create_indexes(self, table: &TableDef) -> Vec<String> {
        table
            .indexes
            .iter()
            .map(|idx| {
                let target = match idx.target {
                    IndexTarget::Column(column) => column.to_string(),
                    // Expression indexes need an extra pair of parentheses in PostgreSQL.
                    IndexTarget::PayloadField(field) => match self {
                        Self::Postgres => format!("({})", self.payload_field(field)),
                        Self::Sqlite => self.payload_field(field),
                    },
                };
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                    idx.name, table.name, target
                )
            })
            .collect()
    }

    /// All DDL statements needed for the eight tables, in order.
    #[must_use]
    pub fn schema_statements(self) -> Vec<String> {
        ALL_TABLES
            .iter()
            .flat_map(|table| {
                std::iter::once(self.create_table(table)).chain(self.create_indexes(table))
            })
            .collect()
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unsupported database dialect: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tables_have_payload_and_key() {
        for table in ALL_TABLES {
            assert!(table.has_column("payload"), "{} lacks payload", table.name);
            let keys = table
                .columns
                .iter()
                .filter(|c| c.role == ColumnRole::Key)
                .count();
            assert_eq!(keys, 1, "{} must have exactly one key", table.name);
        }
    }

    #[test]
    fn test_clients_keyed_by_client_id_without_expiry() {
        assert_eq!(CLIENTS.key_column(), "client_id");
        assert!(!CLIENTS.has_expiry());
        assert!(!CLIENTS.has_column("grant_id"));
    }

    #[test]
    fn test_every_lookup_column_is_indexed() {
        for table in ALL_TABLES {
            for column in table.columns {
                if matches!(column.role, ColumnRole::Relation(_) | ColumnRole::ExpiresAt) {
                    assert!(
                        table
                            .indexes
                            .iter()
                            .any(|i| i.target == IndexTarget::Column(column.name)),
                        "{}.{} is not indexed",
                        table.name,
                        column.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_postgres_create_table() {
        assert_eq!(
            SqlDialect::Postgres.create_table(&ACCESS_TOKENS),
            "CREATE TABLE IF NOT EXISTS access_tokens (id TEXT PRIMARY KEY, grant_id TEXT, \
             expires_at BIGINT, payload JSONB)"
        );
    }

    #[test]
    fn test_sqlite_create_table() {
        assert_eq!(
            SqlDialect::Sqlite.create_table(&SESSIONS),
            "CREATE TABLE IF NOT EXISTS sessions (id TEXT PRIMARY KEY, expires_at INTEGER, \
             payload TEXT)"
        );
    }

    #[test]
    fn test_expression_indexes_per_dialect() {
        let pg = SqlDialect::Postgres.create_indexes(&DEVICE_CODES);
        assert!(pg.contains(
            &"CREATE INDEX IF NOT EXISTS device_codes_user_code_idx ON device_codes \
              ((payload->>'userCode'))"
                .to_string()
        ));

        let lite = SqlDialect::Sqlite.create_indexes(&SESSIONS);
        assert_eq!(
            lite[0],
            "CREATE INDEX IF NOT EXISTS sessions_uid_idx ON sessions \
             (json_extract(payload, '$.uid'))"
        );
    }

    #[test]
    fn test_schema_statements_cover_all_tables() {
        for dialect in [SqlDialect::Postgres, SqlDialect::Sqlite] {
            let statements = dialect.schema_statements();
            let tables = statements
                .iter()
                .filter(|s| s.starts_with("CREATE TABLE"))
                .count();
            assert_eq!(tables, 8);
        }
    }

    #[test]
    fn test_dialect_parsing() {
        assert_eq!("postgresql".parse::<SqlDialect>(), Ok(SqlDialect::Postgres));
        assert_eq!("POSTGRES".parse::<SqlDialect>(), Ok(SqlDialect::Postgres));
        assert_eq!("sqlite".parse::<SqlDialect>(), Ok(SqlDialect::Sqlite));
        assert!("mysql".parse::<SqlDialect>().is_err());

        let parsed: SqlDialect = serde_json::from_str("\"postgresql\"").expect("alias");
        assert_eq!(parsed, SqlDialect::Postgres);
        assert_eq!(SqlDialect::Sqlite.to_string(), "sqlite");
    }
}
