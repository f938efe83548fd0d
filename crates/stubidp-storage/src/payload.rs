//! Mapping between caller payloads and table rows.
//!
//! Most kinds store the payload verbatim in the `payload` column and copy a
//! few relation fields (such as `grantId`) into indexed columns. Clients are
//! different: the well-known client metadata fields move into their own
//! columns and only the remaining fields stay in `payload`.

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::model::ModelKind;
use crate::schema::{CLIENTS, ColumnRole, TableDef};
use crate::types::{Payload, Record, SqlValue};

/// A payload prepared for storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelPayload {
    /// Stored verbatim.
    Generic(Payload),
    /// Client metadata split into promoted columns and a residual map.
    Client(ClientPayload),
}

impl ModelPayload {
    /// Prepares `payload` for the given kind.
    ///
    /// # Errors
    ///
    /// Returns a message when a Client payload has no usable `client_id`.
    pub fn from_payload(kind: ModelKind, payload: Payload) -> Result<Self, String> {
        match kind {
            ModelKind::Client => ClientPayload::from_payload(payload).map(Self::Client),
            _ => Ok(Self::Generic(payload)),
        }
    }

    /// The primary key value the row is stored under, when the payload
    /// carries its own key.
    #[must_use]
    pub fn embedded_key(&self) -> Option<&str> {
        match self {
            Self::Generic(_) => None,
            Self::Client(client) => Some(&client.client_id),
        }
    }

    /// Builds the full row for `table`.
    #[must_use]
    pub fn into_record(self, table: &TableDef, key: &str, expires_at: Option<i64>) -> Record {
        match self {
            Self::Client(client) => client.into_record(),
            Self::Generic(payload) => generic_record(table, key, expires_at, payload),
        }
    }
}

fn generic_record(table: &TableDef, key: &str, expires_at: Option<i64>, payload: Payload) -> Record {
    let mut record = Record::with_capacity(table.columns.len());
    for column in table.columns {
        let value = match column.role {
            ColumnRole::Key => SqlValue::Text(Some(key.to_string())),
            ColumnRole::ExpiresAt => SqlValue::BigInt(expires_at),
            ColumnRole::Relation(field) => SqlValue::Text(
                payload
                    .get(field)
                    .and_then(Value::as_str)
                    .map(str::to_string),
            ),
            // Filled in below so the payload is moved only once.
            ColumnRole::Payload => continue,
            ColumnRole::Promoted(_) => SqlValue::Text(None),
        };
        record.push(column.name, value);
    }
    record.push("payload", SqlValue::Json(Some(Value::Object(payload))));
    record
}

/// Reads the Unix-seconds expiry of a stored row.
#[must_use]
pub fn expires_at(record: &Record) -> Option<i64> {
    record.i64("expires_at")
}

/// Returns `true` if the row expired strictly before `now`.
#[must_use]
pub fn is_expired(record: &Record, now: i64) -> bool {
    expires_at(record).is_some_and(|at| at < now)
}

/// Takes the raw `payload` column out of a stored row.
///
/// For clients this is the residual map, not the reassembled payload.
///
/// # Errors
///
/// Returns [`StoreError::CorruptRow`] if the column holds something other than
/// a JSON object.
pub fn take_payload_column(table: &TableDef, record: &mut Record) -> StoreResult<Payload> {
    match record.take("payload").and_then(SqlValue::into_json) {
        None | Some(Value::Null) => Ok(Payload::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(StoreError::corrupt_row(
            table.name,
            format!("payload is not an object: {other}"),
        )),
    }
}

/// Reassembles the caller's payload from a stored row.
///
/// # Errors
///
/// Returns [`StoreError::CorruptRow`] for rows that do not fit the table.
pub fn decode_record(kind: ModelKind, mut record: Record) -> StoreResult<Payload> {
    match kind {
        ModelKind::Client => ClientPayload::from_record(record).map(ClientPayload::into_payload),
        _ => take_payload_column(kind.table(), &mut record),
    }
}

// =============================================================================
// Client Payload
// =============================================================================

/// Client registration metadata with the well-known fields promoted.
///
/// Only values of the column's type are promoted: a string field holding a
/// number, or any field holding `null`, stays in [`residual`](Self::residual)
/// so the payload reassembles exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientPayload {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uris: Option<Value>,
    pub response_types: Option<Value>,
    pub grant_types: Option<Value>,
    pub token_endpoint_auth_method: Option<String>,
    pub client_name: Option<String>,
    pub logo_uri: Option<String>,
    pub policy_uri: Option<String>,
    pub tos_uri: Option<String>,
    pub initiate_login_uri: Option<String>,
    pub post_logout_redirect_uris: Option<Value>,
    pub id_token_signed_response_alg: Option<String>,
    pub userinfo_signed_response_alg: Option<String>,
    /// Every field that was not promoted.
    pub residual: Payload,
}

fn take_string(map: &mut Payload, field: &str) -> Option<String> {
    match map.get(field) {
        Some(Value::String(_)) => match map.remove(field) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

fn take_json(map: &mut Payload, field: &str) -> Option<Value> {
    match map.get(field) {
        None | Some(Value::Null) => None,
        Some(_) => map.remove(field),
    }
}

fn put(map: &mut Payload, field: &str, value: Option<Value>) {
    if let Some(value) = value {
        map.insert(field.to_string(), value);
    }
}

impl ClientPayload {
    /// Splits a client payload into promoted fields and residual.
    ///
    /// # Errors
    ///
    /// Returns a message if `client_id` is missing, empty, or not a string.
    pub fn from_payload(mut map: Payload) -> Result<Self, String> {
        let client_id = match map.get("client_id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            _ => return Err("client_id is required for Client payloads".to_string()),
        };
        map.remove("client_id");

        Ok(Self {
            client_id,
            client_secret: take_string(&mut map, "client_secret"),
            redirect_uris: take_json(&mut map, "redirect_uris"),
            response_types: take_json(&mut map, "response_types"),
            grant_types: take_json(&mut map, "grant_types"),
            token_endpoint_auth_method: take_string(&mut map, "token_endpoint_auth_method"),
            client_name: take_string(&mut map, "client_name"),
            logo_uri: take_string(&mut map, "logo_uri"),
            policy_uri: take_string(&mut map, "policy_uri"),
            tos_uri: take_string(&mut map, "tos_uri"),
            initiate_login_uri: take_string(&mut map, "initiate_login_uri"),
            post_logout_redirect_uris: take_json(&mut map, "post_logout_redirect_uris"),
            id_token_signed_response_alg: take_string(&mut map, "id_token_signed_response_alg"),
            userinfo_signed_response_alg: take_string(&mut map, "userinfo_signed_response_alg"),
            residual: map,
        })
    }

    /// Reassembles the original payload.
    #[must_use]
    pub fn into_payload(self) -> Payload {
        let mut map = self.residual;
        map.insert("client_id".to_string(), Value::String(self.client_id));
        put(&mut map, "client_secret", self.client_secret.map(Value::String));
        put(&mut map, "redirect_uris", self.redirect_uris);
        put(&mut map, "response_types", self.response_types);
        put(&mut map, "grant_types", self.grant_types);
        put(
            &mut map,
            "token_endpoint_auth_method",
            self.token_endpoint_auth_method.map(Value::String),
        );
        put(&mut map, "client_name", self.client_name.map(Value::String));
        put(&mut map, "logo_uri", self.logo_uri.map(Value::String));
        put(&mut map, "policy_uri", self.policy_uri.map(Value::String));
        put(&mut map, "tos_uri", self.tos_uri.map(Value::String));
        put(
            &mut map,
            "initiate_login_uri",
            self.initiate_login_uri.map(Value::String),
        );
        put(
            &mut map,
            "post_logout_redirect_uris",
            self.post_logout_redirect_uris,
        );
        put(
            &mut map,
            "id_token_signed_response_alg",
            self.id_token_signed_response_alg.map(Value::String),
        );
        put(
            &mut map,
            "userinfo_signed_response_alg",
            self.userinfo_signed_response_alg.map(Value::String),
        );
        map
    }

    /// Builds a `clients` row, columns in table order.
    #[must_use]
    pub fn into_record(self) -> Record {
        Record::with_capacity(CLIENTS.columns.len())
            .with("client_id", SqlValue::Text(Some(self.client_id)))
            .with("client_secret", SqlValue::Text(self.client_secret))
            .with("redirect_uris", SqlValue::Json(self.redirect_uris))
            .with("response_types", SqlValue::Json(self.response_types))
            .with("grant_types", SqlValue::Json(self.grant_types))
            .with(
                "token_endpoint_auth_method",
                SqlValue::Text(self.token_endpoint_auth_method),
            )
            .with("client_name", SqlValue::Text(self.client_name))
            .with("logo_uri", SqlValue::Text(self.logo_uri))
            .with("policy_uri", SqlValue::Text(self.policy_uri))
            .with("tos_uri", SqlValue::Text(self.tos_uri))
            .with("initiate_login_uri", SqlValue::Text(self.initiate_login_uri))
            .with(
                "post_logout_redirect_uris",
                SqlValue::Json(self.post_logout_redirect_uris),
            )
            .with(
                "id_token_signed_response_alg",
                SqlValue::Text(self.id_token_signed_response_alg),
            )
            .with(
                "userinfo_signed_response_alg",
                SqlValue::Text(self.userinfo_signed_response_alg),
            )
            .with("payload", SqlValue::Json(Some(Value::Object(self.residual))))
    }

    /// Reads a `clients` row back.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptRow`] if `client_id` is NULL or the
    /// residual payload is not an object.
    pub fn from_record(mut record: Record) -> StoreResult<Self> {
        let mut text = |column: &str| match record.take(column) {
            Some(SqlValue::Text(value)) => value,
            _ => None,
        };

        let client_id = text("client_id")
            .ok_or_else(|| StoreError::corrupt_row(CLIENTS.name, "client_id is NULL"))?;
        let client_secret = text("client_secret");
        let token_endpoint_auth_method = text("token_endpoint_auth_method");
        let client_name = text("client_name");
        let logo_uri = text("logo_uri");
        let policy_uri = text("policy_uri");
        let tos_uri = text("tos_uri");
        let initiate_login_uri = text("initiate_login_uri");
        let id_token_signed_response_alg = text("id_token_signed_response_alg");
        let userinfo_signed_response_alg = text("userinfo_signed_response_alg");

        let mut json = |column: &str| {
            record
                .take(column)
                .and_then(SqlValue::into_json)
                .filter(|v| !v.is_null())
        };
        let redirect_uris = json("redirect_uris");
        let response_types = json("response_types");
        let grant_types = json("grant_types");
        let post_logout_redirect_uris = json("post_logout_redirect_uris");

        let residual = take_payload_column(&CLIENTS, &mut record)?;

        Ok(Self {
            client_id,
            client_secret,
            redirect_uris,
            response_types,
            grant_types,
            token_endpoint_auth_method,
            client_name,
            logo_uri,
            policy_uri,
            tos_uri,
            initiate_login_uri,
            post_logout_redirect_uris,
            id_token_signed_response_alg,
            userinfo_signed_response_alg,
            residual,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::{GRANTS, REFRESH_TOKENS};

    fn map(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_client_round_trip() {
        let original = map(json!({
            "client_id": "client-1",
            "client_secret": "s",
            "redirect_uris": ["http://localhost/callback"],
            "response_types": ["code"],
            "grant_types": ["authorization_code"],
            "client_name": "Test",
            "require_pushed_authorization_requests": false
        }));

        let client = ClientPayload::from_payload(original.clone()).expect("valid client");
        assert_eq!(client.client_id, "client-1");
        assert_eq!(client.client_secret.as_deref(), Some("s"));
        assert_eq!(
            client.residual,
            map(json!({"require_pushed_authorization_requests": false}))
        );

        let record = client.into_record();
        let columns: Vec<_> = record.iter().map(|(c, _)| c).collect();
        let expected: Vec<_> = CLIENTS.column_names().collect();
        assert_eq!(columns, expected);

        let back = ClientPayload::from_record(record).expect("decodes");
        assert_eq!(back.into_payload(), original);
    }

    #[test]
    fn test_client_keeps_mistyped_fields_in_residual() {
        let original = map(json!({
            "client_id": "client-1",
            "client_name": 7,
            "logo_uri": null,
            "redirect_uris": null
        }));

        let client = ClientPayload::from_payload(original.clone()).expect("valid client");
        assert!(client.client_name.is_none());
        assert!(client.redirect_uris.is_none());
        assert_eq!(client.residual.len(), 3);
        assert_eq!(client.into_payload(), original);
    }

    #[test]
    fn test_client_requires_client_id() {
        assert!(ClientPayload::from_payload(map(json!({"client_secret": "s"}))).is_err());
        assert!(ClientPayload::from_payload(map(json!({"client_id": ""}))).is_err());
        assert!(ClientPayload::from_payload(map(json!({"client_id": 5}))).is_err());
    }

    #[test]
    fn test_generic_record_copies_relations() {
        let payload = map(json!({"grantId": "g-1", "accountId": "acc"}));
        let record = ModelPayload::Generic(payload.clone()).into_record(&REFRESH_TOKENS, "rt-1", Some(10));

        assert_eq!(record.text("id"), Some("rt-1"));
        assert_eq!(record.text("grant_id"), Some("g-1"));
        assert_eq!(record.i64("expires_at"), Some(10));
        assert_eq!(
            decode_record(ModelKind::RefreshToken, record).expect("decodes"),
            payload
        );
    }

    #[test]
    fn test_grant_record_relations() {
        let payload = map(json!({"clientId": "c-1", "accountId": "acc-1"}));
        let record = ModelPayload::Generic(payload).into_record(&GRANTS, "g-1", None);
        assert_eq!(record.text("client_id"), Some("c-1"));
        assert_eq!(record.text("account_id"), Some("acc-1"));
        assert!(record.get("expires_at").is_some_and(SqlValue::is_null));
    }

    #[test]
    fn test_expiry_is_strict() {
        let record = Record::new().with("expires_at", SqlValue::BigInt(Some(100)));
        assert!(!is_expired(&record, 100));
        assert!(is_expired(&record, 101));
        assert!(!is_expired(&Record::new(), i64::MAX));
    }

    #[test]
    fn test_corrupt_payload_column() {
        let mut record = Record::new().with("payload", SqlValue::Json(Some(json!([1, 2]))));
        let err = take_payload_column(&REFRESH_TOKENS, &mut record).expect_err("not an object");
        assert!(matches!(err, StoreError::CorruptRow { .. }));
    }
}
