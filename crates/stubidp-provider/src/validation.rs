//! Payload validators.
//!
//! One typed schema per model kind, checked with `validator`. Unknown keys
//! are always allowed. The adapter does not call these; they are for
//! diagnostics and for checking registered clients.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use stubidp_storage::ModelKind;
use url::Url;
use validator::{Validate, ValidationError};

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Field the check applies to; empty when the payload shape is wrong.
    pub path: String,
    pub message: String,
}

/// All violations found in a payload, sorted by path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("payload failed validation: {}", summary(.0))]
pub struct ValidationErrors(pub Vec<Violation>);

fn summary(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.path, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.0
    }

    /// The first violation, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Violation> {
        self.0.first()
    }
}

// =============================================================================
// Schemas
// =============================================================================

#[derive(Debug, Deserialize)]
pub enum ResponseType {
    #[serde(rename = "code")]
    Code,
    #[serde(rename = "token")]
    Token,
    #[serde(rename = "id_token")]
    IdToken,
    #[serde(rename = "code token")]
    CodeToken,
    #[serde(rename = "code id_token")]
    CodeIdToken,
    #[serde(rename = "token id_token")]
    TokenIdToken,
    #[serde(rename = "code token id_token")]
    CodeTokenIdToken,
}

#[derive(Debug, Deserialize)]
pub enum GrantType {
    #[serde(rename = "authorization_code")]
    AuthorizationCode,
    #[serde(rename = "implicit")]
    Implicit,
    #[serde(rename = "refresh_token")]
    RefreshToken,
    #[serde(rename = "client_credentials")]
    ClientCredentials,
    #[serde(rename = "urn:ietf:params:oauth:grant-type:device_code")]
    DeviceCode,
    #[serde(rename = "urn:openid:params:grant-type:ciba")]
    Ciba,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    ClientSecretBasic,
    ClientSecretPost,
    ClientSecretJwt,
    PrivateKeyJwt,
    None,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ClientPayloadSchema {
    #[validate(length(min = 1, message = "client_id is required"))]
    pub client_id: String,
    pub client_secret: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_redirect_uris"))]
    pub redirect_uris: Vec<String>,
    pub response_types: Option<Vec<ResponseType>>,
    pub grant_types: Option<Vec<GrantType>>,
    pub token_endpoint_auth_method: Option<TokenEndpointAuthMethod>,
    pub client_name: Option<String>,
    #[validate(url(message = "Invalid url"))]
    pub logo_uri: Option<String>,
    #[validate(url(message = "Invalid url"))]
    pub policy_uri: Option<String>,
    #[validate(url(message = "Invalid url"))]
    pub tos_uri: Option<String>,
    #[validate(url(message = "Invalid url"))]
    pub initiate_login_uri: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_post_logout_redirect_uris"))]
    pub post_logout_redirect_uris: Vec<String>,
    pub id_token_signed_response_alg: Option<String>,
    pub userinfo_signed_response_alg: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayloadSchema {
    pub uid: Option<String>,
    pub account_id: Option<String>,
    pub login_ts: Option<f64>,
    pub acr: Option<String>,
    pub amr: Option<Vec<String>>,
}

/// Shared by every token-like kind.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayloadSchema {
    pub account_id: Option<String>,
    pub client_id: Option<String>,
    pub grant_id: Option<String>,
    pub scope: Option<String>,
    pub sid: Option<String>,
    pub iat: Option<f64>,
    pub exp: Option<f64>,
    pub consumed: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ScopeSchema {
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GrantPayloadSchema {
    pub account_id: Option<String>,
    pub client_id: Option<String>,
    pub openid: Option<ScopeSchema>,
    pub resources: Option<HashMap<String, String>>,
    pub rejected: Option<ScopeSchema>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCodePayloadSchema {
    pub user_code: Option<String>,
    pub device_code: Option<String>,
    pub client_id: Option<String>,
    pub scope: Option<String>,
    pub params: Option<serde_json::Map<String, Value>>,
}

fn all_urls(uris: &[String], message: &'static str) -> Result<(), ValidationError> {
    if uris.iter().all(|uri| Url::parse(uri).is_ok()) {
        return Ok(());
    }
    let mut err = ValidationError::new("url");
    err.message = Some(Cow::Borrowed(message));
    Err(err)
}

fn validate_redirect_uris(uris: &[String]) -> Result<(), ValidationError> {
    all_urls(uris, "Invalid redirect URI")
}

fn validate_post_logout_redirect_uris(uris: &[String]) -> Result<(), ValidationError> {
    all_urls(uris, "Invalid post logout redirect URI")
}

// =============================================================================
// Checking
// =============================================================================

/// Turns a serde shape error into a violation.
fn shape_violation(err: &serde_json::Error) -> Violation {
    let text = err.to_string();
    if let Some(rest) = text.strip_prefix("missing field `")
        && let Some((field, _)) = rest.split_once('`')
    {
        return Violation {
            path: field.to_string(),
            message: "Required".into(),
        };
    }
    let rewritten = if let Some(rest) = text.strip_prefix("unknown variant ") {
        Some(format!("Invalid enum value: {rest}"))
    } else if text.starts_with("invalid type") {
        text.rsplit_once("expected ")
            .map(|(_, expected)| format!("Expected {expected}"))
    } else {
        None
    };
    Violation {
        path: String::new(),
        message: rewritten.unwrap_or(text),
    }
}

fn check<T: DeserializeOwned + Validate>(payload: &Value) -> Result<(), ValidationErrors> {
    let schema: T = serde_json::from_value(payload.clone())
        .map_err(|e| ValidationErrors(vec![shape_violation(&e)]))?;

    schema.validate().map_err(|errors| {
        let mut violations: Vec<Violation> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let path = field.to_string();
                errs.iter().map(move |e| Violation {
                    path: path.clone(),
                    message: e
                        .message
                        .as_ref()
                        .map_or_else(|| e.code.to_string(), ToString::to_string),
                })
            })
            .collect();
        violations.sort_by(|a, b| a.path.cmp(&b.path));
        ValidationErrors(violations)
    })
}

/// Validates a payload against the schema for `kind`.
///
/// # Errors
///
/// Returns the violations found; the payload itself is never modified.
pub fn validate_payload(kind: ModelKind, payload: &Value) -> Result<(), ValidationErrors> {
    match kind {
        ModelKind::Client => check::<ClientPayloadSchema>(payload),
        ModelKind::Session => check::<SessionPayloadSchema>(payload),
        ModelKind::AccessToken
        | ModelKind::AuthorizationCode
        | ModelKind::RefreshToken
        | ModelKind::BackchannelAuthenticationRequest => check::<TokenPayloadSchema>(payload),
        ModelKind::Grant => check::<GrantPayloadSchema>(payload),
        ModelKind::DeviceCode => check::<DeviceCodePayloadSchema>(payload),
    }
}
