//! Provider configuration handed to the OIDC engine.
//!
//! The provider registers a single static client and, when a database
//! dialect is configured, an adapter factory backed by that database.

use serde::{Deserialize, Serialize};
use stubidp_storage::Payload;
use tracing::{info, instrument};
use url::Url;

use crate::config::AppConfig;
use crate::error::{ProviderError, Result};
use crate::storage::{AdapterFactory, connect_store};

/// Credentials and callback of the statically registered client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOptions {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl ProviderOptions {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(ProviderError::config("client_id must not be empty"));
        }
        Url::parse(&self.redirect_uri)
            .map_err(|e| ProviderError::config(format!("redirect_uri is not a valid URL: {e}")))?;
        Ok(())
    }
}

/// Client metadata as registered with the engine.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
    pub response_types: Vec<String>,
    pub grant_types: Vec<String>,
}

// Keeps the secret out of logs.
impl std::fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("client_id", &self.client_id)
            .field("client_secret", &"****")
            .field("redirect_uris", &self.redirect_uris)
            .field("response_types", &self.response_types)
            .field("grant_types", &self.grant_types)
            .finish()
    }
}

impl ClientRegistration {
    /// The authorization-code client built from [`ProviderOptions`].
    #[must_use]
    pub fn from_options(options: &ProviderOptions) -> Self {
        Self {
            client_id: options.client_id.clone(),
            client_secret: options.client_secret.clone(),
            redirect_uris: vec![options.redirect_uri.clone()],
            response_types: vec!["code".into()],
            grant_types: vec!["authorization_code".into()],
        }
    }

    /// The registration as a Client payload.
    #[must_use]
    pub fn to_payload(&self) -> Payload {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Payload::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub dev_interactions: bool,
}

/// Everything the OIDC engine is constructed with.
#[derive(Debug, Clone)]
pub struct ProviderConfiguration {
    pub issuer: String,
    pub clients: Vec<ClientRegistration>,
    pub features: Features,
    /// `None` keeps the engine's in-memory storage.
    pub adapter: Option<AdapterFactory>,
}

impl ProviderConfiguration {
    /// The OpenID discovery document location for this issuer.
    #[must_use]
    pub fn discovery_url(&self) -> String {
        discovery_url(&self.issuer)
    }
}

/// `{issuer}/.well-known/openid-configuration`
#[must_use]
pub fn discovery_url(issuer: &str) -> String {
    format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    )
}

/// Builds the provider configuration, connecting storage if a dialect is set.
///
/// # Errors
///
/// Returns an error for invalid options or if the database cannot be set up.
#[instrument(skip_all, fields(issuer = %config.provider.issuer, client_id = %options.client_id))]
pub async fn create_provider(
    options: ProviderOptions,
    config: &AppConfig,
) -> Result<ProviderConfiguration> {
    options.validate()?;

    let adapter = connect_store(&config.database)
        .await?
        .map(AdapterFactory::new);

    let configuration = ProviderConfiguration {
        issuer: config.provider.issuer.clone(),
        clients: vec![ClientRegistration::from_options(&options)],
        features: Features {
            dev_interactions: config.provider.dev_interactions,
        },
        adapter,
    };

    info!(
        persistent = configuration.adapter.is_some(),
        discovery = %configuration.discovery_url(),
        "Provider configured"
    );
    Ok(configuration)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn options() -> ProviderOptions {
        ProviderOptions::new("client-1", "secret", "http://localhost:8080/callback")
    }

    #[test]
    fn test_static_client() {
        let client = ClientRegistration::from_options(&options());
        assert_eq!(
            serde_json::Value::Object(client.to_payload()),
            json!({
                "client_id": "client-1",
                "client_secret": "secret",
                "redirect_uris": ["http://localhost:8080/callback"],
                "response_types": ["code"],
                "grant_types": ["authorization_code"]
            })
        );
        let debug = format!("{client:?}");
        assert!(debug.contains("****"));
        assert!(!debug.contains("\"secret\""));
    }

    #[test]
    fn test_discovery_url() {
        assert_eq!(
            discovery_url("http://localhost:3000"),
            "http://localhost:3000/.well-known/openid-configuration"
        );
        assert_eq!(
            discovery_url("https://idp.example.com/"),
            "https://idp.example.com/.well-known/openid-configuration"
        );
    }

    #[tokio::test]
    async fn test_in_memory_by_default() {
        let provider = create_provider(options(), &AppConfig::default())
            .await
            .expect("configured");
        assert_eq!(provider.issuer, "http://localhost:3000");
        assert!(provider.features.dev_interactions);
        assert!(provider.adapter.is_none());
        assert_eq!(provider.clients.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_options() {
        let bad = ProviderOptions::new("", "s", "http://localhost/cb");
        assert!(create_provider(bad, &AppConfig::default()).await.is_err());

        let bad = ProviderOptions::new("c", "s", "not a url");
        let err = create_provider(bad, &AppConfig::default())
            .await
            .expect_err("invalid redirect");
        assert!(matches!(err, ProviderError::Config(_)));
    }
}
