//! Model registry.
//!
//! The OIDC engine asks for one adapter per model name. [`ModelKind`] is the
//! closed set of names it may ask for, each bound to its table definition.

use std::fmt;
use std::str::FromStr;

use crate::error::AdapterError;
use crate::schema::{self, TableDef};

/// One of the eight kinds of state the OIDC engine persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Session,
    AccessToken,
    AuthorizationCode,
    RefreshToken,
    DeviceCode,
    BackchannelAuthenticationRequest,
    Client,
    Grant,
}

impl ModelKind {
    /// Every model kind.
    pub const ALL: [ModelKind; 8] = [
        Self::Session,
        Self::AccessToken,
        Self::AuthorizationCode,
        Self::RefreshToken,
        Self::DeviceCode,
        Self::BackchannelAuthenticationRequest,
        Self::Client,
        Self::Grant,
    ];

    /// Resolves a model name as passed by the OIDC engine.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnknownModel`] for any name outside the fixed eight.
    pub fn resolve(name: &str) -> Result<Self, AdapterError> {
        match name {
            "Session" => Ok(Self::Session),
            "AccessToken" => Ok(Self::AccessToken),
            "AuthorizationCode" => Ok(Self::AuthorizationCode),
            "RefreshToken" => Ok(Self::RefreshToken),
            "DeviceCode" => Ok(Self::DeviceCode),
            "BackchannelAuthenticationRequest" => Ok(Self::BackchannelAuthenticationRequest),
            "Client" => Ok(Self::Client),
            "Grant" => Ok(Self::Grant),
            other => Err(AdapterError::unknown_model(other)),
        }
    }

    /// The model name used by the OIDC engine.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Session => "Session",
            Self::AccessToken => "AccessToken",
            Self::AuthorizationCode => "AuthorizationCode",
            Self::RefreshToken => "RefreshToken",
            Self::DeviceCode => "DeviceCode",
            Self::BackchannelAuthenticationRequest => "BackchannelAuthenticationRequest",
            Self::Client => "Client",
            Self::Grant => "Grant",
        }
    }

    /// The table this kind is stored in.
    #[must_use]
    pub fn table(self) -> &'static TableDef {
        match self {
            Self::Session => &schema::SESSIONS,
            Self::AccessToken => &schema::ACCESS_TOKENS,
            Self::AuthorizationCode => &schema::AUTHORIZATION_CODES,
            Self::RefreshToken => &schema::REFRESH_TOKENS,
            Self::DeviceCode => &schema::DEVICE_CODES,
            Self::BackchannelAuthenticationRequest => &schema::BACKCHANNEL_AUTHENTICATION_REQUESTS,
            Self::Client => &schema::CLIENTS,
            Self::Grant => &schema::GRANTS,
        }
    }

    /// The payload field this kind can be looked up by, besides its key.
    #[must_use]
    pub fn secondary_key(self) -> Option<SecondaryKey> {
        match self {
            Self::Session => Some(SecondaryKey::Uid),
            Self::DeviceCode => Some(SecondaryKey::UserCode),
            _ => None,
        }
    }

    /// Returns `true` if rows of this kind carry an expiry.
    #[must_use]
    pub fn expires(self) -> bool {
        self != Self::Client
    }

    /// Returns `true` if rows of this kind can be revoked by grant id.
    #[must_use]
    pub fn has_grant_id(self) -> bool {
        self.table().has_column("grant_id")
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

/// A nested payload field used for lookups other than by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryKey {
    /// `uid` of a Session.
    Uid,
    /// `userCode` of a DeviceCode.
    UserCode,
}

impl SecondaryKey {
    /// The payload field holding the value.
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Self::Uid => "uid",
            Self::UserCode => "userCode",
        }
    }

    /// The adapter operation that performs the lookup.
    #[must_use]
    pub fn operation(self) -> Operation {
        match self {
            Self::Uid => Operation::FindByUid,
            Self::UserCode => Operation::FindByUserCode,
        }
    }
}

/// Adapter operations, named as the OIDC engine names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Construct,
    Upsert,
    Find,
    FindByUid,
    FindByUserCode,
    Destroy,
    Consume,
    RevokeByGrantId,
    PurgeExpired,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Construct => "constructor",
            Self::Upsert => "upsert",
            Self::Find => "find",
            Self::FindByUid => "findByUid",
            Self::FindByUserCode => "findByUserCode",
            Self::Destroy => "destroy",
            Self::Consume => "consume",
            Self::RevokeByGrantId => "revokeByGrantId",
            Self::PurgeExpired => "purgeExpired",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_round_trips_names() {
        for kind in ModelKind::ALL {
            assert_eq!(ModelKind::resolve(kind.name()).expect("known model"), kind);
        }
    }

    #[test]
    fn test_resolve_rejects_unknown_names() {
        for name in ["UnknownModel", "session", "", "Clients"] {
            let err = ModelKind::resolve(name).expect_err("unknown model");
            assert!(err.is_unknown_model());
            assert_eq!(err.to_string(), format!("Unknown model: {name}"));
        }
    }

    #[test]
    fn test_secondary_keys() {
        assert_eq!(ModelKind::Session.secondary_key(), Some(SecondaryKey::Uid));
        assert_eq!(
            ModelKind::DeviceCode.secondary_key(),
            Some(SecondaryKey::UserCode)
        );
        assert_eq!(ModelKind::AccessToken.secondary_key(), None);
        assert_eq!(SecondaryKey::UserCode.field(), "userCode");
        assert_eq!(SecondaryKey::Uid.operation().to_string(), "findByUid");
    }

    #[test]
    fn test_grant_relation() {
        let with_grant: Vec<_> = ModelKind::ALL
            .into_iter()
            .filter(|k| k.has_grant_id())
            .collect();
        assert_eq!(
            with_grant,
            vec![
                ModelKind::AccessToken,
                ModelKind::AuthorizationCode,
                ModelKind::RefreshToken,
                ModelKind::DeviceCode,
                ModelKind::BackchannelAuthenticationRequest,
            ]
        );
    }

    #[test]
    fn test_expiry_matches_table() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.expires(), kind.table().has_expiry(), "{kind}");
        }
    }
}
