//! Grant record domain types.
//!
//! A [`GrantRecord`] bundles everything issued for one OAuth2 authorization:
//! the authenticated principal, the registered client, the authorized scopes,
//! protocol attributes, and the set of issued sub-tokens (access token,
//! refresh token, ID token, authorization code, and the `state` placeholder).
//! Records are mutated only by whole-record re-save, which is how token
//! rotation is expressed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;

/// The kind of a token held inside a grant record.
///
/// Wire values double as index-key segments, so they are stable strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Bearer access token.
    #[serde(rename = "access_token")]
    Access,
    /// Refresh token.
    #[serde(rename = "refresh_token")]
    Refresh,
    /// OpenID Connect ID token.
    #[serde(rename = "id_token")]
    Id,
    /// Authorization code (pre-exchange).
    #[serde(rename = "code")]
    Code,
    /// Placeholder for the `state` parameter, indexed so the authorization
    /// response can be correlated back to its grant. Never expires on its
    /// own; removed with the record.
    #[serde(rename = "state")]
    State,
}

impl TokenKind {
    /// All kinds, in indexing order.
    pub const ALL: [TokenKind; 5] = [
        TokenKind::Access,
        TokenKind::Refresh,
        TokenKind::Id,
        TokenKind::Code,
        TokenKind::State,
    ];

    /// Stable string form used in index keys.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access_token",
            Self::Refresh => "refresh_token",
            Self::Id => "id_token",
            Self::Code => "code",
            Self::State => "state",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The OAuth 2.0 grant type a record was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization code grant (with or without PKCE).
    AuthorizationCode,
    /// Client credentials grant.
    ClientCredentials,
    /// Refresh token grant.
    RefreshToken,
    /// Device authorization grant.
    DeviceCode,
}

impl GrantType {
    /// RFC 6749 grant type name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
            Self::DeviceCode => "device_code",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One typed, valued, time-bounded token within a grant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubToken {
    /// Token kind.
    pub kind: TokenKind,

    /// Opaque token value. Globally unique per kind.
    pub value: String,

    /// When the token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When the token expires. `None` for tokens that only die with the
    /// record (the `state` placeholder).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expires_at: Option<OffsetDateTime>,
}

impl SubToken {
    /// Creates a new sub-token.
    #[must_use]
    pub fn new(
        kind: TokenKind,
        value: impl Into<String>,
        issued_at: OffsetDateTime,
        expires_at: Option<OffsetDateTime>,
    ) -> Self {
        Self {
            kind,
            value: value.into(),
            issued_at,
            expires_at,
        }
    }

    /// Creates the never-expiring `state` placeholder token.
    #[must_use]
    pub fn state(value: impl Into<String>) -> Self {
        Self::new(TokenKind::State, value, OffsetDateTime::now_utc(), None)
    }

    /// Returns `true` if the token carries an expiry that has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| OffsetDateTime::now_utc() > at)
    }
}

/// A stored OAuth2 authorization: one principal's grant to one client,
/// with all tokens issued under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRecord {
    /// Opaque grant identifier. Unique within a store.
    pub id: String,

    /// Authenticated subject the grant belongs to.
    pub principal: String,

    /// Registered client the grant was issued to.
    pub client_id: String,

    /// Grant type the authorization was issued under.
    pub grant_type: GrantType,

    /// Authorized scopes.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub scopes: BTreeSet<String>,

    /// Protocol metadata (for example the `state` parameter value).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Issued sub-tokens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<SubToken>,
}

impl GrantRecord {
    /// Creates a record with no scopes, attributes, or tokens.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        principal: impl Into<String>,
        client_id: impl Into<String>,
        grant_type: GrantType,
    ) -> Self {
        Self {
            id: id.into(),
            principal: principal.into(),
            client_id: client_id.into(),
            grant_type,
            scopes: BTreeSet::new(),
            attributes: BTreeMap::new(),
            tokens: Vec::new(),
        }
    }

    /// Adds an authorized scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    /// Adds a protocol attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Adds a sub-token.
    #[must_use]
    pub fn with_token(mut self, token: SubToken) -> Self {
        self.tokens.push(token);
        self
    }

    /// Returns the first token of the given kind, if any.
    #[must_use]
    pub fn token(&self, kind: TokenKind) -> Option<&SubToken> {
        self.tokens.iter().find(|t| t.kind == kind)
    }

    /// Returns the soonest `expires_at` across all sub-tokens, if any
    /// carries one.
    #[must_use]
    pub fn soonest_expiry(&self) -> Option<OffsetDateTime> {
        self.tokens.iter().filter_map(|t| t.expires_at).min()
    }

    /// Computes the record's effective lifetime under a store-wide maximum.
    ///
    /// The result is the time from now until the soonest sub-token expiry,
    /// capped at `max_ttl`. Records without any expiring sub-token live for
    /// the full `max_ttl`. A soonest expiry already in the past yields
    /// `Duration::ZERO` (immediately evictable).
    #[must_use]
    pub fn effective_ttl(&self, max_ttl: Duration) -> Duration {
        match self.soonest_expiry() {
            Some(expiry) => {
                let remaining = expiry - OffsetDateTime::now_utc();
                if remaining.is_negative() {
                    Duration::ZERO
                } else {
                    Duration::try_from(remaining)
                        .unwrap_or(max_ttl)
                        .min(max_ttl)
                }
            }
            None => max_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_record() -> GrantRecord {
        let now = OffsetDateTime::now_utc();
        GrantRecord::new("auth-1", "user-1", "client-1", GrantType::AuthorizationCode)
            .with_scope("openid")
            .with_scope("profile")
            .with_attribute("state", "xyz")
            .with_token(SubToken::new(
                TokenKind::Access,
                "access-token-123",
                now,
                Some(now + time::Duration::hours(1)),
            ))
            .with_token(SubToken::new(
                TokenKind::Refresh,
                "refresh-token-123",
                now,
                Some(now + time::Duration::days(30)),
            ))
            .with_token(SubToken::state("xyz"))
    }

    #[test]
    fn test_token_kind_strings() {
        assert_eq!(TokenKind::Access.as_str(), "access_token");
        assert_eq!(TokenKind::Refresh.as_str(), "refresh_token");
        assert_eq!(TokenKind::Id.as_str(), "id_token");
        assert_eq!(TokenKind::Code.as_str(), "code");
        assert_eq!(TokenKind::State.as_str(), "state");
    }

    #[test]
    fn test_token_lookup_by_kind() {
        let record = create_test_record();
        assert_eq!(
            record.token(TokenKind::Access).map(|t| t.value.as_str()),
            Some("access-token-123")
        );
        assert!(record.token(TokenKind::Code).is_none());
    }

    #[test]
    fn test_soonest_expiry_picks_access_token() {
        let record = create_test_record();
        let access_expiry = record.token(TokenKind::Access).unwrap().expires_at.unwrap();
        assert_eq!(record.soonest_expiry(), Some(access_expiry));
    }

    #[test]
    fn test_effective_ttl_caps_at_max() {
        let record = create_test_record();
        // Access token expires in ~1h; a 10s store cap wins.
        let ttl = record.effective_ttl(Duration::from_secs(10));
        assert_eq!(ttl, Duration::from_secs(10));
    }

    #[test]
    fn test_effective_ttl_follows_soonest_token() {
        let now = OffsetDateTime::now_utc();
        let record = GrantRecord::new("auth-1", "user-1", "client-1", GrantType::AuthorizationCode)
            .with_token(SubToken::new(
                TokenKind::Access,
                "short-lived",
                now,
                Some(now + time::Duration::seconds(10)),
            ));
        let ttl = record.effective_ttl(Duration::from_secs(3600));
        assert!(ttl <= Duration::from_secs(10));
        assert!(ttl > Duration::from_secs(8));
    }

    #[test]
    fn test_effective_ttl_without_expiring_tokens() {
        let record = GrantRecord::new("auth-1", "user-1", "client-1", GrantType::ClientCredentials)
            .with_token(SubToken::state("opaque"));
        assert_eq!(
            record.effective_ttl(Duration::from_secs(3600)),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_effective_ttl_for_already_expired_token() {
        let now = OffsetDateTime::now_utc();
        let record = GrantRecord::new("auth-1", "user-1", "client-1", GrantType::AuthorizationCode)
            .with_token(SubToken::new(
                TokenKind::Access,
                "stale",
                now - time::Duration::hours(2),
                Some(now - time::Duration::hours(1)),
            ));
        assert_eq!(
            record.effective_ttl(Duration::from_secs(3600)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_state_token_never_expires() {
        let token = SubToken::state("xyz");
        assert!(token.expires_at.is_none());
        assert!(!token.is_expired());
    }

    #[test]
    fn test_record_serialization_round_trip() {
        let record = create_test_record();
        let json = serde_json::to_string(&record).unwrap();
        let deserialized: GrantRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, deserialized);
    }

    #[test]
    fn test_record_json_shape() {
        let record = create_test_record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "auth-1");
        assert_eq!(json["clientId"], "client-1");
        assert_eq!(json["grantType"], "authorization_code");
        assert_eq!(json["tokens"][0]["kind"], "access_token");
    }
}
