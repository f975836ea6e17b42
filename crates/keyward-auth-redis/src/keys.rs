//! Redis key construction.
//!
//! Every key this crate writes goes through [`KeyScheme`], so the full key
//! population is visible in one place:
//!
//! | Key                              | Value                       |
//! |----------------------------------|-----------------------------|
//! | `{ns}:auth:{grantId}`            | JSON grant record           |
//! | `{ns}:index:{kind}:{tokenValue}` | grant id                    |
//! | `{ns}:index:principal:{name}`    | sorted set of grant ids     |
//! | `{ns}:session:{code}`            | JSON authorization session  |
//! | `{ns}:user:{userId}`             | set of authorization codes  |
//!
//! Token kinds never collide with the `principal` index segment; the kind
//! strings are fixed (`access_token`, `refresh_token`, `id_token`, `code`,
//! `state`).

use std::fmt;

use keyward_auth::grant::TokenKind;
use keyward_auth::{AuthError, AuthResult};

/// Validated Redis key namespace.
///
/// Trailing colons are stripped so that `"keyward"` and `"keyward:"`
/// produce identical keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace(String);

impl Namespace {
    /// Creates a namespace from a configured prefix.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` when the prefix is empty or
    /// whitespace-only.
    pub fn new(namespace: impl Into<String>) -> AuthResult<Self> {
        let normalized = namespace.into().trim().trim_end_matches(':').to_string();
        if normalized.is_empty() {
            return Err(AuthError::configuration("namespace cannot be empty"));
        }
        Ok(Self(normalized))
    }

    /// Creates a tenant-scoped namespace: `{base}:{tenant}`.
    ///
    /// Use this when several tenants share one Redis deployment and their
    /// keyspaces must not overlap.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` when the tenant id is empty.
    pub fn scoped(&self, tenant: &str) -> AuthResult<Self> {
        if tenant.trim().is_empty() {
            return Err(AuthError::configuration("tenant id cannot be empty"));
        }
        Self::new(format!("{}:{}", self.0, tenant.trim()))
    }

    /// The normalized prefix, without a trailing colon.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds the full Redis keys for one namespace.
#[derive(Debug, Clone)]
pub struct KeyScheme {
    namespace: Namespace,
}

impl KeyScheme {
    /// Creates a key scheme for a namespace.
    #[must_use]
    pub fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }

    /// Key holding a grant record.
    #[must_use]
    pub fn grant(&self, grant_id: &str) -> String {
        format!("{}:auth:{grant_id}", self.namespace)
    }

    /// Key mapping one (token kind, token value) pair to its grant id.
    #[must_use]
    pub fn token_index(&self, kind: TokenKind, value: &str) -> String {
        format!("{}:index:{kind}:{value}", self.namespace)
    }

    /// Key holding the sorted set of a principal's grant ids, scored by
    /// save time.
    #[must_use]
    pub fn principal_index(&self, principal: &str) -> String {
        format!("{}:index:principal:{principal}", self.namespace)
    }

    /// Key holding an authorization session.
    #[must_use]
    pub fn session(&self, authorization_code: &str) -> String {
        format!("{}:session:{authorization_code}", self.namespace)
    }

    /// Key holding the set of a user's live authorization codes.
    #[must_use]
    pub fn user_sessions(&self, user_id: &str) -> String {
        format!("{}:user:{user_id}", self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_scheme() -> KeyScheme {
        KeyScheme::new(Namespace::new("keyward").unwrap())
    }

    #[test]
    fn test_namespace_strips_trailing_colon() {
        let plain = Namespace::new("keyward").unwrap();
        let trailing = Namespace::new("keyward:").unwrap();
        assert_eq!(plain, trailing);
        assert_eq!(plain.as_str(), "keyward");
    }

    #[test]
    fn test_namespace_rejects_empty() {
        assert!(Namespace::new("").is_err());
        assert!(Namespace::new("   ").is_err());
        assert!(Namespace::new(":").is_err());
    }

    #[test]
    fn test_namespace_scoped() {
        let base = Namespace::new("keyward").unwrap();
        let tenant = base.scoped("acme").unwrap();
        assert_eq!(tenant.as_str(), "keyward:acme");
        assert!(base.scoped(" ").is_err());
    }

    #[test]
    fn test_grant_key() {
        assert_eq!(test_scheme().grant("auth-1"), "keyward:auth:auth-1");
    }

    #[test]
    fn test_token_index_keys() {
        let scheme = test_scheme();
        assert_eq!(
            scheme.token_index(TokenKind::Access, "tok-123"),
            "keyward:index:access_token:tok-123"
        );
        assert_eq!(
            scheme.token_index(TokenKind::Refresh, "tok-456"),
            "keyward:index:refresh_token:tok-456"
        );
        assert_eq!(
            scheme.token_index(TokenKind::Code, "abc"),
            "keyward:index:code:abc"
        );
        assert_eq!(
            scheme.token_index(TokenKind::State, "xyz"),
            "keyward:index:state:xyz"
        );
    }

    #[test]
    fn test_principal_index_key() {
        assert_eq!(
            test_scheme().principal_index("alice"),
            "keyward:index:principal:alice"
        );
    }

    #[test]
    fn test_session_keys() {
        let scheme = test_scheme();
        assert_eq!(scheme.session("code-1"), "keyward:session:code-1");
        assert_eq!(scheme.user_sessions("user-1"), "keyward:user:user-1");
    }

    #[test]
    fn test_scoped_namespace_flows_into_keys() {
        let namespace = Namespace::new("keyward").unwrap().scoped("acme").unwrap();
        let scheme = KeyScheme::new(namespace);
        assert_eq!(scheme.grant("auth-1"), "keyward:acme:auth:auth-1");
    }
}
