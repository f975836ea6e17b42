//! Pre-token authorization sessions.
//!
//! An [`AuthorizationSession`] records one accepted authorization request
//! while it waits for the code-for-token exchange: the issued authorization
//! code, the requesting user and client, the granted scopes, and the PKCE
//! challenge the token request must answer.
//!
//! # Lifecycle
//!
//! 1. Session created when an authorization request is approved
//! 2. Client exchanges the code for tokens; the PKCE verifier is checked
//!    against the stored challenge
//! 3. Session deleted after a successful exchange (codes are single-use)
//! 4. Unexchanged sessions die by expiry: the domain `expires_at` on read,
//!    the store TTL as a backstop
//!
//! # Security
//!
//! - Authorization codes are cryptographically random (256 bits)
//! - Sessions expire after a short time (default 10 minutes)
//! - The domain expiry check always wins over the store TTL when stricter
//!
//! Storage lives in [`store`] (the [`SessionStore`] contract) and [`memory`]
//! (the bounded in-process backend); a Redis backend with a per-user index
//! ships in the `keyward-auth-redis` crate.

use std::collections::BTreeSet;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pkce::{CodeChallengeMethod, PkceError, verify_challenge};

pub mod memory;
pub mod store;

pub use memory::InMemorySessionStore;
pub use store::SessionStore;

/// One in-flight authorization-code exchange.
///
/// Immutable after creation except for deletion: a session is never
/// re-saved, only consumed or expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationSession {
    /// Unique session identifier.
    pub session_id: Uuid,

    /// Authorization code (one-time use). The store lookup key.
    /// 256-bit random value, base64url-encoded.
    pub authorization_code: String,

    /// Authenticated user the code was issued for.
    pub user_id: String,

    /// Client that initiated the authorization request.
    pub client_id: String,

    /// Scopes the user approved.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub scopes: BTreeSet<String>,

    /// Redirect URI from the authorization request.
    /// Must match the redirect_uri in the token request.
    pub redirect_uri: String,

    /// State parameter from the authorization request, echoed back to the
    /// client with the code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// PKCE code challenge, when the client uses PKCE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method. Absent when PKCE is not required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<CodeChallengeMethod>,

    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Domain-level expiry. Checked explicitly on every read; a store TTL
    /// may additionally bound the session but never extends it.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthorizationSession {
    /// Creates a session expiring `ttl` from now, with a fresh session id.
    #[must_use]
    pub fn new(
        authorization_code: impl Into<String>,
        user_id: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            session_id: Uuid::new_v4(),
            authorization_code: authorization_code.into(),
            user_id: user_id.into(),
            client_id: client_id.into(),
            scopes: BTreeSet::new(),
            redirect_uri: redirect_uri.into(),
            state: None,
            code_challenge: None,
            code_challenge_method: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Adds an approved scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    /// Sets the `state` parameter.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Stores a PKCE challenge and its method.
    #[must_use]
    pub fn with_challenge(
        mut self,
        challenge: impl Into<String>,
        method: CodeChallengeMethod,
    ) -> Self {
        self.code_challenge = Some(challenge.into());
        self.code_challenge_method = Some(method);
        self
    }

    /// Generates a new cryptographically secure authorization code.
    ///
    /// The code is 256 bits (32 bytes) of random data, encoded as base64url
    /// without padding (43 characters) — well above the OAuth 2.0
    /// recommendation of at least 128 bits of entropy.
    #[must_use]
    pub fn generate_authorization_code() -> String {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Returns `true` if the session's domain expiry has passed.
    ///
    /// Expired sessions must not be used for code exchange, even when the
    /// backing store still holds them.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if the session carries a PKCE challenge the token
    /// request must answer.
    #[must_use]
    pub fn requires_pkce(&self) -> bool {
        self.code_challenge
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }

    /// Verifies a code verifier from the token request against the stored
    /// challenge.
    ///
    /// Sessions without a challenge method accept any (or no) verifier;
    /// see [`verify_challenge`] for the full rules.
    ///
    /// # Errors
    ///
    /// Returns the [`PkceError`] describing why verification failed.
    pub fn verify_pkce(&self, verifier: Option<&str>) -> Result<(), PkceError> {
        verify_challenge(
            self.code_challenge_method,
            self.code_challenge.as_deref(),
            verifier,
        )
    }
}
