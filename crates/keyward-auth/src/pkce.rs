//! PKCE (Proof Key for Code Exchange) implementation
//!
//! Implements RFC 7636 with both challenge methods: `S256` (recommended)
//! and `plain` (legacy clients that cannot hash). A session without a
//! challenge method does not require PKCE at all, which is how confidential
//! clients without PKCE pass through verification.
//!
//! # Example
//!
//! ```
//! use keyward_auth::pkce::{CodeChallenge, CodeChallengeMethod, CodeVerifier, verify_challenge};
//!
//! // Client generates a verifier and challenge
//! let verifier = CodeVerifier::generate();
//! let challenge = CodeChallenge::from_verifier(&verifier);
//!
//! // Server stores the challenge, later verifies the verifier from the
//! // token request against it
//! let result = verify_challenge(
//!     Some(CodeChallengeMethod::S256),
//!     Some(challenge.as_str()),
//!     Some(verifier.as_str()),
//! );
//! assert!(result.is_ok());
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during PKCE operations.
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    /// Verifier length is outside the valid range (43-128 characters).
    #[error("Invalid verifier length: must be 43-128 characters, got {0}")]
    InvalidVerifierLength(usize),

    /// Verifier contains invalid characters.
    #[error("Invalid verifier characters: must be URL-safe base64 ([A-Za-z0-9-._~])")]
    InvalidVerifierCharacters,

    /// Challenge format is invalid.
    #[error("Invalid challenge format: must be valid base64url")]
    InvalidChallengeFormat,

    /// Unsupported challenge method.
    #[error("Unsupported challenge method: {0}. Must be S256 or plain.")]
    UnsupportedMethod(String),

    /// A challenge method is set but the token request carried no verifier.
    #[error("Missing code verifier: the authorization requires PKCE")]
    MissingVerifier,

    /// A challenge method is set but the session stored no challenge.
    #[error("Missing code challenge: session has a method but no challenge")]
    MissingChallenge,

    /// PKCE verification failed (verifier doesn't match challenge).
    #[error("PKCE verification failed: verifier does not match challenge")]
    VerificationFailed,
}

impl PkceError {
    // -------------------------------------------------------------------------
    // Constructor Methods
    // -------------------------------------------------------------------------

    /// Create an `InvalidVerifierLength` error.
    #[must_use]
    pub fn invalid_verifier_length(len: usize) -> Self {
        Self::InvalidVerifierLength(len)
    }

    /// Create an `InvalidVerifierCharacters` error.
    #[must_use]
    pub fn invalid_verifier_characters() -> Self {
        Self::InvalidVerifierCharacters
    }

    /// Create an `InvalidChallengeFormat` error.
    #[must_use]
    pub fn invalid_challenge_format() -> Self {
        Self::InvalidChallengeFormat
    }

    /// Create an `UnsupportedMethod` error.
    #[must_use]
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod(method.into())
    }

    /// Create a `MissingVerifier` error.
    #[must_use]
    pub fn missing_verifier() -> Self {
        Self::MissingVerifier
    }

    /// Create a `MissingChallenge` error.
    #[must_use]
    pub fn missing_challenge() -> Self {
        Self::MissingChallenge
    }

    /// Create a `VerificationFailed` error.
    #[must_use]
    pub fn verification_failed() -> Self {
        Self::VerificationFailed
    }

    // -------------------------------------------------------------------------
    // Predicate Methods
    // -------------------------------------------------------------------------

    /// Returns `true` if this is a verifier validation error.
    #[must_use]
    pub fn is_verifier_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidVerifierLength(_) | Self::InvalidVerifierCharacters | Self::MissingVerifier
        )
    }

    /// Returns `true` if this is a challenge validation error.
    #[must_use]
    pub fn is_challenge_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidChallengeFormat | Self::UnsupportedMethod(_) | Self::MissingChallenge
        )
    }

    /// Returns `true` if this is a verification failure.
    #[must_use]
    pub fn is_verification_error(&self) -> bool {
        matches!(self, Self::VerificationFailed)
    }

    /// Get the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidVerifierLength(_)
            | Self::InvalidVerifierCharacters
            | Self::InvalidChallengeFormat
            | Self::UnsupportedMethod(_)
            | Self::MissingVerifier => "invalid_request",
            Self::MissingChallenge | Self::VerificationFailed => "invalid_grant",
        }
    }
}

// =============================================================================
// Challenge Method
// =============================================================================

/// PKCE challenge method.
///
/// `S256` is what every capable client should use; `plain` exists for
/// constrained clients and compares the verifier directly. Sessions without
/// a method do not require PKCE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    /// SHA-256 hash: `code_challenge = BASE64URL(SHA256(ASCII(code_verifier)))`.
    #[serde(rename = "S256")]
    S256,
    /// Direct comparison: `code_challenge = code_verifier`.
    #[serde(rename = "plain")]
    Plain,
}

impl CodeChallengeMethod {
    /// Parse a challenge method from its wire form.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::UnsupportedMethod` for anything other than
    /// `"S256"` or `"plain"`.
    pub fn parse(method: &str) -> Result<Self, PkceError> {
        match method {
            "S256" => Ok(Self::S256),
            "plain" => Ok(Self::Plain),
            other => Err(PkceError::unsupported_method(other)),
        }
    }

    /// Get the method as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

impl std::fmt::Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for CodeChallengeMethod {
    fn default() -> Self {
        Self::S256
    }
}

// =============================================================================
// Code Verifier
// =============================================================================

/// PKCE code verifier.
///
/// A high-entropy cryptographic random string using the unreserved characters
/// `[A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"`, with a minimum length of
/// 43 characters and a maximum length of 128 characters (RFC 7636 §4.1).
#[derive(Debug, Clone)]
pub struct CodeVerifier(String);

impl CodeVerifier {
    /// Create a new verifier from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Length is not between 43 and 128 characters
    /// - Contains characters other than `[A-Za-z0-9-._~]`
    pub fn new(verifier: String) -> Result<Self, PkceError> {
        let len = verifier.len();

        if !(43..=128).contains(&len) {
            return Err(PkceError::invalid_verifier_length(len));
        }

        if !verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~')
        {
            return Err(PkceError::invalid_verifier_characters());
        }

        Ok(Self(verifier))
    }

    /// Generate a cryptographically random verifier.
    ///
    /// Generates 32 random bytes and encodes them as base64url (43 characters).
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        // `gen` is a reserved keyword in Rust 2024, so we use r#gen
        let bytes: [u8; 32] = rng.r#gen();
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        Self(verifier)
    }

    /// Get the verifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the verifier and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for CodeVerifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Code Challenge
// =============================================================================

/// PKCE code challenge.
///
/// The S256 challenge is the base64url-encoded SHA-256 hash of the verifier
/// (RFC 7636 §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChallenge(String);

impl CodeChallenge {
    /// Create a challenge from a verifier using the S256 method.
    ///
    /// Computes `BASE64URL(SHA256(ASCII(code_verifier)))`.
    #[must_use]
    pub fn from_verifier(verifier: &CodeVerifier) -> Self {
        Self(s256_digest(verifier.as_str()))
    }

    /// Create a challenge from a raw string (received from a client).
    ///
    /// # Errors
    ///
    /// Returns `PkceError::InvalidChallengeFormat` if the string is not
    /// valid base64url.
    pub fn new(challenge: String) -> Result<Self, PkceError> {
        if URL_SAFE_NO_PAD.decode(&challenge).is_err() {
            return Err(PkceError::invalid_challenge_format());
        }
        Ok(Self(challenge))
    }

    /// Verify that a verifier matches this challenge under S256.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::VerificationFailed` if the verifier doesn't match.
    pub fn verify(&self, verifier: &CodeVerifier) -> Result<(), PkceError> {
        if self.0 == s256_digest(verifier.as_str()) {
            Ok(())
        } else {
            Err(PkceError::verification_failed())
        }
    }

    /// Get the challenge as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the challenge and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for CodeChallenge {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn s256_digest(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

// =============================================================================
// Verification
// =============================================================================

/// Verifies a candidate code verifier against a stored challenge.
///
/// Pure: no I/O, no store access. The rules:
///
/// - No method stored: PKCE was not required, verification succeeds.
/// - Method stored but no (or blank) verifier supplied: fails.
/// - Method stored but no challenge stored: fails (inconsistent session).
/// - `S256`: the verifier's SHA-256, base64url-encoded without padding,
///   must equal the stored challenge exactly.
/// - `plain`: the verifier must equal the stored challenge exactly.
///
/// # Errors
///
/// Returns the specific [`PkceError`] describing why verification failed.
pub fn verify_challenge(
    method: Option<CodeChallengeMethod>,
    challenge: Option<&str>,
    verifier: Option<&str>,
) -> Result<(), PkceError> {
    let Some(method) = method else {
        return Ok(());
    };

    let verifier = match verifier {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Err(PkceError::missing_verifier()),
    };

    let challenge = match challenge {
        Some(c) if !c.trim().is_empty() => c,
        _ => return Err(PkceError::missing_challenge()),
    };

    let matches = match method {
        CodeChallengeMethod::S256 => s256_digest(verifier) == challenge,
        CodeChallengeMethod::Plain => verifier == challenge,
    };

    if matches {
        Ok(())
    } else {
        Err(PkceError::verification_failed())
    }
}

// =============================================================================
// Tests
// =============================================================================
