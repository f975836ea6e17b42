//! Grant record storage.
//!
//! This module holds everything issued-grant related:
//!
//! - [`record`] - The [`GrantRecord`]/[`SubToken`] domain types and the
//!   effective-TTL rule
//! - [`store`] - The [`GrantStore`] contract all backends implement
//! - [`index`] - The in-process token/principal index
//! - [`memory`] - The bounded in-process store
//!
//! The protocol engine saves a record once tokens are issued, resolves
//! bearer tokens back to their grant on every request, and re-saves the
//! record (same id, new token values) on refresh-token rotation. Logout and
//! revocation flows go through
//! [`RevocationService`](crate::revocation::RevocationService), which only
//! uses the [`GrantStore`] contract.

pub mod index;
pub mod memory;
pub mod record;
pub mod store;

// Record types
pub use record::{GrantRecord, GrantType, SubToken, TokenKind};

// Store contract
pub use store::{GrantStore, GrantStoreStats};

// Implementations
pub use index::TokenIndex;
pub use memory::InMemoryGrantStore;
