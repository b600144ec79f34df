//! Bitok integration - HMAC-SHA256 signature scheme over JSON requests
//!
//! Canonical string:
//!
//! ```text
//! METHOD\nPATH[?QUERY]\nTIMESTAMP_MS[\nCOMPACT_JSON_BODY]
//! ```
//!
//! signed with the secret key, base64-encoded, and sent in
//! `API-SIGNATURE` next to `API-TIMESTAMP` and `API-KEY-ID`.

mod auth;
mod client;
mod wire;

pub use auth::{build_authorizer, compact_json, BitokAuthorizer};
pub use client::BitokClient;

/// Public production endpoint
pub const DEFAULT_BASE_URL: &str = "https://kyt-api.bitok.org/";
