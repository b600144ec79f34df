//! AMLBot integration - token scheme over form-encoded requests
//!
//! Every request carries `accessId` and `token`, where `token` is the
//! lower-case hex MD5 of `[uid:]access_key:access_id`. The check uid
//! only participates on recheck calls.

mod auth;
mod client;
mod wire;

pub use auth::{build_authorizer, AmlbotAuthorizer};
pub use client::AmlbotClient;

/// Public production endpoint
pub const DEFAULT_BASE_URL: &str = "https://extrnlapiendpoint.silencatech.com/";
