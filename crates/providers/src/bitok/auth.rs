//! Signature authorizer

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::de::IgnoredAny;
use sha2::Sha256;

use aml_core::{CredentialKey, CredentialSet, ProviderId};

use crate::auth::Authorizer;
use crate::error::{ProviderError, ProviderResult};
use crate::request::OutgoingRequest;

type HmacSha256 = Hmac<Sha256>;

pub const KEY_ID_HEADER: &str = "api-key-id";
pub const TIMESTAMP_HEADER: &str = "api-timestamp";
pub const SIGNATURE_HEADER: &str = "api-signature";

/// Credential keys this provider requires
pub const REQUIRED_KEYS: [CredentialKey; 2] =
    [CredentialKey::AccessKeyId, CredentialKey::SecretKey];

/// Signs requests with HMAC-SHA256 headers
#[derive(Clone)]
pub struct BitokAuthorizer {
    key_id: String,
    secret: String,
}

impl BitokAuthorizer {
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
        }
    }

    pub fn from_credentials(credentials: &CredentialSet) -> ProviderResult<Self> {
        let missing = credentials.missing(&REQUIRED_KEYS);
        if !missing.is_empty() {
            return Err(ProviderError::MissingCredentials {
                provider: ProviderId::Bitok,
                keys: missing,
            });
        }

        // Both keys verified present above
        Ok(Self::new(
            credentials.get(CredentialKey::AccessKeyId).unwrap_or_default(),
            credentials.get(CredentialKey::SecretKey).unwrap_or_default(),
        ))
    }

    /// Sign with a fresh timestamp captured for this call
    pub fn authorize(&self, request: &mut OutgoingRequest) -> ProviderResult<()> {
        self.sign_at(request, Utc::now().timestamp_millis())
    }

    /// Sign with an explicit millisecond timestamp
    pub fn sign_at(&self, request: &mut OutgoingRequest, timestamp_ms: i64) -> ProviderResult<()> {
        if !request.url.path().ends_with('/') {
            let path = format!("{}/", request.url.path());
            request.url.set_path(&path);
        }

        let timestamp = timestamp_ms.to_string();
        let mut canonical = format!(
            "{}\n{}\n{}",
            request.method.as_str(),
            request.path_and_query(),
            timestamp
        );
        if let Some(body) = request.body.as_deref().filter(|b| !b.is_empty()) {
            canonical.push('\n');
            canonical.push_str(&compact_json(body)?);
        }

        let signature = self.signature(&canonical)?;

        request.set_header(TIMESTAMP_HEADER, &timestamp)?;
        request.set_header(SIGNATURE_HEADER, &signature)?;
        request.set_header(KEY_ID_HEADER, &self.key_id)?;
        Ok(())
    }

    fn signature(&self, canonical: &str) -> ProviderResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ProviderError::InvalidRequest(format!("invalid signing key: {e}")))?;
        mac.update(canonical.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for BitokAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitokAuthorizer")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Registry factory for this provider; the correlation hint is not used
pub fn build_authorizer(
    credentials: &CredentialSet,
    _correlation_id: Option<&str>,
) -> ProviderResult<Authorizer> {
    BitokAuthorizer::from_credentials(credentials).map(Authorizer::from)
}

/// Strip insignificant whitespace from a JSON document without reordering
/// keys or touching string contents.
pub fn compact_json(body: &[u8]) -> ProviderResult<String> {
    serde_json::from_slice::<IgnoredAny>(body)
        .map_err(|e| ProviderError::InvalidRequest(format!("body is not valid JSON: {e}")))?;

    let mut out = Vec::with_capacity(body.len());
    let mut in_string = false;
    let mut escaped = false;

    for &byte in body {
        if in_string {
            out.push(byte);
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b' ' | b'\n' | b'\r' | b'\t' => {}
            b'"' => {
                in_string = true;
                out.push(byte);
            }
            _ => out.push(byte),
        }
    }

    String::from_utf8(out)
        .map_err(|e| ProviderError::InvalidRequest(format!("body is not UTF-8: {e}")))
}
