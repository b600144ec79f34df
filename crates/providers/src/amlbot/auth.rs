//! Token authorizer

use std::collections::BTreeMap;
use std::fmt;

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use md5::{Digest, Md5};

use aml_core::{CredentialKey, CredentialSet, ProviderId};

use crate::auth::Authorizer;
use crate::error::{ProviderError, ProviderResult};
use crate::request::{OutgoingRequest, RequestKind, FORM_CONTENT_TYPE};

const ACCESS_ID_FIELD: &str = "accessId";
const TOKEN_FIELD: &str = "token";

/// Credential keys this provider requires
pub const REQUIRED_KEYS: [CredentialKey; 2] = [CredentialKey::AccessId, CredentialKey::AccessKey];

/// Signs requests with an `accessId` + digest `token` pair
#[derive(Clone)]
pub struct AmlbotAuthorizer {
    access_id: String,
    access_key: String,
    /// Provider check uid; mixed into the token on status calls only
    correlation_id: Option<String>,
}

impl AmlbotAuthorizer {
    pub fn new(
        access_id: impl Into<String>,
        access_key: impl Into<String>,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            access_id: access_id.into(),
            access_key: access_key.into(),
            correlation_id,
        }
    }

    pub fn from_credentials(
        credentials: &CredentialSet,
        correlation_id: Option<&str>,
    ) -> ProviderResult<Self> {
        let missing = credentials.missing(&REQUIRED_KEYS);
        if !missing.is_empty() {
            return Err(ProviderError::MissingCredentials {
                provider: ProviderId::Amlbot,
                keys: missing,
            });
        }

        // Both keys verified present above
        let access_id = credentials.get(CredentialKey::AccessId).unwrap_or_default();
        let access_key = credentials.get(CredentialKey::AccessKey).unwrap_or_default();

        Ok(Self::new(
            access_id,
            access_key,
            correlation_id.filter(|c| !c.is_empty()).map(str::to_string),
        ))
    }

    /// Lower-case hex MD5 for a request of the given kind
    pub fn token(&self, kind: RequestKind) -> String {
        let material = match (kind, &self.correlation_id) {
            (RequestKind::Status, Some(uid)) => {
                format!("{}:{}:{}", uid, self.access_key, self.access_id)
            }
            _ => format!("{}:{}", self.access_key, self.access_id),
        };
        hex::encode(Md5::digest(material.as_bytes()))
    }

    pub fn authorize(&self, request: &mut OutgoingRequest) -> ProviderResult<()> {
        let token = self.token(request.kind);
        let fields = [
            (ACCESS_ID_FIELD, self.access_id.as_str()),
            (TOKEN_FIELD, token.as_str()),
        ];

        if request.method == Method::GET || request.method == Method::HEAD {
            let merged = merge_encoded(request.url.query().unwrap_or_default().as_bytes(), &fields);
            request.url.set_query(Some(&merged));
        } else {
            let existing = request.body.take().unwrap_or_default();
            let merged = merge_encoded(&existing, &fields);
            request.body = Some(merged.into_bytes());
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        }

        Ok(())
    }
}

impl fmt::Debug for AmlbotAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmlbotAuthorizer")
            .field("access_id", &self.access_id)
            .field("access_key", &"<redacted>")
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

/// Registry factory for this provider
pub fn build_authorizer(
    credentials: &CredentialSet,
    correlation_id: Option<&str>,
) -> ProviderResult<Authorizer> {
    AmlbotAuthorizer::from_credentials(credentials, correlation_id).map(Authorizer::from)
}

/// Decode `encoded`, set `fields` (replacing existing values) and re-encode
/// with keys in sorted order so the output does not depend on input order.
fn merge_encoded(encoded: &[u8], fields: &[(&str, &str)]) -> String {
    let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(encoded) {
        values
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    for (key, value) in fields {
        values.insert((*key).to_string(), vec![(*value).to_string()]);
    }

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, vals) in &values {
        for value in vals {
            serializer.append_pair(key, value);
        }
    }
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const TOKEN_NO_UID: &str = "5313e9afc3fd9c690466e00f98e19f75";
    const TOKEN_WITH_UID: &str = "7ac020b53aaf1575a4739f2888fb6866";

    fn post(kind: RequestKind, body: &str) -> OutgoingRequest {
        let mut req = OutgoingRequest::new(
            kind,
            Method::POST,
            Url::parse("https://amlbot.test/").unwrap(),
        );
        req.body = Some(body.as_bytes().to_vec());
        req
    }

    #[test]
    fn test_golden_signed_body() {
        let auth = AmlbotAuthorizer::new("123", "test-key", None);
        let mut req = post(
            RequestKind::Check,
            "hash=tx123&asset=BTC&locale=en&flow=advanced",
        );

        auth.authorize(&mut req).unwrap();

        let body = String::from_utf8(req.body.unwrap()).unwrap();
        assert_eq!(
            body,
            format!("accessId=123&asset=BTC&flow=advanced&hash=tx123&locale=en&token={TOKEN_NO_UID}")
        );
    }

    #[test]
    fn test_correlation_id_omitted_on_initial_check() {
        let auth = AmlbotAuthorizer::new("123", "test-key", Some("uid-42".into()));
        assert_eq!(auth.token(RequestKind::Check), TOKEN_NO_UID);
        assert_eq!(auth.token(RequestKind::Verify), TOKEN_NO_UID);
        assert_eq!(auth.token(RequestKind::Status), TOKEN_WITH_UID);
    }

    #[test]
    fn test_encoding_is_order_independent() {
        let auth = AmlbotAuthorizer::new("123", "test-key", None);
        let mut a = post(RequestKind::Check, "hash=tx123&asset=BTC");
        let mut b = post(RequestKind::Check, "asset=BTC&hash=tx123");

        auth.authorize(&mut a).unwrap();
        auth.authorize(&mut b).unwrap();

        assert_eq!(a.body, b.body);
    }

    #[test]
    fn test_existing_auth_fields_are_replaced() {
        let auth = AmlbotAuthorizer::new("123", "test-key", None);
        let mut req = post(RequestKind::Check, "accessId=999&token=stale&hash=tx123");

        auth.authorize(&mut req).unwrap();

        let body = String::from_utf8(req.body.unwrap()).unwrap();
        assert_eq!(
            body,
            format!("accessId=123&hash=tx123&token={TOKEN_NO_UID}")
        );
    }

    #[test]
    fn test_get_request_signs_query() {
        let auth = AmlbotAuthorizer::new("123", "test-key", None);
        let mut req = OutgoingRequest::new(
            RequestKind::Verify,
            Method::GET,
            Url::parse("https://amlbot.test/stats?period=day").unwrap(),
        );

        auth.authorize(&mut req).unwrap();

        assert!(req.body.is_none());
        assert_eq!(
            req.url.query().unwrap(),
            format!("accessId=123&period=day&token={TOKEN_NO_UID}")
        );
    }

    #[test]
    fn test_from_credentials_requires_both_keys() {
        let creds = CredentialSet::new().with(CredentialKey::AccessId, "123");
        let err = AmlbotAuthorizer::from_credentials(&creds, None).unwrap_err();
        match err {
            ProviderError::MissingCredentials { provider, keys } => {
                assert_eq!(provider, ProviderId::Amlbot);
                assert_eq!(keys, vec![CredentialKey::AccessKey]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let auth = AmlbotAuthorizer::new("123", "test-key", None);
        assert!(!format!("{auth:?}").contains("test-key"));
    }
}
