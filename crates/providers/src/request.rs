//! Outgoing HTTP request model
//!
//! Clients build an [`OutgoingRequest`], the authorizer mutates it, and the
//! transport sends exactly what the authorizer left behind. The bytes that
//! go into the audit trail are taken from the authorized request, never
//! re-serialized.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use url::Url;

use crate::error::{ProviderError, ProviderResult};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// What an outgoing request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Initial screening of a transaction
    Check,
    /// Status recheck of an existing provider check
    Status,
    /// Harmless read used to validate credentials
    Verify,
}

/// A request about to be sent to a provider
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub kind: RequestKind,
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl OutgoingRequest {
    pub fn new(kind: RequestKind, method: Method, url: Url) -> Self {
        Self {
            kind,
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Attach a form-encoded body built from `pairs` (in the given order)
    pub fn with_form<K, V>(mut self, pairs: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
            .finish();
        self.body = Some(encoded.into_bytes());
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        self
    }

    /// Attach an already-serialized JSON body
    pub fn with_json(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        self
    }

    /// Set a header, replacing any previous value
    pub fn set_header(&mut self, name: &'static str, value: &str) -> ProviderResult<()> {
        let value = HeaderValue::from_str(value).map_err(|e| {
            ProviderError::InvalidRequest(format!("invalid value for header {name}: {e}"))
        })?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// `PATH[?QUERY]` as it will appear on the request line
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) if !query.is_empty() => format!("{}?{}", self.url.path(), query),
            _ => self.url.path().to_string(),
        }
    }

    pub fn has_body(&self) -> bool {
        self.body.as_ref().is_some_and(|b| !b.is_empty())
    }

    /// Bytes recorded in the audit trail for this request.
    ///
    /// The body when there is one, otherwise the request line.
    pub fn audit_bytes(&self) -> Vec<u8> {
        match &self.body {
            Some(body) if !body.is_empty() => body.clone(),
            _ => format!("{} {}", self.method, self.path_and_query()).into_bytes(),
        }
    }
}

/// Response as received from the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
