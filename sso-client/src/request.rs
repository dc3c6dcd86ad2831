//! The parts of an inbound HTTP request the handshake reads.

use crate::error::{SsoError, SsoResult};
use url::form_urlencoded;
use url::Url;

/// Query parameters stripped before the original query is forwarded in
/// `return_sso_url`.
const SIGNED_PARAMS: [&str; 2] = ["sso", "sig"];

/// Schemes a post-login redirect may use.
const ALLOWED_REDIRECT_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

/// Default post-login destination.
pub const DEFAULT_NEXT: &str = "/";

/// Scheme, host, and decoded query of an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoRequest {
    /// `http` or `https`
    pub scheme: String,

    /// Host with optional port, as the browser addressed us
    pub host: String,

    /// Query parameters in order of appearance
    pub query: Vec<(String, String)>,
}

impl SsoRequest {
    /// Create a request with an empty query.
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            query: Vec::new(),
        }
    }

    /// Parse a raw (still percent-encoded) query string.
    pub fn with_raw_query(mut self, raw: Option<&str>) -> Self {
        self.query = raw
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        self
    }

    /// Append one decoded query parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Last value of query parameter `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Post-login destination: `next`, or `/`.
    ///
    /// Absolute targets with a scheme outside http/https/ftp are refused.
    pub fn next(&self) -> SsoResult<String> {
        let next = self.param("next").unwrap_or(DEFAULT_NEXT);

        if let Ok(url) = Url::parse(next) {
            if !ALLOWED_REDIRECT_SCHEMES.contains(&url.scheme()) {
                return Err(SsoError::DisallowedRedirect(next.to_string()));
            }
        }

        Ok(next.to_string())
    }

    /// Re-encoded query without any `sso` or `sig` parameter, including the
    /// leading `?`, or an empty string when nothing is left.
    pub fn forwarded_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut any = false;

        for (key, value) in &self.query {
            if SIGNED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            serializer.append_pair(key, value);
            any = true;
        }

        if any {
            format!("?{}", serializer.finish())
        } else {
            String::new()
        }
    }

    /// Absolute URL for a local path on this host.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme, self.host, path)
    }
}
