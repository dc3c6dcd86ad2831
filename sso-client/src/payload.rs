//! The `sso` payload wire format.
//!
//! On the wire a payload is `base64(urlencode(key=value&...))`. Keys may
//! repeat; lookups return the last value, the way query dictionaries do.

use crate::error::{SsoError, SsoResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use url::form_urlencoded;

/// Ordered key/value mapping carried inside the `sso` parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsoPayload {
    pairs: Vec<(String, String)>,
}

impl SsoPayload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key/value pair (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Append a key/value pair.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Last value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value under `key`, or `MissingField`.
    pub fn require(&self, key: &'static str) -> SsoResult<&str> {
        self.get(key).ok_or(SsoError::MissingField(key))
    }

    /// All pairs in insertion order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// `application/x-www-form-urlencoded` form of the pairs.
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }

    /// Encode for the wire: urlencode, then standard base64.
    pub fn encode(&self) -> String {
        STANDARD.encode(self.to_query_string())
    }

    /// Decode a wire payload.
    ///
    /// ASCII whitespace inside the base64 text is ignored, since some
    /// providers line-wrap their output.
    pub fn decode(encoded: &str) -> SsoResult<Self> {
        let compact: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        let raw = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| SsoError::MalformedPayload(format!("base64: {e}")))?;
        let query = String::from_utf8(raw)
            .map_err(|e| SsoError::MalformedPayload(format!("utf-8: {e}")))?;

        Ok(Self {
            pairs: form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        })
    }
}

impl<K, V> FromIterator<(K, V)> for SsoPayload
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
