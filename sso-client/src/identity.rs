//! Identity asserted by the provider in a verified callback payload.

use crate::error::{SsoError, SsoResult};
use crate::payload::SsoPayload;

/// Typed view of the user fields Discourse includes in its response.
///
/// Only `username` is required; it is the key local accounts are matched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    /// Provider username
    pub username: String,

    /// Email address
    pub email: Option<String>,

    /// Display name
    pub name: Option<String>,

    /// Provider-side user id
    pub external_id: Option<String>,
}

impl ProviderIdentity {
    /// Extract the identity from a decoded payload.
    pub fn from_payload(payload: &SsoPayload) -> SsoResult<Self> {
        let username = payload.require("username")?;
        if username.is_empty() {
            return Err(SsoError::MissingField("username"));
        }

        Ok(Self {
            username: username.to_string(),
            email: non_empty(payload.get("email")),
            name: non_empty(payload.get("name")),
            external_id: non_empty(payload.get("external_id")),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
