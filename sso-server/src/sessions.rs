//! Binding between the session cookie and server-side sessions.
//!
//! Handlers load the [`Session`] at the top, pass it explicitly into the
//! handshake, and commit it before building the response, so whatever the
//! handshake consumed is persisted even when it refuses the request.

use crate::error::ApiError;
use crate::state::AppState;
use axum::http::{header, HeaderMap, Uri};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use sso_client::{Session, SessionCommit, SsoRequest};

/// Load the session named by the request cookie.
pub async fn load(state: &AppState, jar: &CookieJar) -> Result<Session, ApiError> {
    let id = jar.get(&state.cookie.name).map(|c| c.value().to_string());
    Ok(Session::load(state.sessions.as_ref(), id.as_deref()).await?)
}

/// Persist the session and reflect the outcome in the cookie jar.
pub async fn commit(
    state: &AppState,
    session: &mut Session,
    jar: CookieJar,
) -> Result<CookieJar, ApiError> {
    let ttl = state.client.config().session_ttl;

    Ok(match session.commit(state.sessions.as_ref(), ttl).await? {
        SessionCommit::Unchanged => jar,
        SessionCommit::Saved(id) => jar.add(
            Cookie::build((state.cookie.name.clone(), id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(state.cookie.secure),
        ),
        SessionCommit::Cleared => {
            jar.remove(Cookie::build(state.cookie.name.clone()).path("/"))
        }
    })
}

/// Describe the inbound request for the handshake.
///
/// Scheme and host come from `PUBLIC_BASE_URL` when configured, otherwise
/// from `X-Forwarded-Proto` (default `http`) and the `Host` header.
pub fn sso_request(state: &AppState, headers: &HeaderMap, uri: &Uri) -> SsoRequest {
    let (scheme, host) = match &state.public_base_url {
        Some(base) => {
            let host = base.host_str().unwrap_or("localhost");
            let host = match base.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            (base.scheme().to_string(), host)
        }
        None => {
            let scheme = header_str(headers, "x-forwarded-proto")
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_string())
                .filter(|v| v == "http" || v == "https")
                .unwrap_or_else(|| "http".to_string());
            let host = header_str(headers, header::HOST.as_str())
                .map(str::to_string)
                .or_else(|| uri.authority().map(|a| a.to_string()))
                .unwrap_or_else(|| "localhost".to_string());
            (scheme, host)
        }
    };

    SsoRequest::new(scheme, host).with_raw_query(uri.query())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
