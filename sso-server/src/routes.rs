//! Route table and handshake handlers.

use crate::error::ApiError;
use crate::health;
use crate::sessions;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use axum_extra::extract::cookie::CookieJar;
use tower_http::trace::TraceLayer;

/// Path that starts the handshake.
pub const LOGIN_PATH: &str = "/sso/login";

/// Path that ends the local session.
pub const LOGOUT_PATH: &str = "/sso/logout";

/// Path for liveness checks.
pub const HEALTH_PATH: &str = "/health";

/// Build the application router.
///
/// The callback is mounted at the configured callback path, since that is
/// the path the provider is told to return to.
pub fn router(state: AppState) -> Router {
    let callback_path = state.client.config().callback_path.clone();

    Router::new()
        .route(LOGIN_PATH, get(redirect_to_provider))
        .route(&callback_path, get(provider_callback))
        .route(LOGOUT_PATH, get(logout))
        .route(HEALTH_PATH, get(health::liveness))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 302 Found to `location`.
fn found(location: &str) -> Result<Response, ApiError> {
    let value = HeaderValue::from_str(location).map_err(|_| ApiError::InvalidLocation)?;
    Ok((StatusCode::FOUND, [(header::LOCATION, value)]).into_response())
}

/// `GET /sso/login`
async fn redirect_to_provider(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let request = sessions::sso_request(&state, &headers, &uri);
    let mut session = sessions::load(&state, &jar).await?;

    let redirect = state.client.begin(&mut session, &request).await?;

    let jar = sessions::commit(&state, &mut session, jar).await?;
    Ok((jar, found(redirect.location())?).into_response())
}

/// `GET <callback path>`
///
/// The session is committed whatever the outcome, because a refused
/// callback may already have consumed the nonce.
async fn provider_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let request = sessions::sso_request(&state, &headers, &uri);
    let mut session = sessions::load(&state, &jar).await?;

    let outcome = state.client.complete(&mut session, &request).await;

    let jar = sessions::commit(&state, &mut session, jar).await?;
    let response = match outcome {
        Ok(login) => found(login.redirect.location()).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    };
    Ok((jar, response).into_response())
}

/// `GET /sso/logout`
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let request = sessions::sso_request(&state, &headers, &uri);
    let mut session = sessions::load(&state, &jar).await?;

    let redirect = state.client.logout(&mut session, &request)?;

    let jar = sessions::commit(&state, &mut session, jar).await?;
    Ok((jar, found(redirect.location())?).into_response())
}
