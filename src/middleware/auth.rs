//! Client authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Run it through the [`AuthGateway`](crate::auth::AuthGateway)
//! 2. Inject the resulting [`AuthContext`] into the request
//! 3. Reject refused requests with the gateway's error response

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::{app::AppState, auth::AuthContext, error::AuthError};

/// Client authentication middleware function.
///
/// # Flow
///
/// 1. Split the request into head and body; only the head is inspected
/// 2. Authenticate the head against the current wall clock
/// 3. If admitted: insert `AuthContext` into the request extensions, call next handler
/// 4. If refused: return the `AuthError` response (401, 403, 400 or 429)
///
/// # Returns
///
/// - `Ok(Response)` if admitted (calls next handler)
/// - `Err(AuthError)` otherwise
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let (mut parts, body) = request.into_parts();

    let auth_context: AuthContext = state.gateway.authenticate(&parts, Utc::now()).await?;

    // Route handlers can now extract this using Extension<AuthContext>
    parts.extensions.insert(auth_context);

    Ok(next.run(Request::from_parts(parts, body)).await)
}
