//! Echo of the authenticated identity.

use axum::{Extension, Json};

use crate::auth::AuthContext;

/// Return the identity the gateway attached to this request.
///
/// # Endpoint
///
/// `GET /api/v1/whoami`
///
/// ```json
/// {
///   "client_id": "c1",
///   "key_version": "v1",
///   "mode": "signed"
/// }
/// ```
pub async fn whoami(Extension(auth): Extension<AuthContext>) -> Json<AuthContext> {
    Json(auth)
}
