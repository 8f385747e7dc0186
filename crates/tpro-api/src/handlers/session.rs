//! Session inspection and user-initiated transitions.

use axum::extract::State;
use axum::Json;
use tracing::info;

use crate::error::ApiResult;
use crate::session::SessionSnapshot;
use crate::state::AppState;

/// Current session snapshot.
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session().snapshot())
}

/// Clear the result and release the preview. Refused while analyzing.
pub async fn reset_session(State(state): State<AppState>) -> ApiResult<Json<SessionSnapshot>> {
    let mut session = state.session();
    session.reset()?;
    info!("Session reset");
    Ok(Json(session.snapshot()))
}

/// Dismiss the error banner.
pub async fn dismiss_error(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let mut session = state.session();
    session.dismiss_error();
    Json(session.snapshot())
}
