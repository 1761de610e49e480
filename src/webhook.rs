use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use crate::flow::{self, Page};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VoiceQuery {
    /// Call-flow step selector; absent or unknown means the main menu.
    page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoiceForm {
    /// Keypad digits Twilio gathered from the caller, if any.
    #[serde(rename = "Digits")]
    digits: Option<String>,
}

/// Handle POST /voice — Twilio webhook driving the callbox call flow.
///
/// Twilio re-invokes this endpoint with `?page=...` and the gathered Digits
/// as the call progresses. The request's own path is echoed back in Gather
/// actions and Redirects, so the flow stays self-referencing wherever the
/// route is mounted.
pub async fn handle_voice(
    State(state): State<AppState>,
    uri: Uri,
    Query(query): Query<VoiceQuery>,
    Form(form): Form<VoiceForm>,
) -> Response {
    let page = Page::from_param(query.page.as_deref());
    tracing::debug!(?page, digits = ?form.digits, "Incoming voice webhook");

    match flow::build(&state.config.callbox, page, form.digits.as_deref(), uri.path()) {
        Ok(twiml) => ([("Content-Type", "text/xml")], twiml.render()).into_response(),
        Err(e) => {
            // Structural TwiML errors are bugs; abort rather than ship
            // partial markup to the carrier.
            tracing::error!("Failed to build TwiML: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
