// SPDX-License-Identifier: MIT

//! Drive push-notification webhook.
//!
//! Google POSTs here when the watched spreadsheet changes. A notification
//! for a channel we no longer hold gets 410 so Google stops delivering on
//! it; a content update clears the memoized sheet data.

use crate::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use std::sync::Arc;

const CHANNEL_ID_HEADER: &str = "X-Goog-Channel-ID";
const RESOURCE_STATE_HEADER: &str = "X-Goog-Resource-State";
const CHANGED_HEADER: &str = "X-Goog-Changed";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/watch", post(handle_notification))
}

async fn handle_notification(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> StatusCode {
    let Some(channel_id) = header_str(&headers, CHANNEL_ID_HEADER) else {
        tracing::warn!("Watch notification missing channel id header");
        return StatusCode::BAD_REQUEST;
    };
    let Some(resource_state) = header_str(&headers, RESOURCE_STATE_HEADER) else {
        tracing::warn!("Watch notification missing resource state header");
        return StatusCode::BAD_REQUEST;
    };
    let changed = header_str(&headers, CHANGED_HEADER).unwrap_or("");
    let changed: Vec<&str> = changed.split(',').collect();

    tracing::debug!(
        channel_id,
        resource_state,
        changed = ?changed,
        "Watch notification received"
    );

    if !state
        .sheets
        .notify_change(channel_id, resource_state, &changed)
        .await
    {
        // Not our channel (or nothing cached): tell Google to stop
        return StatusCode::GONE;
    }

    StatusCode::NO_CONTENT
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
