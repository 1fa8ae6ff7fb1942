//! Conferencing signal ingress, POST /conference/signals.
//!
//! The provider (or a bridge in front of it) reports call state changes
//! here. Each signal becomes a `CallStarted` / `CallStopped` event.

use axum::{extract::State, http::StatusCode, Json};
use planner_core::RoomId;
use planner_events::LifecycleEvent;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Started,
    Stopped,
}

#[derive(Debug, Deserialize)]
pub struct CallSignal {
    pub room_id: String,
    pub state: CallState,
}

pub async fn signal_handler(
    State(state): State<Arc<AppState>>,
    Json(signal): Json<CallSignal>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if signal.room_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "room_id must not be empty"})),
        ));
    }

    let room = RoomId(signal.room_id);
    info!(room_id = %room, state = ?signal.state, "conference signal received");
    let event = match signal.state {
        CallState::Started => LifecycleEvent::CallStarted(room),
        CallState::Stopped => LifecycleEvent::CallStopped(room),
    };
    let delivered = state.bus.publish(event);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"ok": true, "delivered": delivered})),
    ))
}
