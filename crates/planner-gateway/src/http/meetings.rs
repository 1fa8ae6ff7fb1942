//! Meeting CRUD endpoints.
//!
//! Every mutation goes through `MeetingService`, which persists and then
//! publishes the lifecycle event that drives the scheduler.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use planner_core::{Meeting, MeetingId};
use planner_meetings::{MeetingError, MeetingPatch, NewMeeting};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::app::AppState;

type ApiResult<T> = Result<T, (StatusCode, Json<Value>)>;

/// POST /meetings
pub async fn create_meeting(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewMeeting>,
) -> ApiResult<(StatusCode, Json<Meeting>)> {
    let meeting = state.meetings.create(new).map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(meeting)))
}

/// GET /meetings: meetings that have not ended yet.
pub async fn list_meetings(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Meeting>>> {
    state
        .meetings
        .list_active(Utc::now())
        .map(Json)
        .map_err(api_error)
}

/// GET /meetings/{id}
pub async fn get_meeting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Meeting>> {
    state.meetings.get(MeetingId(id)).map(Json).map_err(api_error)
}

/// PATCH /meetings/{id}
pub async fn update_meeting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<MeetingPatch>,
) -> ApiResult<Json<Meeting>> {
    state
        .meetings
        .update(MeetingId(id), patch)
        .map(Json)
        .map_err(api_error)
}

/// DELETE /meetings/{id}: returns the deleted meeting.
pub async fn delete_meeting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Meeting>> {
    state
        .meetings
        .delete(MeetingId(id))
        .map(Json)
        .map_err(api_error)
}

fn api_error(e: MeetingError) -> (StatusCode, Json<Value>) {
    let status = match &e {
        MeetingError::NotFound { .. } => StatusCode::NOT_FOUND,
        MeetingError::Invalid(inner) if inner.is_precondition() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => {
            error!(error = %e, "meeting request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({"error": e.to_string(), "code": e.code()})))
}
