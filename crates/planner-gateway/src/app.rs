use axum::{
    routing::{get, post},
    Router,
};
use planner_core::config::PlannerConfig;
use planner_events::EventBus;
use planner_meetings::MeetingService;
use planner_scheduler::JobRegistry;
use std::sync::Arc;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: PlannerConfig,
    pub meetings: MeetingService,
    /// Conferencing signals are published here directly.
    pub bus: Arc<EventBus>,
    pub registry: JobRegistry,
}

impl AppState {
    pub fn new(
        config: PlannerConfig,
        meetings: MeetingService,
        bus: Arc<EventBus>,
        registry: JobRegistry,
    ) -> Self {
        Self {
            config,
            meetings,
            bus,
            registry,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    use crate::http::{health, meetings, signals};

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/meetings",
            get(meetings::list_meetings).post(meetings::create_meeting),
        )
        .route(
            "/meetings/{id}",
            get(meetings::get_meeting)
                .patch(meetings::update_meeting)
                .delete(meetings::delete_meeting),
        )
        .route("/conference/signals", post(signals::signal_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
