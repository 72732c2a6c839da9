use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::ScheduleState;

pub fn schedule_routes(state: ScheduleState) -> Router {
    Router::new()
        // Weekly templates
        .route("/templates", post(handlers::create_template))
        .route("/templates/{template_id}", put(handlers::update_template).delete(handlers::delete_template))
        .route("/doctors/{doctor_id}/templates", get(handlers::list_templates))

        // Generated slots
        .route("/availability/generate", post(handlers::generate_availability))
        .route("/availability/prune", post(handlers::prune_availability))
        .route("/doctors/{doctor_id}/availability", get(handlers::query_availability))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
