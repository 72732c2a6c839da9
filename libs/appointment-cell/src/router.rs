// libs/appointment-cell/src/router.rs
use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppointmentState;

pub fn appointment_routes(state: AppointmentState) -> Router {
    // All appointment operations require authentication
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))

        // Appointment listings
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_appointments))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
