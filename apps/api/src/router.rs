use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tracing::info;

use appointment_cell::router::appointment_routes;
use appointment_cell::state::AppointmentState;
use schedule_cell::router::schedule_routes;
use schedule_cell::state::ScheduleState;
use shared_config::{AppConfig, StorageBackend};
use shared_database::SupabaseClient;

/// Both cells share one slot store so bookings see generated availability.
pub fn create_router(config: Arc<AppConfig>) -> Router {
    let (schedule, appointments) = match config.storage_backend {
        StorageBackend::Supabase => {
            info!("Using Supabase storage at {}", config.supabase_url);
            let client = Arc::new(SupabaseClient::new(&config));
            let schedule = ScheduleState::supabase(config.clone(), client.clone());
            let appointments = AppointmentState::supabase(config.clone(), client, schedule.slots.clone());
            (schedule, appointments)
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            let schedule = ScheduleState::in_memory(config.clone());
            let appointments = AppointmentState::in_memory(config.clone(), schedule.slots.clone());
            (schedule, appointments)
        }
    };

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/schedules", schedule_routes(schedule))
        .nest("/appointments", appointment_routes(appointments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

    #[tokio::test]
    async fn root_answers_without_auth() {
        let app = create_router(TestConfig::default().to_arc());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cells_are_mounted_behind_auth() {
        let config = TestConfig::default();
        let app = create_router(config.to_arc());
        let doctor = TestUser::doctor("doctor@example.com");

        let anonymous = app
            .clone()
            .oneshot(Request::builder().uri("/appointments/patients/00000000-0000-0000-0000-000000000000").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let uri = format!("/schedules/doctors/{}/templates", doctor.id);
        let authorized = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header("Authorization", JwtTestUtils::bearer(&doctor, &config))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(authorized.status(), StatusCode::OK);
    }
}
