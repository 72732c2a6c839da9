// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{request_context, AppJson, AppQuery};

use crate::models::{
    Appointment, AppointmentListQuery, AppointmentStatus, CancelAppointmentRequest,
    CreateAppointmentRequest, PatientInput, UpdateStatusRequest,
};
use crate::state::AppointmentState;

// ==============================================================================
// ACCESS RULES
// ==============================================================================

fn is_staff(user: &User) -> bool {
    user.is_admin() || user.is_doctor()
}

/// Patients book for themselves or register inline; staff book for anyone.
/// Ownership of an already known inline document is checked at booking time.
fn ensure_can_book(user: &User, patient: &PatientInput) -> Result<(), AppError> {
    match patient {
        PatientInput::Existing { patient_id } if !is_staff(user) && user.id != patient_id.to_string() => {
            warn!("User {} tried to book for patient {}", user.id, patient_id);
            Err(AppError::Forbidden("Patients can only book appointments for themselves".to_string()))
        }
        _ => Ok(()),
    }
}

fn can_view(user: &User, appointment: &Appointment) -> bool {
    user.is_admin()
        || user.id == appointment.doctor_id.to_string()
        || user.id == appointment.patient_id.to_string()
}

/// Confirm and complete belong to the treating doctor; the patient may also cancel.
fn ensure_can_set_status(user: &User, appointment: &Appointment, status: AppointmentStatus) -> Result<(), AppError> {
    let is_doctor = user.id == appointment.doctor_id.to_string();
    let is_patient = user.id == appointment.patient_id.to_string();

    let allowed = user.is_admin()
        || is_doctor
        || (is_patient && status == AppointmentStatus::Cancelled);

    if !allowed {
        warn!("User {} may not set appointment {} to {}", user.id, appointment.id, status);
        return Err(AppError::Forbidden("Not allowed to change this appointment".to_string()));
    }
    Ok(())
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_can_book(&user, &request.patient)?;

    let ctx = request_context(&user, &state.config);
    let appointment = state.booking_service().reserve(request, &ctx).await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking_service().get(appointment_id).await?;

    if !can_view(&user, &appointment) {
        return Err(AppError::Forbidden("Not allowed to view this appointment".to_string()));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    AppJson(request): AppJson<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = state.booking_service();
    let current = service.get(appointment_id).await?;
    ensure_can_set_status(&user, &current, request.status)?;

    let ctx = request_context(&user, &state.config);
    let appointment = service
        .update_status(appointment_id, request.status, request.reason, &ctx)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    request: Result<Option<Json<CancelAppointmentRequest>>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    // the body is optional, but a JSON body that does not parse is rejected
    let reason = request?.and_then(|Json(body)| body.reason);
    let service = state.booking_service();
    let current = service.get(appointment_id).await?;
    ensure_can_set_status(&user, &current, AppointmentStatus::Cancelled)?;

    let ctx = request_context(&user, &state.config);
    let appointment = service.cancel(appointment_id, reason, &ctx).await?;

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    AppQuery(query): AppQuery<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.is_self_or_admin(&doctor_id.to_string()) {
        return Err(AppError::Forbidden("Doctors can only list their own appointments".to_string()));
    }

    let appointments = state
        .booking_service()
        .list_for_doctor(doctor_id, query.from, query.to)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_self_or_admin(&patient_id.to_string()) && !user.is_doctor() {
        return Err(AppError::Forbidden("Patients can only list their own appointments".to_string()));
    }

    let mut appointments = state.booking_service().list_for_patient(patient_id).await?;

    // a doctor sees only the visits booked with them
    if user.is_doctor() && user.id != patient_id.to_string() {
        appointments.retain(|a| user.id == a.doctor_id.to_string());
    }

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}
