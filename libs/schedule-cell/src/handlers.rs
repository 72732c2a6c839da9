// libs/schedule-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, State},
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
    AvailabilityQueryParams, AvailabilityRangeRequest, CreateTemplateRequest, SlotView,
    UpdateTemplateRequest,
};
use crate::state::ScheduleState;

/// Templates and availability belong to the doctor; admins may act for anyone.
fn ensure_manages(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.is_self_or_admin(&doctor_id.to_string()) {
        return Ok(());
    }
    warn!("User {} tried to manage the schedule of doctor {}", user.id, doctor_id);
    Err(AppError::Forbidden("You can only manage your own schedule".to_string()))
}

// ==============================================================================
// TEMPLATE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_template(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_manages(&user, request.doctor_id)?;

    let ctx = request_context(&user, &state.config);
    let template = state.template_service().create(request, &ctx).await?;

    Ok((StatusCode::CREATED, Json(json!(template))))
}

#[axum::debug_handler]
pub async fn list_templates(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_manages(&user, doctor_id)?;

    let templates = state.template_service().list(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "templates": templates,
        "total": templates.len()
    })))
}

#[axum::debug_handler]
pub async fn update_template(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(template_id): Path<Uuid>,
    AppJson(request): AppJson<UpdateTemplateRequest>,
) -> Result<Json<Value>, AppError> {
    let service = state.template_service();
    let current = service.get(template_id).await?;
    ensure_manages(&user, current.doctor_id)?;

    let ctx = request_context(&user, &state.config);
    let template = service.update(template_id, request, &ctx).await?;

    Ok(Json(json!(template)))
}

#[axum::debug_handler]
pub async fn delete_template(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = state.template_service();
    let current = service.get(template_id).await?;
    ensure_manages(&user, current.doctor_id)?;

    service.delete(template_id).await?;

    Ok(Json(json!({
        "deleted": true,
        "id": template_id
    })))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn generate_availability(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<AvailabilityRangeRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_manages(&user, request.doctor_id)?;

    let summary = state
        .slot_generator()
        .generate(request.doctor_id, request.date_from, request.date_to)
        .await?;

    Ok(Json(json!(summary)))
}

#[axum::debug_handler]
pub async fn prune_availability(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<AvailabilityRangeRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_manages(&user, request.doctor_id)?;

    let ctx = request_context(&user, &state.config);
    let pruned = state
        .slot_generator()
        .prune_orphans(request.doctor_id, request.date_from, request.date_to, &ctx)
        .await?;

    Ok(Json(json!({
        "doctor_id": request.doctor_id,
        "pruned": pruned
    })))
}

/// Any authenticated caller may browse a doctor's calendar.
#[axum::debug_handler]
pub async fn query_availability(
    State(state): State<ScheduleState>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    AppQuery(params): AppQuery<AvailabilityQueryParams>,
) -> Result<Json<Vec<SlotView>>, AppError> {
    let selection = params.selection()?;
    let ctx = request_context(&user, &state.config);

    let slots = state
        .availability_service()
        .query(doctor_id, selection, params.available_only.unwrap_or(false), Some(&ctx))
        .await?;

    Ok(Json(slots.into_iter().map(SlotView::from).collect()))
}
