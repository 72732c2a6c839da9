use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, State},
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::context::RequestContext;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Rejects requests without a valid bearer token and stores the caller in the
/// request extensions for handlers to pick up with `Extension<User>`.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(TypedHeader(auth)) = auth else {
        return Err(AppError::Auth("Missing authorization header".to_string()));
    };

    let user = validate_token(auth.token(), &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Builds the request-scoped context for the scheduling core from the
/// authenticated caller and the wall clock.
pub fn request_context(user: &User, config: &AppConfig) -> RequestContext {
    RequestContext::new(Some(user.clone()), Utc::now())
        .with_clinic_offset_minutes(config.clinic_utc_offset_minutes)
}

/// `Json` whose rejections answer with the `AppError` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Query` whose rejections answer with the `AppError` body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
