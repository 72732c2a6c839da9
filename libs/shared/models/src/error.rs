use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Overlapping schedule: {0}")]
    OverlappingSchedule(String),

    #[error("Slot already booked: {0}")]
    SlotAlreadyBooked(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Booking timeout: {0}")]
    BookingTimeout(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::ValidationError(_)
            | AppError::InvalidTimeRange(_) => StatusCode::BAD_REQUEST,
            AppError::OverlappingSchedule(_)
            | AppError::SlotAlreadyBooked(_)
            | AppError::InvalidStateTransition(_)
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BookingTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidTimeRange(_) => "INVALID_TIME_RANGE",
            AppError::OverlappingSchedule(_) => "OVERLAPPING_SCHEDULE",
            AppError::SlotAlreadyBooked(_) => "SLOT_ALREADY_BOOKED",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::BookingTimeout(_) => "BOOKING_TIMEOUT",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Internal(_) | AppError::Database(_) | AppError::ExternalService(_) => {
                "INFRASTRUCTURE_ERROR"
            }
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::ValidationError(msg)
            | AppError::InvalidTimeRange(msg)
            | AppError::OverlappingSchedule(msg)
            | AppError::SlotAlreadyBooked(msg)
            | AppError::InvalidStateTransition(msg)
            | AppError::BookingTimeout(msg)
            | AppError::Conflict(msg)
            | AppError::Internal(msg)
            | AppError::Database(msg)
            | AppError::ExternalService(msg) => msg,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, message);
        } else {
            tracing::warn!("Request rejected: {}: {}", status, message);
        }

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

// malformed bodies and query strings answer like any other invalid input
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}
