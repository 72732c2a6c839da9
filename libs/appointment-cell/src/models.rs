// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use schedule_cell::models::{flexible_time, ScheduleError};
use schedule_cell::store::StoreError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub clinic_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub motive: String,
    pub status: AppointmentStatus,
    pub price: f64,
    pub discount: f64,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("unknown appointment status: {}", other)),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Either the slot id or its natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotReference {
    ById {
        slot_id: Uuid,
    },
    ByKey {
        doctor_id: Uuid,
        date: NaiveDate,
        #[serde(with = "flexible_time")]
        start_time: NaiveTime,
    },
}

/// Registration payload for a patient the clinic has not seen before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub document_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatientInput {
    Existing { patient_id: Uuid },
    Inline(NewPatient),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub clinic_id: Uuid,
    pub slot: SlotReference,
    pub patient: PatientInput,
    pub motive: String,
    pub notes: Option<String>,
    pub price: Option<f64>,
    pub discount: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentListQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Slot {slot_id} is already booked")]
    SlotAlreadyBooked { slot_id: Uuid },

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStateTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Slot could not be reserved within {0} ms, retry the request")]
    Timeout(u64),

    #[error("Storage error: {0}")]
    Infrastructure(String),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => BookingError::NotFound(what),
            other => BookingError::Infrastructure(other.to_string()),
        }
    }
}

impl From<ScheduleError> for BookingError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::NotFound(what) => BookingError::NotFound(what),
            ScheduleError::Validation(msg) | ScheduleError::InvalidTimeRange(msg) => BookingError::Validation(msg),
            other => BookingError::Infrastructure(other.to_string()),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::Validation(_) => AppError::ValidationError(message),
            BookingError::NotFound(_) => AppError::NotFound(message),
            BookingError::Forbidden(_) => AppError::Forbidden(message),
            BookingError::SlotAlreadyBooked { .. } => AppError::SlotAlreadyBooked(message),
            BookingError::InvalidStateTransition { .. } => AppError::InvalidStateTransition(message),
            BookingError::Timeout(_) => AppError::BookingTimeout(message),
            BookingError::Infrastructure(_) => AppError::Database(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slot_reference_accepts_id_or_natural_key() {
        let id = Uuid::new_v4();
        let by_id: SlotReference = serde_json::from_value(json!({ "slot_id": id })).unwrap();
        assert_eq!(by_id, SlotReference::ById { slot_id: id });

        let doctor = Uuid::new_v4();
        let by_key: SlotReference = serde_json::from_value(json!({
            "doctor_id": doctor,
            "date": "2030-01-07",
            "start_time": "09:30"
        }))
        .unwrap();
        assert_eq!(by_key, SlotReference::ByKey {
            doctor_id: doctor,
            date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        });
    }

    #[test]
    fn patient_input_distinguishes_existing_from_inline() {
        let id = Uuid::new_v4();
        let existing: PatientInput = serde_json::from_value(json!({ "patient_id": id })).unwrap();
        assert_eq!(existing, PatientInput::Existing { patient_id: id });

        let inline: PatientInput = serde_json::from_value(json!({
            "first_name": "Ana",
            "last_name": "Pérez",
            "document_id": "12345678"
        }))
        .unwrap();
        assert!(matches!(inline, PatientInput::Inline(ref p) if p.email.is_none()));
    }

    #[test]
    fn status_wire_format_is_lowercase() {
        assert_eq!(json!(AppointmentStatus::Confirmed), json!("confirmed"));
        assert_eq!("CANCELLED".parse::<AppointmentStatus>().unwrap(), AppointmentStatus::Cancelled);
        assert!("no_show".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn booking_errors_map_to_http_codes() {
        let booked: AppError = BookingError::SlotAlreadyBooked { slot_id: Uuid::new_v4() }.into();
        assert_eq!(booked.code(), "SLOT_ALREADY_BOOKED");

        let timeout: AppError = BookingError::Timeout(5000).into();
        assert_eq!(timeout.status_code(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }
}
