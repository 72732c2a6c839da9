// libs/schedule-cell/src/models.rs
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

use crate::store::StoreError;

// ==============================================================================
// SCHEDULE TEMPLATES
// ==============================================================================

/// A doctor's recurring weekly working hours for one weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: u8, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: u32,
    pub is_active: bool,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleTemplate {
    pub fn break_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.break_start, self.break_end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    /// Same doctor, same weekday, and the working hours intersect.
    pub fn overlaps(&self, other: &ScheduleTemplate) -> bool {
        self.doctor_id == other.doctor_id
            && self.day_of_week == other.day_of_week
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }

    pub fn applies_to(&self, date: NaiveDate) -> bool {
        self.is_active && day_of_week(date) == self.day_of_week
    }
}

/// Weekday index used by templates: Sunday is 0.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplateRequest {
    pub doctor_id: Uuid,
    pub day_of_week: u8,
    #[serde(with = "flexible_time")]
    pub start_time: NaiveTime,
    #[serde(with = "flexible_time")]
    pub end_time: NaiveTime,
    pub slot_duration_minutes: u32,
    #[serde(default, with = "flexible_time::option")]
    pub break_start: Option<NaiveTime>,
    #[serde(default, with = "flexible_time::option")]
    pub break_end: Option<NaiveTime>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTemplateRequest {
    pub day_of_week: Option<u8>,
    #[serde(default, with = "flexible_time::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "flexible_time::option")]
    pub end_time: Option<NaiveTime>,
    pub slot_duration_minutes: Option<u32>,
    #[serde(default, with = "flexible_time::option")]
    pub break_start: Option<NaiveTime>,
    #[serde(default, with = "flexible_time::option")]
    pub break_end: Option<NaiveTime>,
    /// Removes the break window; takes precedence over `break_start`/`break_end`.
    pub clear_break: Option<bool>,
    pub is_active: Option<bool>,
}

// ==============================================================================
// AVAILABILITY SLOTS
// ==============================================================================

/// One bookable interval, derived from a template and keyed by
/// (doctor_id, date, start_time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
}

impl AvailabilitySlot {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            doctor_id: self.doctor_id,
            date: self.date,
            start_time: self.start_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "flexible_time")]
    pub start_time: NaiveTime,
}

/// A slot the generator wants to exist; stores assign the id on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSlot {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl NewSlot {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            doctor_id: self.doctor_id,
            date: self.date,
            start_time: self.start_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotQuery {
    pub doctor_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub available_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSelection {
    Day(NaiveDate),
    Range { from: NaiveDate, to: NaiveDate },
}

impl DateSelection {
    pub fn bounds(&self) -> (NaiveDate, NaiveDate) {
        match *self {
            DateSelection::Day(date) => (date, date),
            DateSelection::Range { from, to } => (from, to),
        }
    }
}

/// Body of the generate and prune operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRangeRequest {
    pub doctor_id: Uuid,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub doctor_id: Uuid,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub created: usize,
    pub preserved: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityQueryParams {
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub available_only: Option<bool>,
}

impl AvailabilityQueryParams {
    pub fn selection(&self) -> Result<DateSelection, ScheduleError> {
        match (self.date, self.from, self.to) {
            (Some(date), None, None) => Ok(DateSelection::Day(date)),
            (None, Some(from), Some(to)) => Ok(DateSelection::Range { from, to }),
            _ => Err(ScheduleError::Validation(
                "Provide either `date` or both `from` and `to`".to_string(),
            )),
        }
    }
}

/// Slot as rendered to calendar and booking clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotView {
    pub id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
}

impl From<AvailabilitySlot> for SlotView {
    fn from(slot: AvailabilitySlot) -> Self {
        Self {
            id: slot.id,
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            available: slot.available,
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Schedule overlaps active template {existing_id}")]
    OverlappingSchedule { existing_id: Uuid },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Infrastructure(String),
}

impl From<StoreError> for ScheduleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ScheduleError::NotFound(what),
            other => ScheduleError::Infrastructure(other.to_string()),
        }
    }
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        let message = err.to_string();
        match err {
            ScheduleError::InvalidTimeRange(_) => AppError::InvalidTimeRange(message),
            ScheduleError::OverlappingSchedule { .. } => AppError::OverlappingSchedule(message),
            ScheduleError::Validation(_) => AppError::ValidationError(message),
            ScheduleError::NotFound(_) => AppError::NotFound(message),
            ScheduleError::Infrastructure(_) => AppError::Database(message),
        }
    }
}

// ==============================================================================
// SERDE HELPERS
// ==============================================================================

/// `HH:MM:SS` on output; `HH:MM:SS` or `HH:MM` on input.
pub mod flexible_time {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid time `{}`, expected HH:MM[:SS]", raw)))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
            match time {
                Some(time) => super::serialize(time, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => parse(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid time `{}`, expected HH:MM[:SS]", raw))),
                None => Ok(None),
            }
        }
    }
}
