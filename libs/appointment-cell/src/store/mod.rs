// libs/appointment-cell/src/store/mod.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

pub use schedule_cell::store::StoreError;

use crate::models::{Appointment, AppointmentStatus};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

/// A status write applied only while the record still has `expected` status.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub expected: AppointmentStatus,
    pub next: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Fails with `StoreError::Conflict` when the slot already has a
    /// non-cancelled appointment.
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// `Ok(None)` when the record is missing or its status moved on.
    async fn update_status(&self, id: Uuid, change: StatusChange) -> Result<Option<Appointment>, StoreError>;

    /// Ordered by (date, start_time); bounds are inclusive.
    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Ordered by (date, start_time).
    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError>;
}
