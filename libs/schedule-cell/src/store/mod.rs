// libs/schedule-cell/src/store/mod.rs
//
// Persistence seams for templates and slots. The slot store is the only shared
// mutable resource of the booking path; `claim` is its compare-and-swap.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use shared_database::ApiError;

use crate::models::{AvailabilitySlot, NewSlot, ScheduleTemplate, SlotKey, SlotQuery};

pub mod memory;
pub mod supabase;

pub use memory::{InMemorySlotStore, InMemoryTemplateStore};
pub use supabase::{SupabaseSlotStore, SupabaseTemplateStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("constraint violated: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Infrastructure(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<ApiError>() {
            Some(api) if api.is_conflict() => StoreError::Conflict(api.body.clone()),
            _ => StoreError::Infrastructure(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Infrastructure(format!("malformed row: {}", err))
    }
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn insert(&self, template: ScheduleTemplate) -> Result<ScheduleTemplate, StoreError>;

    /// Replaces the stored record with the same id.
    async fn update(&self, template: ScheduleTemplate) -> Result<ScheduleTemplate, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<ScheduleTemplate>, StoreError>;

    /// Ordered by (day_of_week, start_time).
    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<ScheduleTemplate>, StoreError>;
}

#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Inserts slots whose (doctor_id, date, start_time) key is new, as available.
    /// Existing rows are left untouched. Returns how many rows were inserted.
    async fn upsert_preserving(&self, slots: Vec<NewSlot>) -> Result<usize, StoreError>;

    /// Ordered by (date, start_time).
    async fn query(&self, query: &SlotQuery) -> Result<Vec<AvailabilitySlot>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<AvailabilitySlot>, StoreError>;

    async fn find_by_key(&self, key: &SlotKey) -> Result<Option<AvailabilitySlot>, StoreError>;

    /// Flips `available` from true to false. `Ok(false)` means zero rows
    /// matched: the slot was already taken (or does not exist).
    async fn claim(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Marks the slot available again.
    async fn release(&self, id: Uuid) -> Result<(), StoreError>;

    /// Deletes the listed slots that are still available; booked ones survive.
    async fn delete_unbooked(&self, ids: &[Uuid]) -> Result<usize, StoreError>;
}
