// libs/schedule-cell/src/services/availability.rs
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use shared_models::context::RequestContext;

use crate::models::{AvailabilitySlot, DateSelection, ScheduleError, SlotKey, SlotQuery};
use crate::store::SlotStore;

/// Read side of the slot table, shared by calendar and booking flows.
pub struct AvailabilityService {
    slots: Arc<dyn SlotStore>,
}

impl AvailabilityService {
    pub fn new(slots: Arc<dyn SlotStore>) -> Self {
        Self { slots }
    }

    /// Slots ordered by (date, start_time). With `available_only` and a
    /// context, slots that already started are left out as well.
    pub async fn query(
        &self,
        doctor_id: Uuid,
        selection: DateSelection,
        available_only: bool,
        ctx: Option<&RequestContext>,
    ) -> Result<Vec<AvailabilitySlot>, ScheduleError> {
        let (from, to) = selection.bounds();
        if from > to {
            return Err(ScheduleError::Validation("from must not be after to".to_string()));
        }

        debug!("Querying slots for doctor {} from {} to {} (available_only={})", doctor_id, from, to, available_only);

        let query = SlotQuery { doctor_id, from, to, available_only };
        let slots = self.slots.query(&query).await?;

        Ok(match (available_only, ctx) {
            (true, Some(ctx)) => slots
                .into_iter()
                .filter(|slot| !ctx.is_past(slot.date, slot.start_time))
                .collect(),
            _ => slots,
        })
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<AvailabilitySlot, ScheduleError> {
        self.slots
            .get(slot_id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(format!("Slot {}", slot_id)))
    }

    pub async fn find_by_key(&self, key: &SlotKey) -> Result<AvailabilitySlot, ScheduleError> {
        self.slots
            .find_by_key(key)
            .await?
            .ok_or_else(|| {
                ScheduleError::NotFound(format!(
                    "Slot for doctor {} on {} at {}",
                    key.doctor_id, key.date, key.start_time
                ))
            })
    }
}
