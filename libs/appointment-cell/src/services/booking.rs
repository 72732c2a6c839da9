// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use schedule_cell::models::{AvailabilitySlot, SlotKey};
use schedule_cell::services::AvailabilityService;
use schedule_cell::store::SlotStore;
use shared_config::AppConfig;
use shared_models::context::RequestContext;

use crate::models::{
    Appointment, AppointmentStatus, BookingError, CreateAppointmentRequest, PatientInput, SlotReference,
};
use crate::services::doctor::DoctorDirectory;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::patient::{validate_new_patient, PatientDirectory};
use crate::store::{AppointmentStore, StatusChange, StoreError};

const MAX_MOTIVE_CHARS: usize = 500;

/// Knobs read from configuration once per service.
#[derive(Debug, Clone, Copy)]
pub struct BookingPolicy {
    pub claim_timeout: Duration,
    pub reopen_past_cancelled_slots: bool,
}

impl BookingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            claim_timeout: config.booking_timeout(),
            reopen_past_cancelled_slots: config.reopen_past_cancelled_slots,
        }
    }
}

pub struct AppointmentBookingService {
    slots: Arc<dyn SlotStore>,
    appointments: Arc<dyn AppointmentStore>,
    patients: Arc<dyn PatientDirectory>,
    doctors: Arc<dyn DoctorDirectory>,
    lifecycle_service: AppointmentLifecycleService,
    policy: BookingPolicy,
}

impl AppointmentBookingService {
    pub fn new(
        slots: Arc<dyn SlotStore>,
        appointments: Arc<dyn AppointmentStore>,
        patients: Arc<dyn PatientDirectory>,
        doctors: Arc<dyn DoctorDirectory>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            slots,
            appointments,
            patients,
            doctors,
            lifecycle_service: AppointmentLifecycleService::new(),
            policy,
        }
    }

    // ==========================================================================
    // RESERVATION
    // ==========================================================================

    /// Turns an available slot into a pending appointment. The slot flag is
    /// flipped with a conditional write, so of any number of concurrent
    /// callers on one slot exactly one gets past the claim.
    #[instrument(skip(self, request, ctx), fields(clinic_id = %request.clinic_id))]
    pub async fn reserve(
        &self,
        request: CreateAppointmentRequest,
        ctx: &RequestContext,
    ) -> Result<Appointment, BookingError> {
        let motive = validate_motive(&request.motive)?;
        let slot = self.resolve_slot(&request.slot).await?;

        if ctx.is_past(slot.date, slot.start_time) {
            warn!("Rejected booking of past slot {} ({} {})", slot.id, slot.date, slot.start_time);
            return Err(BookingError::Validation("Cannot book a slot in the past".to_string()));
        }

        let (price, discount) = self.resolve_price(slot.doctor_id, request.price, request.discount).await?;
        let patient_id = self.resolve_patient(request.patient, ctx).await?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            slot_id: slot.id,
            doctor_id: slot.doctor_id,
            patient_id,
            clinic_id: request.clinic_id,
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            motive,
            status: AppointmentStatus::Pending,
            price,
            discount,
            notes: request.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            cancellation_reason: None,
            created_at: ctx.now,
            updated_at: ctx.now,
        };

        self.claim(slot.id).await?;

        match self.appointments.insert(appointment).await {
            Ok(appointment) => {
                info!(
                    "Appointment {} booked on slot {} for patient {}",
                    appointment.id, appointment.slot_id, appointment.patient_id
                );
                Ok(appointment)
            }
            Err(e) => {
                warn!("Appointment insert failed after claiming slot {}: {}", slot.id, e);
                if let Err(release_err) = self.slots.release(slot.id).await {
                    error!("Failed to release slot {} after aborted booking: {}", slot.id, release_err);
                }
                match e {
                    StoreError::Conflict(_) => Err(BookingError::SlotAlreadyBooked { slot_id: slot.id }),
                    other => Err(other.into()),
                }
            }
        }
    }

    async fn claim(&self, slot_id: Uuid) -> Result<(), BookingError> {
        let claimed = tokio::time::timeout(self.policy.claim_timeout, self.slots.claim(slot_id))
            .await
            .map_err(|_| {
                warn!("Claim of slot {} timed out after {:?}", slot_id, self.policy.claim_timeout);
                BookingError::Timeout(self.policy.claim_timeout.as_millis() as u64)
            })??;

        if !claimed {
            debug!("Slot {} was already taken", slot_id);
            return Err(BookingError::SlotAlreadyBooked { slot_id });
        }
        Ok(())
    }

    async fn resolve_slot(&self, reference: &SlotReference) -> Result<AvailabilitySlot, BookingError> {
        let availability = AvailabilityService::new(self.slots.clone());
        let slot = match *reference {
            SlotReference::ById { slot_id } => availability.get_slot(slot_id).await?,
            SlotReference::ByKey { doctor_id, date, start_time } => {
                availability.find_by_key(&SlotKey { doctor_id, date, start_time }).await?
            }
        };
        Ok(slot)
    }

    async fn resolve_price(
        &self,
        doctor_id: Uuid,
        price: Option<f64>,
        discount: Option<f64>,
    ) -> Result<(f64, f64), BookingError> {
        let price = match price {
            Some(price) => price,
            None => self.doctors
                .base_price(doctor_id)
                .await?
                .ok_or_else(|| BookingError::NotFound(format!("Doctor {}", doctor_id)))?,
        };

        if !price.is_finite() || price < 0.0 {
            return Err(BookingError::Validation("price must be a non-negative amount".to_string()));
        }

        let discount = discount.unwrap_or(0.0);
        if !discount.is_finite() || discount < 0.0 || discount > price {
            return Err(BookingError::Validation("discount must be between 0 and the price".to_string()));
        }

        Ok((price, discount))
    }

    async fn resolve_patient(&self, patient: PatientInput, ctx: &RequestContext) -> Result<Uuid, BookingError> {
        match patient {
            PatientInput::Existing { patient_id } => {
                if !self.patients.exists(patient_id).await? {
                    return Err(BookingError::NotFound(format!("Patient {}", patient_id)));
                }
                Ok(patient_id)
            }
            PatientInput::Inline(new_patient) => {
                validate_new_patient(&new_patient)?;
                let registered = self.patients.find_or_register(new_patient).await?;

                // a known document only resolves for staff or for its own holder
                if let Some(caller) = ctx.caller.as_ref() {
                    let staff = caller.is_admin() || caller.is_doctor();
                    if !registered.created && !staff && caller.id != registered.id.to_string() {
                        warn!("User {} submitted the document of patient {}", caller.id, registered.id);
                        return Err(BookingError::Forbidden(
                            "This document belongs to another patient".to_string(),
                        ));
                    }
                }

                Ok(registered.id)
            }
        }
    }

    // ==========================================================================
    // STATUS CHANGES
    // ==========================================================================

    pub async fn confirm(&self, id: Uuid, ctx: &RequestContext) -> Result<Appointment, BookingError> {
        self.transition(id, AppointmentStatus::Confirmed, None, ctx).await
    }

    pub async fn complete(&self, id: Uuid, ctx: &RequestContext) -> Result<Appointment, BookingError> {
        self.transition(id, AppointmentStatus::Completed, None, ctx).await
    }

    /// Cancels and, for appointments that have not started yet, puts the slot
    /// back on offer. Past slots stay taken unless the policy says otherwise.
    pub async fn cancel(
        &self,
        id: Uuid,
        reason: Option<String>,
        ctx: &RequestContext,
    ) -> Result<Appointment, BookingError> {
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let appointment = self.transition(id, AppointmentStatus::Cancelled, reason, ctx).await?;

        let started = ctx.is_past(appointment.date, appointment.start_time);
        if !started || self.policy.reopen_past_cancelled_slots {
            match self.slots.release(appointment.slot_id).await {
                Ok(()) => debug!("Slot {} released by cancellation of {}", appointment.slot_id, id),
                // the cancellation itself is committed; the slot can be reopened by hand
                Err(e) => error!("Appointment {} cancelled but slot {} not released: {}", id, appointment.slot_id, e),
            }
        } else {
            debug!("Slot {} kept unavailable: appointment {} already started", appointment.slot_id, id);
        }

        Ok(appointment)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        reason: Option<String>,
        ctx: &RequestContext,
    ) -> Result<Appointment, BookingError> {
        match status {
            AppointmentStatus::Confirmed => self.confirm(id, ctx).await,
            AppointmentStatus::Completed => self.complete(id, ctx).await,
            AppointmentStatus::Cancelled => self.cancel(id, reason, ctx).await,
            AppointmentStatus::Pending => {
                let current = self.get(id).await?;
                Err(BookingError::InvalidStateTransition {
                    from: current.status,
                    to: AppointmentStatus::Pending,
                })
            }
        }
    }

    async fn transition(
        &self,
        id: Uuid,
        target: AppointmentStatus,
        cancellation_reason: Option<String>,
        ctx: &RequestContext,
    ) -> Result<Appointment, BookingError> {
        let current = self.get(id).await?;
        self.lifecycle_service.validate_status_transition(current.status, target)?;

        let change = StatusChange {
            expected: current.status,
            next: target,
            cancellation_reason,
            at: ctx.now,
        };

        match self.appointments.update_status(id, change).await? {
            Some(updated) => {
                info!("Appointment {} moved from {} to {}", id, current.status, target);
                Ok(updated)
            }
            None => {
                // someone else changed the status between our read and write
                let latest = self.get(id).await?;
                warn!("Appointment {} changed concurrently to {}", id, latest.status);
                Err(BookingError::InvalidStateTransition { from: latest.status, to: target })
            }
        }
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get(&self, id: Uuid) -> Result<Appointment, BookingError> {
        self.appointments
            .get(id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Appointment {}", id)))
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, BookingError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(BookingError::Validation("from must not be after to".to_string()));
            }
        }
        Ok(self.appointments.list_for_doctor(doctor_id, from, to).await?)
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.appointments.list_for_patient(patient_id).await?)
    }
}

fn validate_motive(motive: &str) -> Result<String, BookingError> {
    let motive = motive.trim();
    if motive.is_empty() {
        return Err(BookingError::Validation("motive is required".to_string()));
    }
    if motive.chars().count() > MAX_MOTIVE_CHARS {
        return Err(BookingError::Validation(format!(
            "motive must be at most {} characters",
            MAX_MOTIVE_CHARS
        )));
    }
    Ok(motive.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn motive_is_trimmed_and_bounded() {
        assert_eq!(validate_motive("  control anual  ").unwrap(), "control anual");
        assert_matches!(validate_motive("   "), Err(BookingError::Validation(_)));
        assert_matches!(validate_motive(&"x".repeat(501)), Err(BookingError::Validation(_)));
        assert!(validate_motive(&"x".repeat(500)).is_ok());
    }
}
