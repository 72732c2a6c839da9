// libs/appointment-cell/src/store/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus};
use crate::store::{AppointmentStore, StatusChange, StoreError};

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by_key(|a| (a.date, a.start_time, a.created_at));
    appointments
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;

        let slot_taken = appointments
            .values()
            .any(|a| a.slot_id == appointment.slot_id && a.status != AppointmentStatus::Cancelled);
        if slot_taken {
            return Err(StoreError::Conflict(format!(
                "slot {} already has an active appointment",
                appointment.slot_id
            )));
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn update_status(&self, id: Uuid, change: StatusChange) -> Result<Option<Appointment>, StoreError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&id) {
            Some(appointment) if appointment.status == change.expected => {
                appointment.status = change.next;
                appointment.updated_at = change.at;
                if change.cancellation_reason.is_some() {
                    appointment.cancellation_reason = change.cancellation_reason;
                }
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let appointments = self.appointments.read().await;
        Ok(sorted(
            appointments
                .values()
                .filter(|a| a.doctor_id == doctor_id)
                .filter(|a| from.map_or(true, |from| a.date >= from))
                .filter(|a| to.map_or(true, |to| a.date <= to))
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let appointments = self.appointments.read().await;
        Ok(sorted(
            appointments
                .values()
                .filter(|a| a.patient_id == patient_id)
                .cloned()
                .collect(),
        ))
    }
}
