// libs/appointment-cell/src/store/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::Appointment;
use crate::store::{AppointmentStore, StatusChange, StoreError};

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";
const ORDER: &str = "order=date.asc,start_time.asc";

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    service_key: String,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            service_key: config.supabase_service_role_key.clone(),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, StoreError> {
        let result: Vec<Appointment> = self.supabase
            .request(Method::GET, path, Some(&self.service_key), None)
            .await?;
        Ok(result)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        debug!("Inserting appointment {} for slot {}", appointment.id, appointment.slot_id);

        // the partial unique index on slot_id answers 409 for a second active booking
        let result: Vec<Appointment> = self.supabase
            .request_with_headers(
                Method::POST,
                APPOINTMENTS_PATH,
                Some(&self.service_key),
                Some(serde_json::to_value(&appointment)?),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        result.into_iter().next()
            .ok_or_else(|| StoreError::Infrastructure("appointment insert returned no row".to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn update_status(&self, id: Uuid, change: StatusChange) -> Result<Option<Appointment>, StoreError> {
        let path = format!("{}?id=eq.{}&status=eq.{}", APPOINTMENTS_PATH, id, change.expected);

        let mut update = json!({
            "status": change.next,
            "updated_at": change.at.to_rfc3339(),
        });
        if let Some(reason) = change.cancellation_reason {
            update["cancellation_reason"] = json!(reason);
        }

        let result: Vec<Appointment> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.service_key),
                Some(update),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        Ok(result.into_iter().next())
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut path = format!("{}?doctor_id=eq.{}", APPOINTMENTS_PATH, doctor_id);
        if let Some(from) = from {
            path.push_str(&format!("&date=gte.{}", from));
        }
        if let Some(to) = to {
            path.push_str(&format!("&date=lte.{}", to));
        }
        path.push('&');
        path.push_str(ORDER);

        self.fetch(&path).await
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("{}?patient_id=eq.{}&{}", APPOINTMENTS_PATH, patient_id, ORDER);
        self.fetch(&path).await
    }
}
