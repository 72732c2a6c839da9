// libs/appointment-cell/src/services/doctor.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::store::StoreError;

/// Source of the consultation price charged when a booking names none.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    /// `Ok(None)` for an unknown doctor.
    async fn base_price(&self, doctor_id: Uuid) -> Result<Option<f64>, StoreError>;
}

/// Every doctor charges the configured default unless overridden.
pub struct FixedPriceDoctorDirectory {
    default_price: f64,
    overrides: HashMap<Uuid, f64>,
}

impl FixedPriceDoctorDirectory {
    pub fn new(default_price: f64) -> Self {
        Self {
            default_price,
            overrides: HashMap::new(),
        }
    }

    pub fn with_price(mut self, doctor_id: Uuid, price: f64) -> Self {
        self.overrides.insert(doctor_id, price);
        self
    }
}

#[async_trait]
impl DoctorDirectory for FixedPriceDoctorDirectory {
    async fn base_price(&self, doctor_id: Uuid) -> Result<Option<f64>, StoreError> {
        Ok(Some(self.overrides.get(&doctor_id).copied().unwrap_or(self.default_price)))
    }
}

#[derive(Debug, Deserialize)]
struct DoctorPriceRow {
    base_price: Option<f64>,
}

pub struct SupabaseDoctorDirectory {
    supabase: Arc<SupabaseClient>,
    service_key: String,
    default_price: f64,
}

impl SupabaseDoctorDirectory {
    pub fn new(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            service_key: config.supabase_service_role_key.clone(),
            default_price: config.default_consultation_price,
        }
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn base_price(&self, doctor_id: Uuid) -> Result<Option<f64>, StoreError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select=base_price", doctor_id);
        let rows: Vec<DoctorPriceRow> = self.supabase
            .request(Method::GET, &path, Some(&self.service_key), None)
            .await?;

        // a doctor without a configured price falls back to the clinic default
        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.base_price.unwrap_or(self.default_price)))
    }
}
