// libs/appointment-cell/src/services/patient.rs
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{BookingError, NewPatient};
use crate::store::StoreError;

const PATIENTS_PATH: &str = "/rest/v1/patients";

/// Outcome of an inline registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisteredPatient {
    pub id: Uuid,
    /// `false` when the document already belonged to a known patient.
    pub created: bool,
}

/// Patient identity lookups and first-visit registration.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn exists(&self, patient_id: Uuid) -> Result<bool, StoreError>;

    /// Returns the patient holding `document_id`, registering them first when
    /// needed.
    async fn find_or_register(&self, patient: NewPatient) -> Result<RegisteredPatient, StoreError>;
}

fn matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, value: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .map_or(false, |re| re.is_match(value))
}

fn valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    email.len() <= 254 && matches(&EMAIL, r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$", email)
}

fn valid_phone(phone: &str) -> bool {
    static PHONE: OnceLock<Option<Regex>> = OnceLock::new();
    matches(&PHONE, r"^\+?[0-9][0-9 ()\-]{5,18}[0-9]$", phone)
}

fn valid_document_id(document_id: &str) -> bool {
    static DOCUMENT: OnceLock<Option<Regex>> = OnceLock::new();
    matches(&DOCUMENT, r"^[A-Za-z0-9.\-]{5,20}$", document_id)
}

/// Field checks for inline registration; runs before any slot is touched.
pub fn validate_new_patient(patient: &NewPatient) -> Result<(), BookingError> {
    for (field, value) in [("first_name", &patient.first_name), ("last_name", &patient.last_name)] {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().count() > 100 {
            return Err(BookingError::Validation(format!("{} must be 1-100 characters", field)));
        }
    }

    if !valid_document_id(patient.document_id.trim()) {
        return Err(BookingError::Validation(
            "document_id must be 5-20 letters, digits, dots or hyphens".to_string(),
        ));
    }

    if let Some(email) = patient.email.as_deref() {
        if !valid_email(email.trim()) {
            return Err(BookingError::Validation("email is not a valid address".to_string()));
        }
    }

    if let Some(phone) = patient.phone.as_deref() {
        if !valid_phone(phone.trim()) {
            return Err(BookingError::Validation("phone is not a valid number".to_string()));
        }
    }

    Ok(())
}

#[derive(Default)]
pub struct InMemoryPatientDirectory {
    patients: RwLock<HashMap<Uuid, NewPatient>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a known patient, e.g. one whose id matches a token subject.
    pub async fn add(&self, patient_id: Uuid, patient: NewPatient) {
        self.patients.write().await.insert(patient_id, patient);
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn exists(&self, patient_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.patients.read().await.contains_key(&patient_id))
    }

    async fn find_or_register(&self, patient: NewPatient) -> Result<RegisteredPatient, StoreError> {
        let mut patients = self.patients.write().await;
        let document_id = patient.document_id.trim();

        if let Some((id, _)) = patients.iter().find(|(_, p)| p.document_id.trim() == document_id) {
            return Ok(RegisteredPatient { id: *id, created: false });
        }

        let id = Uuid::new_v4();
        patients.insert(id, patient);
        Ok(RegisteredPatient { id, created: true })
    }
}

#[derive(Debug, Deserialize)]
struct PatientRow {
    id: Uuid,
}

pub struct SupabasePatientDirectory {
    supabase: Arc<SupabaseClient>,
    service_key: String,
}

impl SupabasePatientDirectory {
    pub fn new(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            service_key: config.supabase_service_role_key.clone(),
        }
    }

    async fn lookup(&self, filter: &str) -> Result<Option<Uuid>, StoreError> {
        let path = format!("{}?{}&select=id", PATIENTS_PATH, filter);
        let rows: Vec<PatientRow> = self.supabase
            .request(Method::GET, &path, Some(&self.service_key), None)
            .await?;
        Ok(rows.into_iter().next().map(|row| row.id))
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn exists(&self, patient_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.lookup(&format!("id=eq.{}", patient_id)).await?.is_some())
    }

    async fn find_or_register(&self, patient: NewPatient) -> Result<RegisteredPatient, StoreError> {
        let document_id = patient.document_id.trim().to_string();
        if let Some(id) = self.lookup(&format!("document_id=eq.{}", document_id)).await? {
            debug!("Patient with document {} already registered as {}", document_id, id);
            return Ok(RegisteredPatient { id, created: false });
        }

        let body = json!({
            "first_name": patient.first_name.trim(),
            "last_name": patient.last_name.trim(),
            "document_id": document_id,
            "email": patient.email,
            "phone": patient.phone,
        });

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::POST,
                PATIENTS_PATH,
                Some(&self.service_key),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        let row: PatientRow = rows.into_iter().next()
            .ok_or_else(|| StoreError::Infrastructure("patient insert returned no row".to_string()))
            .and_then(|row| serde_json::from_value(row).map_err(StoreError::from))?;

        info!("Registered patient {}", row.id);
        Ok(RegisteredPatient { id: row.id, created: true })
    }
}
