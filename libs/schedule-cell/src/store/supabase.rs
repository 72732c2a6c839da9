// libs/schedule-cell/src/store/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::header::HeaderValue;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{AvailabilitySlot, NewSlot, ScheduleTemplate, SlotKey, SlotQuery};
use crate::store::{SlotStore, StoreError, TemplateStore};

const TEMPLATES_PATH: &str = "/rest/v1/schedule_templates";
const SLOTS_PATH: &str = "/rest/v1/availability_slots";
const UPSERT_CHUNK: usize = 500;

fn time_param(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

fn id_list(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
}

pub struct SupabaseTemplateStore {
    supabase: Arc<SupabaseClient>,
    service_key: String,
}

impl SupabaseTemplateStore {
    pub fn new(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            service_key: config.supabase_service_role_key.clone(),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<ScheduleTemplate>, StoreError> {
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, path, Some(&self.service_key), None)
            .await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl TemplateStore for SupabaseTemplateStore {
    async fn insert(&self, template: ScheduleTemplate) -> Result<ScheduleTemplate, StoreError> {
        debug!("Inserting schedule template {} for doctor {}", template.id, template.doctor_id);

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::POST,
                TEMPLATES_PATH,
                Some(&self.service_key),
                Some(serde_json::to_value(&template)?),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        let row = rows.into_iter().next()
            .ok_or_else(|| StoreError::Infrastructure("template insert returned no row".to_string()))?;
        Ok(serde_json::from_value(row)?)
    }

    async fn update(&self, template: ScheduleTemplate) -> Result<ScheduleTemplate, StoreError> {
        let path = format!("{}?id=eq.{}", TEMPLATES_PATH, template.id);
        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.service_key),
                Some(serde_json::to_value(&template)?),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        let row = rows.into_iter().next()
            .ok_or_else(|| StoreError::NotFound(format!("Template {}", template.id)))?;
        Ok(serde_json::from_value(row)?)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let path = format!("{}?id=eq.{}", TEMPLATES_PATH, id);
        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                Some(&self.service_key),
                None,
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("Template {}", id)));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScheduleTemplate>, StoreError> {
        let path = format!("{}?id=eq.{}", TEMPLATES_PATH, id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<ScheduleTemplate>, StoreError> {
        let path = format!(
            "{}?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            TEMPLATES_PATH, doctor_id
        );
        self.fetch(&path).await
    }
}

/// Row shape of `availability_slots`.
#[derive(Debug, Serialize, Deserialize)]
struct SlotRow {
    id: Uuid,
    doctor_id: Uuid,
    slot_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    is_available: bool,
}

impl From<SlotRow> for AvailabilitySlot {
    fn from(row: SlotRow) -> Self {
        Self {
            id: row.id,
            doctor_id: row.doctor_id,
            date: row.slot_date,
            start_time: row.start_time,
            end_time: row.end_time,
            available: row.is_available,
        }
    }
}

pub struct SupabaseSlotStore {
    supabase: Arc<SupabaseClient>,
    service_key: String,
}

impl SupabaseSlotStore {
    pub fn new(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            service_key: config.supabase_service_role_key.clone(),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<AvailabilitySlot>, StoreError> {
        let rows: Vec<SlotRow> = self.supabase
            .request(Method::GET, path, Some(&self.service_key), None)
            .await?;
        Ok(rows.into_iter().map(AvailabilitySlot::from).collect())
    }

    async fn set_available(&self, path: &str, available: bool) -> Result<Vec<Value>, StoreError> {
        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::PATCH,
                path,
                Some(&self.service_key),
                Some(json!({ "is_available": available })),
                Some(SupabaseClient::return_representation()),
            )
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl SlotStore for SupabaseSlotStore {
    async fn upsert_preserving(&self, slots: Vec<NewSlot>) -> Result<usize, StoreError> {
        // ignore-duplicates turns conflicting rows into no-ops, so only fresh
        // rows come back in the representation
        let path = format!("{}?on_conflict=doctor_id,slot_date,start_time", SLOTS_PATH);
        let mut inserted = 0;

        for chunk in slots.chunks(UPSERT_CHUNK) {
            // a fresh id is only kept when the row is new; duplicates are matched on the natural key
            let body: Vec<Value> = chunk.iter()
                .map(|slot| json!({
                    "id": Uuid::new_v4(),
                    "doctor_id": slot.doctor_id,
                    "slot_date": slot.date,
                    "start_time": time_param(slot.start_time),
                    "end_time": time_param(slot.end_time),
                    "is_available": true,
                }))
                .collect();

            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                "Prefer",
                HeaderValue::from_static("resolution=ignore-duplicates,return=representation"),
            );

            let rows: Vec<Value> = self.supabase
                .request_with_headers(
                    Method::POST,
                    &path,
                    Some(&self.service_key),
                    Some(Value::Array(body)),
                    Some(headers),
                )
                .await?;
            inserted += rows.len();
        }

        debug!("Upserted {} slots, {} new", slots.len(), inserted);
        Ok(inserted)
    }

    async fn query(&self, query: &SlotQuery) -> Result<Vec<AvailabilitySlot>, StoreError> {
        let mut path = format!(
            "{}?doctor_id=eq.{}&slot_date=gte.{}&slot_date=lte.{}",
            SLOTS_PATH, query.doctor_id, query.from, query.to
        );
        if query.available_only {
            path.push_str("&is_available=eq.true");
        }
        path.push_str("&order=slot_date.asc,start_time.asc");

        self.fetch(&path).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<AvailabilitySlot>, StoreError> {
        let path = format!("{}?id=eq.{}", SLOTS_PATH, id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn find_by_key(&self, key: &SlotKey) -> Result<Option<AvailabilitySlot>, StoreError> {
        let path = format!(
            "{}?doctor_id=eq.{}&slot_date=eq.{}&start_time=eq.{}",
            SLOTS_PATH, key.doctor_id, key.date, time_param(key.start_time)
        );
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn claim(&self, id: Uuid) -> Result<bool, StoreError> {
        // conditional UPDATE: the row only matches while it is still available
        let path = format!("{}?id=eq.{}&is_available=eq.true", SLOTS_PATH, id);
        let rows = self.set_available(&path, false).await?;
        Ok(!rows.is_empty())
    }

    async fn release(&self, id: Uuid) -> Result<(), StoreError> {
        let path = format!("{}?id=eq.{}", SLOTS_PATH, id);
        let rows = self.set_available(&path, true).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("Slot {}", id)));
        }
        Ok(())
    }

    async fn delete_unbooked(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let path = format!("{}?id=in.({})&is_available=eq.true", SLOTS_PATH, id_list(ids));
        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::DELETE,
                &path,
                Some(&self.service_key),
                None,
                Some(SupabaseClient::return_representation()),
            )
            .await?;
        Ok(rows.len())
    }
}
