// libs/schedule-cell/src/store/memory.rs
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{AvailabilitySlot, NewSlot, ScheduleTemplate, SlotKey, SlotQuery};
use crate::store::{SlotStore, StoreError, TemplateStore};

/// Process-local template table for development and tests.
#[derive(Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<Uuid, ScheduleTemplate>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn insert(&self, template: ScheduleTemplate) -> Result<ScheduleTemplate, StoreError> {
        let mut templates = self.templates.write().await;
        if templates.contains_key(&template.id) {
            return Err(StoreError::Conflict(format!("template {} already exists", template.id)));
        }
        templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn update(&self, template: ScheduleTemplate) -> Result<ScheduleTemplate, StoreError> {
        let mut templates = self.templates.write().await;
        match templates.get_mut(&template.id) {
            Some(existing) => {
                *existing = template.clone();
                Ok(template)
            }
            None => Err(StoreError::NotFound(format!("Template {}", template.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.templates
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("Template {}", id)))
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScheduleTemplate>, StoreError> {
        Ok(self.templates.read().await.get(&id).cloned())
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<ScheduleTemplate>, StoreError> {
        let mut templates: Vec<ScheduleTemplate> = self.templates
            .read()
            .await
            .values()
            .filter(|t| t.doctor_id == doctor_id)
            .cloned()
            .collect();
        templates.sort_by_key(|t| (t.day_of_week, t.start_time));
        Ok(templates)
    }
}

type KeyTuple = (Uuid, NaiveDate, NaiveTime);

#[derive(Default)]
struct SlotTable {
    by_id: HashMap<Uuid, AvailabilitySlot>,
    // unique (doctor_id, date, start_time) index; BTreeMap keeps query order
    by_key: BTreeMap<KeyTuple, Uuid>,
}

/// Process-local slot table. Every write happens under one write lock, which
/// gives `claim` the same all-or-nothing behaviour as a conditional UPDATE.
#[derive(Default)]
pub struct InMemorySlotStore {
    table: RwLock<SlotTable>,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key_tuple(key: &SlotKey) -> KeyTuple {
    (key.doctor_id, key.date, key.start_time)
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn upsert_preserving(&self, slots: Vec<NewSlot>) -> Result<usize, StoreError> {
        let mut table = self.table.write().await;
        let mut inserted = 0;

        for slot in slots {
            let key = key_tuple(&slot.key());
            if table.by_key.contains_key(&key) {
                continue;
            }
            let id = Uuid::new_v4();
            table.by_key.insert(key, id);
            table.by_id.insert(id, AvailabilitySlot {
                id,
                doctor_id: slot.doctor_id,
                date: slot.date,
                start_time: slot.start_time,
                end_time: slot.end_time,
                available: true,
            });
            inserted += 1;
        }

        debug!("In-memory upsert inserted {} slots", inserted);
        Ok(inserted)
    }

    async fn query(&self, query: &SlotQuery) -> Result<Vec<AvailabilitySlot>, StoreError> {
        if query.from > query.to {
            return Ok(vec![]);
        }
        let table = self.table.read().await;
        let lower = (query.doctor_id, query.from, NaiveTime::default());

        Ok(table.by_key
            .range(lower..)
            .take_while(|((doctor_id, date, _), _)| *doctor_id == query.doctor_id && *date <= query.to)
            .filter_map(|(_, id)| table.by_id.get(id))
            .filter(|slot| !query.available_only || slot.available)
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<AvailabilitySlot>, StoreError> {
        Ok(self.table.read().await.by_id.get(&id).cloned())
    }

    async fn find_by_key(&self, key: &SlotKey) -> Result<Option<AvailabilitySlot>, StoreError> {
        let table = self.table.read().await;
        Ok(table.by_key
            .get(&key_tuple(key))
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn claim(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut table = self.table.write().await;
        match table.by_id.get_mut(&id) {
            Some(slot) if slot.available => {
                slot.available = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: Uuid) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        match table.by_id.get_mut(&id) {
            Some(slot) => {
                slot.available = true;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("Slot {}", id))),
        }
    }

    async fn delete_unbooked(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        let mut table = self.table.write().await;
        let mut deleted = 0;

        for id in ids {
            let removable = table.by_id.get(id).map(|slot| slot.available).unwrap_or(false);
            if !removable {
                continue;
            }
            if let Some(slot) = table.by_id.remove(id) {
                table.by_key.remove(&key_tuple(&slot.key()));
                deleted += 1;
            }
        }

        Ok(deleted)
    }
}
