// libs/schedule-cell/src/state.rs
use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::services::{AvailabilityService, ScheduleTemplateService, SlotGenerator};
use crate::store::{
    InMemorySlotStore, InMemoryTemplateStore, SlotStore, SupabaseSlotStore, SupabaseTemplateStore,
    TemplateStore,
};

/// Router state for the schedule cell. The slot store is shared with the
/// appointment cell, so the binary builds it once and hands it to both.
#[derive(Clone)]
pub struct ScheduleState {
    pub config: Arc<AppConfig>,
    pub templates: Arc<dyn TemplateStore>,
    pub slots: Arc<dyn SlotStore>,
}

impl ScheduleState {
    pub fn new(config: Arc<AppConfig>, templates: Arc<dyn TemplateStore>, slots: Arc<dyn SlotStore>) -> Self {
        Self { config, templates, slots }
    }

    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryTemplateStore::new()),
            Arc::new(InMemorySlotStore::new()),
        )
    }

    pub fn supabase(config: Arc<AppConfig>, client: Arc<SupabaseClient>) -> Self {
        let templates = Arc::new(SupabaseTemplateStore::new(client.clone(), &config));
        let slots = Arc::new(SupabaseSlotStore::new(client, &config));
        Self::new(config, templates, slots)
    }

    pub fn template_service(&self) -> ScheduleTemplateService {
        ScheduleTemplateService::new(self.templates.clone())
    }

    pub fn slot_generator(&self) -> SlotGenerator {
        SlotGenerator::new(self.templates.clone(), self.slots.clone(), self.config.max_generation_days)
    }

    pub fn availability_service(&self) -> AvailabilityService {
        AvailabilityService::new(self.slots.clone())
    }
}
