// libs/schedule-cell/src/services/template.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::context::RequestContext;

use crate::models::{CreateTemplateRequest, ScheduleError, ScheduleTemplate, UpdateTemplateRequest};
use crate::store::{StoreError, TemplateStore};

pub struct ScheduleTemplateService {
    templates: Arc<dyn TemplateStore>,
}

impl ScheduleTemplateService {
    pub fn new(templates: Arc<dyn TemplateStore>) -> Self {
        Self { templates }
    }

    pub async fn create(
        &self,
        request: CreateTemplateRequest,
        ctx: &RequestContext,
    ) -> Result<ScheduleTemplate, ScheduleError> {
        debug!("Creating schedule template for doctor {} on day {}", request.doctor_id, request.day_of_week);

        let template = ScheduleTemplate {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
            slot_duration_minutes: request.slot_duration_minutes,
            is_active: request.is_active.unwrap_or(true),
            break_start: request.break_start,
            break_end: request.break_end,
            created_at: ctx.now,
            updated_at: ctx.now,
        };

        validate_template(&template)?;
        self.ensure_no_overlap(&template).await?;

        let stored = match self.templates.insert(template.clone()).await {
            Ok(stored) => stored,
            Err(StoreError::Conflict(_)) => return Err(self.overlap_after_conflict(&template).await),
            Err(e) => return Err(e.into()),
        };

        info!("Schedule template {} created for doctor {}", stored.id, stored.doctor_id);
        Ok(stored)
    }

    /// Merges the given fields onto the stored template and re-validates it.
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateTemplateRequest,
        ctx: &RequestContext,
    ) -> Result<ScheduleTemplate, ScheduleError> {
        let mut template = self.get(id).await?;

        if let Some(day) = request.day_of_week {
            template.day_of_week = day;
        }
        if let Some(start) = request.start_time {
            template.start_time = start;
        }
        if let Some(end) = request.end_time {
            template.end_time = end;
        }
        if let Some(duration) = request.slot_duration_minutes {
            template.slot_duration_minutes = duration;
        }
        if request.clear_break.unwrap_or(false) {
            template.break_start = None;
            template.break_end = None;
        } else {
            if request.break_start.is_some() {
                template.break_start = request.break_start;
            }
            if request.break_end.is_some() {
                template.break_end = request.break_end;
            }
        }
        if let Some(active) = request.is_active {
            template.is_active = active;
        }
        template.updated_at = ctx.now;

        validate_template(&template)?;
        self.ensure_no_overlap(&template).await?;

        let stored = match self.templates.update(template.clone()).await {
            Ok(stored) => stored,
            Err(StoreError::Conflict(_)) => return Err(self.overlap_after_conflict(&template).await),
            Err(e) => return Err(e.into()),
        };

        info!("Schedule template {} updated", stored.id);
        Ok(stored)
    }

    /// Generated slots are left in place; booked ones stay booked.
    pub async fn delete(&self, id: Uuid) -> Result<ScheduleTemplate, ScheduleError> {
        let template = self.get(id).await?;
        self.templates.delete(id).await?;
        info!("Schedule template {} deleted for doctor {}", id, template.doctor_id);
        Ok(template)
    }

    pub async fn get(&self, id: Uuid) -> Result<ScheduleTemplate, ScheduleError> {
        self.templates
            .get(id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(format!("Template {}", id)))
    }

    pub async fn list(&self, doctor_id: Uuid) -> Result<Vec<ScheduleTemplate>, ScheduleError> {
        Ok(self.templates.list_for_doctor(doctor_id).await?)
    }

    async fn find_overlap(&self, candidate: &ScheduleTemplate) -> Result<Option<Uuid>, ScheduleError> {
        if !candidate.is_active {
            return Ok(None);
        }

        let existing = self.templates.list_for_doctor(candidate.doctor_id).await?;
        Ok(existing
            .iter()
            .filter(|other| other.is_active && other.id != candidate.id)
            .find(|other| other.overlaps(candidate))
            .map(|other| other.id))
    }

    async fn ensure_no_overlap(&self, candidate: &ScheduleTemplate) -> Result<(), ScheduleError> {
        if let Some(existing_id) = self.find_overlap(candidate).await? {
            warn!(
                "Rejected template for doctor {}: overlaps active template {}",
                candidate.doctor_id, existing_id
            );
            return Err(ScheduleError::OverlappingSchedule { existing_id });
        }
        Ok(())
    }

    // The database exclusion constraint caught a concurrent writer; find who won.
    async fn overlap_after_conflict(&self, candidate: &ScheduleTemplate) -> ScheduleError {
        match self.find_overlap(candidate).await {
            Ok(Some(existing_id)) => ScheduleError::OverlappingSchedule { existing_id },
            Ok(None) => ScheduleError::Infrastructure(
                "template write rejected by a constraint with no visible overlap".to_string(),
            ),
            Err(e) => e,
        }
    }
}

/// Structural checks that need no storage access.
pub fn validate_template(template: &ScheduleTemplate) -> Result<(), ScheduleError> {
    if template.day_of_week > 6 {
        return Err(ScheduleError::InvalidTimeRange(
            "day_of_week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }

    if template.start_time >= template.end_time {
        return Err(ScheduleError::InvalidTimeRange("start_time must be before end_time".to_string()));
    }

    if template.slot_duration_minutes == 0 {
        return Err(ScheduleError::InvalidTimeRange("slot_duration_minutes must be positive".to_string()));
    }

    // a window shorter than one slot is valid and simply expands to nothing
    match (template.break_start, template.break_end) {
        (None, None) => Ok(()),
        (Some(start), Some(end)) => {
            if start >= end {
                return Err(ScheduleError::InvalidTimeRange("break_start must be before break_end".to_string()));
            }
            if start < template.start_time || end > template.end_time {
                return Err(ScheduleError::InvalidTimeRange(
                    "break must lie within the working hours".to_string(),
                ));
            }
            Ok(())
        }
        _ => Err(ScheduleError::InvalidTimeRange(
            "break_start and break_end must be given together".to_string(),
        )),
    }
}
