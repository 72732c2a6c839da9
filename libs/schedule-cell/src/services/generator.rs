// libs/schedule-cell/src/services/generator.rs
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::context::RequestContext;

use crate::models::{GenerationSummary, NewSlot, ScheduleError, ScheduleTemplate, SlotKey, SlotQuery};
use crate::store::{SlotStore, TemplateStore};

/// Expands one template into the slots it describes on `date`.
///
/// Intervals of `slot_duration_minutes` are laid end to end from `start_time`.
/// An interval touching the break window is dropped whole, and a trailing
/// interval that would run past `end_time` is never emitted.
pub fn expand_template(template: &ScheduleTemplate, date: NaiveDate) -> Vec<NewSlot> {
    if !template.applies_to(date) || template.slot_duration_minutes == 0 {
        return vec![];
    }

    let step = Duration::minutes(i64::from(template.slot_duration_minutes));
    let break_window = template.break_window();
    let mut slots = Vec::new();
    let mut cursor = template.start_time;

    loop {
        let (slot_end, wrapped) = cursor.overflowing_add_signed(step);
        if wrapped != 0 || slot_end > template.end_time {
            break;
        }

        let in_break = break_window
            .map(|(break_start, break_end)| cursor < break_end && break_start < slot_end)
            .unwrap_or(false);

        if !in_break {
            slots.push(NewSlot {
                doctor_id: template.doctor_id,
                date,
                start_time: cursor,
                end_time: slot_end,
            });
        }

        cursor = slot_end;
    }

    slots
}

pub struct SlotGenerator {
    templates: Arc<dyn TemplateStore>,
    slots: Arc<dyn SlotStore>,
    max_days: i64,
}

impl SlotGenerator {
    pub fn new(templates: Arc<dyn TemplateStore>, slots: Arc<dyn SlotStore>, max_days: i64) -> Self {
        Self { templates, slots, max_days }
    }

    /// Makes sure every slot the doctor's active templates describe for the
    /// inclusive range exists. Existing slots keep their availability.
    pub async fn generate(
        &self,
        doctor_id: Uuid,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<GenerationSummary, ScheduleError> {
        self.validate_range(date_from, date_to)?;

        let described = self.described_slots(doctor_id, date_from, date_to).await?;
        let total = described.len();
        debug!(
            "Doctor {} templates describe {} slots between {} and {}",
            doctor_id, total, date_from, date_to
        );

        let created = if described.is_empty() {
            0
        } else {
            self.slots.upsert_preserving(described.into_values().collect()).await?
        };

        let summary = GenerationSummary {
            doctor_id,
            date_from,
            date_to,
            created,
            preserved: total.saturating_sub(created),
        };

        info!(
            "Generated availability for doctor {}: {} created, {} preserved",
            doctor_id, summary.created, summary.preserved
        );
        Ok(summary)
    }

    /// Deletes future, still-available slots in the range that no active
    /// template describes any more. Returns how many were removed.
    pub async fn prune_orphans(
        &self,
        doctor_id: Uuid,
        date_from: NaiveDate,
        date_to: NaiveDate,
        ctx: &RequestContext,
    ) -> Result<usize, ScheduleError> {
        self.validate_range(date_from, date_to)?;

        let described: HashSet<(SlotKey, NaiveTime)> = self
            .described_slots(doctor_id, date_from, date_to)
            .await?
            .into_values()
            .map(|slot| (slot.key(), slot.end_time))
            .collect();

        let query = SlotQuery { doctor_id, from: date_from, to: date_to, available_only: true };
        let orphans: Vec<Uuid> = self.slots
            .query(&query)
            .await?
            .into_iter()
            .filter(|slot| !ctx.is_past(slot.date, slot.start_time))
            .filter(|slot| !described.contains(&(slot.key(), slot.end_time)))
            .map(|slot| slot.id)
            .collect();

        if orphans.is_empty() {
            return Ok(0);
        }

        let pruned = self.slots.delete_unbooked(&orphans).await?;
        info!("Pruned {} orphaned slots for doctor {}", pruned, doctor_id);
        Ok(pruned)
    }

    fn validate_range(&self, date_from: NaiveDate, date_to: NaiveDate) -> Result<(), ScheduleError> {
        if date_from > date_to {
            return Err(ScheduleError::Validation("date_from must not be after date_to".to_string()));
        }
        let days = (date_to - date_from).num_days() + 1;
        if days > self.max_days {
            return Err(ScheduleError::Validation(format!(
                "date range spans {} days, the maximum is {}",
                days, self.max_days
            )));
        }
        Ok(())
    }

    async fn described_slots(
        &self,
        doctor_id: Uuid,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<BTreeMap<SlotKey, NewSlot>, ScheduleError> {
        let templates: Vec<ScheduleTemplate> = self.templates
            .list_for_doctor(doctor_id)
            .await?
            .into_iter()
            .filter(|t| t.is_active)
            .collect();

        let mut described = BTreeMap::new();
        for date in date_from.iter_days().take_while(|d| *d <= date_to) {
            for template in &templates {
                for slot in expand_template(template, date) {
                    described.entry(slot.key()).or_insert(slot);
                }
            }
        }
        Ok(described)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    fn template(start: NaiveTime, end: NaiveTime, minutes: u32) -> ScheduleTemplate {
        ScheduleTemplate {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            day_of_week: 1,
            start_time: start,
            end_time: end,
            slot_duration_minutes: minutes,
            is_active: true,
            break_start: None,
            break_end: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn break_window_is_skipped() {
        let mut tpl = template(t(8, 0), t(17, 0), 60);
        tpl.break_start = Some(t(12, 0));
        tpl.break_end = Some(t(13, 0));

        let slots = expand_template(&tpl, monday());
        assert_eq!(slots.len(), 8);
        assert!(slots.iter().all(|s| s.start_time != t(12, 0)));
        assert_eq!(slots.last().unwrap().end_time, t(17, 0));
    }

    #[test]
    fn slot_straddling_break_is_dropped() {
        let mut tpl = template(t(9, 0), t(11, 0), 30);
        tpl.break_start = Some(t(9, 45));
        tpl.break_end = Some(t(10, 0));

        let starts: Vec<NaiveTime> = expand_template(&tpl, monday()).iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![t(9, 0), t(10, 0), t(10, 30)]);
    }

    #[test]
    fn trailing_partial_slot_is_discarded() {
        let tpl = template(t(8, 0), t(8, 50), 30);
        let slots = expand_template(&tpl, monday());
        assert_eq!(slots.len(), 1);
        assert_eq!((slots[0].start_time, slots[0].end_time), (t(8, 0), t(8, 30)));
    }

    #[test]
    fn other_weekdays_and_inactive_templates_expand_to_nothing() {
        let tpl = template(t(9, 0), t(11, 0), 30);
        let tuesday = NaiveDate::from_ymd_opt(2030, 1, 8).unwrap();
        assert!(expand_template(&tpl, tuesday).is_empty());

        let mut inactive = template(t(9, 0), t(11, 0), 30);
        inactive.is_active = false;
        assert!(expand_template(&inactive, monday()).is_empty());
    }

    #[test]
    fn late_evening_template_does_not_wrap_past_midnight() {
        let tpl = template(t(22, 0), NaiveTime::from_hms_opt(23, 59, 0).unwrap(), 60);
        let slots = expand_template(&tpl, monday());
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start_time, t(22, 0));
    }
}
