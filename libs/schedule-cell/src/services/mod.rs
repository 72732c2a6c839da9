pub mod availability;
pub mod generator;
pub mod template;

pub use availability::AvailabilityService;
pub use generator::{expand_template, SlotGenerator};
pub use template::{validate_template, ScheduleTemplateService};
