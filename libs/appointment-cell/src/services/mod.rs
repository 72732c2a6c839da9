pub mod booking;
pub mod doctor;
pub mod lifecycle;
pub mod patient;

pub use booking::{AppointmentBookingService, BookingPolicy};
pub use doctor::{DoctorDirectory, FixedPriceDoctorDirectory, SupabaseDoctorDirectory};
pub use lifecycle::AppointmentLifecycleService;
pub use patient::{validate_new_patient, InMemoryPatientDirectory, PatientDirectory, RegisteredPatient, SupabasePatientDirectory};
