// libs/appointment-cell/src/state.rs
use std::sync::Arc;

use schedule_cell::store::SlotStore;
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::services::{
    AppointmentBookingService, BookingPolicy, DoctorDirectory, FixedPriceDoctorDirectory,
    InMemoryPatientDirectory, PatientDirectory, SupabaseDoctorDirectory, SupabasePatientDirectory,
};
use crate::store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub slots: Arc<dyn SlotStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub patients: Arc<dyn PatientDirectory>,
    pub doctors: Arc<dyn DoctorDirectory>,
}

impl AppointmentState {
    pub fn new(
        config: Arc<AppConfig>,
        slots: Arc<dyn SlotStore>,
        appointments: Arc<dyn AppointmentStore>,
        patients: Arc<dyn PatientDirectory>,
        doctors: Arc<dyn DoctorDirectory>,
    ) -> Self {
        Self { config, slots, appointments, patients, doctors }
    }

    /// Local development wiring around an existing slot store.
    pub fn in_memory(config: Arc<AppConfig>, slots: Arc<dyn SlotStore>) -> Self {
        let doctors = Arc::new(FixedPriceDoctorDirectory::new(config.default_consultation_price));
        Self::new(
            config,
            slots,
            Arc::new(InMemoryAppointmentStore::new()),
            Arc::new(InMemoryPatientDirectory::new()),
            doctors,
        )
    }

    pub fn supabase(config: Arc<AppConfig>, client: Arc<SupabaseClient>, slots: Arc<dyn SlotStore>) -> Self {
        let appointments = Arc::new(SupabaseAppointmentStore::new(client.clone(), &config));
        let patients = Arc::new(SupabasePatientDirectory::new(client.clone(), &config));
        let doctors = Arc::new(SupabaseDoctorDirectory::new(client, &config));
        Self::new(config, slots, appointments, patients, doctors)
    }

    pub fn booking_service(&self) -> AppointmentBookingService {
        AppointmentBookingService::new(
            self.slots.clone(),
            self.appointments.clone(),
            self.patients.clone(),
            self.doctors.clone(),
            BookingPolicy::from_config(&self.config),
        )
    }
}
