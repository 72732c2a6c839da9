use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(StorageBackend::Supabase),
            "memory" | "in-memory" | "in_memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub booking_timeout_ms: u64,
    pub max_generation_days: i64,
    pub reopen_past_cancelled_slots: bool,
    pub clinic_utc_offset_minutes: i32,
    pub default_consultation_price: f64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            storage_backend: StorageBackend::Memory,
            booking_timeout_ms: 5_000,
            max_generation_days: 366,
            reopen_past_cancelled_slots: false,
            clinic_utc_offset_minutes: 0,
            default_consultation_price: 0.0,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });
        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            });
        let supabase_service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_SERVICE_ROLE_KEY not set, falling back to anon key");
                supabase_anon_key.clone()
            });
        let supabase_jwt_secret = env::var("SUPABASE_JWT_SECRET")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_JWT_SECRET not set, using empty value");
                String::new()
            });

        let supabase_ready = !supabase_url.is_empty() && !supabase_anon_key.is_empty();
        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(raw) => raw.parse().unwrap_or_else(|e: String| {
                warn!("{}, using in-memory storage", e);
                StorageBackend::Memory
            }),
            Err(_) if supabase_ready => StorageBackend::Supabase,
            Err(_) => {
                warn!("STORAGE_BACKEND not set and Supabase not configured, using in-memory storage");
                StorageBackend::Memory
            }
        };

        let config = Self {
            supabase_url,
            supabase_anon_key,
            supabase_service_role_key,
            supabase_jwt_secret,
            storage_backend,
            booking_timeout_ms: at_least(
                "BOOKING_TIMEOUT_MS",
                parse_or("BOOKING_TIMEOUT_MS", defaults.booking_timeout_ms),
                1,
                defaults.booking_timeout_ms,
            ),
            max_generation_days: at_least(
                "MAX_GENERATION_DAYS",
                parse_or("MAX_GENERATION_DAYS", defaults.max_generation_days),
                1,
                defaults.max_generation_days,
            ),
            reopen_past_cancelled_slots: parse_or(
                "REOPEN_PAST_CANCELLED_SLOTS",
                defaults.reopen_past_cancelled_slots,
            ),
            clinic_utc_offset_minutes: parse_or(
                "CLINIC_UTC_OFFSET_MINUTES",
                defaults.clinic_utc_offset_minutes,
            ),
            default_consultation_price: parse_or(
                "DEFAULT_CONSULTATION_PRICE",
                defaults.default_consultation_price,
            ),
            port: parse_or("PORT", defaults.port),
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("Supabase storage selected but not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn booking_timeout(&self) -> Duration {
        Duration::from_millis(self.booking_timeout_ms)
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {:?}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn at_least<T>(key: &str, value: T, min: T, default: T) -> T
where
    T: PartialOrd + std::fmt::Debug,
{
    if value < min {
        warn!("{} must be at least {:?}, got {:?}, using default {:?}", key, min, value, default);
        return default;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_known_names() {
        assert_eq!("supabase".parse::<StorageBackend>(), Ok(StorageBackend::Supabase));
        assert_eq!(" Memory ".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("postgres".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn defaults_are_conservative() {
        let config = AppConfig::default();
        assert_eq!(config.booking_timeout(), Duration::from_secs(5));
        assert!(!config.reopen_past_cancelled_slots);
        assert_eq!(config.max_generation_days, 366);
        assert!(!config.is_configured());
    }

    #[test]
    fn non_positive_limits_fall_back_to_defaults() {
        assert_eq!(at_least("MAX_GENERATION_DAYS", 0, 1, 366), 366);
        assert_eq!(at_least("MAX_GENERATION_DAYS", -30, 1, 366), 366);
        assert_eq!(at_least("MAX_GENERATION_DAYS", 31, 1, 366), 31);
        assert_eq!(at_least("BOOKING_TIMEOUT_MS", 0u64, 1, 5000), 5000);
    }
}
