use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How the slot resolver treats current-day slots that start before `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PastSlotPolicy {
    /// Past slots are only filtered against booked appointments.
    Include,
    /// Slots starting before `now` are dropped.
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingPolicy {
    pub horizon_days: u32,
    pub slot_minutes: u32,
    pub past_slots: PastSlotPolicy,
    /// When set, booking rejects timestamps that no availability window generates.
    pub require_availability_window: bool,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            horizon_days: 7,
            slot_minutes: 30,
            past_slots: PastSlotPolicy::Include,
            require_availability_window: false,
        }
    }
}

impl SchedulingPolicy {
    /// Slot granularity in minutes, never zero.
    pub fn step_minutes(&self) -> u32 {
        if self.slot_minutes == 0 { Self::default().slot_minutes } else { self.slot_minutes }
    }

    /// Replaces a zero slot length with the default, so the field and
    /// `step_minutes` agree.
    pub fn normalized(mut self) -> Self {
        if self.slot_minutes == 0 {
            let fallback = Self::default().slot_minutes;
            warn!("SCHEDULING_SLOT_MINUTES must be positive, falling back to {}", fallback);
            self.slot_minutes = fallback;
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub notification_webhook_url: String,
    pub notification_api_key: String,
    pub notification_sender: String,
    /// Upper bound on a single notification delivery.
    pub notification_timeout_secs: u64,
    pub scheduling: SchedulingPolicy,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            notification_webhook_url: String::new(),
            notification_api_key: String::new(),
            notification_sender: "no-reply@clinic.local".to_string(),
            notification_timeout_secs: 10,
            scheduling: SchedulingPolicy::default(),
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                .unwrap_or_else(|_| {
                    warn!("NOTIFICATION_WEBHOOK_URL not set, confirmations will only be logged");
                    String::new()
                }),
            notification_api_key: env::var("NOTIFICATION_API_KEY").unwrap_or_default(),
            notification_sender: env::var("NOTIFICATION_SENDER")
                .unwrap_or(defaults.notification_sender),
            notification_timeout_secs: parse_var(
                "NOTIFICATION_TIMEOUT_SECS",
                defaults.notification_timeout_secs,
            ),
            scheduling: SchedulingPolicy {
                horizon_days: parse_var("SCHEDULING_HORIZON_DAYS", defaults.scheduling.horizon_days),
                slot_minutes: parse_var("SCHEDULING_SLOT_MINUTES", defaults.scheduling.slot_minutes),
                past_slots: if parse_var("SCHEDULING_EXCLUDE_PAST_SLOTS", false) {
                    PastSlotPolicy::Exclude
                } else {
                    PastSlotPolicy::Include
                },
                require_availability_window: parse_var(
                    "BOOKING_REQUIRE_AVAILABILITY_WINDOW",
                    defaults.scheduling.require_availability_window,
                ),
            }
            .normalized(),
            port: parse_var("PORT", defaults.port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_notification_configured(&self) -> bool {
        !self.notification_webhook_url.is_empty()
    }

    pub fn slot_minutes(&self) -> u32 {
        self.scheduling.step_minutes()
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}
