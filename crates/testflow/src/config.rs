use std::time::Duration;

use crate::jobs::queue::{QueueOptions, TransitionPolicy};
use crate::jobs::store::MAX_LEASE;
use crate::liveness::DEFAULT_THRESHOLD_SECS;
use crate::scheduler::DEFAULT_SCHEDULE;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres { database_url: String },
    Memory,
}

/// Runtime configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    pub store: StoreKind,
    pub listen_addr: String,
    pub allowed_origin: String,
    pub liveness_threshold_secs: i64,
    /// `None` disables the scheduler.
    pub schedule: Option<String>,
    /// `0` disables leases and the reaper. Capped at `MAX_LEASE`.
    pub lease_seconds: u64,
    pub reap_interval_ms: u64,
    pub strict_transitions: bool,
    pub migrate_on_startup: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |primary: &str, fallback: &str| {
            lookup(primary)
                .filter(|s| !s.trim().is_empty())
                .or_else(|| lookup(fallback).filter(|s| !s.trim().is_empty()))
        };

        let store = match get("TESTFLOW_STORE", "STORE")
            .map(|s| s.trim().to_lowercase())
            .as_deref()
        {
            Some("memory") => StoreKind::Memory,
            None | Some("postgres") | Some("pg") => {
                let database_url = get("TESTFLOW_DATABASE_URL", "DATABASE_URL")
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is missing"))?;
                StoreKind::Postgres { database_url }
            }
            Some(other) => anyhow::bail!("unknown TESTFLOW_STORE {other:?} (expected postgres or memory)"),
        };

        let listen_addr = get("TESTFLOW_LISTEN_ADDR", "LISTEN_ADDR")
            .or_else(|| lookup("PORT").map(|p| format!("0.0.0.0:{}", p.trim())))
            .unwrap_or_else(|| "0.0.0.0:3000".to_string());

        let allowed_origin =
            get("TESTFLOW_ALLOWED_ORIGIN", "ALLOWED_ORIGIN").unwrap_or_else(|| "*".to_string());

        let liveness_threshold_secs = get("TESTFLOW_LIVENESS_SECS", "LIVENESS_SECS")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_THRESHOLD_SECS);

        let schedule = match get("TESTFLOW_SCHEDULE", "SCHEDULE") {
            Some(s) if is_off(&s) => None,
            Some(s) => Some(s.trim().to_string()),
            None => Some(DEFAULT_SCHEDULE.to_string()),
        };

        let lease_seconds = get("TESTFLOW_LEASE_SECONDS", "LEASE_SECONDS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0)
            .min(MAX_LEASE.as_secs());

        let reap_interval_ms = get("TESTFLOW_REAP_INTERVAL_MS", "REAP_INTERVAL_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(5_000)
            .max(100);

        let strict_transitions = get("TESTFLOW_STRICT_TRANSITIONS", "STRICT_TRANSITIONS")
            .map(|v| is_on(&v))
            .unwrap_or(false);

        let migrate_on_startup = get("TESTFLOW_MIGRATE_ON_STARTUP", "MIGRATE_ON_STARTUP")
            .map(|v| is_on(&v))
            .unwrap_or(true);

        Ok(Self {
            store,
            listen_addr,
            allowed_origin,
            liveness_threshold_secs,
            schedule,
            lease_seconds,
            reap_interval_ms,
            strict_transitions,
            migrate_on_startup,
        })
    }

    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            transitions: if self.strict_transitions {
                TransitionPolicy::Strict
            } else {
                TransitionPolicy::Permissive
            },
            lease: (self.lease_seconds > 0).then(|| Duration::from_secs(self.lease_seconds)),
        }
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}

fn is_on(v: &str) -> bool {
    matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn is_off(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "0" | "off" | "false" | "none" | "disabled"
    )
}
