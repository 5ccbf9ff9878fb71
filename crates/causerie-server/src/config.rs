use std::time::Duration;

use causerie_shared::constants::{
    IDLE_TIMEOUT_SECS, MAX_CLIENTS, MAX_SESSIONS, REAPER_PERIOD_SECS,
};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub max_clients: usize,
    pub max_sessions: usize,
    pub idle_timeout: Duration,
    pub reaper_period: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            max_clients: MAX_CLIENTS,
            max_sessions: MAX_SESSIONS,
            idle_timeout: Duration::from_secs(IDLE_TIMEOUT_SECS),
            reaper_period: Duration::from_secs(REAPER_PERIOD_SECS),
        }
    }
}

impl ServerConfig {
    /// Build a config for the given listen port, letting the environment
    /// override the tuning knobs.
    pub fn from_env(port: u16) -> Self {
        let mut config = Self {
            port,
            ..Self::default()
        };

        if let Some(n) = env_number("CAUSERIE_MAX_CLIENTS") {
            config.max_clients = n as usize;
        }
        if let Some(n) = env_number("CAUSERIE_MAX_SESSIONS") {
            config.max_sessions = n as usize;
        }
        if let Some(n) = env_number("CAUSERIE_IDLE_TIMEOUT_SECS") {
            config.idle_timeout = Duration::from_secs(n);
        }
        if let Some(n) = env_number("CAUSERIE_REAPER_PERIOD_SECS") {
            config.reaper_period = Duration::from_secs(n);
        }

        config
    }
}

fn env_number(key: &str) -> Option<u64> {
    let value = std::env::var(key).ok()?;
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = %value, "Ignoring non-numeric override");
            None
        }
    }
}
