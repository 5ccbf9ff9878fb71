use std::path::PathBuf;
use std::time::Duration;

use causerie_shared::constants::{
    DEFAULT_DROP_RATE, SEND_INITIAL_TIMEOUT_MS, SEND_MAX_ATTEMPTS, SEND_MAX_TIMEOUT_MS,
};

/// Retry policy for the stop-and-wait sender.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub max_attempts: u32,
    /// ACK timeout for the first attempt; doubled per retry.
    pub initial_timeout: Duration,
    pub max_timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_attempts: SEND_MAX_ATTEMPTS,
            initial_timeout: Duration::from_millis(SEND_INITIAL_TIMEOUT_MS),
            max_timeout: Duration::from_millis(SEND_MAX_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Probability of silently discarding an incoming datagram, for
    /// exercising the sender's retransmission path. Production deployments
    /// set this to 0.
    pub p_drop: f64,
    /// Directory received files land in. Must already exist.
    pub saved_dir: PathBuf,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            p_drop: DEFAULT_DROP_RATE,
            saved_dir: PathBuf::from("./saved"),
        }
    }
}

impl ReceiverConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("CAUSERIE_DROP_RATE") {
            match value.parse::<f64>() {
                Ok(rate) if (0.0..=1.0).contains(&rate) => config.p_drop = rate,
                _ => {
                    tracing::warn!(value = %value, "Ignoring drop rate outside 0.0..=1.0");
                }
            }
        }
        if let Ok(dir) = std::env::var("CAUSERIE_SAVED_DIR") {
            config.saved_dir = PathBuf::from(dir);
        }

        config
    }
}
