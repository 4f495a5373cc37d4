//! Runtime-configurable behaviour of the reduction engine.
//!
//! All values have defaults. Override via environment variables
//! (prefixed `TREEFOLD_`) or by constructing a custom `ReduceConfig`.

use std::time::Duration;

/// Tuning and diagnostic switches for collective reductions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceConfig {
    /// Timeout for each send/recv inside a collective.
    ///
    /// `None` blocks until the peer participates, which is the collective
    /// contract: a rank that never joins stalls everyone else.
    pub collective_timeout: Option<Duration>,

    /// Compare root, stride and element size carried by every incoming
    /// partial result against the local call and fail with
    /// `ProtocolViolation` on disagreement.
    pub verify_agreement: bool,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            collective_timeout: None,
            verify_agreement: true,
        }
    }
}

impl ReduceConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `TREEFOLD_COLLECTIVE_TIMEOUT_SECS` (`0` disables the timeout)
    /// - `TREEFOLD_VERIFY_AGREEMENT` (`0`/`false` disables the check)
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("TREEFOLD_COLLECTIVE_TIMEOUT_SECS")
            && let Ok(s) = v.parse::<u64>()
        {
            cfg.collective_timeout = (s > 0).then(|| Duration::from_secs(s));
        }
        if let Ok(v) = std::env::var("TREEFOLD_VERIFY_AGREEMENT") {
            match v.trim().to_ascii_lowercase().as_str() {
                "0" | "false" | "off" | "no" => cfg.verify_agreement = false,
                "1" | "true" | "on" | "yes" => cfg.verify_agreement = true,
                _ => {}
            }
        }

        cfg
    }

    /// Builder-style timeout override.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.collective_timeout = Some(timeout);
        self
    }
}
