//! Driver configuration
//!
//! Defaults match what the firmware expects on a station interface.
//! A few knobs can be overridden from the environment for bring-up work.

use std::time::Duration;
use tracing::warn;

/// Environment variable overriding [`DriverConfig::ctl_timeout`] (milliseconds).
pub const ENV_CTL_TIMEOUT_MS: &str = "BWFM_CTL_TIMEOUT_MS";
/// Environment variable overriding [`DriverConfig::cmd_ring_capacity`].
pub const ENV_CMD_RING: &str = "BWFM_CMD_RING";

/// Default command ring capacity.
pub const DEFAULT_CMD_RING: usize = 32;
/// Default time to wait for a matching control response.
pub const DEFAULT_CTL_TIMEOUT: Duration = Duration::from_millis(2000);

/// Tunables for one device instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// How long a BCDC transaction waits for its response.
    pub ctl_timeout: Duration,
    /// Slots in the deferred command ring.
    pub cmd_ring_capacity: usize,
    /// Active scan dwell per channel (ms).
    pub scan_channel_time: u32,
    /// Unassociated scan dwell (ms).
    pub scan_unassoc_time: u32,
    /// Passive scan dwell (ms).
    pub scan_passive_time: u32,
    /// Power-management mode set at interface init.
    pub power_mode: u32,
    /// Turn off ARP/ND/checksum offloads in the firmware.
    pub disable_offloads: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            ctl_timeout: DEFAULT_CTL_TIMEOUT,
            cmd_ring_capacity: DEFAULT_CMD_RING,
            scan_channel_time: 40,
            scan_unassoc_time: 40,
            scan_passive_time: 120,
            power_mode: 2,
            disable_offloads: true,
        }
    }
}

impl DriverConfig {
    /// Defaults with environment overrides applied.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(ms) = env_parse::<u64>(ENV_CTL_TIMEOUT_MS) {
            cfg.ctl_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = env_parse::<usize>(ENV_CMD_RING) {
            if n == 0 {
                warn!(var = ENV_CMD_RING, "ignoring zero ring capacity");
            } else {
                cfg.cmd_ring_capacity = n;
            }
        }
        cfg
    }

    /// Override the control timeout.
    #[must_use]
    pub const fn with_ctl_timeout(mut self, timeout: Duration) -> Self {
        self.ctl_timeout = timeout;
        self
    }

    /// Override the command ring capacity.
    #[must_use]
    pub const fn with_cmd_ring_capacity(mut self, capacity: usize) -> Self {
        self.cmd_ring_capacity = capacity;
        self
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var, value = %raw, "ignoring unparseable override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = DriverConfig::default();
        assert_eq!(cfg.ctl_timeout, Duration::from_secs(2));
        assert_eq!(cfg.cmd_ring_capacity, 32);
        assert_eq!(
            (cfg.scan_channel_time, cfg.scan_unassoc_time, cfg.scan_passive_time),
            (40, 40, 120)
        );
        assert_eq!(cfg.power_mode, 2);
        assert!(cfg.disable_offloads);
    }

    #[test]
    fn builders() {
        let cfg = DriverConfig::default()
            .with_ctl_timeout(Duration::from_millis(5))
            .with_cmd_ring_capacity(4);
        assert_eq!(cfg.ctl_timeout, Duration::from_millis(5));
        assert_eq!(cfg.cmd_ring_capacity, 4);
    }
}
