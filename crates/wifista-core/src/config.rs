// ── Runtime client-mode configuration ──
//
// These types describe how one station interface behaves. They carry
// timing and policy only and never touch disk; `wifista-config` builds
// a `ClientModeConfig` from TOML and hands it in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do when the IP coordinator reports loss of reachability
/// while fully connected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReachabilityPolicy {
    /// Drop the association immediately.
    #[default]
    Disconnect,
    /// Stay associated, recreate the IP coordinator and provision again.
    Reprovision,
}

/// Configuration for a single station interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientModeConfig {
    /// Interface the machine drives (e.g. `wlan0`).
    pub interface_name: String,
    /// Budget for association + authentication.
    pub connecting_watchdog: Duration,
    /// Budget for a framework-initiated roam.
    pub roam_watchdog: Duration,
    /// How long to wait for the IP coordinator's "ready" signal.
    pub ip_client_startup_timeout: Duration,
    /// How long to wait for a retiring IP coordinator to finish shutting down.
    pub ip_client_shutdown_timeout: Duration,
    pub reachability_policy: ReachabilityPolicy,
    /// Blocklist duration for a BSS that rejected us as busy.
    pub busy_ap_block_duration: Duration,
    /// Consecutive network-not-found events tolerated while connecting.
    pub network_not_found_threshold: u32,
    pub rssi_poll_interval: Duration,
    /// Start DHCP before association completes ("fast connect").
    pub pre_association_provisioning: bool,
}

impl Default for ClientModeConfig {
    fn default() -> Self {
        Self {
            interface_name: "wlan0".into(),
            connecting_watchdog: Duration::from_secs(30),
            roam_watchdog: Duration::from_secs(15),
            ip_client_startup_timeout: Duration::from_secs(2),
            ip_client_shutdown_timeout: Duration::from_secs(60),
            reachability_policy: ReachabilityPolicy::default(),
            busy_ap_block_duration: Duration::from_secs(5 * 60),
            network_not_found_threshold: 3,
            rssi_poll_interval: Duration::from_secs(3),
            pre_association_provisioning: false,
        }
    }
}

impl ClientModeConfig {
    /// Reject configurations that would make a watchdog fire immediately
    /// or never let an attempt fail on not-found.
    pub fn validate(&self) -> Result<(), crate::CoreError> {
        let durations = [
            ("connecting_watchdog", self.connecting_watchdog),
            ("roam_watchdog", self.roam_watchdog),
            ("ip_client_startup_timeout", self.ip_client_startup_timeout),
            ("ip_client_shutdown_timeout", self.ip_client_shutdown_timeout),
            ("rssi_poll_interval", self.rssi_poll_interval),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(crate::CoreError::Config {
                    message: format!("{field} must be greater than zero"),
                });
            }
        }
        if self.network_not_found_threshold == 0 {
            return Err(crate::CoreError::Config {
                message: "network_not_found_threshold must be at least 1".into(),
            });
        }
        if self.interface_name.is_empty() {
            return Err(crate::CoreError::Config {
                message: "interface_name must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ClientModeConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.connecting_watchdog, Duration::from_secs(30));
        assert_eq!(cfg.roam_watchdog, Duration::from_secs(15));
        assert_eq!(cfg.ip_client_startup_timeout, Duration::from_secs(2));
        assert_eq!(cfg.ip_client_shutdown_timeout, Duration::from_secs(60));
        assert_eq!(cfg.reachability_policy, ReachabilityPolicy::Disconnect);
    }

    #[test]
    fn zero_watchdog_is_rejected() {
        let cfg = ClientModeConfig {
            roam_watchdog: Duration::ZERO,
            ..ClientModeConfig::default()
        };
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("roam_watchdog"), "{err}");
    }

    #[test]
    fn policy_parses_from_kebab_case() {
        assert_eq!(
            "reprovision".parse::<ReachabilityPolicy>().ok(),
            Some(ReachabilityPolicy::Reprovision)
        );
        assert!("sometimes".parse::<ReachabilityPolicy>().is_err());
    }
}
