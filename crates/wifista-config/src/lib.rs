//! Shared configuration for the wifista CLI and any other front end.
//!
//! TOML file + `WIFISTA_` environment overrides, saved networks with
//! credential resolution (env + keyring + plaintext), and translation
//! to `wifista_core::ClientModeConfig`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use wifista_core::{
    ClientModeConfig, Credential, DisableReason, IpAssignment, NetworkConfigStore, NetworkId,
    NetworkIdentity, ReachabilityPolicy, SecurityType, Ssid, StaticIpConfig,
};

const KEYRING_SERVICE: &str = "wifista";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for network '{network}'")]
    NoCredentials { network: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Interface used when none is given on the command line.
    pub default_interface: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Per-interface overrides, keyed by interface name.
    #[serde(default)]
    pub interfaces: HashMap<String, InterfaceProfile>,

    /// Saved networks, keyed by a human name.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_interface: Some("wlan0".into()),
            defaults: Defaults::default(),
            interfaces: HashMap::new(),
            networks: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_connecting_watchdog")]
    pub connecting_watchdog_secs: u64,

    #[serde(default = "default_roam_watchdog")]
    pub roam_watchdog_secs: u64,

    #[serde(default = "default_ip_startup")]
    pub ip_startup_timeout_millis: u64,

    #[serde(default = "default_ip_shutdown")]
    pub ip_shutdown_timeout_secs: u64,

    /// "disconnect" or "reprovision".
    #[serde(default = "default_policy")]
    pub reachability_policy: String,

    #[serde(default = "default_busy_block")]
    pub busy_ap_block_secs: u64,

    #[serde(default = "default_not_found_threshold")]
    pub network_not_found_threshold: u32,

    #[serde(default = "default_rssi_poll")]
    pub rssi_poll_interval_millis: u64,

    #[serde(default)]
    pub fast_connect: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            connecting_watchdog_secs: default_connecting_watchdog(),
            roam_watchdog_secs: default_roam_watchdog(),
            ip_startup_timeout_millis: default_ip_startup(),
            ip_shutdown_timeout_secs: default_ip_shutdown(),
            reachability_policy: default_policy(),
            busy_ap_block_secs: default_busy_block(),
            network_not_found_threshold: default_not_found_threshold(),
            rssi_poll_interval_millis: default_rssi_poll(),
            fast_connect: false,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_connecting_watchdog() -> u64 {
    30
}
fn default_roam_watchdog() -> u64 {
    15
}
fn default_ip_startup() -> u64 {
    2_000
}
fn default_ip_shutdown() -> u64 {
    60
}
fn default_policy() -> String {
    "disconnect".into()
}
fn default_busy_block() -> u64 {
    5 * 60
}
fn default_not_found_threshold() -> u32 {
    3
}
fn default_rssi_poll() -> u64 {
    3_000
}

/// Overrides for one interface. Unset fields fall back to `[defaults]`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct InterfaceProfile {
    pub connecting_watchdog_secs: Option<u64>,
    pub roam_watchdog_secs: Option<u64>,
    pub ip_startup_timeout_millis: Option<u64>,
    pub ip_shutdown_timeout_secs: Option<u64>,
    pub reachability_policy: Option<String>,
    pub busy_ap_block_secs: Option<u64>,
    pub network_not_found_threshold: Option<u32>,
    pub rssi_poll_interval_millis: Option<u64>,
    pub fast_connect: Option<bool>,
}

/// A saved network.
#[derive(Deserialize, Serialize)]
pub struct NetworkProfile {
    /// Identifier handed to the state machine.
    pub id: u32,

    pub ssid: String,

    #[serde(default)]
    pub security: SecurityType,

    /// Plaintext passphrase (prefer keyring or env var).
    pub passphrase: Option<String>,

    /// Environment variable name containing the passphrase.
    pub passphrase_env: Option<String>,

    /// Outer identity for enterprise networks.
    pub eap_identity: Option<String>,

    /// Static addressing; DHCP when absent.
    pub static_ip: Option<StaticIpConfig>,

    #[serde(default)]
    pub hidden: bool,
}

impl fmt::Debug for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkProfile")
            .field("id", &self.id)
            .field("ssid", &self.ssid)
            .field("security", &self.security)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("passphrase_env", &self.passphrase_env)
            .field("eap_identity", &self.eap_identity)
            .field("static_ip", &self.static_ip)
            .field("hidden", &self.hidden)
            .finish()
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "wifista", "wifista").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("wifista");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WIFISTA_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unreadable config");
        Config::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Runtime config ──────────────────────────────────────────────────

impl Config {
    /// Interface to drive: the explicit one, else `default_interface`,
    /// else `wlan0`.
    pub fn interface_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_interface.clone())
            .unwrap_or_else(|| "wlan0".into())
    }

    /// Build the runtime configuration for one interface, applying its
    /// overrides on top of `[defaults]`.
    pub fn client_mode_config(
        &self,
        interface: Option<&str>,
    ) -> Result<ClientModeConfig, ConfigError> {
        let name = self.interface_name(interface);
        if name.trim().is_empty() {
            return Err(invalid("interface", "must not be empty"));
        }
        let empty = InterfaceProfile::default();
        let over = self.interfaces.get(&name).unwrap_or(&empty);
        let d = &self.defaults;

        let policy_str = over
            .reachability_policy
            .as_deref()
            .unwrap_or(&d.reachability_policy);
        let reachability_policy: ReachabilityPolicy = policy_str.parse().map_err(|_| {
            invalid(
                "reachability_policy",
                format!("expected 'disconnect' or 'reprovision', got '{policy_str}'"),
            )
        })?;

        let threshold = over
            .network_not_found_threshold
            .unwrap_or(d.network_not_found_threshold);
        if threshold == 0 {
            return Err(invalid("network_not_found_threshold", "must be at least 1"));
        }

        Ok(ClientModeConfig {
            interface_name: name,
            connecting_watchdog: secs(
                "connecting_watchdog_secs",
                over.connecting_watchdog_secs
                    .unwrap_or(d.connecting_watchdog_secs),
            )?,
            roam_watchdog: secs(
                "roam_watchdog_secs",
                over.roam_watchdog_secs.unwrap_or(d.roam_watchdog_secs),
            )?,
            ip_client_startup_timeout: millis(
                "ip_startup_timeout_millis",
                over.ip_startup_timeout_millis
                    .unwrap_or(d.ip_startup_timeout_millis),
            )?,
            ip_client_shutdown_timeout: secs(
                "ip_shutdown_timeout_secs",
                over.ip_shutdown_timeout_secs
                    .unwrap_or(d.ip_shutdown_timeout_secs),
            )?,
            reachability_policy,
            busy_ap_block_duration: secs(
                "busy_ap_block_secs",
                over.busy_ap_block_secs.unwrap_or(d.busy_ap_block_secs),
            )?,
            network_not_found_threshold: threshold,
            rssi_poll_interval: millis(
                "rssi_poll_interval_millis",
                over.rssi_poll_interval_millis
                    .unwrap_or(d.rssi_poll_interval_millis),
            )?,
            pre_association_provisioning: over.fast_connect.unwrap_or(d.fast_connect),
        })
    }

    /// Check everything a run would need: every interface section and
    /// every saved network. Credentials are not resolved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client_mode_config(None)?;
        for name in self.interfaces.keys() {
            self.client_mode_config(Some(name))?;
        }
        let mut seen: HashMap<u32, &str> = HashMap::new();
        for (name, network) in &self.networks {
            network.validate(name)?;
            if let Some(other) = seen.insert(network.id, name) {
                return Err(invalid(
                    format!("networks.{name}.id"),
                    format!("id {} is already used by '{other}'", network.id),
                ));
            }
        }
        Ok(())
    }
}

fn secs(field: &str, value: u64) -> Result<Duration, ConfigError> {
    nonzero(field, Duration::from_secs(value))
}

fn millis(field: &str, value: u64) -> Result<Duration, ConfigError> {
    nonzero(field, Duration::from_millis(value))
}

fn nonzero(field: &str, value: Duration) -> Result<Duration, ConfigError> {
    if value.is_zero() {
        Err(invalid(field, "must be greater than zero"))
    } else {
        Ok(value)
    }
}

// ── Saved networks ──────────────────────────────────────────────────

impl NetworkProfile {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.ssid.is_empty() || self.ssid.len() > 32 {
            return Err(invalid(
                format!("networks.{name}.ssid"),
                "must be 1 to 32 bytes",
            ));
        }
        if self.security == SecurityType::Open && self.passphrase.is_some() {
            return Err(invalid(
                format!("networks.{name}.passphrase"),
                "open networks take no passphrase",
            ));
        }
        Ok(())
    }

    /// Build the identity handed to the radio, resolving credentials.
    pub fn identity(&self, name: &str) -> Result<NetworkIdentity, ConfigError> {
        self.validate(name)?;
        let credential = match self.security {
            SecurityType::Open => Credential::None,
            SecurityType::Psk | SecurityType::Sae => {
                Credential::Passphrase(resolve_passphrase(self, name)?)
            }
            SecurityType::Eap => Credential::Enterprise {
                identity: self
                    .eap_identity
                    .clone()
                    .ok_or_else(|| ConfigError::NoCredentials {
                        network: name.into(),
                    })?,
            },
        };
        Ok(NetworkIdentity {
            network_id: NetworkId(self.id),
            ssid: Ssid::new(self.ssid.clone()),
            security: self.security,
            credential,
            ip_assignment: self
                .static_ip
                .clone()
                .map_or(IpAssignment::Dynamic, IpAssignment::Static),
            hidden: self.hidden,
        })
    }
}

/// Resolve a passphrase from the credential chain.
pub fn resolve_passphrase(
    network: &NetworkProfile,
    name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Network's passphrase_env → env var lookup
    if let Some(ref env_name) = network.passphrase_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("network/{name}")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref passphrase) = network.passphrase {
        return Ok(SecretString::from(passphrase.clone()));
    }

    Err(ConfigError::NoCredentials {
        network: name.into(),
    })
}

/// Store a passphrase in the system keyring.
pub fn store_passphrase(name: &str, passphrase: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("network/{name}"))
        .map_err(|e| invalid("keyring", e.to_string()))?;
    entry
        .set_password(passphrase)
        .map_err(|e| invalid("keyring", e.to_string()))
}

/// Selection status tracked per saved network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkStatus {
    pub failures: BTreeMap<DisableReason, u32>,
    pub ever_connected: bool,
    pub ever_validated: bool,
}

#[derive(Debug)]
struct SavedNetwork {
    name: String,
    identity: NetworkIdentity,
    status: NetworkStatus,
}

/// Saved networks from the config file, usable as the state machine's
/// network-configuration collaborator.
#[derive(Debug, Default)]
pub struct SavedNetworks {
    networks: BTreeMap<NetworkId, SavedNetwork>,
}

impl SavedNetworks {
    /// Resolve every saved network. A network whose credentials cannot
    /// be resolved is skipped with a warning.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut networks = BTreeMap::new();
        for (name, profile) in &config.networks {
            match profile.identity(name) {
                Ok(identity) => {
                    networks.insert(
                        identity.network_id,
                        SavedNetwork {
                            name: name.clone(),
                            identity,
                            status: NetworkStatus::default(),
                        },
                    );
                }
                Err(ConfigError::NoCredentials { network }) => {
                    warn!(%network, "skipping saved network without credentials");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Self { networks })
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Look up a network id by its config name.
    pub fn id_of(&self, name: &str) -> Option<NetworkId> {
        self.networks
            .iter()
            .find(|(_, saved)| saved.name == name)
            .map(|(id, _)| *id)
    }

    pub fn status(&self, network_id: NetworkId) -> Option<&NetworkStatus> {
        self.networks.get(&network_id).map(|saved| &saved.status)
    }

    /// (id, name, ssid) of every saved network, ordered by id.
    pub fn summaries(&self) -> impl Iterator<Item = (NetworkId, &str, &Ssid)> {
        self.networks
            .iter()
            .map(|(id, saved)| (*id, saved.name.as_str(), &saved.identity.ssid))
    }
}

impl NetworkConfigStore for SavedNetworks {
    fn identity(&self, network_id: NetworkId) -> Option<NetworkIdentity> {
        self.networks
            .get(&network_id)
            .map(|saved| saved.identity.clone())
    }

    fn record_failure(&mut self, network_id: NetworkId, reason: DisableReason) {
        if let Some(saved) = self.networks.get_mut(&network_id) {
            *saved.status.failures.entry(reason).or_default() += 1;
            debug!(%network_id, %reason, "failure recorded");
        }
    }

    fn record_connected(&mut self, network_id: NetworkId) {
        if let Some(saved) = self.networks.get_mut(&network_id) {
            saved.status.failures.clear();
            saved.status.ever_connected = true;
        }
    }

    fn record_validation(&mut self, network_id: NetworkId, valid: bool) {
        if let Some(saved) = self.networks.get_mut(&network_id) {
            saved.status.ever_validated |= valid;
        }
    }
}
