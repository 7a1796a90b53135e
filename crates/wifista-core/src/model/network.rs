// ── Network identity types ──
//
// NetworkIdentity is fetched from the network-configuration collaborator
// at the moment an attempt starts and lives only as long as that attempt.

use serde::{Deserialize, Serialize};
use std::fmt;

use secrecy::SecretString;

use super::address::Ssid;
use super::link::StaticIpConfig;

// ── NetworkId ───────────────────────────────────────────────────────

/// Identifier of a saved network in the network-configuration store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub u32);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NetworkId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// ── Security / credentials ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SecurityType {
    #[default]
    Open,
    Psk,
    Sae,
    Eap,
}

/// Credential reference handed to the radio for one attempt.
///
/// The secret never leaves this type except through
/// [`secrecy::ExposeSecret`] at the radio boundary.
#[derive(Debug, Clone)]
pub enum Credential {
    None,
    Passphrase(SecretString),
    /// Enterprise identity; the EAP exchange itself belongs to the supplicant.
    Enterprise { identity: String },
}

/// How L3 configuration is obtained on this network.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IpAssignment {
    #[default]
    Dynamic,
    Static(StaticIpConfig),
}

/// Immutable per-attempt view of a saved network.
#[derive(Debug, Clone)]
pub struct NetworkIdentity {
    pub network_id: NetworkId,
    pub ssid: Ssid,
    pub security: SecurityType,
    pub credential: Credential,
    pub ip_assignment: IpAssignment,
    pub hidden: bool,
}

// ── Requesters ──────────────────────────────────────────────────────

/// Who asked for a connection. Uid 1000 is the system itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requester {
    pub uid: u32,
    #[serde(default)]
    pub package: Option<String>,
}

pub const SYSTEM_UID: u32 = 1000;

impl Requester {
    pub fn system() -> Self {
        Self {
            uid: SYSTEM_UID,
            package: None,
        }
    }

    /// A connect request issued on behalf of an app or the settings UI
    /// rather than by auto-join.
    pub fn is_user(&self) -> bool {
        self.uid != SYSTEM_UID
    }
}

impl Default for Requester {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Display for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(pkg) => write!(f, "{}:{pkg}", self.uid),
            None => write!(f, "{}", self.uid),
        }
    }
}

/// Attribution for a reconnect request, forwarded to network selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkSource(pub Vec<Requester>);
