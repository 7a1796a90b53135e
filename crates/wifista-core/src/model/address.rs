// ── Link-layer identity types ──
//
// MacAddress, Bssid and Ssid identify the access point side of an
// association. Bssid carries the wildcard sentinel used when the
// radio is free to pick any BSS of the target network.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── MacAddress ──────────────────────────────────────────────────────

/// MAC address, normalized to lowercase colon-separated format (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

/// The all-zero address drivers report when no BSS is known.
pub const ZERO_MAC: &str = "00:00:00:00:00:00";

impl MacAddress {
    /// Create a normalized MAC address from any common format.
    /// Accepts colon-separated, dash-separated, or bare hex.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, AddressError> {
        let raw = raw.as_ref().trim();
        let hex: String = raw
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidMac(raw.to_owned()));
        }

        let octets: Vec<&str> = (0..6).filter_map(|i| hex.get(i * 2..i * 2 + 2)).collect();
        Ok(Self(octets.join(":")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_MAC
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid MAC address: {0:?}")]
    InvalidMac(String),
}

// ── Bssid ───────────────────────────────────────────────────────────

/// Target BSS of an association request.
///
/// `Any` lets the radio choose among every BSS advertising the target
/// network; the string form is `"any"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Bssid {
    #[default]
    Any,
    Mac(MacAddress),
}

impl Bssid {
    pub fn as_mac(&self) -> Option<&MacAddress> {
        match self {
            Self::Mac(mac) => Some(mac),
            Self::Any => None,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Does an observed BSS satisfy this target?
    pub fn accepts(&self, observed: &MacAddress) -> bool {
        match self {
            Self::Any => true,
            Self::Mac(mac) => mac == observed,
        }
    }
}

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Mac(mac) => write!(f, "{mac}"),
        }
    }
}

impl FromStr for Bssid {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("any") || s.trim() == ZERO_MAC || s.trim() == "ff:ff:ff:ff:ff:ff"
        {
            return Ok(Self::Any);
        }
        MacAddress::new(s).map(Self::Mac)
    }
}

impl TryFrom<String> for Bssid {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Bssid> for String {
    fn from(bssid: Bssid) -> Self {
        bssid.to_string()
    }
}

impl From<MacAddress> for Bssid {
    fn from(mac: MacAddress) -> Self {
        Self::Mac(mac)
    }
}

// ── Ssid ────────────────────────────────────────────────────────────

/// Network name as reported by the driver. Compared byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ssid(String);

impl Ssid {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl From<&str> for Ssid {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Ssid {
    fn from(s: String) -> Self {
        Self(s)
    }
}
