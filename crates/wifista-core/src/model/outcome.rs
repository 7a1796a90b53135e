// ── Attempt outcomes ──
//
// Every connection attempt ends with exactly one AttemptOutcome. The
// outcome, together with the BSS context captured at the time, forms
// the AttemptReport consumed by selection, blocklist and network
// configuration collaborators.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::{MacAddress, Ssid};
use super::network::{NetworkId, Requester};

// ── Failure sub-reasons ─────────────────────────────────────────────

/// IEEE 802.11 status code 17: AP is unable to handle additional STAs.
pub const STATUS_AP_UNABLE_TO_HANDLE_NEW_STA: u16 = 17;
/// IEEE 802.11 status code 30: association rejected temporarily.
pub const STATUS_REJECTED_TEMPORARILY: u16 = 30;
/// IEEE 802.11 status code 34: poor channel conditions.
pub const STATUS_POOR_CHANNEL_CONDITIONS: u16 = 34;
/// IEEE 802.11 status code 1: unspecified failure.
pub const STATUS_UNSPECIFIED_FAILURE: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AssocRejectReason {
    ApBusy,
    RejectedTemporarily,
    PoorChannelConditions,
    Unspecified,
    /// Any other non-zero status code.
    Denied(u16),
    /// The radio refused to even send the request.
    LocallyRefused,
}

impl AssocRejectReason {
    pub fn from_status(status: u16) -> Self {
        match status {
            STATUS_AP_UNABLE_TO_HANDLE_NEW_STA => Self::ApBusy,
            STATUS_REJECTED_TEMPORARILY => Self::RejectedTemporarily,
            STATUS_POOR_CHANNEL_CONDITIONS => Self::PoorChannelConditions,
            STATUS_UNSPECIFIED_FAILURE => Self::Unspecified,
            other => Self::Denied(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AuthFailureReason {
    WrongPassword,
    EapFailure { code: i32 },
    Timeout,
    Unknown,
}

// ── AttemptOutcome ──────────────────────────────────────────────────

/// Terminal result of a single connection or roam attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptOutcome {
    /// The attempt succeeded.
    None,
    AssociationTimeout,
    AssociationRejected(AssocRejectReason),
    AuthenticationFailure(AuthFailureReason),
    Dhcp,
    IpReachabilityLost,
    NetworkNotFound,
    Disconnection,
    RoamTimeout,
    IpClientStartupTimeout,
    /// Ended locally on request; never counted against the network.
    Cancelled,
}

impl AttemptOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, Self::None)
    }

    /// Failures count toward blocklisting and network disabling.
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::None | Self::Cancelled)
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::AssociationTimeout => f.write_str("association-timeout"),
            Self::AssociationRejected(reason) => write!(f, "association-rejected({reason})"),
            Self::AuthenticationFailure(reason) => write!(f, "authentication-failure({reason})"),
            Self::Dhcp => f.write_str("dhcp"),
            Self::IpReachabilityLost => f.write_str("ip-reachability-lost"),
            Self::NetworkNotFound => f.write_str("network-not-found"),
            Self::Disconnection => f.write_str("disconnection"),
            Self::RoamTimeout => f.write_str("roam-timeout"),
            Self::IpClientStartupTimeout => f.write_str("ip-client-startup-timeout"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

// ── Attempt bookkeeping ─────────────────────────────────────────────

/// Whether the attempt was a fresh connect or a framework roam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AttemptKind {
    Connect,
    Roam,
}

/// Everything the outcome collaborators need to drive backoff decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptReport {
    pub attempt_id: u64,
    pub kind: AttemptKind,
    pub outcome: AttemptOutcome,
    pub network_id: NetworkId,
    pub ssid: Ssid,
    pub bssid: Option<MacAddress>,
    pub rssi: Option<i32>,
    pub frequency_mhz: Option<u32>,
    pub user_selected: bool,
    pub requester: Requester,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl AttemptReport {
    pub fn duration(&self) -> Duration {
        (self.ended_at - self.started_at).to_std().unwrap_or_default()
    }
}

// ── Collaborator-facing reasons ─────────────────────────────────────

/// Reason attached to a BSSID blocklist request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BlockReason {
    ApUnableToHandleNewSta,
    AssociationRejection,
    AssociationTimeout,
    AuthenticationFailure,
    WrongPassword,
    EapFailure,
    DhcpFailure,
    AbnormalDisconnect,
    NetworkValidationFailure,
}

/// Reason attached to a network-selection-status update. The
/// configuration collaborator owns the counting thresholds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DisableReason {
    AssociationRejection,
    AuthenticationFailure,
    WrongPassword,
    EapFailure,
    DhcpFailure,
    NetworkNotFound,
    NoInternet,
}

impl AttemptOutcome {
    /// The blocklist reason for this outcome, if it should blocklist at all.
    pub fn block_reason(self) -> Option<BlockReason> {
        match self {
            Self::AssociationRejected(AssocRejectReason::ApBusy) => {
                Some(BlockReason::ApUnableToHandleNewSta)
            }
            Self::AssociationRejected(AssocRejectReason::LocallyRefused) => None,
            Self::AssociationRejected(_) => Some(BlockReason::AssociationRejection),
            Self::AssociationTimeout => Some(BlockReason::AssociationTimeout),
            Self::AuthenticationFailure(AuthFailureReason::WrongPassword) => {
                Some(BlockReason::WrongPassword)
            }
            Self::AuthenticationFailure(AuthFailureReason::EapFailure { .. }) => {
                Some(BlockReason::EapFailure)
            }
            Self::AuthenticationFailure(_) => Some(BlockReason::AuthenticationFailure),
            Self::Dhcp => Some(BlockReason::DhcpFailure),
            Self::Disconnection | Self::IpReachabilityLost | Self::RoamTimeout => {
                Some(BlockReason::AbnormalDisconnect)
            }
            Self::None | Self::NetworkNotFound | Self::IpClientStartupTimeout | Self::Cancelled => {
                None
            }
        }
    }

    /// The selection-status reason for this outcome, if the network's
    /// failure counters should move.
    pub fn disable_reason(self) -> Option<DisableReason> {
        match self {
            Self::AssociationRejected(AssocRejectReason::LocallyRefused) => None,
            Self::AssociationRejected(_) | Self::AssociationTimeout => {
                Some(DisableReason::AssociationRejection)
            }
            Self::AuthenticationFailure(AuthFailureReason::WrongPassword) => {
                Some(DisableReason::WrongPassword)
            }
            Self::AuthenticationFailure(AuthFailureReason::EapFailure { .. }) => {
                Some(DisableReason::EapFailure)
            }
            Self::AuthenticationFailure(_) => Some(DisableReason::AuthenticationFailure),
            Self::Dhcp => Some(DisableReason::DhcpFailure),
            Self::NetworkNotFound => Some(DisableReason::NetworkNotFound),
            Self::None
            | Self::IpReachabilityLost
            | Self::Disconnection
            | Self::RoamTimeout
            | Self::IpClientStartupTimeout
            | Self::Cancelled => None,
        }
    }
}
