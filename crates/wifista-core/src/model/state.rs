// ── Observable state enums ──

use serde::{Deserialize, Serialize};

/// Coarse connection state broadcast to observers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DetailedState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    Authenticating,
    ObtainingIpAddr,
    Connected,
    Disconnected,
}

/// Supplicant-level association state as reported by the driver.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SupplicantState {
    #[default]
    Disconnected,
    InterfaceDisabled,
    Inactive,
    Scanning,
    Authenticating,
    Associating,
    Associated,
    FourWayHandshake,
    GroupHandshake,
    Completed,
}

impl SupplicantState {
    /// The detailed state an observer should see for this supplicant state.
    pub fn detailed(self) -> DetailedState {
        match self {
            Self::Disconnected | Self::InterfaceDisabled | Self::Inactive => {
                DetailedState::Disconnected
            }
            Self::Scanning => DetailedState::Scanning,
            Self::Authenticating | Self::FourWayHandshake | Self::GroupHandshake => {
                DetailedState::Authenticating
            }
            Self::Associating | Self::Associated => DetailedState::Connecting,
            Self::Completed => DetailedState::ObtainingIpAddr,
        }
    }

    /// Is the supplicant in the middle of bringing up a link?
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            Self::Authenticating
                | Self::Associating
                | Self::Associated
                | Self::FourWayHandshake
                | Self::GroupHandshake
        )
    }
}

/// Role the interface plays for the rest of the system.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ClientRole {
    #[default]
    Primary,
    SecondaryTransient,
    SecondaryLongLived,
    LocalOnly,
}

impl ClientRole {
    pub fn is_primary(self) -> bool {
        matches!(self, Self::Primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supplicant_maps_to_detailed() {
        assert_eq!(SupplicantState::FourWayHandshake.detailed(), DetailedState::Authenticating);
        assert_eq!(SupplicantState::Completed.detailed(), DetailedState::ObtainingIpAddr);
        assert_eq!(SupplicantState::Inactive.detailed(), DetailedState::Disconnected);
        assert!(SupplicantState::Associated.is_connecting());
        assert!(!SupplicantState::Completed.is_connecting());
    }
}
