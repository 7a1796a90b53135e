// ── Domain model ──
//
// Value types shared by the state machine, its collaborators and the
// simulation harness. All are plain data; none hold references back
// into the machine.

pub mod address;
pub mod link;
pub mod network;
pub mod outcome;
pub mod state;

pub use address::{AddressError, Bssid, MacAddress, Ssid};
pub use link::{LinkAddress, LinkPropertiesSnapshot, Route, StaticIpConfig};
pub use network::{
    Credential, IpAssignment, NetworkId, NetworkIdentity, Requester, SecurityType, WorkSource,
};
pub use outcome::{
    AssocRejectReason, AttemptKind, AttemptOutcome, AttemptReport, AuthFailureReason,
    BlockReason, DisableReason,
};
pub use state::{ClientRole, DetailedState, SupplicantState};
