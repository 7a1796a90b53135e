//! Client-mode connection state machine for a single wireless station
//! interface.
//!
//! - **[`StateMachine`]**: the synchronous hierarchical machine. One
//!   [`Event`] in, zero or more collaborator calls and state transitions
//!   out. Owns the [`ConnectionContext`] and the IP-coordinator session
//!   lifecycle ([`IpClientLifecycle`]).
//!
//! - **[`StationController`]**: runs a machine on its own task behind an
//!   unbounded FIFO queue. Collaborators post callbacks through an
//!   [`EventSink`]; observers use [`watch()`](StationController::watch)
//!   for the latest [`StationSnapshot`] or
//!   [`changes()`](StationController::changes) for every [`StateChange`].
//!
//! - **Collaborators** ([`service`]): the radio, IP coordinator, network
//!   agent presenter, selection, blocklist and network configuration are
//!   traits. The machine never blocks on them.
//!
//! - **Simulation** ([`sim`]): in-memory collaborators, a manual clock
//!   and a YAML scenario runner for deterministic runs.

pub mod command;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod event;
pub mod ip;
pub mod machine;
pub mod model;
pub mod service;
pub mod sim;
pub mod stream;
pub mod watchdog;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult, DisconnectReason};
pub use config::{ClientModeConfig, ReachabilityPolicy};
pub use context::{Attempt, ConnectionContext};
pub use controller::StationController;
pub use error::{CoreError, RadioError};
pub use event::{
    AgentEvent, AgentEventKind, Event, EventSink, IpEvent, IpEventKind, RadioEvent,
    ReachabilityLossReason, TimerEvent, TimerKind,
};
pub use ip::{
    IpClientLifecycle, ProvisioningMode, ProvisioningRequest, ProvisioningRun, SessionToken,
};
pub use machine::{LeafState, StateChange, StateId, StateMachine, StateTree, StationSnapshot};
pub use service::{
    AgentInfo, AgentToken, Blocklist, Collaborators, IpProvisioner, NetworkConfigStore,
    NetworkPresenter, RadioDriver, SelectionService, SignalPoll,
};
pub use stream::{SnapshotStream, StateChangeStream};
pub use watchdog::{TimerService, TokioTimers, Watchdog};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    AssocRejectReason, AttemptKind, AttemptOutcome, AttemptReport, AuthFailureReason,
    BlockReason, Bssid, ClientRole, Credential, DetailedState, DisableReason, IpAssignment,
    LinkAddress, LinkPropertiesSnapshot, MacAddress, NetworkId, NetworkIdentity, Requester,
    Route, SecurityType, Ssid, StaticIpConfig, SupplicantState, WorkSource,
};
