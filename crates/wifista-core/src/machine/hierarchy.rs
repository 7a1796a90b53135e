// ── State hierarchy ──
//
// Connectable
// ├── ConnectingOrConnected
// │   ├── L2Connecting
// │   └── L2Connected
// │       ├── WaitBeforeL3Provisioning
// │       ├── L3Provisioning
// │       ├── L3Connected
// │       └── Roaming
// └── Disconnected
//
// The machine is always in exactly one `LeafState`. Interior states
// exist only as links in a leaf's ancestor chain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::model::DetailedState;

/// Every node of the hierarchy, interior or leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
#[serde(rename_all = "kebab-case")]
pub enum StateId {
    Connectable,
    ConnectingOrConnected,
    L2Connecting,
    L2Connected,
    WaitBeforeL3Provisioning,
    L3Provisioning,
    L3Connected,
    Roaming,
    Disconnected,
}

impl StateId {
    pub fn name(self) -> &'static str {
        match self {
            Self::Connectable => "connectable",
            Self::ConnectingOrConnected => "connecting-or-connected",
            Self::L2Connecting => "l2-connecting",
            Self::L2Connected => "l2-connected",
            Self::WaitBeforeL3Provisioning => "wait-before-l3-provisioning",
            Self::L3Provisioning => "l3-provisioning",
            Self::L3Connected => "l3-connected",
            Self::Roaming => "roaming",
            Self::Disconnected => "disconnected",
        }
    }

    pub fn parent(self) -> Option<StateId> {
        match self {
            Self::Connectable => None,
            Self::ConnectingOrConnected | Self::Disconnected => Some(Self::Connectable),
            Self::L2Connecting | Self::L2Connected => Some(Self::ConnectingOrConnected),
            Self::WaitBeforeL3Provisioning
            | Self::L3Provisioning
            | Self::L3Connected
            | Self::Roaming => Some(Self::L2Connected),
        }
    }

    /// Direct children, in display order.
    pub fn children(self) -> &'static [StateId] {
        match self {
            Self::Connectable => &[Self::ConnectingOrConnected, Self::Disconnected],
            Self::ConnectingOrConnected => &[Self::L2Connecting, Self::L2Connected],
            Self::L2Connected => &[
                Self::WaitBeforeL3Provisioning,
                Self::L3Provisioning,
                Self::L3Connected,
                Self::Roaming,
            ],
            Self::L2Connecting
            | Self::WaitBeforeL3Provisioning
            | Self::L3Provisioning
            | Self::L3Connected
            | Self::Roaming
            | Self::Disconnected => &[],
        }
    }

    /// This state followed by each ancestor up to the root.
    pub fn chain(self) -> Chain {
        Chain { next: Some(self) }
    }

    pub fn depth(self) -> usize {
        self.chain().count() - 1
    }

    /// Is `self` equal to `ancestor` or nested somewhere below it?
    pub fn is_within(self, ancestor: StateId) -> bool {
        self.chain().any(|state| state == ancestor)
    }

    /// Deepest state that contains both `self` and `other`.
    pub fn common_ancestor(self, other: StateId) -> StateId {
        self.chain()
            .find(|candidate| other.is_within(*candidate))
            .unwrap_or(Self::Connectable)
    }

    pub fn as_leaf(self) -> Option<LeafState> {
        match self {
            Self::L2Connecting => Some(LeafState::L2Connecting),
            Self::WaitBeforeL3Provisioning => Some(LeafState::WaitBeforeL3Provisioning),
            Self::L3Provisioning => Some(LeafState::L3Provisioning),
            Self::L3Connected => Some(LeafState::L3Connected),
            Self::Roaming => Some(LeafState::Roaming),
            Self::Disconnected => Some(LeafState::Disconnected),
            Self::Connectable | Self::ConnectingOrConnected | Self::L2Connected => None,
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Iterator over a state and its ancestors, innermost first.
#[derive(Debug, Clone)]
pub struct Chain {
    next: Option<StateId>,
}

impl Iterator for Chain {
    type Item = StateId;

    fn next(&mut self) -> Option<StateId> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

// ── Leaf states ─────────────────────────────────────────────────────

/// The states the machine can actually rest in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
pub enum LeafState {
    L2Connecting,
    WaitBeforeL3Provisioning,
    L3Provisioning,
    L3Connected,
    Roaming,
    #[default]
    Disconnected,
}

impl LeafState {
    pub fn id(self) -> StateId {
        match self {
            Self::L2Connecting => StateId::L2Connecting,
            Self::WaitBeforeL3Provisioning => StateId::WaitBeforeL3Provisioning,
            Self::L3Provisioning => StateId::L3Provisioning,
            Self::L3Connected => StateId::L3Connected,
            Self::Roaming => StateId::Roaming,
            Self::Disconnected => StateId::Disconnected,
        }
    }

    pub fn name(self) -> &'static str {
        self.id().name()
    }

    /// Ancestor chain from this leaf to the root.
    pub fn chain(self) -> Chain {
        self.id().chain()
    }

    pub fn is_within(self, ancestor: StateId) -> bool {
        self.id().is_within(ancestor)
    }

    /// Detailed state observers see on entry, before supplicant refinement.
    pub fn detailed(self) -> DetailedState {
        match self {
            Self::L2Connecting => DetailedState::Connecting,
            Self::WaitBeforeL3Provisioning | Self::L3Provisioning => {
                DetailedState::ObtainingIpAddr
            }
            Self::L3Connected | Self::Roaming => DetailedState::Connected,
            Self::Disconnected => DetailedState::Disconnected,
        }
    }
}

impl fmt::Display for LeafState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LeafState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::iter()
            .find(|leaf| leaf.name() == s)
            .ok_or_else(|| UnknownState(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown leaf state '{0}'")]
pub struct UnknownState(pub String);

// ── Rendering ───────────────────────────────────────────────────────

/// Box-drawing rendering of the hierarchy, optionally marking the
/// active leaf and its ancestors.
pub struct StateTree {
    active: Option<LeafState>,
}

impl StateTree {
    pub fn new() -> Self {
        Self { active: None }
    }

    pub fn with_active(active: LeafState) -> Self {
        Self {
            active: Some(active),
        }
    }

    fn render(
        &self,
        f: &mut fmt::Formatter<'_>,
        state: StateId,
        prefix: &str,
        last: bool,
        root: bool,
    ) -> fmt::Result {
        let marker = match self.active {
            Some(leaf) if leaf.id() == state => " *",
            Some(leaf) if leaf.is_within(state) => " +",
            _ => "",
        };
        if root {
            writeln!(f, "{state}{marker}")?;
        } else {
            let branch = if last { "└── " } else { "├── " };
            writeln!(f, "{prefix}{branch}{state}{marker}")?;
        }

        let child_prefix = if root {
            String::new()
        } else if last {
            format!("{prefix}    ")
        } else {
            format!("{prefix}│   ")
        };
        let children = state.children();
        for (idx, child) in children.iter().enumerate() {
            self.render(f, *child, &child_prefix, idx + 1 == children.len(), false)?;
        }
        Ok(())
    }
}

impl Default for StateTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, StateId::Connectable, "", true, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_leaf_chain_ends_at_root() {
        for leaf in LeafState::iter() {
            let chain: Vec<_> = leaf.chain().collect();
            assert_eq!(chain.first(), Some(&leaf.id()));
            assert_eq!(chain.last(), Some(&StateId::Connectable));
            assert_eq!(leaf.id().as_leaf(), Some(leaf));
        }
    }

    #[test]
    fn parent_and_children_agree() {
        for state in StateId::iter() {
            for child in state.children() {
                assert_eq!(child.parent(), Some(state));
            }
            assert_eq!(state.children().is_empty(), state.as_leaf().is_some());
        }
    }

    #[test]
    fn common_ancestor_of_siblings() {
        assert_eq!(
            StateId::Roaming.common_ancestor(StateId::L3Connected),
            StateId::L2Connected
        );
        assert_eq!(
            StateId::L2Connecting.common_ancestor(StateId::L3Provisioning),
            StateId::ConnectingOrConnected
        );
        assert_eq!(
            StateId::Disconnected.common_ancestor(StateId::Roaming),
            StateId::Connectable
        );
        assert_eq!(
            StateId::L3Connected.common_ancestor(StateId::L3Connected),
            StateId::L3Connected
        );
    }

    #[test]
    fn leaf_names_parse_back() {
        for leaf in LeafState::iter() {
            assert_eq!(leaf.name().parse::<LeafState>(), Ok(leaf));
        }
        assert!("l2-connected".parse::<LeafState>().is_err());
    }

    #[test]
    fn roaming_is_four_levels_deep() {
        assert_eq!(StateId::Roaming.depth(), 3);
        assert_eq!(StateId::Connectable.depth(), 0);
    }

    #[test]
    fn tree_rendering() {
        insta::assert_snapshot!(StateTree::with_active(LeafState::Roaming).to_string(), @r"
        connectable +
        ├── connecting-or-connected +
        │   ├── l2-connecting
        │   └── l2-connected +
        │       ├── wait-before-l3-provisioning
        │       ├── l3-provisioning
        │       ├── l3-connected
        │       └── roaming *
        └── disconnected
        ");
    }
}
