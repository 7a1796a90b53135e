//! State hierarchy display.

use serde::Serialize;
use strum::IntoEnumIterator;

use wifista_core::{StateId, StateTree};

use crate::cli::{GlobalOpts, StatesArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct StateEntry {
    state: StateId,
    parent: Option<StateId>,
    depth: usize,
    leaf: bool,
    active: bool,
}

pub fn handle(args: &StatesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let active = args.active.map(util::leaf_state);
    let entries: Vec<StateEntry> = StateId::iter()
        .map(|state| StateEntry {
            state,
            parent: state.parent(),
            depth: state.depth(),
            leaf: state.as_leaf().is_some(),
            active: active.is_some_and(|leaf| leaf.is_within(state)),
        })
        .collect();

    let tree = active.map_or_else(StateTree::new, StateTree::with_active);
    let out = output::render_single(
        &global.output,
        &entries,
        |_| tree.to_string().trim_end().to_owned(),
        |entries| {
            entries
                .iter()
                .map(|e| e.state.name())
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
