//! Command handlers: CLI args -> scenario runs / config -> output formatting.

pub mod completions;
pub mod config_cmd;
pub mod scenarios;
pub mod simulate;
pub mod states;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a parsed command to its handler.
pub fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Simulate(args) => simulate::handle(&args, global),
        Command::Scenarios => scenarios::handle(global),
        Command::States(args) => states::handle(&args, global),
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(args) => {
            completions::handle(&args);
            Ok(())
        }
    }
}
