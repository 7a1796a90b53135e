//! Bundled scenario listing.

use serde::Serialize;
use tabled::Tabled;

use wifista_core::sim::Scenario;

use crate::cli::GlobalOpts;
use crate::error::{CliError, scenario_error};
use crate::output;

#[derive(Serialize)]
struct ScenarioSummary {
    name: String,
    description: String,
    networks: usize,
    steps: usize,
}

impl From<&Scenario> for ScenarioSummary {
    fn from(s: &Scenario) -> Self {
        Self {
            name: s.name.clone(),
            description: s.description.trim().to_owned(),
            networks: s.networks.len(),
            steps: s.steps.len(),
        }
    }
}

#[derive(Tabled)]
struct ScenarioRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Steps")]
    steps: usize,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&ScenarioSummary> for ScenarioRow {
    fn from(s: &ScenarioSummary) -> Self {
        Self {
            name: s.name.clone(),
            steps: s.steps,
            description: s.description.clone(),
        }
    }
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let summaries: Vec<ScenarioSummary> = Scenario::builtins()
        .map_err(|e| scenario_error("builtin", e))?
        .iter()
        .map(ScenarioSummary::from)
        .collect();
    let out = output::render_list(
        &global.output,
        &summaries,
        |s| ScenarioRow::from(s),
        |s| s.name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
