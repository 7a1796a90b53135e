//! Scenario runs against the simulated station.

use std::fmt::Write as _;

use tabled::Tabled;
use tracing::{debug, info};

use wifista_config::{self as config, SavedNetworks};
use wifista_core::sim::{Call, Scenario, Trace, TraceCommand, TraceTransition};
use wifista_core::sim::{run_scenario, run_scenario_with_fallback};

use crate::cli::{GlobalOpts, OutputFormat, SimulateArgs};
use crate::error::{CliError, scenario_error};
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct TransitionRow {
    #[tabled(rename = "Step")]
    step: usize,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Detailed")]
    detailed: String,
}

impl TransitionRow {
    fn new(t: &TraceTransition, color: bool) -> Self {
        Self {
            step: t.step,
            from: output::paint_state(t.from, color),
            to: output::paint_state(t.to, color),
            detailed: t.detailed.to_string(),
        }
    }
}

#[derive(Tabled)]
struct CommandRow {
    #[tabled(rename = "Step")]
    step: usize,
    #[tabled(rename = "Command")]
    command: &'static str,
    #[tabled(rename = "Result")]
    result: String,
}

impl CommandRow {
    fn new(c: &TraceCommand, color: bool) -> Self {
        let result = if c.result.starts_with("error") {
            output::paint_failure(&c.result, color)
        } else {
            c.result.clone()
        };
        Self {
            step: c.step,
            command: c.command,
            result,
        }
    }
}

#[derive(Tabled)]
struct CallRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Call")]
    call: String,
    #[tabled(rename = "Details")]
    details: String,
}

/// Split a serialized call into its tag and `key=value` details.
fn call_row(index: usize, call: &Call) -> CallRow {
    let value = serde_json::to_value(call).unwrap_or_default();
    let mut kind = String::new();
    let mut details = Vec::new();
    if let serde_json::Value::Object(fields) = value {
        for (key, field) in fields {
            if key == "call" {
                kind = field.as_str().unwrap_or_default().to_owned();
            } else {
                let field = match field {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                details.push(format!("{key}={field}"));
            }
        }
    }
    CallRow {
        index,
        call: kind,
        details: details.join(" "),
    }
}

// ── Rendering ───────────────────────────────────────────────────────

fn render_trace(trace: &Trace, show_calls: bool, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Scenario: {}", trace.scenario);

    let transitions: Vec<_> = trace
        .transitions
        .iter()
        .map(|t| TransitionRow::new(t, color))
        .collect();
    let _ = writeln!(out, "{}", output::render_table(&transitions));

    if !trace.commands.is_empty() {
        let commands: Vec<_> = trace
            .commands
            .iter()
            .map(|c| CommandRow::new(c, color))
            .collect();
        let _ = writeln!(out, "{}", output::render_table(&commands));
    }

    if show_calls {
        let calls: Vec<_> = trace
            .calls
            .iter()
            .enumerate()
            .map(|(i, call)| call_row(i + 1, call))
            .collect();
        let _ = writeln!(out, "{}", output::render_table(&calls));
    }

    let last = &trace.final_state;
    let _ = write!(
        out,
        "Final state: {} ({})",
        output::paint_state(last.state, color),
        last.detailed
    );
    if let Some(network) = last.last_network_id {
        let _ = write!(out, ", last network {network}");
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

fn load_scenario(args: &SimulateArgs) -> Result<Scenario, CliError> {
    let scenario = match (&args.builtin, &args.file) {
        (Some(name), _) => Scenario::builtin(name),
        (None, Some(path)) => Scenario::from_yaml(&util::read_text(path)?),
        (None, None) => {
            return Err(CliError::Validation {
                field: "scenario".into(),
                reason: "give a scenario file or --builtin NAME".into(),
            });
        }
    };
    let label = args
        .builtin
        .clone()
        .or_else(|| args.file.as_ref().map(|p| p.display().to_string()))
        .unwrap_or_default();
    scenario.map_err(|e| scenario_error(&label, e))
}

pub fn handle(args: &SimulateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut scenario = load_scenario(args)?;
    if let Some(policy) = args.policy {
        scenario.policy = Some(util::policy(policy));
    }
    if args.fast_connect {
        scenario.fast_connect = Some(true);
    }

    let cfg = config::load_config_or_default();
    let base = cfg.client_mode_config(global.interface.as_deref())?;
    debug!(interface = %base.interface_name, scenario = %scenario.name, "simulating");

    let saved = if args.no_saved {
        SavedNetworks::default()
    } else {
        SavedNetworks::from_config(&cfg)?
    };
    let result = if saved.is_empty() {
        run_scenario(&scenario, &base)
    } else {
        info!(networks = saved.len(), "saved networks available to the scenario");
        run_scenario_with_fallback(&scenario, &base, Box::new(saved))
    };
    let trace = result.map_err(|e| scenario_error(&scenario.name, e))?;

    let color = output::should_color(&global.color);
    let out = match global.output {
        OutputFormat::Table => render_trace(&trace, args.calls, color),
        _ => output::render_single(
            &global.output,
            &trace,
            |_| String::new(),
            |t| t.final_state.state.to_string(),
        )?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wifista_core::{Bssid, NetworkId};

    use super::*;

    #[test]
    fn call_rows_split_tag_from_fields() {
        let row = call_row(
            3,
            &Call::RadioConnect {
                network_id: NetworkId(5),
                bssid: Bssid::Any,
            },
        );
        assert_eq!(row.index, 3);
        assert_eq!(row.call, "radio-connect");
        assert!(row.details.contains("network_id=5"), "{}", row.details);
        assert!(row.details.contains("bssid=any"), "{}", row.details);
    }

    #[test]
    fn plain_trace_summary_names_the_final_state() {
        let scenario = Scenario::builtin("round-trip").unwrap();
        let trace = run_scenario(&scenario, &wifista_core::ClientModeConfig::default()).unwrap();
        let text = render_trace(&trace, true, false);
        assert!(text.starts_with("Scenario: round-trip"), "{text}");
        assert!(text.contains("l3-connected"), "{text}");
        assert!(text.contains("ip-create"), "{text}");
        assert!(text.ends_with("Final state: disconnected (disconnected)"), "{text}");
    }
}
