//! Config subcommand handlers.

use std::fmt::Write as _;

use dialoguer::{Confirm, Input, Select};
use serde::Serialize;
use tabled::Tabled;

use wifista_config::{
    self as config, Config, ConfigError, Defaults, NetworkProfile, SavedNetworks,
};
use wifista_core::SecurityType;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util::{self, prompt_err};

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking passphrases.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref iface) = cfg.default_interface {
        let _ = writeln!(out, "default_interface = \"{iface}\"");
    }
    let d = &cfg.defaults;
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", d.output);
    let _ = writeln!(out, "color = \"{}\"", d.color);
    let _ = writeln!(out, "connecting_watchdog_secs = {}", d.connecting_watchdog_secs);
    let _ = writeln!(out, "roam_watchdog_secs = {}", d.roam_watchdog_secs);
    let _ = writeln!(out, "ip_startup_timeout_millis = {}", d.ip_startup_timeout_millis);
    let _ = writeln!(out, "ip_shutdown_timeout_secs = {}", d.ip_shutdown_timeout_secs);
    let _ = writeln!(out, "reachability_policy = \"{}\"", d.reachability_policy);
    let _ = writeln!(out, "busy_ap_block_secs = {}", d.busy_ap_block_secs);
    let _ = writeln!(out, "network_not_found_threshold = {}", d.network_not_found_threshold);
    let _ = writeln!(out, "rssi_poll_interval_millis = {}", d.rssi_poll_interval_millis);
    let _ = writeln!(out, "fast_connect = {}", d.fast_connect);

    let mut names: Vec<_> = cfg.interfaces.keys().collect();
    names.sort();
    for name in names {
        let i = &cfg.interfaces[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[interfaces.{name}]");
        if let Some(v) = i.connecting_watchdog_secs {
            let _ = writeln!(out, "connecting_watchdog_secs = {v}");
        }
        if let Some(v) = i.roam_watchdog_secs {
            let _ = writeln!(out, "roam_watchdog_secs = {v}");
        }
        if let Some(v) = i.ip_startup_timeout_millis {
            let _ = writeln!(out, "ip_startup_timeout_millis = {v}");
        }
        if let Some(v) = i.ip_shutdown_timeout_secs {
            let _ = writeln!(out, "ip_shutdown_timeout_secs = {v}");
        }
        if let Some(ref v) = i.reachability_policy {
            let _ = writeln!(out, "reachability_policy = \"{v}\"");
        }
        if let Some(v) = i.busy_ap_block_secs {
            let _ = writeln!(out, "busy_ap_block_secs = {v}");
        }
        if let Some(v) = i.network_not_found_threshold {
            let _ = writeln!(out, "network_not_found_threshold = {v}");
        }
        if let Some(v) = i.rssi_poll_interval_millis {
            let _ = writeln!(out, "rssi_poll_interval_millis = {v}");
        }
        if let Some(v) = i.fast_connect {
            let _ = writeln!(out, "fast_connect = {v}");
        }
    }

    for (name, n) in &cfg.networks {
        let _ = writeln!(out);
        let _ = writeln!(out, "[networks.{name}]");
        let _ = writeln!(out, "id = {}", n.id);
        let _ = writeln!(out, "ssid = \"{}\"", n.ssid);
        let _ = writeln!(out, "security = \"{}\"", n.security);
        if n.passphrase.is_some() {
            let _ = writeln!(out, "passphrase = \"****\"");
        }
        if let Some(ref env) = n.passphrase_env {
            let _ = writeln!(out, "passphrase_env = \"{env}\"");
        }
        if let Some(ref identity) = n.eap_identity {
            let _ = writeln!(out, "eap_identity = \"{identity}\"");
        }
        if n.static_ip.is_some() {
            let _ = writeln!(out, "static_ip = {{ ... }}");
        }
        if n.hidden {
            let _ = writeln!(out, "hidden = true");
        }
    }

    out.trim_end().to_owned()
}

/// Structured view of the config with passphrases masked.
fn redacted_value(cfg: &Config) -> Result<serde_json::Value, CliError> {
    let mut value = serde_json::to_value(cfg).map_err(|e| CliError::Serialize(e.to_string()))?;
    if let Some(networks) = value
        .get_mut("networks")
        .and_then(serde_json::Value::as_object_mut)
    {
        for secret in networks
            .values_mut()
            .filter_map(|network| network.get_mut("passphrase"))
            .filter(|secret| !secret.is_null())
        {
            *secret = serde_json::Value::String("****".into());
        }
    }
    Ok(value)
}

fn security_choice(index: usize) -> SecurityType {
    match index {
        1 => SecurityType::Psk,
        2 => SecurityType::Sae,
        3 => SecurityType::Eap,
        _ => SecurityType::Open,
    }
}

/// Offer to store a passphrase in the system keyring or return it for
/// plaintext config. `None` means it went to the keyring.
fn prompt_passphrase_storage(network: &str, passphrase: String) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the passphrase?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        config::store_passphrase(network, &passphrase)?;
        eprintln!("   ✓ Passphrase stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(passphrase))
    }
}

fn prompt_network() -> Result<(String, NetworkProfile), CliError> {
    let name: String = Input::new()
        .with_prompt("Network name")
        .default("home".into())
        .interact_text()
        .map_err(prompt_err)?;
    let ssid: String = Input::new()
        .with_prompt("SSID")
        .interact_text()
        .map_err(prompt_err)?;
    let id: u32 = Input::new()
        .with_prompt("Network id")
        .default(1)
        .interact_text()
        .map_err(prompt_err)?;

    let security = security_choice(
        Select::new()
            .with_prompt("Security")
            .items(&["Open", "WPA2-Personal (PSK)", "WPA3-Personal (SAE)", "Enterprise (EAP)"])
            .default(1)
            .interact()
            .map_err(prompt_err)?,
    );

    let mut profile = NetworkProfile {
        id,
        ssid,
        security,
        passphrase: None,
        passphrase_env: None,
        eap_identity: None,
        static_ip: None,
        hidden: false,
    };
    match security {
        SecurityType::Open => {}
        SecurityType::Psk | SecurityType::Sae => {
            let passphrase = rpassword::prompt_password("Passphrase: ").map_err(prompt_err)?;
            if passphrase.len() < 8 {
                return Err(CliError::Validation {
                    field: "passphrase".into(),
                    reason: "must be at least 8 characters".into(),
                });
            }
            profile.passphrase = prompt_passphrase_storage(&name, passphrase)?;
        }
        SecurityType::Eap => {
            let identity: String = Input::new()
                .with_prompt("EAP identity")
                .interact_text()
                .map_err(prompt_err)?;
            profile.eap_identity = Some(identity);
        }
    }
    Ok((name, profile))
}

// ── Validation report ───────────────────────────────────────────────

#[derive(Serialize)]
struct NetworkCheck {
    name: String,
    id: u32,
    ssid: String,
    security: SecurityType,
    usable: bool,
    problem: Option<String>,
}

#[derive(Tabled)]
struct NetworkCheckRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: u32,
    #[tabled(rename = "SSID")]
    ssid: String,
    #[tabled(rename = "Security")]
    security: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&NetworkCheck> for NetworkCheckRow {
    fn from(c: &NetworkCheck) -> Self {
        Self {
            name: c.name.clone(),
            id: c.id,
            ssid: c.ssid.clone(),
            security: c.security.to_string(),
            status: c.problem.clone().unwrap_or_else(|| "ok".into()),
        }
    }
}

fn check_networks(cfg: &Config) -> Vec<NetworkCheck> {
    cfg.networks
        .iter()
        .map(|(name, profile)| {
            let problem = match profile.identity(name) {
                Ok(_) => None,
                Err(ConfigError::NoCredentials { .. }) => Some("no credentials".to_owned()),
                Err(e) => Some(e.to_string()),
            };
            NetworkCheck {
                name: name.clone(),
                id: profile.id,
                ssid: profile.ssid.clone(),
                security: profile.security,
                usable: problem.is_none(),
                problem,
            }
        })
        .collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            if config_path.exists()
                && !util::confirm(
                    &format!("Overwrite {}?", config_path.display()),
                    global.yes,
                )?
            {
                return Err(CliError::ConfigExists {
                    path: config_path.display().to_string(),
                });
            }
            eprintln!("✨ wifista — configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let interface: String = Input::new()
                .with_prompt("Station interface")
                .default("wlan0".into())
                .interact_text()
                .map_err(prompt_err)?;

            let policy = Select::new()
                .with_prompt("When the network stops being reachable")
                .items(&["Disconnect", "Keep the link and provision IP again"])
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            let fast_connect = Confirm::new()
                .with_prompt("Start DHCP before association completes (fast connect)?")
                .default(false)
                .interact()
                .map_err(prompt_err)?;

            let mut cfg = Config {
                default_interface: Some(interface),
                defaults: Defaults {
                    reachability_policy: if policy == 0 {
                        "disconnect".into()
                    } else {
                        "reprovision".into()
                    },
                    fast_connect,
                    ..Defaults::default()
                },
                ..Config::default()
            };

            let add_network = Confirm::new()
                .with_prompt("Add a saved network now?")
                .default(true)
                .interact()
                .map_err(prompt_err)?;
            if add_network {
                let (name, profile) = prompt_network()?;
                cfg.networks.insert(name, profile);
            }

            cfg.validate()?;
            config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("\n  Try it: wifista simulate --builtin round-trip");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let value = redacted_value(&cfg)?;
            let out = output::render_single(
                &global.output,
                &value,
                |_| format_config_redacted(&cfg),
                |_| config::config_path().display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        // ── Validate ────────────────────────────────────────────────
        ConfigCommand::Validate => {
            let cfg = config::load_config()?;
            cfg.validate()?;
            let runtime = cfg.client_mode_config(global.interface.as_deref())?;
            let checks = check_networks(&cfg);
            let saved = SavedNetworks::from_config(&cfg)?;

            let out = output::render_list(
                &global.output,
                &checks,
                |c| NetworkCheckRow::from(c),
                |c| c.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            if !global.quiet {
                eprintln!(
                    "✓ Configuration valid for {} ({} of {} saved networks usable)",
                    runtime.interface_name,
                    saved.len(),
                    checks.len()
                );
            }
            Ok(())
        }

        // ── SetPassphrase ───────────────────────────────────────────
        ConfigCommand::SetPassphrase { network } => {
            let cfg = config::load_config_or_default();
            let profile = cfg.networks.get(&network).ok_or_else(|| {
                let available: Vec<_> = cfg.networks.keys().cloned().collect();
                CliError::SavedNetworkNotFound {
                    name: network.clone(),
                    available: if available.is_empty() {
                        "(none)".into()
                    } else {
                        available.join(", ")
                    },
                }
            })?;
            if profile.security == SecurityType::Open || profile.security == SecurityType::Eap {
                return Err(CliError::Validation {
                    field: "security".into(),
                    reason: format!("'{network}' is {} and takes no passphrase", profile.security),
                });
            }

            let passphrase = rpassword::prompt_password("Passphrase: ").map_err(prompt_err)?;
            if passphrase.is_empty() {
                return Err(CliError::Validation {
                    field: "passphrase".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            config::store_passphrase(&network, &passphrase)?;
            eprintln!("✓ Passphrase stored in system keyring for network '{network}'");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Config {
        let mut cfg = Config::default();
        cfg.networks.insert(
            "home".into(),
            NetworkProfile {
                id: 5,
                ssid: "home".into(),
                security: SecurityType::Psk,
                passphrase: Some("correct-horse".into()),
                passphrase_env: None,
                eap_identity: None,
                static_ip: None,
                hidden: false,
            },
        );
        cfg
    }

    #[test]
    fn redacted_formats_hide_passphrases() {
        let cfg = sample();
        let text = format_config_redacted(&cfg);
        assert!(text.contains("[networks.home]"), "{text}");
        assert!(!text.contains("correct-horse"), "{text}");

        let value = redacted_value(&cfg).unwrap();
        assert_eq!(value["networks"]["home"]["passphrase"], "****");
        assert_eq!(value["defaults"]["reachability_policy"], "disconnect");
    }

    #[test]
    fn open_network_checks_as_usable() {
        let mut cfg = Config::default();
        cfg.networks.insert(
            "cafe".into(),
            NetworkProfile {
                id: 6,
                ssid: "Cafe".into(),
                security: SecurityType::Open,
                passphrase: None,
                passphrase_env: None,
                eap_identity: None,
                static_ip: None,
                hidden: false,
            },
        );
        let checks = check_networks(&cfg);
        assert_eq!(checks.len(), 1);
        assert!(checks[0].usable);

        let mut eap = cfg;
        eap.networks.get_mut("cafe").unwrap().security = SecurityType::Eap;
        let checks = check_networks(&eap);
        assert_eq!(checks[0].problem.as_deref(), Some("no credentials"));
    }
}
