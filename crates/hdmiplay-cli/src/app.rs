use std::io::{self, Write};
use std::thread;

use clap::CommandFactory;
use serde::Serialize;
use tracing::debug;

use hdmiplay_core::{AppConfig, LaunchError, Launcher, Session};
use hdmiplay_detect::{find_connector, list_system_connectors, Connector, ToolConnectors};

use crate::cli::Cli;

pub const EXIT_USAGE: u8 = 1;
pub const EXIT_VIDEO_NOT_FOUND: u8 = 2;
pub const EXIT_PLAYBACK_FAILED: u8 = 3;

/// Run one invocation, writing the user-facing report to `out`.
/// Returns the process exit code.
pub fn run(cli: &Cli, config: &AppConfig, out: &mut dyn Write) -> io::Result<u8> {
    if cli.list_connectors {
        list_connectors(config, cli.json, out)?;
        return Ok(0);
    }

    let Some(video) = cli.video.as_deref() else {
        writeln!(out, "{}", Cli::command().render_help())?;
        return Ok(EXIT_USAGE);
    };

    if !video.exists() {
        writeln!(out, "video not found: {}", video.display())?;
        return Ok(EXIT_VIDEO_NOT_FOUND);
    }

    match cli.connector_id {
        Some(id) => prepare_connector(config, id, cli.force_mode, out)?,
        None if cli.force_mode => writeln!(out, "--force-mode needs --connector-id; ignoring it.")?,
        None => {}
    }

    let candidates = cli.backend.selection().candidates(&config.backends.order);
    debug!(?candidates, "Backend candidates");

    match Launcher::from_config(config).launch(video, &candidates, cli.detach) {
        Ok(outcome) => match outcome.session {
            Session::Detached(player) => {
                writeln!(
                    out,
                    "{} started (pid {}) with backend {} detached; you can safely close the SSH session.",
                    config.player.executable, player.pid, outcome.backend
                )?;
                Ok(0)
            }
            Session::Finished { exit_code: Some(0) } => Ok(0),
            Session::Finished { exit_code } => {
                // Passed through as-is; it can overlap our own 1-3.
                match exit_code {
                    Some(code) => writeln!(
                        out,
                        "{} exited with code {code} (backend {}).",
                        config.player.executable, outcome.backend
                    )?,
                    None => writeln!(
                        out,
                        "{} was terminated by a signal (backend {}).",
                        config.player.executable, outcome.backend
                    )?,
                }
                Ok(exit_code.and_then(|c| u8::try_from(c).ok()).unwrap_or(1))
            }
        },
        Err(e @ LaunchError::ExecutableMissing(_)) => {
            writeln!(out, "{e}")?;
            Ok(EXIT_PLAYBACK_FAILED)
        }
        Err(LaunchError::AllBackendsFailed { attempts }) => {
            writeln!(out, "all backends failed to start {}.", config.player.executable)?;
            if let Some(last) = attempts.last() {
                writeln!(out, "last error: {last}")?;
            }
            Ok(EXIT_PLAYBACK_FAILED)
        }
    }
}

#[derive(Serialize)]
struct Inventory<'a> {
    sysfs: &'a [Connector],
    tool: Option<&'a [Connector]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_unavailable: Option<&'a str>,
}

fn list_connectors(config: &AppConfig, json: bool, out: &mut dyn Write) -> io::Result<()> {
    let root = &config.sysfs.root;
    let sysfs = list_system_connectors(root);
    let tool = config.mode_tool().list_connectors();

    if json {
        let inventory = Inventory {
            sysfs: &sysfs,
            tool: tool.connectors(),
            tool_unavailable: match &tool {
                ToolConnectors::Unavailable(reason) => Some(reason.as_str()),
                ToolConnectors::Listed(_) => None,
            },
        };
        serde_json::to_writer_pretty(&mut *out, &inventory)?;
        writeln!(out)?;
        return Ok(());
    }

    if sysfs.is_empty() {
        writeln!(out, "no {} connectors found.", root.display())?;
    } else {
        writeln!(out, "sysfs DRM connectors ({}):", root.display())?;
        for c in &sysfs {
            writeln!(
                out,
                "  {:20} status={:12} mode={}",
                c.id.to_string(),
                c.status.as_str(),
                c.first_mode().unwrap_or("-")
            )?;
        }
    }

    writeln!(out)?;
    match &tool {
        ToolConnectors::Listed(connectors) => {
            writeln!(out, "{} connectors (ids):", config.mode_tool.executable)?;
            for c in connectors {
                let modes: Vec<&str> = c.modes.iter().take(3).map(String::as_str).collect();
                writeln!(
                    out,
                    "  id={:>3}  type={:8}  status={:12}  modes=[{}]",
                    c.id.to_string(),
                    c.kind.as_deref().unwrap_or("?"),
                    c.status.as_str(),
                    modes.join(", ")
                )?;
            }
        }
        ToolConnectors::Unavailable(reason) => {
            writeln!(
                out,
                "{} not available or parsing failed ({reason}); install libdrm-tests to get connector ids (optional).",
                config.mode_tool.executable
            )?;
        }
    }

    Ok(())
}

/// Report on `--connector-id` and optionally force its first mode.
/// Nothing here stops playback; the OS may already route output correctly.
fn prepare_connector(
    config: &AppConfig,
    id: u32,
    force_mode: bool,
    out: &mut dyn Write,
) -> io::Result<()> {
    let tool = config.mode_tool();
    let listed = tool.list_connectors();
    let Some(connectors) = listed.connectors() else {
        writeln!(
            out,
            "{} not available or could not parse connectors. Install libdrm-tests and re-run.",
            tool.executable
        )?;
        writeln!(
            out,
            "You can still try to play; the OS may already route output to the correct HDMI."
        )?;
        return Ok(());
    };

    let Some(connector) = find_connector(connectors, id) else {
        writeln!(out, "connector id {id} not listed by {}.", tool.executable)?;
        return Ok(());
    };

    if !connector.is_connected() {
        writeln!(
            out,
            "connector id {id} status={}; forcing mode may still enable it.",
            connector.status
        )?;
    }

    let Some(mode) = connector.first_mode() else {
        writeln!(out, "connector id {id} has no reported modes; cannot set.")?;
        return Ok(());
    };
    writeln!(out, "connector {id} first mode: {mode}")?;

    if !force_mode {
        writeln!(
            out,
            "pass --force-mode to call {} and set the mode before playing.",
            tool.executable
        )?;
        return Ok(());
    }

    writeln!(out, "attempting to set mode via {}...", tool.executable)?;
    match tool.set_mode(id, mode) {
        Ok(()) => {
            writeln!(out, "mode set returned (should be visible on HDMI).")?;
            thread::sleep(config.settle_time());
        }
        Err(e) => writeln!(out, "could not set mode: {e}")?,
    }

    Ok(())
}
