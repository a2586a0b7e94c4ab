//! Mode-listing tool integration (libdrm's `modetest`).
//!
//! The `-c` report is an unversioned text layout, so all knowledge of it lives
//! in [`parse`]. Everything else only deals in [`Connector`] values.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::{Connector, ConnectorId, ConnectorStatus};

/// `<id> <encoder> <status> <type> ...`
static RE_CONNECTOR_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+(\d+)\s+(\w+)\s+(\S+)").unwrap());

/// Mode line, optionally prefixed by an index token as newer releases print.
static RE_MODE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:#\d+\s+)?(\d+x\d+)").unwrap());

/// Result of asking the tool for its connector list.
#[derive(Debug, Clone)]
pub enum ToolConnectors {
    Listed(Vec<Connector>),
    /// Tool missing, failed, or printed something we could not read.
    Unavailable(String),
}

impl ToolConnectors {
    pub fn connectors(&self) -> Option<&[Connector]> {
        match self {
            Self::Listed(list) => Some(list),
            Self::Unavailable(_) => None,
        }
    }
}

/// Parse a `modetest -c` report.
///
/// Returns `None` when the `Connectors:` header is absent. Blank lines and
/// rows of an unexpected shape are skipped.
pub fn parse(raw: &str) -> Option<Vec<Connector>> {
    let lines: Vec<&str> = raw.lines().collect();
    let header = lines.iter().position(|l| l.contains("Connectors:"))?;

    let mut i = header + 1;
    if lines
        .get(i)
        .is_some_and(|l| l.trim_start().starts_with("id"))
    {
        i += 1;
    }

    let mut connectors = Vec::new();
    while i < lines.len() {
        if is_top_level_section(lines[i]) {
            break;
        }
        let Some(caps) = RE_CONNECTOR_ROW.captures(lines[i]) else {
            i += 1;
            continue;
        };
        i += 1;

        let Ok(id) = caps[1].parse::<u32>() else {
            continue;
        };
        let status = ConnectorStatus::from_report(&caps[3]);
        let kind = caps[4].to_string();

        // The modes block must belong to this row, not the next connector.
        while i < lines.len()
            && !lines[i].contains("modes:")
            && !RE_CONNECTOR_ROW.is_match(lines[i])
            && !is_top_level_section(lines[i])
        {
            i += 1;
        }

        let mut modes = Vec::new();
        if i < lines.len() && lines[i].contains("modes:") {
            i += 1;
            while i < lines.len() {
                let line = lines[i].trim();
                if line.is_empty()
                    || is_section_header(line)
                    || RE_CONNECTOR_ROW.is_match(lines[i])
                {
                    break;
                }
                if let Some(m) = RE_MODE_LINE.captures(line) {
                    modes.push(m[1].to_string());
                }
                i += 1;
            }
        }

        debug!(id, %status, kind = %kind, modes = modes.len(), "Parsed tool connector");
        connectors.push(Connector {
            id: ConnectorId::Index(id),
            status,
            kind: Some(kind),
            modes,
        });
    }

    Some(connectors)
}

/// `props:`, `encoders:` and friends close a modes block.
fn is_section_header(trimmed: &str) -> bool {
    trimmed.ends_with(':') && !trimmed.contains(char::is_whitespace)
}

/// `CRTCs:`, `Planes:` and the like end the connector list.
fn is_top_level_section(line: &str) -> bool {
    !line.starts_with(char::is_whitespace) && is_section_header(line)
}

/// Find a tool-reported connector by numeric id.
pub fn find_connector(connectors: &[Connector], id: u32) -> Option<&Connector> {
    connectors
        .iter()
        .find(|c| c.id == ConnectorId::Index(id))
}

/// Invocation settings for the mode-listing/mode-setting tool.
#[derive(Debug, Clone)]
pub struct ModeTool {
    /// Executable name looked up on `PATH`, or an explicit path.
    pub executable: String,
    /// DRM driver module passed as `-M` (e.g., "vc4").
    pub module: Option<String>,
    /// Privilege wrapper used for mode setting (e.g., "sudo").
    pub elevate: Option<String>,
}

impl Default for ModeTool {
    fn default() -> Self {
        Self {
            executable: "modetest".into(),
            module: None,
            elevate: Some("sudo".into()),
        }
    }
}

impl ModeTool {
    /// Resolve the tool on `PATH`.
    pub fn locate(&self) -> Result<PathBuf, ToolError> {
        which::which(&self.executable)
            .map_err(|_| ToolError::ToolMissing(self.executable.clone()))
    }

    /// Run the tool's connector report and parse it.
    pub fn list_connectors(&self) -> ToolConnectors {
        let tool = match self.locate() {
            Ok(path) => path,
            Err(e) => return ToolConnectors::Unavailable(e.to_string()),
        };

        let output = match Command::new(&tool)
            .args(self.module_args())
            .arg("-c")
            .stdin(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %tool.display(), error = %e, "Failed to run mode tool");
                return ToolConnectors::Unavailable(format!(
                    "could not run {}: {e}",
                    self.executable
                ));
            }
        };

        if !output.status.success() {
            debug!(status = %output.status, "Mode tool exited with failure");
            return ToolConnectors::Unavailable(format!(
                "{} exited with {}",
                self.executable, output.status
            ));
        }

        let report = String::from_utf8_lossy(&output.stdout);
        match parse(&report) {
            Some(connectors) => ToolConnectors::Listed(connectors),
            None => ToolConnectors::Unavailable(format!(
                "could not parse {} connector report",
                self.executable
            )),
        }
    }

    /// Force `connector_id` into `mode`, through the privilege wrapper.
    pub fn set_mode(&self, connector_id: u32, mode: &str) -> Result<(), ToolError> {
        let tool = self.locate()?;

        let mut cmd = match self.elevate.as_deref().filter(|e| !e.is_empty()) {
            Some(wrapper) => {
                let mut cmd = Command::new(wrapper);
                cmd.arg(&tool);
                cmd
            }
            None => Command::new(&tool),
        };
        cmd.args(self.module_args())
            .arg("-s")
            .arg(format!("{connector_id}:{mode}"));

        info!(command = ?cmd, "Setting connector mode");

        let status = cmd.status().map_err(|e| ToolError::ToolExecutionFailed {
            tool: self.executable.clone(),
            reason: e.to_string(),
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(ToolError::ToolExecutionFailed {
                tool: self.executable.clone(),
                reason: format!("exited with {status}"),
            })
        }
    }

    fn module_args(&self) -> Vec<String> {
        match self.module.as_deref().filter(|m| !m.is_empty()) {
            Some(module) => vec!["-M".into(), module.into()],
            None => vec![],
        }
    }
}
