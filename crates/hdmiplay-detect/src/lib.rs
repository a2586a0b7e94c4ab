pub mod error;
pub mod modetest;
pub mod sysfs;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use error::ToolError;
pub use modetest::{find_connector, parse, ModeTool, ToolConnectors};
pub use sysfs::{list_system_connectors, DEFAULT_SYSFS_ROOT};

/// How a connector is identified by the source that reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConnectorId {
    /// Directory name under the sysfs DRM class (e.g., `card0-HDMI-A-1`).
    Name(String),
    /// Numeric object id from the mode-listing tool (e.g., `29`).
    Index(u32),
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(id) => write!(f, "{id}"),
        }
    }
}

/// Connection state reported for a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorStatus {
    Connected,
    Disconnected,
    Unknown,
}

impl ConnectorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a status word. Anything unrecognised maps to `Unknown`.
    pub fn from_report(s: &str) -> Self {
        match s.trim() {
            "connected" => Self::Connected,
            "disconnected" => Self::Disconnected,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A display output path as seen by the kernel or the mode-listing tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub status: ConnectorStatus,
    /// Connector type (e.g., "HDMI-A"). Only the mode-listing tool reports it.
    pub kind: Option<String>,
    /// Supported modes in reported order; the first is the preferred one.
    pub modes: Vec<String>,
}

impl Connector {
    pub fn first_mode(&self) -> Option<&str> {
        self.modes.first().map(String::as_str)
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectorStatus::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_report() {
        assert_eq!(ConnectorStatus::from_report("connected\n"), ConnectorStatus::Connected);
        assert_eq!(ConnectorStatus::from_report("disconnected"), ConnectorStatus::Disconnected);
        assert_eq!(ConnectorStatus::from_report("unknown"), ConnectorStatus::Unknown);
        assert_eq!(ConnectorStatus::from_report("weird"), ConnectorStatus::Unknown);
    }

    #[test]
    fn test_connector_serializes_flat_id() {
        let connector = Connector {
            id: ConnectorId::Index(29),
            status: ConnectorStatus::Connected,
            kind: Some("HDMI-A".into()),
            modes: vec!["1920x1080".into()],
        };
        let json = serde_json::to_value(&connector).unwrap();
        assert_eq!(json["id"], 29);
        assert_eq!(json["status"], "connected");
        assert_eq!(connector.first_mode(), Some("1920x1080"));
    }
}
