//! Connector inventory from the kernel's DRM class directory.
//!
//! Each connector shows up as `cardN-<TYPE>-<M>` with plain-text `status`
//! and `modes` files. Nothing here needs privileges.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::{Connector, ConnectorId, ConnectorStatus};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/drm";

/// List connectors under `root` in lexical entry order.
///
/// A missing root yields an empty list. Unreadable `status`/`modes` files
/// degrade to `Unknown` and no modes instead of failing the scan.
pub fn list_system_connectors(root: &Path) -> Vec<Connector> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %root.display(), error = %e, "DRM class directory not readable");
            return vec![];
        }
    };

    // card0, renderD128 and version are devices/attributes, not connectors.
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.starts_with("card") && name.contains('-'))
        .collect();
    names.sort();

    names
        .into_iter()
        .map(|name| {
            let dir = root.join(&name);
            let status = fs::read_to_string(dir.join("status"))
                .map(|s| ConnectorStatus::from_report(&s))
                .unwrap_or(ConnectorStatus::Unknown);
            let modes = fs::read_to_string(dir.join("modes"))
                .map(|s| {
                    s.lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            debug!(connector = %name, %status, "Found sysfs connector");

            Connector {
                id: ConnectorId::Name(name),
                status,
                kind: None,
                modes,
            }
        })
        .collect()
}
