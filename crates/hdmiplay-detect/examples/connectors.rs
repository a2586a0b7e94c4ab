//! Run with: cargo run -p hdmiplay-detect --example connectors
//!
//! Prints every DRM connector the kernel and modetest know about.

use std::path::Path;

use hdmiplay_detect::{list_system_connectors, ModeTool, ToolConnectors, DEFAULT_SYSFS_ROOT};

fn main() {
    let connectors = list_system_connectors(Path::new(DEFAULT_SYSFS_ROOT));

    if connectors.is_empty() {
        println!("No sysfs connectors found.");
    }
    for c in &connectors {
        println!("Connector: {}", c.id);
        println!("  Status: {}", c.status);
        if let Some(mode) = c.first_mode() {
            println!("  Mode:   {mode}");
        }
        println!();
    }

    match ModeTool::default().list_connectors() {
        ToolConnectors::Listed(list) => {
            for c in &list {
                println!("modetest id {}: {} ({} modes)", c.id, c.status, c.modes.len());
            }
        }
        ToolConnectors::Unavailable(reason) => println!("modetest unavailable: {reason}"),
    }
}
