use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use hdmiplay_core::{Backend, BackendSelection};

/// Play a video on the HDMI output from a console/SSH session (no X needed).
///
/// Tries SDL's kmsdrm driver first, then the fbcon framebuffer, then the
/// player's own choice, keeping the first one that stays up.
#[derive(Debug, Parser)]
#[command(
    name = "hdmiplay",
    version,
    after_help = "Exit codes: 0 played (or the player's own exit code), 1 no video given, \
                  2 video not found, 3 player missing or every backend failed."
)]
pub struct Cli {
    /// Video file to play (MP4).
    pub video: Option<PathBuf>,

    /// List /sys/class/drm connectors and, if modetest is available, connector ids.
    #[arg(long)]
    pub list_connectors: bool,

    /// Print the connector listing as JSON.
    #[arg(long, requires = "list_connectors")]
    pub json: bool,

    /// modetest connector id to inspect before playing.
    #[arg(long, value_name = "ID")]
    pub connector_id: Option<u32>,

    /// With --connector-id, set that connector's first mode via modetest (uses sudo).
    #[arg(long)]
    pub force_mode: bool,

    /// Video backend to try.
    #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
    pub backend: BackendArg,

    /// Detach the player so it keeps running after SSH logout.
    #[arg(long)]
    pub detach: bool,

    /// Config file to use instead of ~/.config/hdmiplay/config.toml.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log debug detail to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Auto,
    Kmsdrm,
    Fbcon,
    Default,
}

impl BackendArg {
    pub fn selection(self) -> BackendSelection {
        match self {
            Self::Auto => BackendSelection::Auto,
            Self::Kmsdrm => BackendSelection::Only(Backend::Kmsdrm),
            Self::Fbcon => BackendSelection::Only(Backend::Fbcon),
            Self::Default => BackendSelection::Only(Backend::Default),
        }
    }
}
