use std::ffi::OsString;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Environment variable SDL reads to pick its video driver.
pub const VIDEO_DRIVER_VAR: &str = "SDL_VIDEODRIVER";

/// Framebuffer device used by SDL's fbcon driver.
pub const FRAMEBUFFER_VAR: &str = "SDL_FBDEV";

/// A display backend the player can be steered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Direct kernel mode setting; needs no framebuffer device.
    Kmsdrm,
    /// Legacy framebuffer console.
    Fbcon,
    /// No overlay; the player picks for itself.
    Default,
}

impl Backend {
    /// Preferred trial order: most modern path first.
    pub const AUTO_ORDER: [Backend; 3] = [Backend::Kmsdrm, Backend::Fbcon, Backend::Default];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kmsdrm => "kmsdrm",
            Self::Fbcon => "fbcon",
            Self::Default => "default",
        }
    }

    /// Variables to set on the player's environment for this backend.
    ///
    /// `SDL_FBDEV` is only set when `framebuffer` exists.
    pub fn env_overlay(&self, framebuffer: &Path) -> Vec<(&'static str, OsString)> {
        match self {
            Self::Kmsdrm => vec![(VIDEO_DRIVER_VAR, "kmsdrm".into())],
            Self::Fbcon => {
                let mut vars = vec![(VIDEO_DRIVER_VAR, OsString::from("fbcon"))];
                if framebuffer.exists() {
                    vars.push((FRAMEBUFFER_VAR, framebuffer.into()));
                }
                vars
            }
            Self::Default => vec![],
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which candidates a launch should try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSelection {
    /// Every candidate in the configured order.
    Auto,
    Only(Backend),
}

impl BackendSelection {
    pub fn candidates(&self, auto_order: &[Backend]) -> Vec<Backend> {
        match self {
            Self::Auto => auto_order.to_vec(),
            Self::Only(backend) => vec![*backend],
        }
    }
}
