//! Deciding whether a freshly started player is actually working.
//!
//! There is no feedback channel from the display, so the default policy just
//! waits a moment and checks the player has not died. Other signals (a health
//! file, a message from the player) can be plugged in via [`ProbePolicy`]
//! without touching the fallback loop.

use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::Duration;

use tracing::debug;

#[derive(Debug)]
pub enum ProbeVerdict {
    /// The player looks healthy; treat this backend as the session.
    Accepted,
    /// The player exited on its own while being probed.
    Exited(ExitStatus),
    /// The player is still running but the policy does not trust it.
    Rejected(String),
}

pub trait ProbePolicy {
    fn probe(&self, child: &mut Child) -> io::Result<ProbeVerdict>;
}

/// Accept any player that is still alive after a fixed window.
///
/// Known to misjudge both ways: a backend that starts but shows a black
/// screen passes, and a working player that finishes a very short clip
/// inside the window fails.
#[derive(Debug, Clone, Copy)]
pub struct LivenessProbe {
    window: Duration,
}

impl LivenessProbe {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

impl ProbePolicy for LivenessProbe {
    fn probe(&self, child: &mut Child) -> io::Result<ProbeVerdict> {
        thread::sleep(self.window);
        match child.try_wait()? {
            Some(status) => {
                debug!(pid = child.id(), %status, "Player exited within probe window");
                Ok(ProbeVerdict::Exited(status))
            }
            None => Ok(ProbeVerdict::Accepted),
        }
    }
}
