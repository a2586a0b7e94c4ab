pub mod backend;
pub mod config;
pub mod error;
pub mod launcher;
pub mod probe;

pub use backend::{Backend, BackendSelection};
pub use config::AppConfig;
pub use error::{HdmiplayError, LaunchError};
pub use launcher::{
    AttemptFailure, DetachedPlayer, FailedAttempt, LaunchOutcome, Launcher, PlayerCommand, Session,
};
pub use probe::{LivenessProbe, ProbePolicy, ProbeVerdict};
