use thiserror::Error;

use crate::launcher::FailedAttempt;

#[derive(Debug, Error)]
pub enum HdmiplayError {
    #[error("config error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum LaunchError {
    /// The player itself is not installed; no backend can help.
    #[error("{0} not found; install ffmpeg (ffplay)")]
    ExecutableMissing(String),

    #[error("all backends failed to start the player{}", last_failure(.attempts))]
    AllBackendsFailed { attempts: Vec<FailedAttempt> },
}

fn last_failure(attempts: &[FailedAttempt]) -> String {
    attempts
        .last()
        .map(|a| format!("; last error: {a}"))
        .unwrap_or_default()
}
