use thiserror::Error;

/// Failures of the optional mode-listing/mode-setting tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0} not installed (libdrm-tests); install it to list or force connector modes")]
    ToolMissing(String),

    #[error("{tool} failed: {reason}")]
    ToolExecutionFailed { tool: String, reason: String },
}
