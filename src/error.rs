use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("External tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} exited with status {code:?}: {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Timeout occurred during {operation}")]
    Timeout { operation: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid target format: {0}")]
    InvalidTarget(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Reporting error: {0}")]
    Reporting(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ScanError {
    /// Build a `ToolFailed` from a finished invocation.
    pub fn tool_failed(tool: &str, code: Option<i32>, stderr: &str) -> Self {
        ScanError::ToolFailed {
            tool: tool.to_string(),
            code,
            stderr: stderr.trim().to_string(),
        }
    }
}
