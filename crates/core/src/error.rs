//! Error types for the TicketForge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all TicketForge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Model output that could not be interpreted ---
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("No working directory configured for tool execution")]
    RootNotConfigured,

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Path rejected: {0}")]
    PathRejected(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("{operation} failed for {path}: {reason}")]
    Io {
        operation: &'static str,
        path: String,
        reason: String,
    },
}

impl ToolError {
    /// Build an I/O error, mapping `NotFound` to [`ToolError::PathNotFound`].
    pub fn io(operation: &'static str, path: impl Into<String>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::PathNotFound(path)
        } else {
            Self::Io {
                operation,
                path,
                reason: err.to_string(),
            }
        }
    }
}
