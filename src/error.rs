//! Error types for the Rally host
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for host operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Peer errors (3xx)
    PeerResolution = 300,
    PeerNotFound = 301,
    PeerTransport = 302,
    PeerTimeout = 303,

    // Protocol errors (4xx)
    ProtocolMalformed = 400,
    ProtocolSerialization = 401,

    // Runtime errors (5xx)
    ModelFailed = 500,
    ToolFailed = 501,
    ToolUnknown = 502,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Peer errors
            400..=499 => 40, // Protocol errors
            500..=599 => 50, // Runtime errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the host
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Peer Errors
    // ─────────────────────────────────────────────────────────────

    /// Capability card could not be fetched or decoded
    #[error("Failed to resolve peer card from {address}: {message}")]
    Resolution { address: String, message: String },

    /// Dispatch target is not in the registry
    #[error("Agent {name} not found")]
    PeerNotFound { name: String },

    /// Network failure reaching a registered peer
    #[error("Transport error talking to {peer}: {message}")]
    Transport { peer: String, message: String },

    /// Request to a peer timed out
    #[error("Request to {peer} timed out after {timeout_ms}ms")]
    Timeout { peer: String, timeout_ms: u64 },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Peer replied, but not in a usable shape
    #[error("Malformed response from {peer}: {message}")]
    MalformedResponse { peer: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Runtime Errors
    // ─────────────────────────────────────────────────────────────

    /// Chat model request failed
    #[error("Model request failed: {message}")]
    Model { message: String },

    /// A tool invocation failed
    #[error("Tool {name} failed: {message}")]
    Tool { name: String, message: String },

    /// The model asked for a tool that does not exist
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::Json(_) => ErrorCode::ProtocolSerialization,

            Error::Resolution { .. } => ErrorCode::PeerResolution,
            Error::PeerNotFound { .. } => ErrorCode::PeerNotFound,
            Error::Transport { .. } => ErrorCode::PeerTransport,
            Error::Timeout { .. } => ErrorCode::PeerTimeout,

            Error::MalformedResponse { .. } => ErrorCode::ProtocolMalformed,

            Error::Model { .. } => ErrorCode::ModelFailed,
            Error::Tool { .. } => ErrorCode::ToolFailed,
            Error::UnknownTool { .. } => ErrorCode::ToolUnknown,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::Timeout { .. } | Error::Io(_)
        )
    }

    /// Whether the dispatcher degrades this error to an empty fragment list
    /// instead of propagating it
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::Timeout { .. } | Error::MalformedResponse { .. }
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'rally-host config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'rally-host config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values."
            ),

            Error::Resolution { .. } => Some(
                "Check that the friend agent is running and that its address is listed under [peers]."
            ),
            Error::PeerNotFound { .. } => Some(
                "Run 'rally-host peers' to list the agents that registered at startup."
            ),
            Error::Transport { .. } | Error::Timeout { .. } => Some(
                "The friend agent may be down or slow. Raise 'request_timeout_secs' if it is busy."
            ),

            Error::Model { .. } => Some(
                "Check that the chat model endpoint under [model] is reachable and the model is pulled."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            code.as_str(),
            self
        );

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        let code = self.code();
        format!("[{}] {}", code.as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a resolution error
    pub fn resolution(address: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Resolution {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create a peer-not-found error
    pub fn peer_not_found(name: impl Into<String>) -> Self {
        Error::PeerNotFound { name: name.into() }
    }

    /// Create a transport error
    pub fn transport(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transport {
            peer: peer.into(),
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Error::MalformedResponse {
            peer: peer.into(),
            message: message.into(),
        }
    }

    /// Create a model error
    pub fn model(message: impl Into<String>) -> Self {
        Error::Model {
            message: message.into(),
        }
    }

    /// Create a tool error
    pub fn tool(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            name: name.into(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "E100");
        assert_eq!(ErrorCode::PeerNotFound.as_str(), "E301");
        assert_eq!(ErrorCode::InternalError.as_str(), "E900");
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(ErrorCode::ConfigNotFound.exit_code(), 10);
        assert_eq!(ErrorCode::IoRead.exit_code(), 20);
        assert_eq!(ErrorCode::PeerTransport.exit_code(), 30);
        assert_eq!(ErrorCode::ProtocolMalformed.exit_code(), 40);
        assert_eq!(ErrorCode::ModelFailed.exit_code(), 50);
        assert_eq!(ErrorCode::InternalError.exit_code(), 90);
    }

    #[test]
    fn test_peer_not_found_message() {
        let err = Error::peer_not_found("Bob_Agent");
        assert_eq!(err.to_string(), "Agent Bob_Agent not found");
        assert_eq!(err.code(), ErrorCode::PeerNotFound);
        assert!(!err.is_degradable());
    }

    #[test]
    fn test_degradable_errors() {
        assert!(Error::transport("A", "refused").is_degradable());
        assert!(Error::Timeout { peer: "A".into(), timeout_ms: 5000 }.is_degradable());
        assert!(Error::malformed("A", "no task").is_degradable());
        assert!(!Error::Internal("boom".into()).is_degradable());
    }

    #[test]
    fn test_error_retryable() {
        assert!(Error::transport("A", "refused").is_retryable());
        assert!(!Error::malformed("A", "bad").is_retryable());
        assert!(!Error::config_not_found("/test").is_retryable());
    }

    #[test]
    fn test_error_suggestions() {
        let err = Error::config_not_found("/test");
        assert!(err.suggestion().unwrap().contains("config init"));

        let err = Error::peer_not_found("Z");
        assert!(err.suggestion().unwrap().contains("rally-host peers"));

        assert!(Error::Internal("x".into()).suggestion().is_none());
    }

    #[test]
    fn test_format_for_terminal() {
        let err = Error::config_not_found("/test/host.toml");
        let formatted = err.format_for_terminal();

        assert!(formatted.contains("E100"));
        assert!(formatted.contains("\x1b[31m"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn test_format_for_log() {
        let err = Error::transport("Karley_Agent", "connection refused");
        let formatted = err.format_for_log();

        assert!(formatted.contains("[E302]"));
        assert!(formatted.contains("Karley_Agent"));
        assert!(!formatted.contains("\x1b["));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        assert_eq!(err.code(), ErrorCode::IoNotFound);
    }
}
