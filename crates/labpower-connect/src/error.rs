//! Error types for command transports

use thiserror::Error;

/// Error type for transport operations
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The program to run does not exist on the host
    #[error("program not found: {0}")]
    NotFound(String),

    /// The command exited with a code outside the expected set
    #[error("command '{command}' returned unexpected code {code}: {stderr}")]
    UnexpectedReturnCode {
        command: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    /// The command line could not be split into a program and arguments
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Operation not available on this host
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// I/O error while running the command
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, ConnectionError>;
