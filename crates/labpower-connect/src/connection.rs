//! Transport trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CompletedProcess, ExecOptions, OsName};

/// A channel for running commands on a managed host
///
/// Implementations decide how the command reaches the host. Backends only
/// rely on these three operations.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Run a command and return its output
    ///
    /// Returns `ConnectionError::NotFound` when the program does not exist
    /// and `ConnectionError::UnexpectedReturnCode` when the exit code is
    /// not accepted by `options`.
    async fn execute_command(&self, command: &str, options: &ExecOptions)
        -> Result<CompletedProcess>;

    /// Shut the host down
    async fn shutdown_platform(&self) -> Result<()>;

    /// Operating system family of the host
    async fn get_os_name(&self) -> Result<OsName>;
}
