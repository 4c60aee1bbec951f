//! Local command execution
//!
//! Runs commands on the current machine with `tokio::process`.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::connection::Connection;
use crate::error::{ConnectionError, Result};
use crate::types::{CompletedProcess, ExecOptions, OsName};

/// Connection to the machine running this process
#[derive(Debug, Clone)]
pub struct LocalConnection {
    os_name: OsName,
}

impl Default for LocalConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalConnection {
    pub fn new() -> Self {
        Self {
            os_name: OsName::current(),
        }
    }

    fn build_command(&self, command: &str, shell: bool) -> Result<Command> {
        if shell {
            let mut cmd = if self.os_name == OsName::Windows {
                let mut cmd = Command::new("cmd");
                cmd.arg("/C");
                cmd
            } else {
                let mut cmd = Command::new("sh");
                cmd.arg("-c");
                cmd
            };
            cmd.arg(command);
            return Ok(cmd);
        }

        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ConnectionError::InvalidCommand("empty command".to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(parts);
        Ok(cmd)
    }

    fn shutdown_command(&self) -> Result<&'static str> {
        match self.os_name {
            OsName::Windows => Ok("shutdown /s /f /t 0"),
            OsName::Linux | OsName::MacOs => Ok("shutdown -h now"),
            OsName::FreeBsd => Ok("shutdown -p now"),
            OsName::Esxi => Ok("poweroff"),
            OsName::Unknown => Err(ConnectionError::Unsupported(
                "shutdown on unknown operating system".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Connection for LocalConnection {
    async fn execute_command(
        &self,
        command: &str,
        options: &ExecOptions,
    ) -> Result<CompletedProcess> {
        debug!(command = %command, shell = options.shell, "Executing local command");

        let output = match self.build_command(command, options.shell)?.output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let program = command.split_whitespace().next().unwrap_or(command);
                return Err(ConnectionError::NotFound(program.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        // Killed by a signal: no exit code
        let return_code = output.status.code().unwrap_or(-1);
        let process = CompletedProcess {
            args: command.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            return_code,
        };

        if !options.accepts(return_code) {
            return Err(ConnectionError::UnexpectedReturnCode {
                command: command.to_string(),
                code: return_code,
                stdout: process.stdout,
                stderr: process.stderr,
            });
        }

        Ok(process)
    }

    async fn shutdown_platform(&self) -> Result<()> {
        let command = self.shutdown_command()?;
        self.execute_command(command, &ExecOptions::default()).await?;
        Ok(())
    }

    async fn get_os_name(&self) -> Result<OsName> {
        Ok(self.os_name)
    }
}
