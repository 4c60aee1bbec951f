//! IPMI power control through a local command-line tool
//!
//! Chassis power commands are issued with `ipmitool` or `ipmiutil`, run
//! through the injected [`Connection`]. The tool is probed once when the
//! controller is created; each request then builds one command line with
//! inline credentials and checks stdout for the tool's success banner.

use async_trait::async_trait;
use labpower_connect::{Connection, ConnectionError, ExecOptions};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{IpmiConfig, IpmiTool};
use crate::controller::{no_target, PowerController, PowerOperation};
use crate::error::{PowerError, Result};
use crate::types::{IpmiState, Target};

/// Attempts used by `power_up`, `power_down` and the facade
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Exit codes accepted from the version probe
const PROBE_RETURN_CODES: [i32; 3] = [0, 127, 234];

impl IpmiTool {
    /// Command used to check that the tool is installed
    pub fn version_command(&self) -> &'static str {
        match self {
            IpmiTool::IpmiTool => "ipmitool -V",
            IpmiTool::IpmiUtil => "ipmiutil -V",
        }
    }

    /// Tool-specific argument selecting the chassis state
    pub fn state_argument(&self, state: IpmiState) -> &'static str {
        match (self, state) {
            (IpmiTool::IpmiTool, IpmiState::Up) => "on",
            (IpmiTool::IpmiTool, IpmiState::Down) => "off",
            (IpmiTool::IpmiTool, IpmiState::Reset) => "reset",
            (IpmiTool::IpmiTool, IpmiState::Soft) => "soft",
            (IpmiTool::IpmiUtil, IpmiState::Up) => "-u",
            (IpmiTool::IpmiUtil, IpmiState::Down) => "-d",
            (IpmiTool::IpmiUtil, IpmiState::Reset) => "-r",
            (IpmiTool::IpmiUtil, IpmiState::Soft) => "-D",
        }
    }

    fn success_markers(&self) -> &'static [&'static str] {
        match self {
            IpmiTool::IpmiTool => &["completed successfully", "Chassis Power Control"],
            IpmiTool::IpmiUtil => &["completed successfully"],
        }
    }

    fn is_success(&self, stdout: &str) -> bool {
        self.success_markers().iter().any(|m| stdout.contains(m))
    }
}

/// IPMI controller using an external tool
pub struct IpmiController {
    connection: Arc<dyn Connection>,
    config: IpmiConfig,
}

impl std::fmt::Debug for IpmiController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpmiController")
            .field("host", &self.config.host)
            .field("tool", &self.config.tool)
            .finish()
    }
}

impl IpmiController {
    /// Create a new IPMI controller
    ///
    /// Fails with `ToolNotAvailable` when the selected tool is not
    /// installed on the host behind `connection`.
    pub async fn new(connection: Arc<dyn Connection>, config: IpmiConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(PowerError::InvalidConfig("IPMI host must not be empty".to_string()));
        }

        let controller = Self { connection, config };
        controller.probe_tool().await?;
        Ok(controller)
    }

    /// Get the BMC host
    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn tool(&self) -> IpmiTool {
        self.config.tool
    }

    async fn probe_tool(&self) -> Result<()> {
        let command = self.config.tool.version_command();
        let options = ExecOptions::default().with_expected_return_codes(PROBE_RETURN_CODES);

        match self.connection.execute_command(command, &options).await {
            Ok(process) => {
                debug!(tool = %self.config.tool, output = %process.stdout.trim(), "IPMI tool available");
                Ok(())
            }
            Err(ConnectionError::NotFound(program)) => Err(PowerError::ToolNotAvailable(format!(
                "{} is not installed on the host",
                program
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Build the chassis power command line
    pub(crate) fn build_command(&self, state: IpmiState) -> String {
        let c = &self.config;
        let arg = c.tool.state_argument(state);
        match c.tool {
            IpmiTool::IpmiTool => format!(
                "ipmitool -I lanplus -H {} -U {} -P {} chassis power {}",
                c.host, c.username, c.password, arg
            ),
            IpmiTool::IpmiUtil => format!(
                "ipmiutil power -F lan2 -N {} -U {} -P {} {} -V 4",
                c.host, c.username, c.password, arg
            ),
        }
    }

    // Command line safe for logs
    fn masked(&self, command: &str) -> String {
        command.replace(&format!("-P {} ", self.config.password), "-P ****** ")
    }

    /// Set the chassis power state
    ///
    /// Runs the command up to `retry_count` times (at least once), pausing
    /// `retry_delay` after each failed attempt.
    pub async fn set_state(&self, state: IpmiState, retry_count: u32) -> Result<()> {
        let attempts = retry_count.max(1);
        let command = self.build_command(state);
        let mut last_failure = String::new();

        for attempt in 1..=attempts {
            debug!(command = %self.masked(&command), attempt, "Sending IPMI command");

            match self.connection.execute_command(&command, &ExecOptions::default()).await {
                Ok(process) if self.config.tool.is_success(&process.stdout) => {
                    info!(host = %self.config.host, state = %state, "IPMI power state set");
                    return Ok(());
                }
                Ok(process) => {
                    last_failure = format!(
                        "stdout: '{}', stderr: '{}'",
                        process.stdout.trim(),
                        process.stderr.trim()
                    );
                }
                Err(e) => last_failure = e.to_string(),
            }

            warn!(
                host = %self.config.host,
                state = %state,
                attempt,
                max = attempts,
                failure = %last_failure,
                "IPMI command failed"
            );

            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        Err(PowerError::power(format!(
            "IPMI request '{}' for {} failed after {} attempts: {}",
            state, self.config.host, attempts, last_failure
        )))
    }

    /// Power on with the default retry budget
    pub async fn power_up(&self) -> Result<()> {
        self.set_state(IpmiState::Up, DEFAULT_RETRY_COUNT).await
    }

    /// Power off with the default retry budget
    pub async fn power_down(&self) -> Result<()> {
        self.set_state(IpmiState::Down, DEFAULT_RETRY_COUNT).await
    }

    /// Power down, wait `cycle_delay`, power up
    pub async fn powercycle(&self) -> Result<()> {
        self.power_down().await?;
        tokio::time::sleep(self.config.cycle_delay).await;
        self.power_up().await
    }
}

#[async_trait]
impl PowerController for IpmiController {
    fn backend_name(&self) -> &'static str {
        "ipmi"
    }

    async fn set_state(&self, state: &str, target: Option<&Target>) -> Result<()> {
        let state: IpmiState = state.parse()?;
        no_target(target, "ipmi")?;
        IpmiController::set_state(self, state, DEFAULT_RETRY_COUNT).await
    }

    async fn power_on(&self, target: Option<&Target>) -> Result<()> {
        no_target(target, "ipmi")?;
        self.power_up().await
    }

    async fn power_off(&self, target: Option<&Target>) -> Result<()> {
        no_target(target, "ipmi")?;
        self.power_down().await
    }

    async fn power_cycle(&self, target: Option<&Target>) -> Result<()> {
        no_target(target, "ipmi")?;
        self.powercycle().await
    }

    fn cycle_delay(&self) -> std::time::Duration {
        self.config.cycle_delay
    }

    fn supports_operation(&self, _op: PowerOperation) -> bool {
        true
    }
}
