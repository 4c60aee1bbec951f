//! Operating-system power states
//!
//! Sleep, hibernate and shutdown of the host behind a [`Connection`].
//! Each supported OS is a [`PowerFlavor`]: how to ask the OS which sleep
//! states it offers and which commands enter each one. Shutdown (S5) is
//! always delegated to the connection.

mod freebsd;
mod linux;
mod windows;

use async_trait::async_trait;
use labpower_connect::{Connection, ExecOptions, OsName};
use std::sync::Arc;
use tracing::{debug, info};

use crate::controller::{no_target, PowerController, PowerOperation};
use crate::error::{PowerError, Result};
use crate::types::{SystemPowerState, Target};

pub use freebsd::FreeBsd;
pub use linux::Linux;
pub use windows::Windows;

/// OS-specific sleep state discovery and commands
pub trait PowerFlavor: Send + Sync {
    fn os_name(&self) -> OsName;

    /// Command listing the sleep states the OS offers
    fn discovery_command(&self) -> &'static str;

    /// States named in the discovery output, S5 excluded
    fn parse_available_states(&self, stdout: &str) -> Vec<SystemPowerState>;

    /// Commands entering `state`, run in order
    fn state_commands(&self, state: SystemPowerState) -> Result<Vec<&'static str>>;

    /// Options for the state commands
    fn command_options(&self) -> ExecOptions {
        ExecOptions::default()
    }
}

/// Select the flavor for an OS
pub fn flavor_for(os: OsName) -> Result<Box<dyn PowerFlavor>> {
    match os {
        OsName::Linux => Ok(Box::new(Linux)),
        OsName::Windows => Ok(Box::new(Windows)),
        OsName::FreeBsd => Ok(Box::new(FreeBsd)),
        other => Err(PowerError::InvalidConfig(format!(
            "system power states are not supported on {}",
            other
        ))),
    }
}

/// Controller for the host's own power states
pub struct SystemPowerController {
    connection: Arc<dyn Connection>,
    flavor: Box<dyn PowerFlavor>,
}

impl std::fmt::Debug for SystemPowerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemPowerController")
            .field("os", &self.flavor.os_name())
            .finish()
    }
}

impl SystemPowerController {
    /// Create a controller for the OS reported by `connection`
    pub async fn new(connection: Arc<dyn Connection>) -> Result<Self> {
        let os = connection.get_os_name().await?;
        let flavor = flavor_for(os)?;
        debug!(%os, "System power controller ready");
        Ok(Self { connection, flavor })
    }

    pub fn os_name(&self) -> OsName {
        self.flavor.os_name()
    }

    /// Query the live OS for the states it can enter
    ///
    /// S5 is always included. The result is sorted without duplicates.
    pub async fn get_available_power_states(&self) -> Result<Vec<SystemPowerState>> {
        let process = self
            .connection
            .execute_command(self.flavor.discovery_command(), &self.flavor.command_options())
            .await?;

        let mut states = self.flavor.parse_available_states(&process.stdout);
        states.push(SystemPowerState::S5);
        states.sort();
        states.dedup();
        Ok(states)
    }

    /// Enter a power state
    pub async fn set_state(&self, state: SystemPowerState) -> Result<()> {
        if state == SystemPowerState::S5 {
            info!(os = %self.os_name(), "Shutting down platform");
            self.connection.shutdown_platform().await?;
            return Ok(());
        }

        let available = self.get_available_power_states().await?;
        if !available.contains(&state) {
            let names: Vec<String> = available.iter().map(|s| s.to_string()).collect();
            return Err(PowerError::power(format!(
                "Power state {} is not supported on this system, available: {}",
                state,
                names.join(", ")
            )));
        }

        let options = self.flavor.command_options();
        for command in self.flavor.state_commands(state)? {
            debug!(command, "Running power state command");
            self.connection.execute_command(command, &options).await?;
        }

        info!(os = %self.os_name(), state = %state, "Power state requested");
        Ok(())
    }
}

#[async_trait]
impl PowerController for SystemPowerController {
    fn backend_name(&self) -> &'static str {
        "system"
    }

    async fn set_state(&self, state: &str, target: Option<&Target>) -> Result<()> {
        let state: SystemPowerState = state.parse()?;
        no_target(target, self.backend_name())?;
        SystemPowerController::set_state(self, state).await
    }

    async fn power_on(&self, _target: Option<&Target>) -> Result<()> {
        Err(PowerError::Unsupported(
            "a host cannot power itself on".to_string(),
        ))
    }

    async fn power_off(&self, target: Option<&Target>) -> Result<()> {
        no_target(target, self.backend_name())?;
        SystemPowerController::set_state(self, SystemPowerState::S5).await
    }

    async fn power_cycle(&self, _target: Option<&Target>) -> Result<()> {
        Err(PowerError::Unsupported(
            "power cycle is not available for system power states".to_string(),
        ))
    }

    fn supports_operation(&self, op: PowerOperation) -> bool {
        matches!(op, PowerOperation::PowerOff | PowerOperation::SetState)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingConnection;
    use SystemPowerState::*;

    async fn controller(os: OsName, discovery: &str) -> (SystemPowerController, Arc<RecordingConnection>) {
        let connection = Arc::new(RecordingConnection::new(os).with_default_stdout(discovery));
        let controller = SystemPowerController::new(connection.clone()).await.unwrap();
        (controller, connection)
    }

    #[tokio::test]
    async fn test_unsupported_os() {
        let connection = Arc::new(RecordingConnection::new(OsName::Esxi));
        let err = SystemPowerController::new(connection).await.unwrap_err();
        assert!(matches!(err, PowerError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_s5_delegates_to_shutdown() {
        let (system, connection) = controller(OsName::Linux, "mem disk").await;

        system.set_state(S5).await.unwrap();

        assert_eq!(connection.shutdown_count(), 1);
        assert_eq!(connection.call_count(), 0);
    }

    #[tokio::test]
    async fn test_linux_available_states() {
        let (system, connection) = controller(OsName::Linux, "freeze mem disk\n").await;

        assert_eq!(system.get_available_power_states().await.unwrap(), vec![S3, S4, S5]);
        assert_eq!(connection.commands(), vec!["cat /sys/power/state"]);
    }

    #[tokio::test]
    async fn test_linux_s4_and_s3_commands() {
        let (system, connection) = controller(OsName::Linux, "mem disk").await;

        system.set_state(S4).await.unwrap();
        system.set_state(S3).await.unwrap();

        assert_eq!(
            connection.commands(),
            vec![
                "cat /sys/power/state",
                "echo disk > /sys/power/state",
                "cat /sys/power/state",
                "echo deep > /sys/power/mem_sleep",
                "echo mem > /sys/power/state",
            ]
        );
        assert!(connection.calls().iter().all(|(_, options)| options.shell));
    }

    #[tokio::test]
    async fn test_undiscovered_state_fails_before_command() {
        let (system, connection) = controller(OsName::Linux, "mem disk").await;

        let err = system.set_state(S1).await.unwrap_err();
        assert!(matches!(err, PowerError::PowerManagement(_)));
        // only the discovery ran
        assert_eq!(connection.commands(), vec!["cat /sys/power/state"]);
    }

    #[tokio::test]
    async fn test_states_are_discovered_on_every_request() {
        let (system, connection) = controller(OsName::Linux, "mem disk").await;
        connection.push_stdout("disk\n");

        // first discovery no longer offers mem
        assert!(system.set_state(S3).await.is_err());
        system.set_state(S3).await.unwrap();

        assert_eq!(
            connection.commands(),
            vec![
                "cat /sys/power/state",
                "cat /sys/power/state",
                "echo deep > /sys/power/mem_sleep",
                "echo mem > /sys/power/state",
            ]
        );
    }

    #[tokio::test]
    async fn test_windows_commands() {
        let discovery = windows::tests::POWERCFG_S3_HIBERNATE;
        let (system, connection) = controller(OsName::Windows, discovery).await;

        system.set_state(S3).await.unwrap();
        system.set_state(S4).await.unwrap();
        assert!(system.set_state(S1).await.is_err());

        assert_eq!(
            connection.commands(),
            vec![
                "powercfg /a",
                "powercfg /hibernate off & rundll32.exe powrprof.dll,SetSuspendState Sleep",
                "powercfg /a",
                "powercfg /hibernate on & rundll32.exe powrprof.dll,SetSuspendState 0,1,0",
                "powercfg /a",
            ]
        );
    }

    #[tokio::test]
    async fn test_freebsd_commands() {
        let (system, connection) = controller(OsName::FreeBsd, "S4 S5").await;

        assert_eq!(system.get_available_power_states().await.unwrap(), vec![S4, S5]);
        system.set_state(S4).await.unwrap();
        assert!(system.set_state(S1).await.is_err());

        let commands = connection.commands();
        assert_eq!(commands[0], "sysctl -n hw.acpi.supported_sleep_state");
        assert_eq!(commands[2], "acpiconf -s S4");
        assert_eq!(commands.len(), 4);
    }

    #[tokio::test]
    async fn test_facade_mapping() {
        let (system, connection) = controller(OsName::Linux, "standby mem disk").await;

        system.power_off(None).await.unwrap();
        assert_eq!(connection.shutdown_count(), 1);

        assert!(matches!(system.power_on(None).await, Err(PowerError::Unsupported(_))));
        assert!(matches!(system.power_cycle(None).await, Err(PowerError::Unsupported(_))));
        assert!(!system.supports_operation(PowerOperation::PowerOn));
        assert!(system.supports_operation(PowerOperation::SetState));

        let err = PowerController::set_state(&system, "S7", None).await.unwrap_err();
        assert!(matches!(err, PowerError::UnsupportedState { backend: "system", .. }));

        let err = PowerController::set_state(&system, "s1", Some(&Target::Outlet(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, PowerError::InvalidConfig(_)));
        assert_eq!(connection.call_count(), 0);

        PowerController::set_state(&system, "s1", None).await.unwrap();
        assert_eq!(connection.commands().last().unwrap(), "echo standby > /sys/power/state");
    }
}
