//! Linux sleep states through sysfs

use labpower_connect::{ExecOptions, OsName};

use super::PowerFlavor;
use crate::error::{PowerError, Result};
use crate::types::SystemPowerState;

#[derive(Debug, Clone, Copy, Default)]
pub struct Linux;

impl PowerFlavor for Linux {
    fn os_name(&self) -> OsName {
        OsName::Linux
    }

    fn discovery_command(&self) -> &'static str {
        "cat /sys/power/state"
    }

    fn parse_available_states(&self, stdout: &str) -> Vec<SystemPowerState> {
        stdout
            .split_whitespace()
            .filter_map(|token| match token {
                "standby" => Some(SystemPowerState::S1),
                "mem" => Some(SystemPowerState::S3),
                "disk" => Some(SystemPowerState::S4),
                _ => None,
            })
            .collect()
    }

    fn state_commands(&self, state: SystemPowerState) -> Result<Vec<&'static str>> {
        match state {
            SystemPowerState::S1 => Ok(vec!["echo standby > /sys/power/state"]),
            SystemPowerState::S3 => Ok(vec![
                "echo deep > /sys/power/mem_sleep",
                "echo mem > /sys/power/state",
            ]),
            SystemPowerState::S4 => Ok(vec!["echo disk > /sys/power/state"]),
            other => Err(PowerError::power(format!("No Linux command for power state {}", other))),
        }
    }

    fn command_options(&self) -> ExecOptions {
        ExecOptions::shell()
    }
}
