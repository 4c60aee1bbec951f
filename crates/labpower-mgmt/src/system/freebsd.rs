//! FreeBSD sleep states through ACPI

use labpower_connect::OsName;

use super::PowerFlavor;
use crate::error::{PowerError, Result};
use crate::types::SystemPowerState;

#[derive(Debug, Clone, Copy, Default)]
pub struct FreeBsd;

impl PowerFlavor for FreeBsd {
    fn os_name(&self) -> OsName {
        OsName::FreeBsd
    }

    fn discovery_command(&self) -> &'static str {
        "sysctl -n hw.acpi.supported_sleep_state"
    }

    fn parse_available_states(&self, stdout: &str) -> Vec<SystemPowerState> {
        stdout
            .split_whitespace()
            .filter_map(|token| token.parse().ok())
            .collect()
    }

    fn state_commands(&self, state: SystemPowerState) -> Result<Vec<&'static str>> {
        match state {
            SystemPowerState::S1 => Ok(vec!["acpiconf -s S1"]),
            SystemPowerState::S2 => Ok(vec!["acpiconf -s S2"]),
            SystemPowerState::S3 => Ok(vec!["acpiconf -s S3"]),
            SystemPowerState::S4 => Ok(vec!["acpiconf -s S4"]),
            SystemPowerState::S5 => Err(PowerError::power("S5 is handled by platform shutdown")),
        }
    }
}
