//! Windows sleep states through powercfg

use labpower_connect::{ExecOptions, OsName};

use super::PowerFlavor;
use crate::error::{PowerError, Result};
use crate::types::SystemPowerState;

const SLEEP: &str = "powercfg /hibernate off & rundll32.exe powrprof.dll,SetSuspendState Sleep";
const HIBERNATE: &str = "powercfg /hibernate on & rundll32.exe powrprof.dll,SetSuspendState 0,1,0";

#[derive(Debug, Clone, Copy, Default)]
pub struct Windows;

impl PowerFlavor for Windows {
    fn os_name(&self) -> OsName {
        OsName::Windows
    }

    fn discovery_command(&self) -> &'static str {
        "powercfg /a"
    }

    // Only the section listing available states counts; the report goes
    // on to list the unavailable ones with the same labels.
    fn parse_available_states(&self, stdout: &str) -> Vec<SystemPowerState> {
        let mut states = Vec::new();
        let mut in_available = false;

        for line in stdout.lines() {
            let line = line.trim();
            let lower = line.to_ascii_lowercase();
            if lower.contains("are not available") {
                in_available = false;
                continue;
            }
            if lower.contains("are available") {
                in_available = true;
                continue;
            }
            if !in_available {
                continue;
            }

            if lower.starts_with("standby") {
                states.extend(
                    line.split(|c: char| !c.is_ascii_alphanumeric())
                        .filter_map(|token| match token {
                            "S1" => Some(SystemPowerState::S1),
                            "S2" => Some(SystemPowerState::S2),
                            "S3" => Some(SystemPowerState::S3),
                            _ => None,
                        }),
                );
            } else if lower.starts_with("hibernate") {
                states.push(SystemPowerState::S4);
            }
        }

        states
    }

    fn state_commands(&self, state: SystemPowerState) -> Result<Vec<&'static str>> {
        match state {
            SystemPowerState::S1 | SystemPowerState::S2 | SystemPowerState::S3 => Ok(vec![SLEEP]),
            SystemPowerState::S4 => Ok(vec![HIBERNATE]),
            SystemPowerState::S5 => Err(PowerError::power("S5 is handled by platform shutdown")),
        }
    }

    // the commands chain two programs with `&`
    fn command_options(&self) -> ExecOptions {
        ExecOptions::shell()
    }
}
