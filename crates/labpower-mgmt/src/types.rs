//! Power states and targets
//!
//! Each backend has its own closed set of states. Parsing a state name
//! into the backend's enum is the only way to request a state through the
//! string-based facade, so an illegal name fails before any command is
//! built.

use std::str::FromStr;

use crate::error::PowerError;

/// IPMI chassis power states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpmiState {
    /// Chassis power on
    Up,
    /// Chassis power off (hard)
    Down,
    /// Hard reset
    Reset,
    /// Soft shutdown via ACPI
    Soft,
}

impl IpmiState {
    pub const ALL: [IpmiState; 4] = [IpmiState::Up, IpmiState::Down, IpmiState::Reset, IpmiState::Soft];
}

impl std::fmt::Display for IpmiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpmiState::Up => write!(f, "up"),
            IpmiState::Down => write!(f, "down"),
            IpmiState::Reset => write!(f, "reset"),
            IpmiState::Soft => write!(f, "soft"),
        }
    }
}

impl FromStr for IpmiState {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(IpmiState::Up),
            "down" => Ok(IpmiState::Down),
            "reset" => Ok(IpmiState::Reset),
            "soft" => Ok(IpmiState::Soft),
            _ => Err(unsupported(s, "ipmi")),
        }
    }
}

/// SNMP PDU outlet states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PduState {
    On,
    Off,
    Cycle,
}

impl std::fmt::Display for PduState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PduState::On => write!(f, "on"),
            PduState::Off => write!(f, "off"),
            PduState::Cycle => write!(f, "cycle"),
        }
    }
}

impl FromStr for PduState {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(PduState::On),
            "off" => Ok(PduState::Off),
            "cycle" => Ok(PduState::Cycle),
            _ => Err(unsupported(s, "pdu")),
        }
    }
}

/// CC-SG node power states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CcsgState {
    On,
    Off,
}

impl CcsgState {
    /// Operation name used by the `setNodePower` SOAP call
    pub fn operation(&self) -> &'static str {
        match self {
            CcsgState::On => "power on",
            CcsgState::Off => "power off",
        }
    }
}

impl std::fmt::Display for CcsgState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CcsgState::On => write!(f, "on"),
            CcsgState::Off => write!(f, "off"),
        }
    }
}

impl FromStr for CcsgState {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(CcsgState::On),
            "off" => Ok(CcsgState::Off),
            _ => Err(unsupported(s, "ccsg")),
        }
    }
}

/// DLI web power switch socket states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DliState {
    On,
    Off,
    Cycle,
}

impl DliState {
    /// Action keyword of the `/outlet` endpoint
    pub fn action(&self) -> &'static str {
        match self {
            DliState::On => "ON",
            DliState::Off => "OFF",
            DliState::Cycle => "CCL",
        }
    }
}

impl std::fmt::Display for DliState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DliState::On => write!(f, "on"),
            DliState::Off => write!(f, "off"),
            DliState::Cycle => write!(f, "cycle"),
        }
    }
}

impl FromStr for DliState {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(DliState::On),
            "off" => Ok(DliState::Off),
            "cycle" => Ok(DliState::Cycle),
            _ => Err(unsupported(s, "dli")),
        }
    }
}

/// ACPI system sleep states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SystemPowerState {
    /// Power on suspend
    S1,
    /// CPU powered off
    S2,
    /// Suspend to RAM
    S3,
    /// Suspend to disk (hibernate)
    S4,
    /// Soft off
    S5,
}

impl std::fmt::Display for SystemPowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemPowerState::S1 => write!(f, "S1"),
            SystemPowerState::S2 => write!(f, "S2"),
            SystemPowerState::S3 => write!(f, "S3"),
            SystemPowerState::S4 => write!(f, "S4"),
            SystemPowerState::S5 => write!(f, "S5"),
        }
    }
}

impl FromStr for SystemPowerState {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "S1" => Ok(SystemPowerState::S1),
            "S2" => Ok(SystemPowerState::S2),
            "S3" => Ok(SystemPowerState::S3),
            "S4" => Ok(SystemPowerState::S4),
            "S5" => Ok(SystemPowerState::S5),
            _ => Err(unsupported(s, "system")),
        }
    }
}

/// What a power request is aimed at, beyond the controller itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// PDU or power switch outlet number
    Outlet(u32),
    /// CC-SG node name
    Device(String),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Outlet(n) => write!(f, "outlet {}", n),
            Target::Device(name) => write!(f, "device {}", name),
        }
    }
}

fn unsupported(state: &str, backend: &'static str) -> PowerError {
    PowerError::UnsupportedState {
        state: state.to_string(),
        backend,
    }
}
