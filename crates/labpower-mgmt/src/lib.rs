//! Lab power management
//!
//! Power-state control for remote lab hardware behind one trait,
//! [`PowerController`]. Each backend owns its legal state set and the
//! encode, send and verify cycle for its transport.
//!
//! # Supported backends
//!
//! - **IPMI**: chassis power through `ipmitool` or `ipmiutil` run on a [`Connection`]
//! - **PDU**: SNMPv2c outlet control for APC and Raritan units
//! - **CC-SG**: Raritan CommandCenter Secure Gateway SOAP services
//! - **DLI**: Digital Loggers web power switches
//! - **System**: sleep, hibernate and shutdown of the host itself
//!
//! # Example
//!
//! ```no_run
//! use labpower_mgmt::{PduConfig, PduController, PduVendorKind, PowerController, Target};
//!
//! # async fn example() -> labpower_mgmt::Result<()> {
//! let config = PduConfig::new("10.0.0.20", PduVendorKind::Apc).with_community("private");
//! let pdu = PduController::new(config)?;
//!
//! // Cycle outlet 3
//! pdu.power_cycle(Some(&Target::Outlet(3))).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # IPMI Example
//!
//! ```no_run
//! use labpower_connect::LocalConnection;
//! use labpower_mgmt::{IpmiConfig, IpmiController, IpmiState};
//! use std::sync::Arc;
//!
//! # async fn example() -> labpower_mgmt::Result<()> {
//! let config = IpmiConfig::new("10.0.0.10", "admin", "password");
//! let controller = IpmiController::new(Arc::new(LocalConnection::new()), config).await?;
//!
//! controller.set_state(IpmiState::Soft, 3).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Connection`]: labpower_connect::Connection

pub mod ccsg;
pub mod config;
pub mod controller;
pub mod device;
pub mod dli;
pub mod error;
pub mod ipmi;
pub mod pdu;
pub mod system;
pub mod types;

#[cfg(test)]
mod testing;

pub use ccsg::CcsgController;
pub use config::{CcsgConfig, DeviceConfig, DliConfig, IpmiConfig, IpmiTool, PduConfig, PduVendorKind};
pub use controller::{PowerController, PowerOperation, DEFAULT_CYCLE_DELAY};
pub use device::build_controller;
pub use dli::DliController;
pub use error::{PowerError, Result};
pub use ipmi::IpmiController;
pub use pdu::{PduController, PduVendor};
pub use system::SystemPowerController;
pub use types::{CcsgState, DliState, IpmiState, PduState, SystemPowerState, Target};
