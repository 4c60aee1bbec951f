//! SNMP-managed power distribution units
//!
//! Outlets are switched by writing an INTEGER to a vendor-specific outlet
//! control column. Vendors differ only in the column OID and the values
//! that mean on, off and cycle, so they are described by [`PduVendor`]
//! data rather than separate controller types.

pub mod client;
pub mod snmp;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{PduConfig, PduVendorKind};
use crate::controller::{outlet_from, PowerController, PowerOperation};
use crate::error::{PowerError, Result};
use crate::types::{PduState, Target};

pub use client::{SnmpClient, UdpSnmpClient};
pub use snmp::{error_status_name, SnmpError, SnmpMessage};

/// Outlet control column and state values for one PDU vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduVendor {
    pub name: &'static str,
    pub outlet_control_oid: &'static str,
    pub on: i64,
    pub off: i64,
    pub cycle: i64,
}

impl PduVendor {
    /// APC rPDUOutletControlOutletCommand
    pub const APC: PduVendor = PduVendor {
        name: "APC",
        outlet_control_oid: "1.3.6.1.4.1.318.1.1.12.3.3.1.1.4",
        on: 1,
        off: 2,
        cycle: 3,
    };

    /// Raritan outletSwitchingState
    pub const RARITAN: PduVendor = PduVendor {
        name: "Raritan",
        outlet_control_oid: "1.3.6.1.4.1.13742.6.4.1.2.1.2.1",
        on: 1,
        off: 0,
        cycle: 2,
    };

    /// Integer written for a state
    pub fn value(&self, state: PduState) -> i64 {
        match state {
            PduState::On => self.on,
            PduState::Off => self.off,
            PduState::Cycle => self.cycle,
        }
    }
}

impl From<PduVendorKind> for PduVendor {
    fn from(kind: PduVendorKind) -> Self {
        match kind {
            PduVendorKind::Apc => PduVendor::APC,
            PduVendorKind::Raritan => PduVendor::RARITAN,
        }
    }
}

/// SNMP PDU controller
pub struct PduController {
    config: PduConfig,
    vendor: PduVendor,
    client: Arc<dyn SnmpClient>,
}

impl std::fmt::Debug for PduController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PduController")
            .field("host", &self.config.host)
            .field("vendor", &self.vendor.name)
            .field("outlet", &self.config.outlet_number)
            .finish()
    }
}

impl PduController {
    /// Create a controller talking SNMPv2c over UDP
    pub fn new(config: PduConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(PowerError::InvalidConfig("PDU host must not be empty".to_string()));
        }

        let client = UdpSnmpClient::new(
            &config.host,
            config.port,
            &config.community,
            config.timeout,
            config.retries,
        );
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Create a controller over an existing SNMP client
    pub fn with_client(config: PduConfig, client: Arc<dyn SnmpClient>) -> Self {
        let vendor = PduVendor::from(config.vendor);
        Self {
            config,
            vendor,
            client,
        }
    }

    pub fn vendor(&self) -> &PduVendor {
        &self.vendor
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    fn resolve_outlet(&self, outlet: Option<u32>) -> Result<u32> {
        outlet.or(self.config.outlet_number).ok_or_else(|| {
            PowerError::power("Missing outlet number value, not passed in constructor or method parameter")
        })
    }

    /// Switch an outlet
    ///
    /// `outlet` overrides the outlet bound in the config.
    pub async fn set_state(&self, state: PduState, outlet: Option<u32>) -> Result<()> {
        let outlet = self.resolve_outlet(outlet)?;
        let value = self.vendor.value(state);

        self.set_oid(self.vendor.outlet_control_oid, outlet, value).await?;
        info!(host = %self.config.host, vendor = self.vendor.name, outlet, state = %state, "PDU outlet switched");

        tokio::time::sleep(self.config.settle_delay).await;
        Ok(())
    }

    /// SET `<oid>.<instance>` to `value`
    pub async fn set_oid(&self, oid: &str, instance: u32, value: i64) -> Result<()> {
        let full_oid = format!("{}.{}", oid, instance);
        debug!(host = %self.config.host, oid = %full_oid, value, "Setting PDU OID");

        let response = self.client.set(&full_oid, value).await.map_err(|e| {
            warn!(host = %self.config.host, error = %e, "SNMP request failed");
            PowerError::PduConfiguration(format!("{} ({})", e, full_oid))
        })?;

        if response.error_status != 0 {
            return Err(PowerError::PduSnmp(format!(
                "{} at index {} ({} = {})",
                error_status_name(response.error_status),
                response.error_index,
                full_oid,
                value
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl PowerController for PduController {
    fn backend_name(&self) -> &'static str {
        "pdu"
    }

    async fn set_state(&self, state: &str, target: Option<&Target>) -> Result<()> {
        let state: PduState = state.parse()?;
        let outlet = outlet_from(target, self.backend_name())?;
        PduController::set_state(self, state, outlet).await
    }

    async fn power_on(&self, target: Option<&Target>) -> Result<()> {
        PowerController::set_state(self, "on", target).await
    }

    async fn power_off(&self, target: Option<&Target>) -> Result<()> {
        PowerController::set_state(self, "off", target).await
    }

    async fn power_cycle(&self, target: Option<&Target>) -> Result<()> {
        PowerController::set_state(self, "cycle", target).await
    }

    fn supports_operation(&self, _op: PowerOperation) -> bool {
        true
    }
}
