//! Controller construction from configuration

use labpower_connect::Connection;
use std::sync::Arc;

use crate::ccsg::CcsgController;
use crate::config::DeviceConfig;
use crate::controller::PowerController;
use crate::dli::DliController;
use crate::error::Result;
use crate::ipmi::IpmiController;
use crate::pdu::PduController;
use crate::system::SystemPowerController;

/// Build the controller for a configured device
///
/// IPMI probes its tool and the system backend asks the connection for
/// its OS, so both use `connection` here. The network backends ignore it.
pub async fn build_controller(
    device: &DeviceConfig,
    connection: Arc<dyn Connection>,
) -> Result<Box<dyn PowerController>> {
    let controller: Box<dyn PowerController> = match device {
        DeviceConfig::Ipmi(config) => Box::new(IpmiController::new(connection, config.clone()).await?),
        DeviceConfig::Pdu(config) => Box::new(PduController::new(config.clone())?),
        DeviceConfig::Ccsg(config) => Box::new(CcsgController::new(config.clone())?),
        DeviceConfig::Dli(config) => Box::new(DliController::new(config.clone())?),
        DeviceConfig::System => Box::new(SystemPowerController::new(connection).await?),
    };
    Ok(controller)
}
