use color_eyre::eyre::{bail, Result, WrapErr};
use labpower_connect::LocalConnection;
use labpower_mgmt::{build_controller, DeviceConfig, PowerController, SystemPowerController};
use std::sync::Arc;
use tracing::info;

use super::config::LabConfig;
use crate::TargetArgs;

async fn controller_for(lab: &LabConfig, name: &str) -> Result<Box<dyn PowerController>> {
    let device = lab.device(name)?;
    build_controller(device, Arc::new(LocalConnection::new()))
        .await
        .wrap_err_with(|| format!("Failed to set up {} controller for '{}'", device.kind(), name))
}

/// Release the controller's remote session, keeping the command's error first
async fn finish(controller: Box<dyn PowerController>, name: &str, result: Result<()>) -> Result<()> {
    let closed = controller
        .close()
        .await
        .wrap_err_with(|| format!("Failed to close {} controller for '{}'", controller.backend_name(), name));
    result?;
    closed
}

pub fn list(lab: &LabConfig) -> Result<()> {
    if lab.devices.is_empty() {
        println!("No devices configured.");
        return Ok(());
    }
    for (name, device) in &lab.devices {
        println!("{}\t{}", name, device.kind());
    }
    Ok(())
}

pub async fn power_on(lab: &LabConfig, args: &TargetArgs) -> Result<()> {
    let controller = controller_for(lab, &args.device).await?;
    let result = controller
        .power_on(args.target().as_ref())
        .await
        .wrap_err_with(|| format!("Power on failed for '{}'", args.device));
    finish(controller, &args.device, result).await?;
    info!(device = %args.device, "Powered on");
    Ok(())
}

pub async fn power_off(lab: &LabConfig, args: &TargetArgs) -> Result<()> {
    let controller = controller_for(lab, &args.device).await?;
    let result = controller
        .power_off(args.target().as_ref())
        .await
        .wrap_err_with(|| format!("Power off failed for '{}'", args.device));
    finish(controller, &args.device, result).await?;
    info!(device = %args.device, "Powered off");
    Ok(())
}

pub async fn power_cycle(lab: &LabConfig, args: &TargetArgs) -> Result<()> {
    let controller = controller_for(lab, &args.device).await?;
    let result = controller
        .power_cycle(args.target().as_ref())
        .await
        .wrap_err_with(|| format!("Power cycle failed for '{}'", args.device));
    finish(controller, &args.device, result).await?;
    info!(device = %args.device, "Power cycled");
    Ok(())
}

pub async fn set_state(lab: &LabConfig, args: &TargetArgs, state: &str) -> Result<()> {
    let controller = controller_for(lab, &args.device).await?;
    let result = controller
        .set_state(state, args.target().as_ref())
        .await
        .wrap_err_with(|| format!("Setting state '{}' failed for '{}'", state, args.device));
    finish(controller, &args.device, result).await?;
    info!(device = %args.device, state, "State set");
    Ok(())
}

pub async fn states(lab: &LabConfig, name: &str) -> Result<()> {
    let device = lab.device(name)?;
    if !matches!(device, DeviceConfig::System) {
        bail!("'{}' is a {} device; power states are listed for system devices only", name, device.kind());
    }

    let system = SystemPowerController::new(Arc::new(LocalConnection::new())).await?;
    let states = system.get_available_power_states().await?;
    let names: Vec<String> = states.iter().map(|s| s.to_string()).collect();
    println!("{}", names.join(" "));
    Ok(())
}
