//! Digital Loggers web power switch
//!
//! Outlets are switched with the switch's legacy outlet endpoint,
//! `GET /outlet?<n>=ON|OFF|CCL`, authenticated with HTTP basic auth.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::config::DliConfig;
use crate::controller::{outlet_from, PowerController, PowerOperation};
use crate::error::{PowerError, Result};
use crate::types::{DliState, Target};

/// DLI web power switch controller
pub struct DliController {
    config: DliConfig,
    client: Client,
}

impl std::fmt::Debug for DliController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DliController")
            .field("ip", &self.config.ip)
            .field("outlet", &self.config.outlet_number)
            .finish()
    }
}

impl DliController {
    pub fn new(config: DliConfig) -> Result<Self> {
        if config.ip.trim().is_empty() && config.base_url.is_none() {
            return Err(PowerError::InvalidConfig("DLI address must not be empty".to_string()));
        }

        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { config, client })
    }

    fn resolve_outlet(&self, outlet: Option<u32>) -> Result<u32> {
        outlet.or(self.config.outlet_number).ok_or_else(|| {
            PowerError::power("Missing outlet number value, not passed in constructor or method parameter")
        })
    }

    /// Switch an outlet
    pub async fn set_state(&self, state: DliState, outlet: Option<u32>) -> Result<()> {
        let outlet = self.resolve_outlet(outlet)?;
        let url = format!("{}/outlet?{}={}", self.config.switch_url(), outlet, state.action());
        debug!(%url, "Sending DLI outlet request");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PowerError::power(format!(
                "DLI switch {} rejected outlet {} {}: HTTP {}",
                self.config.ip,
                outlet,
                state.action(),
                status.as_u16()
            )));
        }

        info!(ip = %self.config.ip, outlet, state = %state, "DLI outlet switched");
        Ok(())
    }
}

#[async_trait]
impl PowerController for DliController {
    fn backend_name(&self) -> &'static str {
        "dli"
    }

    async fn set_state(&self, state: &str, target: Option<&Target>) -> Result<()> {
        let state: DliState = state.parse()?;
        let outlet = outlet_from(target, self.backend_name())?;
        DliController::set_state(self, state, outlet).await
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
