//! Raritan CommandCenter Secure Gateway power control
//!
//! The appliance exposes SOAP web services. A session id from `signOn`
//! authenticates every later call; nodes are addressed by name and their
//! managed power interface is looked up through `getNodeByName`. Power
//! changes run as jobs on the appliance, so each request is followed by
//! polling `getNodePower` until the job reports it is no longer running.

pub mod soap;
pub mod xml;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::CcsgConfig;
use crate::controller::{device_from, PowerController, PowerOperation};
use crate::error::{PowerError, Result};
use crate::types::{CcsgState, Target};

use soap::{SoapClient, NODE_SERVICE, SECURITY_SERVICE};
pub use xml::{extract_device_ids, get_value_from_response, Element};

/// Interface type keyword identifying power sockets
const POWER_INTERFACE: &str = "power";

#[derive(Debug, Default)]
struct Session {
    id: Option<String>,
    /// Power interface of the configured device
    power_socket_id: Option<String>,
}

/// CC-SG controller
pub struct CcsgController {
    config: CcsgConfig,
    client: SoapClient,
    session: Mutex<Session>,
}

impl std::fmt::Debug for CcsgController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CcsgController")
            .field("ip", &self.config.ip)
            .field("device_name", &self.config.device_name)
            .finish()
    }
}

impl CcsgController {
    /// Create a controller; no request is made until the first call
    pub fn new(config: CcsgConfig) -> Result<Self> {
        if config.ip.trim().is_empty() && config.base_url.is_none() {
            return Err(PowerError::InvalidConfig("CC-SG address must not be empty".to_string()));
        }

        let client = SoapClient::new(&config)?;
        Ok(Self {
            config,
            client,
            session: Mutex::new(Session::default()),
        })
    }

    /// Log in and resolve the power interface of the configured device
    pub async fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let session_id = self.ensure_session(&mut session).await?;

        if let Some(device) = &self.config.device_name {
            let socket = self.lookup_power_socket(&session_id, device).await?;
            session.power_socket_id = Some(socket);
        }
        Ok(())
    }

    /// Open a new session, signing off any current one first
    pub async fn login(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if let Some(previous) = session.id.take() {
            session.power_socket_id = None;
            self.sign_off(&previous).await?;
        }
        session.id = Some(self.sign_on().await?);
        Ok(())
    }

    /// Close the session if one is open
    pub async fn logout(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let Some(session_id) = session.id.take() else {
            debug!("No CC-SG session to close");
            return Ok(());
        };
        session.power_socket_id = None;
        self.sign_off(&session_id).await
    }

    /// Current session id
    pub async fn session_id(&self) -> Option<String> {
        self.session.lock().await.id.clone()
    }

    /// Id of the first power interface of `device`
    pub async fn gather_power_socket_id(&self, device: &str) -> Result<String> {
        let mut session = self.session.lock().await;
        let session_id = self.ensure_session(&mut session).await?;
        self.lookup_power_socket(&session_id, device).await
    }

    /// Switch a node's power
    ///
    /// `device` overrides the node bound in the config. A session is
    /// opened only when none exists.
    pub async fn set_state(&self, state: CcsgState, device: Option<&str>) -> Result<()> {
        let device_name = device
            .or(self.config.device_name.as_deref())
            .ok_or_else(|| {
                PowerError::power("Missing device name value, not passed in constructor or method parameter")
            })?;

        let mut session = self.session.lock().await;
        let session_id = self.ensure_session(&mut session).await?;

        // the cached socket belongs to the configured device only
        let bound = match device {
            None => session.power_socket_id.clone(),
            Some(_) => None,
        };
        let socket_id = match bound {
            Some(socket) => socket,
            None => {
                let socket = self.lookup_power_socket(&session_id, device_name).await?;
                if device.is_none() {
                    session.power_socket_id = Some(socket.clone());
                }
                socket
            }
        };

        debug!(device = device_name, socket = %socket_id, state = %state, "Requesting CC-SG node power");
        let url = self.client.service_url(NODE_SERVICE);
        self.client
            .generic_api_call(
                &url,
                soap::set_node_power(&session_id, device_name, &socket_id, state.operation()),
            )
            .await?;

        self.wait_for_job(&session_id, device_name).await?;
        info!(device = device_name, state = %state, "CC-SG node power changed");
        Ok(())
    }

    /// Poll until the node's power job has finished
    pub async fn wait_for_finished_change_state_job(&self, device: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        let session_id = self.ensure_session(&mut session).await?;
        self.wait_for_job(&session_id, device).await
    }

    async fn ensure_session(&self, session: &mut Session) -> Result<String> {
        match &session.id {
            Some(id) => Ok(id.clone()),
            None => {
                let id = self.sign_on().await?;
                session.id = Some(id.clone());
                Ok(id)
            }
        }
    }

    async fn sign_on(&self) -> Result<String> {
        let url = self.client.service_url(SECURITY_SERVICE);
        let body = soap::sign_on(&self.config.username, &self.config.password);

        let session_id = async {
            let response = self.client.generic_api_call(&url, body).await?;
            get_value_from_response(&response, "result")
        }
        .await
        .map_err(|e| {
            warn!(ip = %self.config.ip, error = %e, "CC-SG login failed");
            PowerError::power("Found problem with login request.")
        })?;

        info!(ip = %self.config.ip, "Logged in to CC-SG");
        Ok(session_id)
    }

    async fn sign_off(&self, session_id: &str) -> Result<()> {
        let url = self.client.service_url(SECURITY_SERVICE);
        self.client
            .generic_api_call(&url, soap::sign_off(&self.config.username, session_id))
            .await?;
        info!(ip = %self.config.ip, "Logged out of CC-SG");
        Ok(())
    }

    async fn lookup_power_socket(&self, session_id: &str, device: &str) -> Result<String> {
        let url = self.client.service_url(NODE_SERVICE);
        let response = self
            .client
            .generic_api_call(&url, soap::get_node_by_name(session_id, device))
            .await?;

        let ids = extract_device_ids(&response, POWER_INTERFACE)?;
        if ids.len() > 1 {
            debug!(device, count = ids.len(), "Node has several power interfaces, using the first");
        }
        ids.into_iter()
            .next()
            .ok_or_else(|| PowerError::power(format!("No power interface found for device '{}'", device)))
    }

    async fn wait_for_job(&self, session_id: &str, device: &str) -> Result<()> {
        let url = self.client.service_url(NODE_SERVICE);
        let deadline = Instant::now() + self.config.job_timeout;

        loop {
            let response = self
                .client
                .generic_api_call(&url, soap::get_node_power(session_id, device))
                .await?;
            let in_progress = get_value_from_response(&response, "inProgress")?;

            if in_progress.trim().eq_ignore_ascii_case("false") {
                return Ok(());
            }

            if Instant::now() + self.config.poll_interval > deadline {
                return Err(PowerError::power("Job is still not finished"));
            }
            debug!(device, "CC-SG power job still running");
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

impl Drop for CcsgController {
    fn drop(&mut self) {
        let Some(session_id) = self.session.get_mut().id.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(ip = %self.config.ip, "CC-SG controller dropped outside a runtime, session left open");
            return;
        };

        // best effort, nothing awaits this task
        let client = self.client.clone();
        let url = client.service_url(SECURITY_SERVICE);
        let body = soap::sign_off(&self.config.username, &session_id);
        let ip = self.config.ip.clone();
        handle.spawn(async move {
            match client.generic_api_call(&url, body).await {
                Ok(_) => debug!(%ip, "Closed CC-SG session on drop"),
                Err(e) => warn!(%ip, error = %e, "Failed to close CC-SG session on drop"),
            }
        });
    }
}

#[async_trait]
impl PowerController for CcsgController {
    fn backend_name(&self) -> &'static str {
        "ccsg"
    }

    async fn set_state(&self, state: &str, target: Option<&Target>) -> Result<()> {
        let state: CcsgState = state.parse()?;
        let device = device_from(target, self.backend_name())?;
        CcsgController::set_state(self, state, device).await
    }

    async fn power_on(&self, target: Option<&Target>) -> Result<()> {
        PowerController::set_state(self, "on", target).await
    }

    async fn power_off(&self, target: Option<&Target>) -> Result<()> {
        PowerController::set_state(self, "off", target).await
    }

    async fn power_cycle(&self, target: Option<&Target>) -> Result<()> {
        self.power_off(target).await?;
        self.power_on(target).await
    }

    fn supports_operation(&self, _op: PowerOperation) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        self.logout().await
    }
}
