//! CC-SG web-service envelopes and HTTP transport

use quick_xml::escape::escape;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Identity, StatusCode};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::CcsgConfig;
use crate::error::{PowerError, Result};

pub const SECURITY_SERVICE: &str = "SecurityAndAccessServicePort";
pub const NODE_SERVICE: &str = "NodeManagementServicePort";

const SECURITY_NS: &str = "http://com.raritan.cc.bl.webservice.service.security/types";
const NODE_NS: &str = "http://com.raritan.cc.bl.webservice.service.node/types";

fn envelope(namespace: &str, operation: &str, params: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, value) in params {
        body.push_str(&format!("<{0}>{1}</{0}>", name, escape(*value)));
    }
    format!(
        concat!(
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:typ="{ns}">"#,
            "<soapenv:Header/><soapenv:Body><typ:{op}>{body}</typ:{op}></soapenv:Body></soapenv:Envelope>"
        ),
        ns = namespace,
        op = operation,
        body = body
    )
}

pub fn sign_on(username: &str, password: &str) -> String {
    envelope(SECURITY_NS, "signOn", &[("username", username), ("password", password)])
}

pub fn sign_off(username: &str, session_id: &str) -> String {
    envelope(SECURITY_NS, "signOff", &[("username", username), ("sessionID", session_id)])
}

pub fn get_node_by_name(session_id: &str, node_name: &str) -> String {
    envelope(NODE_NS, "getNodeByName", &[("sessionID", session_id), ("nodeName", node_name)])
}

pub fn set_node_power(session_id: &str, node_name: &str, interface_id: &str, operation: &str) -> String {
    envelope(
        NODE_NS,
        "setNodePower",
        &[
            ("sessionID", session_id),
            ("nodeName", node_name),
            ("interfaceIDs", interface_id),
            ("powerOperationType", operation),
        ],
    )
}

pub fn get_node_power(session_id: &str, node_name: &str) -> String {
    envelope(NODE_NS, "getNodePower", &[("sessionID", session_id), ("nodeName", node_name)])
}

/// HTTPS client for the appliance's web services
#[derive(Debug, Clone)]
pub struct SoapClient {
    client: Client,
    services_url: String,
    retries: u32,
    retry_delay: Duration,
}

impl SoapClient {
    /// Build the client, loading the client certificate when configured
    ///
    /// The appliance presents a self-signed certificate, so server
    /// verification is off.
    pub fn new(config: &CcsgConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(config.request_timeout);

        match (&config.cert_path, &config.key_path) {
            (Some(cert), Some(key)) => builder = builder.identity(load_identity(cert, key)?),
            (None, None) => {}
            _ => {
                return Err(PowerError::InvalidConfig(
                    "CC-SG client certificate and key must be set together".to_string(),
                ))
            }
        }

        Ok(Self {
            client: builder.build()?,
            services_url: config.services_url(),
            retries: config.call_retries,
            retry_delay: config.call_retry_delay,
        })
    }

    pub fn service_url(&self, service: &str) -> String {
        format!("{}/{}", self.services_url, service)
    }

    /// POST a SOAP body and return the response text
    ///
    /// Transport errors and non-200 answers are retried up to the
    /// configured count; the last failure is returned.
    pub async fn generic_api_call(&self, url: &str, body: String) -> Result<String> {
        let attempts = self.retries + 1;
        let mut attempt = 1;
        loop {
            match self.call_once(url, body.clone()).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < attempts => {
                    warn!(%url, attempt, attempts, error = %e, "CC-SG call failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_once(&self, url: &str, body: String) -> Result<String> {
        debug!(%url, "Calling CC-SG web service");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            error!(
                "Error on Raritan CCSG api call ! Response status code: {}",
                status.as_u16()
            );
            return Err(PowerError::power(format!(
                "Response has incorrect status code: {}",
                status.as_u16()
            )));
        }

        Ok(response.text().await?)
    }
}

fn load_identity(cert: &Path, key: &Path) -> Result<Identity> {
    let read = |path: &Path| {
        std::fs::read(path).map_err(|e| {
            PowerError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })
    };

    let mut pem = read(cert)?;
    pem.push(b'\n');
    pem.extend(read(key)?);
    Identity::from_pem(&pem).map_err(PowerError::from)
}
