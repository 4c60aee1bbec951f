//! Backend configuration
//!
//! Every default (community string, ports, certificate paths, delays) is
//! an explicit field with a `Default` value, so callers can see and
//! override all of them. All configs deserialize with serde; durations are
//! given in seconds.

use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

use crate::controller::DEFAULT_CYCLE_DELAY;

/// Default SNMP community string for PDU writes
pub const DEFAULT_COMMUNITY: &str = "private";
/// Default SNMP agent port
pub const DEFAULT_SNMP_PORT: u16 = 161;
/// Default CC-SG web-services port
pub const DEFAULT_CCSG_PORT: u16 = 8443;
/// Default CC-SG client certificate
pub const DEFAULT_CCSG_CERT_PATH: &str = "/etc/ssl/ccsg/ccsg.crt.pem";
/// Default CC-SG client key
pub const DEFAULT_CCSG_KEY_PATH: &str = "/etc/ssl/ccsg/ccsg.key.pem";

/// IPMI command-line tool flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpmiTool {
    #[default]
    IpmiTool,
    IpmiUtil,
}

impl std::fmt::Display for IpmiTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpmiTool::IpmiTool => write!(f, "ipmitool"),
            IpmiTool::IpmiUtil => write!(f, "ipmiutil"),
        }
    }
}

/// IPMI controller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IpmiConfig {
    /// BMC hostname or IP address
    pub host: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub tool: IpmiTool,
    /// Pause between failed attempts
    #[serde(default = "default_ipmi_retry_delay", deserialize_with = "secs")]
    pub retry_delay: Duration,
    /// Pause between power down and power up in `powercycle`
    #[serde(default = "default_cycle_delay", deserialize_with = "secs")]
    pub cycle_delay: Duration,
}

impl IpmiConfig {
    /// Create new IPMI config
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            tool: IpmiTool::default(),
            retry_delay: default_ipmi_retry_delay(),
            cycle_delay: default_cycle_delay(),
        }
    }

    /// Select the command-line tool
    pub fn with_tool(mut self, tool: IpmiTool) -> Self {
        self.tool = tool;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_cycle_delay(mut self, delay: Duration) -> Self {
        self.cycle_delay = delay;
        self
    }
}

/// PDU vendor selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PduVendorKind {
    Apc,
    Raritan,
}

/// SNMP PDU configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PduConfig {
    /// PDU hostname or IP address
    pub host: String,
    pub vendor: PduVendorKind,
    #[serde(default = "default_snmp_port")]
    pub port: u16,
    #[serde(default = "default_community")]
    pub community: String,
    /// Outlet used when a call does not name one
    #[serde(default)]
    pub outlet_number: Option<u32>,
    /// Wait per SNMP request attempt
    #[serde(default = "default_snmp_timeout", deserialize_with = "secs")]
    pub timeout: Duration,
    /// Retransmissions after the first request
    #[serde(default = "default_snmp_retries")]
    pub retries: u32,
    /// Pause after a successful SET so the PDU can settle
    #[serde(default = "default_settle_delay", deserialize_with = "secs")]
    pub settle_delay: Duration,
}

impl PduConfig {
    /// Create new PDU config with defaults
    pub fn new(host: impl Into<String>, vendor: PduVendorKind) -> Self {
        Self {
            host: host.into(),
            vendor,
            port: DEFAULT_SNMP_PORT,
            community: DEFAULT_COMMUNITY.to_string(),
            outlet_number: None,
            timeout: default_snmp_timeout(),
            retries: default_snmp_retries(),
            settle_delay: default_settle_delay(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_community(mut self, community: impl Into<String>) -> Self {
        self.community = community.into();
        self
    }

    /// Bind a default outlet
    pub fn with_outlet(mut self, outlet: u32) -> Self {
        self.outlet_number = Some(outlet);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration, retries: u32) -> Self {
        self.timeout = timeout;
        self.retries = retries;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// CC-SG appliance configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CcsgConfig {
    /// Appliance hostname or IP address
    pub ip: String,
    pub username: String,
    pub password: String,
    /// Node used when a call does not name one
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default = "default_ccsg_port")]
    pub port: u16,
    /// Override for the web-services root URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// Client certificate; `None` disables client authentication
    #[serde(default = "default_cert_path")]
    pub cert_path: Option<PathBuf>,
    #[serde(default = "default_key_path")]
    pub key_path: Option<PathBuf>,
    #[serde(default = "default_poll_interval", deserialize_with = "secs")]
    pub poll_interval: Duration,
    /// Upper bound for waiting on a power job
    #[serde(default = "default_job_timeout", deserialize_with = "secs")]
    pub job_timeout: Duration,
    #[serde(default = "default_request_timeout", deserialize_with = "secs")]
    pub request_timeout: Duration,
    /// Extra attempts for a failed web-service call
    #[serde(default = "default_call_retries")]
    pub call_retries: u32,
    #[serde(default = "default_call_retry_delay", deserialize_with = "secs")]
    pub call_retry_delay: Duration,
}

impl CcsgConfig {
    /// Create new CC-SG config with defaults
    pub fn new(ip: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            username: username.into(),
            password: password.into(),
            device_name: None,
            port: DEFAULT_CCSG_PORT,
            base_url: None,
            cert_path: default_cert_path(),
            key_path: default_key_path(),
            poll_interval: default_poll_interval(),
            job_timeout: default_job_timeout(),
            request_timeout: default_request_timeout(),
            call_retries: default_call_retries(),
            call_retry_delay: default_call_retry_delay(),
        }
    }

    /// Bind a default node
    pub fn with_device(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = Some(device_name.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_certificate(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.cert_path = Some(cert_path.into());
        self.key_path = Some(key_path.into());
        self
    }

    pub fn without_client_certificate(mut self) -> Self {
        self.cert_path = None;
        self.key_path = None;
        self
    }

    pub fn with_job_polling(mut self, poll_interval: Duration, job_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.job_timeout = job_timeout;
        self
    }

    pub fn with_call_retries(mut self, call_retries: u32, call_retry_delay: Duration) -> Self {
        self.call_retries = call_retries;
        self.call_retry_delay = call_retry_delay;
        self
    }

    /// Web-services root URL
    pub fn services_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}:{}/CommandCenterWebServices", self.ip, self.port),
        }
    }
}

/// DLI web power switch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DliConfig {
    /// Switch hostname or IP address
    pub ip: String,
    pub username: String,
    pub password: String,
    /// Outlet used when a call does not name one
    #[serde(default)]
    pub outlet_number: Option<u32>,
    /// Override for the switch root URL
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout", deserialize_with = "secs")]
    pub request_timeout: Duration,
}

impl DliConfig {
    /// Create new DLI config with defaults
    pub fn new(ip: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            username: username.into(),
            password: password.into(),
            outlet_number: None,
            base_url: None,
            request_timeout: default_request_timeout(),
        }
    }

    /// Bind a default outlet
    pub fn with_outlet(mut self, outlet: u32) -> Self {
        self.outlet_number = Some(outlet);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Switch root URL
    pub fn switch_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}", self.ip),
        }
    }
}

/// One configured device
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeviceConfig {
    Ipmi(IpmiConfig),
    Pdu(PduConfig),
    Ccsg(CcsgConfig),
    Dli(DliConfig),
    /// OS power states of the host behind the connection
    System,
}

impl DeviceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceConfig::Ipmi(_) => "ipmi",
            DeviceConfig::Pdu(_) => "pdu",
            DeviceConfig::Ccsg(_) => "ccsg",
            DeviceConfig::Dli(_) => "dli",
            DeviceConfig::System => "system",
        }
    }
}

fn secs<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(serde::de::Error::custom(format!("invalid duration: {}", secs)));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn default_ipmi_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_cycle_delay() -> Duration {
    DEFAULT_CYCLE_DELAY
}

fn default_snmp_port() -> u16 {
    DEFAULT_SNMP_PORT
}

fn default_community() -> String {
    DEFAULT_COMMUNITY.to_string()
}

fn default_snmp_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_snmp_retries() -> u32 {
    5
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_ccsg_port() -> u16 {
    DEFAULT_CCSG_PORT
}

fn default_cert_path() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_CCSG_CERT_PATH))
}

fn default_key_path() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_CCSG_KEY_PATH))
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_job_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_call_retries() -> u32 {
    2
}

fn default_call_retry_delay() -> Duration {
    Duration::from_secs(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_pdu_config_defaults() {
        let config = PduConfig::new("10.10.10.10", PduVendorKind::Apc);
        assert_eq!(config.community, "private");
        assert_eq!(config.port, 161);
        assert_eq!(config.outlet_number, None);

        let config = config.with_community("string").with_outlet(5);
        assert_eq!(config.community, "string");
        assert_eq!(config.outlet_number, Some(5));
    }

    #[test]
    fn test_ccsg_config_defaults() {
        let config = CcsgConfig::new("10.0.0.2", "user", "pass");
        assert_eq!(config.cert_path, Some(PathBuf::from("/etc/ssl/ccsg/ccsg.crt.pem")));
        assert_eq!(config.key_path, Some(PathBuf::from("/etc/ssl/ccsg/ccsg.key.pem")));
        assert_eq!(
            config.services_url(),
            "https://10.0.0.2:8443/CommandCenterWebServices"
        );

        let config = config
            .with_base_url("http://127.0.0.1:1234/")
            .without_client_certificate();
        assert_eq!(config.services_url(), "http://127.0.0.1:1234");
        assert!(config.cert_path.is_none());
        assert_eq!(config.call_retries, 2);
        assert_eq!(config.call_retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_ipmi_config_builder() {
        let config = IpmiConfig::new("bmc.local", "root", "secret").with_tool(IpmiTool::IpmiUtil);
        assert_eq!(config.tool, IpmiTool::IpmiUtil);
        assert_eq!(config.cycle_delay, DEFAULT_CYCLE_DELAY);
    }

    #[test]
    fn test_device_config_from_toml() {
        let text = r#"
            [bmc]
            kind = "ipmi"
            host = "10.10.10.10"
            username = "root"
            password = "secret"
            tool = "ipmiutil"
            retry_delay = 0.5

            [rack-pdu]
            kind = "pdu"
            host = "10.10.10.20"
            vendor = "raritan"
            outlet_number = 7

            [kvm]
            kind = "ccsg"
            ip = "10.10.10.30"
            username = "user"
            password = "pass"
            device_name = "node-1"

            [switch]
            kind = "dli"
            ip = "10.10.10.40"
            username = "admin"
            password = "1234"

            [local]
            kind = "system"
        "#;

        let devices: BTreeMap<String, DeviceConfig> = toml::from_str(text).unwrap();
        assert_eq!(devices.len(), 5);

        match &devices["bmc"] {
            DeviceConfig::Ipmi(c) => {
                assert_eq!(c.tool, IpmiTool::IpmiUtil);
                assert_eq!(c.retry_delay, Duration::from_millis(500));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &devices["rack-pdu"] {
            DeviceConfig::Pdu(c) => {
                assert_eq!(c.vendor, PduVendorKind::Raritan);
                assert_eq!(c.community, "private");
                assert_eq!(c.outlet_number, Some(7));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &devices["kvm"] {
            DeviceConfig::Ccsg(c) => {
                assert_eq!(c.device_name.as_deref(), Some("node-1"));
                assert_eq!(c.job_timeout, Duration::from_secs(60));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(devices["switch"].kind(), "dli");
        assert_eq!(devices["local"].kind(), "system");
    }

    #[test]
    fn test_negative_duration_rejected() {
        let text = r#"
            kind = "ipmi"
            host = "h"
            username = "u"
            password = "p"
            retry_delay = -1
        "#;
        assert!(toml::from_str::<DeviceConfig>(text).is_err());
    }
}
