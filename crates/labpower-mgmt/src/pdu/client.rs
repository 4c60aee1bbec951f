//! SNMP transport
//!
//! One SET per call over UDP, with a per-attempt timeout and a bounded
//! number of retransmissions of the same request.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, trace};

use super::snmp::{PduType, Result, SnmpError, SnmpMessage};

/// Largest datagram accepted from an agent
const MAX_DATAGRAM: usize = 65_507;

/// Write access to an SNMP agent
#[async_trait]
pub trait SnmpClient: Send + Sync {
    /// SET an INTEGER at `oid` and return the agent's response
    async fn set(&self, oid: &str, value: i64) -> Result<SnmpMessage>;
}

/// SNMPv2c client over UDP
#[derive(Debug)]
pub struct UdpSnmpClient {
    host: String,
    port: u16,
    community: String,
    timeout: Duration,
    retries: u32,
    next_request_id: AtomicI32,
}

impl UdpSnmpClient {
    pub fn new(host: &str, port: u16, community: &str, timeout: Duration, retries: u32) -> Self {
        Self {
            host: host.to_string(),
            port,
            community: community.to_string(),
            timeout,
            retries,
            next_request_id: AtomicI32::new(seed_request_id()),
        }
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        let target = self.target();
        let found = match lookup_host(target.as_str()).await {
            Ok(mut addrs) => addrs.next(),
            Err(_) => None,
        };
        found.ok_or(SnmpError::Resolve(target))
    }

    fn request_id(&self) -> i32 {
        // keep ids positive
        self.next_request_id.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF
    }
}

#[async_trait]
impl SnmpClient for UdpSnmpClient {
    async fn set(&self, oid: &str, value: i64) -> Result<SnmpMessage> {
        let agent = self.resolve().await?;
        let bind: SocketAddr = if agent.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(agent).await?;

        let request_id = self.request_id();
        let request = SnmpMessage::set_request(&self.community, request_id, oid, value).encode()?;
        let attempts = self.retries + 1;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        for attempt in 1..=attempts {
            debug!(agent = %agent, oid, value, attempt, "Sending SNMP SET");
            socket.send(&request).await?;

            let deadline = tokio::time::Instant::now() + self.timeout;
            loop {
                let len = match tokio::time::timeout_at(deadline, socket.recv(&mut buf)).await {
                    Ok(received) => received?,
                    Err(_) => break,
                };

                match SnmpMessage::decode(&buf[..len]) {
                    Ok(response)
                        if response.pdu_type == PduType::Response
                            && response.request_id == request_id =>
                    {
                        return Ok(response);
                    }
                    Ok(other) => {
                        trace!(request_id = other.request_id, "Ignoring unrelated SNMP message");
                    }
                    Err(e) => {
                        trace!(error = %e, "Ignoring undecodable datagram");
                    }
                }
            }
        }

        Err(SnmpError::Timeout {
            target: self.target(),
            attempts,
        })
    }
}

fn seed_request_id() -> i32 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos & 0x3FFF_FFFF) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::snmp::{VarBind, VarValue};

    // Answers each SET with a Response echoing the varbinds
    async fn spawn_agent(error_status: u32, drop_first: usize) -> (SocketAddr, tokio::task::JoinHandle<Vec<SnmpMessage>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut buf = vec![0u8; 1500];
            loop {
                let received = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await;
                let Ok(Ok((len, peer))) = received else { break };
                let request = SnmpMessage::decode(&buf[..len]).unwrap();
                seen.push(request.clone());
                if seen.len() <= drop_first {
                    continue;
                }
                let response = SnmpMessage {
                    pdu_type: PduType::Response,
                    error_status,
                    error_index: if error_status == 0 { 0 } else { 1 },
                    ..request
                };
                socket.send_to(&response.encode().unwrap(), peer).await.unwrap();
                break;
            }
            seen
        });

        (addr, handle)
    }

    #[tokio::test]
    async fn test_set_roundtrip_against_local_agent() {
        let (addr, agent) = spawn_agent(0, 0).await;
        let client = UdpSnmpClient::new("127.0.0.1", addr.port(), "private", Duration::from_millis(500), 1);

        let response = client.set("1.3.6.1.4.1.318.1.1.12.3.3.1.1.4.3", 1).await.unwrap();
        assert_eq!(response.error_status, 0);
        assert_eq!(
            response.varbinds,
            vec![VarBind {
                oid: "1.3.6.1.4.1.318.1.1.12.3.3.1.1.4.3".to_string(),
                value: VarValue::Integer(1),
            }]
        );

        let seen = agent.await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].community, "private");
        assert_eq!(seen[0].pdu_type, PduType::SetRequest);
    }

    #[tokio::test]
    async fn test_retransmits_until_answered() {
        let (addr, agent) = spawn_agent(0, 2).await;
        let client = UdpSnmpClient::new("127.0.0.1", addr.port(), "private", Duration::from_millis(100), 3);

        client.set("1.3.6.1.4.1.318.1.1.12.3.3.1.1.4.1", 2).await.unwrap();

        let seen = agent.await.unwrap();
        assert_eq!(seen.len(), 3);
        // every retransmission reuses the request id
        assert!(seen.iter().all(|m| m.request_id == seen[0].request_id));
    }

    #[tokio::test]
    async fn test_timeout_after_all_attempts() {
        // bound but silent
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();
        let client = UdpSnmpClient::new("127.0.0.1", port, "private", Duration::from_millis(50), 2);

        let err = client.set("1.3.6.1.4.1.318.1.1.12.3.3.1.1.4.1", 1).await.unwrap_err();
        assert!(matches!(err, SnmpError::Timeout { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_raised() {
        let (addr, _agent) = spawn_agent(17, 0).await;
        let client = UdpSnmpClient::new("127.0.0.1", addr.port(), "public", Duration::from_millis(500), 0);

        let response = client.set("1.3.6.1.4.1.13742.6.4.1.2.1.2.1.2", 0).await.unwrap();
        assert_eq!(response.error_status, 17);
    }

    #[tokio::test]
    async fn test_unresolvable_host() {
        let client = UdpSnmpClient::new("host.invalid", 161, "private", Duration::from_millis(50), 0);
        let err = client.set("1.3.6.1", 1).await.unwrap_err();
        assert!(matches!(err, SnmpError::Resolve(_)));
    }
}
