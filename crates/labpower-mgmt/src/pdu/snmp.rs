//! SNMPv2c message encoding
//!
//! BER encoding and decoding of the community-based SNMP messages needed
//! to write PDU outlet controls (RFC 3416 PDUs wrapped in the RFC 1901
//! community message).

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// SNMP version field value for SNMPv2c
const VERSION_2C: i64 = 1;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OBJECT_ID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_IP_ADDRESS: u8 = 0x40;
const TAG_COUNTER32: u8 = 0x41;
const TAG_GAUGE32: u8 = 0x42;
const TAG_TIMETICKS: u8 = 0x43;
const TAG_COUNTER64: u8 = 0x46;
const TAG_NO_SUCH_OBJECT: u8 = 0x80;
const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
const TAG_END_OF_MIB_VIEW: u8 = 0x82;

/// Error type for SNMP exchanges
#[derive(Debug, Error)]
pub enum SnmpError {
    /// Malformed or unexpected message
    #[error("malformed SNMP message: {0}")]
    Decode(String),

    /// OID string that cannot be encoded
    #[error("invalid OID: {0}")]
    InvalidOid(String),

    /// Agent address did not resolve
    #[error("cannot resolve SNMP agent {0}")]
    Resolve(String),

    /// No matching response in time
    #[error("no SNMP response from {target} after {attempts} attempts")]
    Timeout { target: String, attempts: u32 },

    /// Socket failure
    #[error("SNMP transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for SNMP operations
pub type Result<T> = std::result::Result<T, SnmpError>;

/// SNMP PDU types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    Report = 0xA8,
}

impl TryFrom<u8> for PduType {
    type Error = SnmpError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0xA0 => Ok(PduType::GetRequest),
            0xA1 => Ok(PduType::GetNextRequest),
            0xA2 => Ok(PduType::Response),
            0xA3 => Ok(PduType::SetRequest),
            0xA8 => Ok(PduType::Report),
            _ => Err(SnmpError::Decode(format!("unknown PDU tag: {:#04x}", value))),
        }
    }
}

/// Variable binding value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarValue {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(String),
    /// Counter32, Gauge32, TimeTicks, Counter64
    Unsigned(u64),
    IpAddress([u8; 4]),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    Other { tag: u8, data: Vec<u8> },
}

impl std::fmt::Display for VarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarValue::Integer(v) => write!(f, "{}", v),
            VarValue::OctetString(v) => write!(f, "{}", String::from_utf8_lossy(v)),
            VarValue::Null => write!(f, "null"),
            VarValue::ObjectId(oid) => write!(f, "{}", oid),
            VarValue::Unsigned(v) => write!(f, "{}", v),
            VarValue::IpAddress(a) => write!(f, "{}.{}.{}.{}", a[0], a[1], a[2], a[3]),
            VarValue::NoSuchObject => write!(f, "noSuchObject"),
            VarValue::NoSuchInstance => write!(f, "noSuchInstance"),
            VarValue::EndOfMibView => write!(f, "endOfMibView"),
            VarValue::Other { tag, data } => write!(f, "tag {:#04x} ({} bytes)", tag, data.len()),
        }
    }
}

/// One OID/value pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: String,
    pub value: VarValue,
}

/// Community-based SNMP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpMessage {
    pub community: String,
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: u32,
    pub error_index: u32,
    pub varbinds: Vec<VarBind>,
}

impl SnmpMessage {
    /// SetRequest writing one INTEGER value
    pub fn set_request(community: &str, request_id: i32, oid: &str, value: i64) -> Self {
        Self {
            community: community.to_string(),
            pdu_type: PduType::SetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind {
                oid: oid.to_string(),
                value: VarValue::Integer(value),
            }],
        }
    }

    /// Encode the message to bytes
    pub fn encode(&self) -> Result<Bytes> {
        let mut varbinds = BytesMut::new();
        for varbind in &self.varbinds {
            let mut entry = BytesMut::new();
            put_tlv(&mut entry, TAG_OBJECT_ID, &oid_bytes(&varbind.oid)?);
            put_value(&mut entry, &varbind.value)?;
            put_tlv(&mut varbinds, TAG_SEQUENCE, &entry);
        }

        let mut pdu = BytesMut::new();
        put_tlv(&mut pdu, TAG_INTEGER, &integer_bytes(i64::from(self.request_id)));
        put_tlv(&mut pdu, TAG_INTEGER, &integer_bytes(i64::from(self.error_status)));
        put_tlv(&mut pdu, TAG_INTEGER, &integer_bytes(i64::from(self.error_index)));
        put_tlv(&mut pdu, TAG_SEQUENCE, &varbinds);

        let mut message = BytesMut::new();
        put_tlv(&mut message, TAG_INTEGER, &integer_bytes(VERSION_2C));
        put_tlv(&mut message, TAG_OCTET_STRING, self.community.as_bytes());
        put_tlv(&mut message, self.pdu_type as u8, &pdu);

        let mut buf = BytesMut::with_capacity(message.len() + 4);
        put_tlv(&mut buf, TAG_SEQUENCE, &message);
        Ok(buf.freeze())
    }

    /// Parse a message from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut outer = BerReader::new(data);
        let mut message = BerReader::new(outer.expect(TAG_SEQUENCE)?);

        let version = decode_integer(message.expect(TAG_INTEGER)?)?;
        if version != VERSION_2C {
            return Err(SnmpError::Decode(format!("unsupported SNMP version {}", version)));
        }
        let community = String::from_utf8_lossy(message.expect(TAG_OCTET_STRING)?).to_string();

        let (tag, pdu) = message.read_tlv()?;
        let pdu_type = PduType::try_from(tag)?;
        let mut pdu = BerReader::new(pdu);

        let request_id = decode_integer(pdu.expect(TAG_INTEGER)?)?;
        let error_status = decode_integer(pdu.expect(TAG_INTEGER)?)?;
        let error_index = decode_integer(pdu.expect(TAG_INTEGER)?)?;

        let mut list = BerReader::new(pdu.expect(TAG_SEQUENCE)?);
        let mut varbinds = Vec::new();
        while !list.is_empty() {
            let mut entry = BerReader::new(list.expect(TAG_SEQUENCE)?);
            let oid = decode_oid(entry.expect(TAG_OBJECT_ID)?)?;
            let (tag, content) = entry.read_tlv()?;
            varbinds.push(VarBind {
                oid,
                value: decode_value(tag, content)?,
            });
        }

        Ok(Self {
            community,
            pdu_type,
            request_id: i32::try_from(request_id)
                .map_err(|_| SnmpError::Decode(format!("request id out of range: {}", request_id)))?,
            error_status: u32::try_from(error_status)
                .map_err(|_| SnmpError::Decode(format!("bad error-status: {}", error_status)))?,
            error_index: u32::try_from(error_index)
                .map_err(|_| SnmpError::Decode(format!("bad error-index: {}", error_index)))?,
            varbinds,
        })
    }
}

/// RFC 3416 name of an error-status value
pub fn error_status_name(status: u32) -> &'static str {
    match status {
        0 => "noError",
        1 => "tooBig",
        2 => "noSuchName",
        3 => "badValue",
        4 => "readOnly",
        5 => "genErr",
        6 => "noAccess",
        7 => "wrongType",
        8 => "wrongLength",
        9 => "wrongEncoding",
        10 => "wrongValue",
        11 => "noCreation",
        12 => "inconsistentValue",
        13 => "resourceUnavailable",
        14 => "commitFailed",
        15 => "undoFailed",
        16 => "authorizationError",
        17 => "notWritable",
        18 => "inconsistentName",
        _ => "unknownError",
    }
}

fn put_length(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
        return;
    }
    let bytes = (len as u32).to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    buf.put_u8(0x80 | (bytes.len() - skip) as u8);
    buf.put_slice(&bytes[skip..]);
}

fn put_tlv(buf: &mut BytesMut, tag: u8, content: &[u8]) {
    buf.put_u8(tag);
    put_length(buf, content.len());
    buf.put_slice(content);
}

fn put_value(buf: &mut BytesMut, value: &VarValue) -> Result<()> {
    match value {
        VarValue::Integer(v) => put_tlv(buf, TAG_INTEGER, &integer_bytes(*v)),
        VarValue::OctetString(v) => put_tlv(buf, TAG_OCTET_STRING, v),
        VarValue::Null => put_tlv(buf, TAG_NULL, &[]),
        VarValue::ObjectId(oid) => put_tlv(buf, TAG_OBJECT_ID, &oid_bytes(oid)?),
        VarValue::Unsigned(v) => put_tlv(buf, TAG_GAUGE32, &unsigned_bytes(*v)),
        VarValue::IpAddress(a) => put_tlv(buf, TAG_IP_ADDRESS, a),
        VarValue::NoSuchObject => put_tlv(buf, TAG_NO_SUCH_OBJECT, &[]),
        VarValue::NoSuchInstance => put_tlv(buf, TAG_NO_SUCH_INSTANCE, &[]),
        VarValue::EndOfMibView => put_tlv(buf, TAG_END_OF_MIB_VIEW, &[]),
        VarValue::Other { tag, data } => put_tlv(buf, *tag, data),
    }
    Ok(())
}

/// Minimal two's complement encoding
fn integer_bytes(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn unsigned_bytes(value: u64) -> Vec<u8> {
    let mut out = vec![0u8];
    out.extend_from_slice(&value.to_be_bytes());
    let skip = out.iter().take_while(|&&b| b == 0).count();
    // keep one leading zero when the top bit is set
    let start = if skip < out.len() && out[skip] & 0x80 != 0 { skip - 1 } else { skip.min(out.len() - 1) };
    out[start..].to_vec()
}

fn oid_bytes(oid: &str) -> Result<Vec<u8>> {
    let invalid = || SnmpError::InvalidOid(oid.to_string());
    let arcs = oid
        .trim_start_matches('.')
        .split('.')
        .map(|arc| arc.parse::<u64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;

    if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
        return Err(invalid());
    }

    let mut out = Vec::with_capacity(arcs.len() + 4);
    let first = (arcs[0] * 40).checked_add(arcs[1]).ok_or_else(invalid)?;
    push_base128(&mut out, first);
    for arc in &arcs[2..] {
        push_base128(&mut out, *arc);
    }
    Ok(out)
}

fn push_base128(out: &mut Vec<u8>, mut value: u64) {
    let mut tmp = [0u8; 10];
    let mut i = tmp.len() - 1;
    tmp[i] = (value & 0x7F) as u8;
    value >>= 7;
    while value > 0 {
        i -= 1;
        tmp[i] = 0x80 | (value & 0x7F) as u8;
        value >>= 7;
    }
    out.extend_from_slice(&tmp[i..]);
}

struct BerReader<'a> {
    data: &'a [u8],
}

impl<'a> BerReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8])> {
        if self.data.len() < 2 {
            return Err(SnmpError::Decode("truncated element".to_string()));
        }

        let tag = self.data[0];
        let first = self.data[1];
        let (len, header) = if first & 0x80 == 0 {
            (first as usize, 2)
        } else {
            let count = (first & 0x7F) as usize;
            if count == 0 || count > 4 || self.data.len() < 2 + count {
                return Err(SnmpError::Decode(format!("bad length encoding {:#04x}", first)));
            }
            let len = self.data[2..2 + count]
                .iter()
                .fold(0usize, |acc, &b| (acc << 8) | b as usize);
            (len, 2 + count)
        };

        let end = header + len;
        if self.data.len() < end {
            return Err(SnmpError::Decode(format!(
                "element of {} bytes exceeds remaining {}",
                len,
                self.data.len() - header
            )));
        }

        let content = &self.data[header..end];
        self.data = &self.data[end..];
        Ok((tag, content))
    }

    fn expect(&mut self, expected: u8) -> Result<&'a [u8]> {
        let (tag, content) = self.read_tlv()?;
        if tag != expected {
            return Err(SnmpError::Decode(format!(
                "expected tag {:#04x}, found {:#04x}",
                expected, tag
            )));
        }
        Ok(content)
    }
}

fn decode_integer(content: &[u8]) -> Result<i64> {
    if content.is_empty() || content.len() > 8 {
        return Err(SnmpError::Decode(format!("integer of {} bytes", content.len())));
    }
    let negative = content[0] & 0x80 != 0;
    let init: i64 = if negative { -1 } else { 0 };
    Ok(content.iter().fold(init, |acc, &b| (acc << 8) | i64::from(b)))
}

fn decode_unsigned(content: &[u8]) -> Result<u64> {
    if content.len() > 9 {
        return Err(SnmpError::Decode(format!("unsigned of {} bytes", content.len())));
    }
    Ok(content.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

fn decode_oid(content: &[u8]) -> Result<String> {
    let mut arcs: Vec<u64> = Vec::new();
    let mut value: u64 = 0;
    for (i, &b) in content.iter().enumerate() {
        value = (value << 7) | u64::from(b & 0x7F);
        if b & 0x80 != 0 {
            if i == content.len() - 1 {
                return Err(SnmpError::Decode("truncated OID".to_string()));
            }
            continue;
        }
        if arcs.is_empty() {
            let first = (value / 40).min(2);
            arcs.push(first);
            arcs.push(value - first * 40);
        } else {
            arcs.push(value);
        }
        value = 0;
    }

    if arcs.is_empty() {
        return Err(SnmpError::Decode("empty OID".to_string()));
    }
    Ok(arcs.iter().map(u64::to_string).collect::<Vec<_>>().join("."))
}

fn decode_value(tag: u8, content: &[u8]) -> Result<VarValue> {
    Ok(match tag {
        TAG_INTEGER => VarValue::Integer(decode_integer(content)?),
        TAG_OCTET_STRING => VarValue::OctetString(content.to_vec()),
        TAG_NULL => VarValue::Null,
        TAG_OBJECT_ID => VarValue::ObjectId(decode_oid(content)?),
        TAG_COUNTER32 | TAG_GAUGE32 | TAG_TIMETICKS | TAG_COUNTER64 => {
            VarValue::Unsigned(decode_unsigned(content)?)
        }
        TAG_IP_ADDRESS if content.len() == 4 => {
            VarValue::IpAddress([content[0], content[1], content[2], content[3]])
        }
        TAG_NO_SUCH_OBJECT => VarValue::NoSuchObject,
        TAG_NO_SUCH_INSTANCE => VarValue::NoSuchInstance,
        TAG_END_OF_MIB_VIEW => VarValue::EndOfMibView,
        _ => VarValue::Other {
            tag,
            data: content.to_vec(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding() {
        assert_eq!(integer_bytes(0), vec![0x00]);
        assert_eq!(integer_bytes(1), vec![0x01]);
        assert_eq!(integer_bytes(127), vec![0x7F]);
        assert_eq!(integer_bytes(128), vec![0x00, 0x80]);
        assert_eq!(integer_bytes(256), vec![0x01, 0x00]);
        assert_eq!(integer_bytes(-1), vec![0xFF]);
        assert_eq!(integer_bytes(-129), vec![0xFF, 0x7F]);

        assert_eq!(decode_integer(&[0x00, 0x80]).unwrap(), 128);
        assert_eq!(decode_integer(&[0xFF, 0x7F]).unwrap(), -129);
    }

    #[test]
    fn test_unsigned_encoding() {
        assert_eq!(unsigned_bytes(0), vec![0x00]);
        assert_eq!(unsigned_bytes(5), vec![0x05]);
        assert_eq!(unsigned_bytes(0x80), vec![0x00, 0x80]);
        assert_eq!(unsigned_bytes(0x0100), vec![0x01, 0x00]);
    }

    #[test]
    fn test_oid_encoding() {
        // 1.3.6.1.4.1.318 -> 2b 06 01 04 01 82 3e
        assert_eq!(
            oid_bytes("1.3.6.1.4.1.318").unwrap(),
            vec![0x2B, 0x06, 0x01, 0x04, 0x01, 0x82, 0x3E]
        );
        assert_eq!(
            decode_oid(&[0x2B, 0x06, 0x01, 0x04, 0x01, 0x82, 0x3E]).unwrap(),
            "1.3.6.1.4.1.318"
        );
        assert_eq!(oid_bytes(".1.3.6").unwrap(), oid_bytes("1.3.6").unwrap());
    }

    #[test]
    fn test_invalid_oids() {
        assert!(matches!(oid_bytes("1"), Err(SnmpError::InvalidOid(_))));
        assert!(matches!(
            oid_bytes("2.18446744073709551615"),
            Err(SnmpError::InvalidOid(_))
        ));
        assert!(oid_bytes("3.1.2").is_err());
        assert!(oid_bytes("1.40.2").is_err());
        assert!(oid_bytes("1.3.x").is_err());
        assert!(oid_bytes("").is_err());
    }

    #[test]
    fn test_set_request_bytes() {
        let message = SnmpMessage::set_request("private", 1, "1.3.6.1.4.1.318.1.1.12.3.3.1.1.4.3", 1);
        let bytes = message.encode().unwrap();

        let expected: Vec<u8> = vec![
            0x30, 0x30, // message
            0x02, 0x01, 0x01, // version 2c
            0x04, 0x07, b'p', b'r', b'i', b'v', b'a', b't', b'e', // community
            0xA3, 0x22, // SetRequest
            0x02, 0x01, 0x01, // request id
            0x02, 0x01, 0x00, // error status
            0x02, 0x01, 0x00, // error index
            0x30, 0x17, // varbind list
            0x30, 0x15, // varbind
            0x06, 0x10, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x82, 0x3E, 0x01, 0x01, 0x0C, 0x03, 0x03,
            0x01, 0x01, 0x04, 0x03, // oid
            0x02, 0x01, 0x01, // value
        ];
        assert_eq!(&bytes[..], &expected[..]);

        let decoded = SnmpMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_decode_response_with_error_status() {
        let response = SnmpMessage {
            community: "private".to_string(),
            pdu_type: PduType::Response,
            request_id: 4242,
            error_status: 2,
            error_index: 1,
            varbinds: vec![VarBind {
                oid: "1.3.6.1.4.1.13742.6.4.1.2.1.2.1.9".to_string(),
                value: VarValue::Integer(1),
            }],
        };

        let decoded = SnmpMessage::decode(&response.encode().unwrap()).unwrap();
        assert_eq!(decoded.pdu_type, PduType::Response);
        assert_eq!(decoded.request_id, 4242);
        assert_eq!(error_status_name(decoded.error_status), "noSuchName");
        assert_eq!(decoded.error_index, 1);
    }

    #[test]
    fn test_long_length_form() {
        let community = "c".repeat(200);
        let message = SnmpMessage::set_request(&community, 7, "1.3.6.1", 2);
        let bytes = message.encode().unwrap();

        // outer length needs the long form
        assert_eq!(bytes[1], 0x81);
        assert_eq!(SnmpMessage::decode(&bytes).unwrap().community, community);
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = SnmpMessage::set_request("private", 1, "1.3.6.1", 1)
            .encode()
            .unwrap();
        let err = SnmpMessage::decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, SnmpError::Decode(_)));
    }

    #[test]
    fn test_decode_special_values() {
        assert_eq!(decode_value(0x81, &[]).unwrap(), VarValue::NoSuchInstance);
        assert_eq!(decode_value(0x43, &[0x01, 0x00]).unwrap(), VarValue::Unsigned(256));
        assert_eq!(VarValue::NoSuchObject.to_string(), "noSuchObject");
        assert_eq!(
            decode_value(0x40, &[10, 0, 0, 1]).unwrap().to_string(),
            "10.0.0.1"
        );
    }
}
