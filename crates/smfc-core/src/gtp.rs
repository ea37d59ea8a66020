use crate::error::{Result, SmfcError};
use bytes::{BufMut, Bytes, BytesMut};
use smfc_shared::{
    Teid, GTP_CREATE_BEARER_RESPONSE, GTP_CREATE_SESSION_REQUEST, GTP_DELETE_BEARER_RESPONSE,
    GTP_DELETE_SESSION_REQUEST, GTP_IE_APN, GTP_IE_F_TEID, GTP_IE_IMSI, GTP_UPDATE_BEARER_RESPONSE,
};
use std::net::Ipv4Addr;

pub const GTP_VERSION: u8 = 2;

// Header flags (octet 1)
pub const FLAG_PIGGYBACK: u8 = 0x10;
pub const FLAG_TEID: u8 = 0x08;

/// GTPv2-C header (TS 29.274 clause 5.1). The TEID is only carried on the
/// wire when `teid_presence` is set; otherwise it reads as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct GtpHeader {
    pub version: u8,
    pub teid_presence: bool,
    pub message_type: u8,
    /// Octets following the first four
    pub length: u16,
    pub teid: Teid,
    /// 24-bit sequence number
    pub sequence: u32,
}

impl GtpHeader {
    pub fn new(message_type: u8, teid: Teid, sequence: u32) -> Self {
        Self {
            version: GTP_VERSION,
            teid_presence: true,
            message_type,
            length: 0,
            teid,
            sequence: sequence & 0x00ff_ffff,
        }
    }

    /// Encoded size of this header
    pub fn header_len(&self) -> usize {
        if self.teid_presence {
            12
        } else {
            8
        }
    }

    /// Parse header from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(SmfcError::InvalidPacket("GTP header too short".to_string()));
        }

        let version = data[0] >> 5;
        if version != GTP_VERSION {
            return Err(SmfcError::InvalidPacket(format!("Invalid GTP version: {version}")));
        }

        let teid_presence = (data[0] & FLAG_TEID) != 0;
        let message_type = data[1];
        let length = u16::from_be_bytes([data[2], data[3]]);

        let (teid, seq_offset) = if teid_presence {
            if data.len() < 12 {
                return Err(SmfcError::InvalidPacket("GTP header too short".to_string()));
            }
            (Teid(u32::from_be_bytes([data[4], data[5], data[6], data[7]])), 8)
        } else {
            (Teid::UNASSIGNED, 4)
        };

        let sequence = u32::from_be_bytes([
            0,
            data[seq_offset],
            data[seq_offset + 1],
            data[seq_offset + 2],
        ]);

        Ok(Self {
            version,
            teid_presence,
            message_type,
            length,
            teid,
            sequence,
        })
    }

    /// Serialize header into a buffer
    pub fn serialize(&self, buf: &mut BytesMut) {
        let mut flags = self.version << 5;
        if self.teid_presence {
            flags |= FLAG_TEID;
        }
        buf.put_u8(flags);
        buf.put_u8(self.message_type);
        buf.put_u16(self.length);
        if self.teid_presence {
            buf.put_u32(self.teid.0);
        }
        buf.put_slice(&self.sequence.to_be_bytes()[1..4]);
        buf.put_u8(0);
    }
}

/// GTPv2-C information element
#[derive(Debug, Clone, PartialEq)]
pub struct GtpIe {
    pub ie_type: u8,
    pub instance: u8,
    pub data: Bytes,
}

impl GtpIe {
    pub fn new(ie_type: u8, instance: u8, data: impl Into<Bytes>) -> Self {
        Self {
            ie_type,
            instance,
            data: data.into(),
        }
    }

    /// Parse one IE starting at `offset`; returns the IE and the offset of the next one
    fn parse(data: &Bytes, offset: usize) -> Result<(Self, usize)> {
        let rest = &data[offset..];
        if rest.len() < 4 {
            return Err(SmfcError::InvalidPacket("IE header truncated".to_string()));
        }

        let ie_type = rest[0];
        let length = u16::from_be_bytes([rest[1], rest[2]]) as usize;
        let instance = rest[3] & 0x0f;

        let start = offset + 4;
        let end = start + length;
        if end > data.len() {
            return Err(SmfcError::InvalidPacket(format!("IE {ie_type} truncated")));
        }

        Ok((
            Self {
                ie_type,
                instance,
                data: data.slice(start..end),
            },
            end,
        ))
    }

    fn serialize(&self, buf: &mut BytesMut) {
        buf.put_u8(self.ie_type);
        buf.put_u16(self.data.len() as u16);
        buf.put_u8(self.instance & 0x0f);
        buf.put_slice(&self.data);
    }
}

/// Message classes the session core routes on. Everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GtpMessageKind {
    CreateSessionRequest,
    DeleteSessionRequest,
    CreateBearerResponse,
    UpdateBearerResponse,
    DeleteBearerResponse,
    Other(u8),
}

impl From<u8> for GtpMessageKind {
    fn from(message_type: u8) -> Self {
        match message_type {
            GTP_CREATE_SESSION_REQUEST => Self::CreateSessionRequest,
            GTP_DELETE_SESSION_REQUEST => Self::DeleteSessionRequest,
            GTP_CREATE_BEARER_RESPONSE => Self::CreateBearerResponse,
            GTP_UPDATE_BEARER_RESPONSE => Self::UpdateBearerResponse,
            GTP_DELETE_BEARER_RESPONSE => Self::DeleteBearerResponse,
            other => Self::Other(other),
        }
    }
}

/// Decoded GTPv2-C message
#[derive(Debug, Clone)]
pub struct GtpMessage {
    pub header: GtpHeader,
    pub ies: Vec<GtpIe>,
}

impl GtpMessage {
    pub fn new(header: GtpHeader) -> Self {
        Self {
            header,
            ies: Vec::new(),
        }
    }

    pub fn with_ie(mut self, ie: GtpIe) -> Self {
        self.ies.push(ie);
        self
    }

    /// Parse complete message from a received buffer. IE payloads share the
    /// buffer's storage.
    pub fn parse(data: &Bytes) -> Result<Self> {
        let header = GtpHeader::parse(data)?;

        let total = header.length as usize + 4;
        if data.len() < total {
            return Err(SmfcError::InvalidPacket("GTP message truncated".to_string()));
        }
        if total < header.header_len() {
            return Err(SmfcError::InvalidPacket(format!(
                "GTP length {} shorter than header",
                header.length
            )));
        }

        let body = data.slice(..total);
        let mut ies = Vec::new();
        let mut offset = header.header_len();
        while offset < total {
            let (ie, next) = GtpIe::parse(&body, offset)?;
            ies.push(ie);
            offset = next;
        }

        Ok(Self { header, ies })
    }

    /// Serialize message, recomputing the header length
    pub fn serialize(&self) -> Bytes {
        let mut ie_bytes = BytesMut::new();
        for ie in &self.ies {
            ie.serialize(&mut ie_bytes);
        }

        let mut header = self.header.clone();
        header.length = (header.header_len() - 4 + ie_bytes.len()) as u16;

        let mut buf = BytesMut::with_capacity(header.header_len() + ie_bytes.len());
        header.serialize(&mut buf);
        buf.put_slice(&ie_bytes);
        buf.freeze()
    }

    pub fn kind(&self) -> GtpMessageKind {
        GtpMessageKind::from(self.header.message_type)
    }

    /// Find IE by type and instance
    pub fn find_ie(&self, ie_type: u8, instance: u8) -> Option<&GtpIe> {
        self.ies
            .iter()
            .find(|ie| ie.ie_type == ie_type && ie.instance == instance)
    }
}

/// Fully qualified TEID (TS 29.274 clause 8.22)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fteid {
    pub interface_type: u8,
    pub teid: Teid,
    pub ipv4: Option<Ipv4Addr>,
}

impl Fteid {
    pub fn decode(ie: &GtpIe) -> Result<Self> {
        let data = &ie.data;
        if data.len() < 5 {
            return Err(SmfcError::InvalidIe {
                ie_type: GTP_IE_F_TEID,
                reason: "F-TEID shorter than 5 octets".to_string(),
            });
        }

        let has_v4 = (data[0] & 0x80) != 0;
        let interface_type = data[0] & 0x3f;
        let teid = Teid(u32::from_be_bytes([data[1], data[2], data[3], data[4]]));

        let ipv4 = if has_v4 {
            if data.len() < 9 {
                return Err(SmfcError::InvalidIe {
                    ie_type: GTP_IE_F_TEID,
                    reason: "F-TEID IPv4 address truncated".to_string(),
                });
            }
            Some(Ipv4Addr::new(data[5], data[6], data[7], data[8]))
        } else {
            None
        };

        Ok(Self {
            interface_type,
            teid,
            ipv4,
        })
    }

    pub fn encode(&self, instance: u8) -> GtpIe {
        let mut buf = BytesMut::with_capacity(9);
        let mut flags = self.interface_type & 0x3f;
        if self.ipv4.is_some() {
            flags |= 0x80;
        }
        buf.put_u8(flags);
        buf.put_u32(self.teid.0);
        if let Some(addr) = self.ipv4 {
            buf.put_slice(&addr.octets());
        }
        GtpIe::new(GTP_IE_F_TEID, instance, buf.freeze())
    }
}

/// Attributes a new session needs from its Create-Session-Request
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSessionRequest {
    pub imsi: String,
    pub apn: Option<String>,
    pub sender_fteid: Fteid,
}

impl CreateSessionRequest {
    pub fn decode(msg: &GtpMessage) -> Result<Self> {
        let imsi = msg
            .find_ie(GTP_IE_IMSI, 0)
            .map(|ie| decode_bcd(&ie.data))
            .ok_or(SmfcError::MissingIe(GTP_IE_IMSI))?;
        if imsi.is_empty() {
            return Err(SmfcError::InvalidIe {
                ie_type: GTP_IE_IMSI,
                reason: "empty IMSI".to_string(),
            });
        }

        let apn = msg.find_ie(GTP_IE_APN, 0).map(|ie| decode_apn(&ie.data));

        let sender_fteid = msg
            .find_ie(GTP_IE_F_TEID, 0)
            .ok_or(SmfcError::MissingIe(GTP_IE_F_TEID))
            .and_then(Fteid::decode)?;

        Ok(Self {
            imsi,
            apn,
            sender_fteid,
        })
    }
}

/// TBCD digits, low nibble first, 0xF filler
pub fn decode_bcd(data: &[u8]) -> String {
    let mut digits = String::with_capacity(data.len() * 2);
    for byte in data {
        for nibble in [byte & 0x0f, byte >> 4] {
            if nibble > 9 {
                return digits;
            }
            digits.push(char::from(b'0' + nibble));
        }
    }
    digits
}

pub fn encode_bcd(digits: &str) -> Bytes {
    let nibbles: Vec<u8> = digits
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect();
    let mut buf = BytesMut::with_capacity(nibbles.len().div_ceil(2));
    for pair in nibbles.chunks(2) {
        let high = pair.get(1).copied().unwrap_or(0x0f);
        buf.put_u8((high << 4) | pair[0]);
    }
    buf.freeze()
}

/// Length-prefixed labels joined with dots
pub fn decode_apn(data: &[u8]) -> String {
    let mut labels = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let len = data[offset] as usize;
        let end = (offset + 1 + len).min(data.len());
        labels.push(String::from_utf8_lossy(&data[offset + 1..end]).into_owned());
        offset = end;
    }
    labels.join(".")
}

pub fn encode_apn(apn: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(apn.len() + 1);
    for label in apn.split('.') {
        buf.put_u8(label.len() as u8);
        buf.put_slice(label.as_bytes());
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_session_request(teid: Teid, sequence: u32) -> GtpMessage {
        GtpMessage::new(GtpHeader::new(GTP_CREATE_SESSION_REQUEST, teid, sequence))
            .with_ie(GtpIe::new(GTP_IE_IMSI, 0, encode_bcd("001010123456789")))
            .with_ie(GtpIe::new(GTP_IE_APN, 0, encode_apn("internet")))
            .with_ie(
                Fteid {
                    interface_type: 6,
                    teid: Teid(0x1111),
                    ipv4: Some(Ipv4Addr::new(10, 0, 0, 1)),
                }
                .encode(0),
            )
    }

    #[test]
    fn test_header_parse() {
        let data = vec![
            0x48, 32, 0, 8, // Version 2 + T flag, Create Session Request, length 8
            0, 0, 0, 0x4d, // TEID 77
            0, 0, 5, 0, // Sequence 5, spare
        ];

        let header = GtpHeader::parse(&data).unwrap();
        assert_eq!(header.version, 2);
        assert!(header.teid_presence);
        assert_eq!(header.message_type, GTP_CREATE_SESSION_REQUEST);
        assert_eq!(header.teid, Teid(77));
        assert_eq!(header.sequence, 5);
    }

    #[test]
    fn test_header_without_teid() {
        let data = vec![0x40, 1, 0, 4, 0, 1, 2, 0];
        let header = GtpHeader::parse(&data).unwrap();
        assert!(!header.teid_presence);
        assert_eq!(header.teid, Teid::UNASSIGNED);
        assert_eq!(header.sequence, 0x0102);
        assert_eq!(header.header_len(), 8);
    }

    #[test]
    fn test_header_rejects_gtpv1() {
        let data = vec![0x32, 16, 0, 4, 0, 0, 0, 1];
        assert!(matches!(
            GtpHeader::parse(&data),
            Err(SmfcError::InvalidPacket(_))
        ));
    }

    #[test]
    fn test_message_parse() {
        let wire = create_session_request(Teid::UNASSIGNED, 42).serialize();
        let msg = GtpMessage::parse(&wire).unwrap();

        assert_eq!(msg.kind(), GtpMessageKind::CreateSessionRequest);
        assert_eq!(msg.header.sequence, 42);
        assert_eq!(msg.header.length as usize + 4, wire.len());
        assert_eq!(msg.ies.len(), 3);
    }

    #[test]
    fn test_message_truncated() {
        let wire = create_session_request(Teid::UNASSIGNED, 1).serialize();
        let short = wire.slice(..wire.len() - 3);
        assert!(GtpMessage::parse(&short).is_err());
    }

    #[test]
    fn test_decode_create_session_request() {
        let msg = create_session_request(Teid::UNASSIGNED, 1);
        let req = CreateSessionRequest::decode(&msg).unwrap();

        assert_eq!(req.imsi, "001010123456789");
        assert_eq!(req.apn.as_deref(), Some("internet"));
        assert_eq!(req.sender_fteid.teid, Teid(0x1111));
        assert_eq!(req.sender_fteid.ipv4, Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_create_session_request_without_imsi() {
        let msg = GtpMessage::new(GtpHeader::new(GTP_CREATE_SESSION_REQUEST, Teid(0), 1));
        assert!(matches!(
            CreateSessionRequest::decode(&msg),
            Err(SmfcError::MissingIe(GTP_IE_IMSI))
        ));
    }

    #[test]
    fn test_message_kind() {
        assert_eq!(
            GtpMessageKind::from(GTP_DELETE_SESSION_REQUEST),
            GtpMessageKind::DeleteSessionRequest
        );
        assert_eq!(GtpMessageKind::from(1), GtpMessageKind::Other(1));
    }

    #[test]
    fn test_apn_labels() {
        assert_eq!(decode_apn(&encode_apn("ims.mnc001.mcc001.gprs")), "ims.mnc001.mcc001.gprs");
    }
}
