use crate::error::{Result, SmfcError};
use bytes::{BufMut, Bytes, BytesMut};
use smfc_shared::Seid;

pub const PFCP_VERSION: u8 = 1;

// Header flags (octet 1)
pub const FLAG_MP: u8 = 0x02;
pub const FLAG_SEID: u8 = 0x01;

/// PFCP header (TS 29.244 clause 7.2.2)
#[derive(Debug, Clone, PartialEq)]
pub struct PfcpHeader {
    pub version: u8,
    pub seid_presence: bool,
    pub message_type: u8,
    /// Octets following the first four
    pub length: u16,
    pub seid: Seid,
    /// 24-bit sequence number
    pub sequence: u32,
}

impl PfcpHeader {
    /// Node-level message header (no SEID)
    pub fn node(message_type: u8, sequence: u32) -> Self {
        Self {
            version: PFCP_VERSION,
            seid_presence: false,
            message_type,
            length: 0,
            seid: Seid::UNASSIGNED,
            sequence: sequence & 0x00ff_ffff,
        }
    }

    /// Session-level message header
    pub fn session(message_type: u8, seid: Seid, sequence: u32) -> Self {
        Self {
            seid_presence: true,
            seid,
            ..Self::node(message_type, sequence)
        }
    }

    pub fn header_len(&self) -> usize {
        if self.seid_presence {
            16
        } else {
            8
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(SmfcError::InvalidPacket("PFCP header too short".to_string()));
        }

        let version = data[0] >> 5;
        if version != PFCP_VERSION {
            return Err(SmfcError::InvalidPacket(format!("Invalid PFCP version: {version}")));
        }

        let seid_presence = (data[0] & FLAG_SEID) != 0;
        let message_type = data[1];
        let length = u16::from_be_bytes([data[2], data[3]]);

        let (seid, seq_offset) = if seid_presence {
            if data.len() < 16 {
                return Err(SmfcError::InvalidPacket("PFCP header too short".to_string()));
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&data[4..12]);
            (Seid(u64::from_be_bytes(raw)), 12)
        } else {
            (Seid::UNASSIGNED, 4)
        };

        let sequence = u32::from_be_bytes([
            0,
            data[seq_offset],
            data[seq_offset + 1],
            data[seq_offset + 2],
        ]);

        Ok(Self {
            version,
            seid_presence,
            message_type,
            length,
            seid,
            sequence,
        })
    }

    pub fn serialize(&self, buf: &mut BytesMut) {
        let mut flags = self.version << 5;
        if self.seid_presence {
            flags |= FLAG_SEID;
        }
        buf.put_u8(flags);
        buf.put_u8(self.message_type);
        buf.put_u16(self.length);
        if self.seid_presence {
            buf.put_u64(self.seid.0);
        }
        buf.put_slice(&self.sequence.to_be_bytes()[1..4]);
        buf.put_u8(0);
    }
}

/// PFCP message with its IE block left undecoded
#[derive(Debug, Clone)]
pub struct PfcpMessage {
    pub header: PfcpHeader,
    pub body: Bytes,
}

impl PfcpMessage {
    pub fn new(header: PfcpHeader, body: impl Into<Bytes>) -> Self {
        Self {
            header,
            body: body.into(),
        }
    }

    pub fn parse(data: &Bytes) -> Result<Self> {
        let header = PfcpHeader::parse(data)?;

        let total = header.length as usize + 4;
        if data.len() < total || total < header.header_len() {
            return Err(SmfcError::InvalidPacket(format!(
                "PFCP length {} does not fit {} received octets",
                header.length,
                data.len()
            )));
        }

        let body = data.slice(header.header_len()..total);
        Ok(Self { header, body })
    }

    pub fn serialize(&self) -> Bytes {
        let mut header = self.header.clone();
        header.length = (header.header_len() - 4 + self.body.len()) as u16;

        let mut buf = BytesMut::with_capacity(header.header_len() + self.body.len());
        header.serialize(&mut buf);
        buf.put_slice(&self.body);
        buf.freeze()
    }
}
