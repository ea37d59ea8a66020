use crate::error::{Result, SmfcError};
use bytes::{BufMut, Bytes, BytesMut};
use smfc_shared::{
    AVP_CC_REQUEST_TYPE, AVP_RESULT_CODE, AVP_SESSION_ID, CMD_CREDIT_CONTROL, CMD_RE_AUTH,
    GX_APPLICATION_ID,
};

const HEADER_LEN: usize = 20;

// Header flags
pub const FLAG_REQUEST: u8 = 0x80;
pub const FLAG_PROXIABLE: u8 = 0x40;
pub const FLAG_ERROR: u8 = 0x20;

// AVP flags
pub const AVP_FLAG_VENDOR: u8 = 0x80;
pub const AVP_FLAG_MANDATORY: u8 = 0x40;

/// Diameter AVP
#[derive(Debug, Clone, PartialEq)]
pub struct Avp {
    pub code: u32,
    pub flags: u8,
    pub vendor_id: Option<u32>,
    pub data: Bytes,
}

impl Avp {
    pub fn new(code: u32, data: impl Into<Bytes>) -> Self {
        Self {
            code,
            flags: AVP_FLAG_MANDATORY,
            vendor_id: None,
            data: data.into(),
        }
    }

    pub fn unsigned32(code: u32, value: u32) -> Self {
        Self::new(code, value.to_be_bytes().to_vec())
    }

    pub fn as_u32(&self) -> Option<u32> {
        let raw: [u8; 4] = self.data.as_ref().try_into().ok()?;
        Some(u32::from_be_bytes(raw))
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.data).to_string()
    }

    /// Parse one AVP at `offset`; returns the AVP and the padded offset of the next one
    fn parse(data: &Bytes, offset: usize) -> Result<(Self, usize)> {
        let rest = &data[offset..];
        if rest.len() < 8 {
            return Err(SmfcError::InvalidPacket("AVP too short".to_string()));
        }

        let code = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
        let flags = rest[4];
        let length = u32::from_be_bytes([0, rest[5], rest[6], rest[7]]) as usize;

        let (vendor_id, header_len) = if (flags & AVP_FLAG_VENDOR) != 0 {
            if rest.len() < 12 {
                return Err(SmfcError::InvalidPacket("Vendor AVP too short".to_string()));
            }
            (Some(u32::from_be_bytes([rest[8], rest[9], rest[10], rest[11]])), 12)
        } else {
            (None, 8)
        };

        if length < header_len || length > rest.len() {
            return Err(SmfcError::InvalidPacket(format!(
                "AVP {code} length {length} out of bounds"
            )));
        }

        let avp = Self {
            code,
            flags,
            vendor_id,
            data: data.slice(offset + header_len..offset + length),
        };
        Ok((avp, offset + length.div_ceil(4) * 4))
    }

    fn serialize(&self, buf: &mut BytesMut) {
        let header_len = if self.vendor_id.is_some() { 12 } else { 8 };
        let length = (header_len + self.data.len()) as u32;

        buf.put_u32(self.code);
        let mut flags = self.flags;
        if self.vendor_id.is_some() {
            flags |= AVP_FLAG_VENDOR;
        }
        buf.put_u8(flags);
        buf.put_slice(&length.to_be_bytes()[1..4]);
        if let Some(vendor_id) = self.vendor_id {
            buf.put_u32(vendor_id);
        }
        buf.put_slice(&self.data);
        while buf.len() % 4 != 0 {
            buf.put_u8(0);
        }
    }
}

/// Decoded Gx message: a Credit-Control answer or a Re-Auth request from the PCRF
#[derive(Debug, Clone)]
pub struct GxMessage {
    pub flags: u8,
    pub command_code: u32,
    pub application_id: u32,
    pub hop_by_hop_id: u32,
    pub end_to_end_id: u32,
    pub avps: Vec<Avp>,
}

impl GxMessage {
    pub fn new(command_code: u32, is_request: bool) -> Self {
        Self {
            flags: if is_request {
                FLAG_REQUEST | FLAG_PROXIABLE
            } else {
                FLAG_PROXIABLE
            },
            command_code,
            application_id: GX_APPLICATION_ID,
            hop_by_hop_id: 0,
            end_to_end_id: 0,
            avps: Vec::new(),
        }
    }

    /// Credit-Control answer carrying a result code and request type
    pub fn cca(cc_request_type: u32, result_code: u32) -> Self {
        Self::new(CMD_CREDIT_CONTROL, false)
            .with_avp(Avp::unsigned32(AVP_RESULT_CODE, result_code))
            .with_avp(Avp::unsigned32(AVP_CC_REQUEST_TYPE, cc_request_type))
    }

    pub fn with_avp(mut self, avp: Avp) -> Self {
        self.avps.push(avp);
        self
    }

    pub fn parse(data: &Bytes) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(SmfcError::InvalidPacket("Diameter header too short".to_string()));
        }

        let version = data[0];
        if version != 1 {
            return Err(SmfcError::InvalidPacket(format!("Invalid Diameter version: {version}")));
        }

        let length = u32::from_be_bytes([0, data[1], data[2], data[3]]) as usize;
        if length < HEADER_LEN || data.len() < length {
            return Err(SmfcError::InvalidPacket("Diameter message truncated".to_string()));
        }

        let flags = data[4];
        let command_code = u32::from_be_bytes([0, data[5], data[6], data[7]]);
        let application_id = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let hop_by_hop_id = u32::from_be_bytes([data[12], data[13], data[14], data[15]]);
        let end_to_end_id = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);

        let message = data.slice(..length);
        let mut avps = Vec::new();
        let mut offset = HEADER_LEN;
        while offset < length {
            let (avp, next) = Avp::parse(&message, offset)?;
            avps.push(avp);
            offset = next;
        }

        Ok(Self {
            flags,
            command_code,
            application_id,
            hop_by_hop_id,
            end_to_end_id,
            avps,
        })
    }

    pub fn serialize(&self) -> Bytes {
        let mut avp_bytes = BytesMut::new();
        for avp in &self.avps {
            avp.serialize(&mut avp_bytes);
        }
        let length = (HEADER_LEN + avp_bytes.len()) as u32;

        let mut buf = BytesMut::with_capacity(length as usize);
        buf.put_u8(1);
        buf.put_slice(&length.to_be_bytes()[1..4]);
        buf.put_u8(self.flags);
        buf.put_slice(&self.command_code.to_be_bytes()[1..4]);
        buf.put_u32(self.application_id);
        buf.put_u32(self.hop_by_hop_id);
        buf.put_u32(self.end_to_end_id);
        buf.put_slice(&avp_bytes);
        buf.freeze()
    }

    pub fn is_request(&self) -> bool {
        (self.flags & FLAG_REQUEST) != 0
    }

    pub fn is_cca(&self) -> bool {
        self.command_code == CMD_CREDIT_CONTROL && !self.is_request()
    }

    pub fn is_rar(&self) -> bool {
        self.command_code == CMD_RE_AUTH && self.is_request()
    }

    pub fn find_avp(&self, code: u32) -> Option<&Avp> {
        self.avps.iter().find(|avp| avp.code == code)
    }

    pub fn session_id(&self) -> Option<String> {
        self.find_avp(AVP_SESSION_ID).map(Avp::as_string)
    }

    pub fn result_code(&self) -> Option<u32> {
        self.find_avp(AVP_RESULT_CODE).and_then(Avp::as_u32)
    }

    pub fn cc_request_type(&self) -> Option<u32> {
        self.find_avp(AVP_CC_REQUEST_TYPE).and_then(Avp::as_u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smfc_shared::{CC_REQUEST_TYPE_INITIAL, RESULT_CODE_SUCCESS};

    #[test]
    fn test_cca_parse() {
        let data = vec![
            1, 0, 0, 44, // Version, Length (44)
            0x40, 0, 1, 16, // Flags (Proxiable), Command Code (272)
            1, 0, 0, 22, // Application ID (16777238)
            0, 0, 0, 1, // Hop-by-Hop ID
            0, 0, 0, 2, // End-to-End ID
            0, 0, 1, 12, // Code (268)
            0x40, 0, 0, 12, // Flags (Mandatory), Length (12)
            0, 0, 7, 209, // 2001
            0, 0, 1, 160, // Code (416)
            0x40, 0, 0, 12, // Flags, Length
            0, 0, 0, 1, // INITIAL_REQUEST
        ];

        let msg = GxMessage::parse(&Bytes::from(data)).unwrap();
        assert!(msg.is_cca());
        assert_eq!(msg.application_id, GX_APPLICATION_ID);
        assert_eq!(msg.result_code(), Some(RESULT_CODE_SUCCESS));
        assert_eq!(msg.cc_request_type(), Some(CC_REQUEST_TYPE_INITIAL));
    }

    #[test]
    fn test_session_id_padding() {
        let wire = GxMessage::new(CMD_RE_AUTH, true)
            .with_avp(Avp::new(AVP_SESSION_ID, "smf.epc;1;2"))
            .with_avp(Avp::unsigned32(AVP_RESULT_CODE, 2001))
            .serialize();

        // 11 octet Session-Id pads to 12
        assert_eq!(wire.len(), 20 + 20 + 12);

        let msg = GxMessage::parse(&wire).unwrap();
        assert!(msg.is_rar());
        assert_eq!(msg.session_id().as_deref(), Some("smf.epc;1;2"));
        assert_eq!(msg.result_code(), Some(2001));
    }

    #[test]
    fn test_vendor_avp() {
        let wire = GxMessage::new(CMD_CREDIT_CONTROL, false)
            .with_avp(Avp {
                code: 1000,
                flags: AVP_FLAG_MANDATORY,
                vendor_id: Some(10415),
                data: Bytes::from_static(&[0, 0, 0, 5]),
            })
            .serialize();

        let msg = GxMessage::parse(&wire).unwrap();
        let avp = msg.find_avp(1000).unwrap();
        assert_eq!(avp.vendor_id, Some(10415));
        assert_eq!(avp.as_u32(), Some(5));
    }

    #[test]
    fn test_truncated_avp() {
        let mut wire = GxMessage::cca(CC_REQUEST_TYPE_INITIAL, 2001).serialize().to_vec();
        // Claim a longer AVP than the message holds
        wire[27] = 200;
        assert!(GxMessage::parse(&Bytes::from(wire)).is_err());
    }
}
