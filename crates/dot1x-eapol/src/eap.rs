//! EAP packet parsing and construction (RFC 3748 §4).

use bytes::{BufMut, BytesMut};
use strum::Display;

use crate::CodecError;

/// Fixed EAP header length: code, identifier, length.
pub const EAP_HEADER_LEN: usize = 4;

/// EAP code octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum EapCode {
    /// Authenticator-to-peer request.
    Request,
    /// Peer-to-authenticator response.
    Response,
    /// Authentication succeeded.
    Success,
    /// Authentication failed.
    Failure,
}

impl EapCode {
    /// Maps the wire octet to a code.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Request),
            2 => Some(Self::Response),
            3 => Some(Self::Success),
            4 => Some(Self::Failure),
            _ => None,
        }
    }

    /// The wire octet for this code.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Request => 1,
            Self::Response => 2,
            Self::Success => 3,
            Self::Failure => 4,
        }
    }
}

/// EAP method type octet. Only the types this implementation speaks are
/// named; everything else stays numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum EapType {
    /// Identity exchange.
    Identity,
    /// Notification.
    Notification,
    /// Legacy NAK (response only).
    Nak,
    /// MD5-Challenge.
    Md5Challenge,
    /// EAP-TLS.
    Tls,
    /// Any other method type.
    Other(u8),
}

impl EapType {
    /// Maps the wire octet to a method type.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Identity,
            2 => Self::Notification,
            3 => Self::Nak,
            4 => Self::Md5Challenge,
            13 => Self::Tls,
            other => Self::Other(other),
        }
    }

    /// The wire octet for this method type.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Identity => 1,
            Self::Notification => 2,
            Self::Nak => 3,
            Self::Md5Challenge => 4,
            Self::Tls => 13,
            Self::Other(other) => other,
        }
    }
}

/// Advances an EAP identifier modulo 256. The very first identifier of a
/// conversation (previous is `None`) is 0.
#[must_use]
pub fn next_id(previous: Option<u8>) -> u8 {
    previous.map_or(0, |id| id.wrapping_add(1))
}

/// A decoded EAP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapPacket {
    /// Packet code.
    pub code: EapCode,
    /// Identifier matching requests to responses.
    pub identifier: u8,
    /// Everything after the 4-octet header, `length - 4` octets. For
    /// Request/Response the first octet is the Type.
    pub body: Vec<u8>,
}

impl EapPacket {
    /// Decodes an EAP packet from an EAPOL body.
    ///
    /// A length field exceeding the received octets means the packet must
    /// be silently discarded (RFC 3748 §4.1); that surfaces as
    /// [`CodecError::EapTruncated`]. Octets beyond the declared length
    /// are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < EAP_HEADER_LEN {
            return Err(CodecError::ShortHeader(data.len()));
        }

        let code = EapCode::from_u8(data[0]).ok_or(CodecError::UnknownCode(data[0]))?;
        let identifier = data[1];
        let length = usize::from(u16::from_be_bytes([data[2], data[3]]));

        if length < EAP_HEADER_LEN {
            return Err(CodecError::EapLengthUnderflow(length));
        }
        if length > data.len() {
            return Err(CodecError::EapTruncated {
                declared: length,
                received: data.len(),
            });
        }

        Ok(Self {
            code,
            identifier,
            body: data[EAP_HEADER_LEN..length].to_vec(),
        })
    }

    /// The method type of a Request/Response packet.
    pub fn eap_type(&self) -> Result<EapType, CodecError> {
        match self.code {
            EapCode::Request | EapCode::Response => self
                .body
                .first()
                .map(|&t| EapType::from_u8(t))
                .ok_or(CodecError::MissingType),
            EapCode::Success | EapCode::Failure => Err(CodecError::MissingType),
        }
    }

    /// The Type-Data of a Request/Response packet (body minus the Type
    /// octet).
    #[must_use]
    pub fn type_data(&self) -> &[u8] {
        self.body.get(1..).unwrap_or(&[])
    }

    /// Total encoded length of this packet.
    #[must_use]
    pub fn len(&self) -> usize {
        EAP_HEADER_LEN + self.body.len()
    }

    /// Whether the packet carries no body at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Re-encodes this packet.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.len());
        buf.put_u8(self.code.as_u8());
        buf.put_u8(self.identifier);
        buf.put_u16(self.len() as u16);
        buf.put_slice(&self.body);
        buf.to_vec()
    }
}

/// Builds a Request packet carrying `eap_type` and its Type-Data.
#[must_use]
pub fn build_request(identifier: u8, eap_type: EapType, type_data: &[u8]) -> Vec<u8> {
    build_typed(EapCode::Request, identifier, eap_type, type_data)
}

/// Builds a Response packet carrying `eap_type` and its Type-Data.
#[must_use]
pub fn build_response(identifier: u8, eap_type: EapType, type_data: &[u8]) -> Vec<u8> {
    build_typed(EapCode::Response, identifier, eap_type, type_data)
}

fn build_typed(code: EapCode, identifier: u8, eap_type: EapType, type_data: &[u8]) -> Vec<u8> {
    let len = EAP_HEADER_LEN + 1 + type_data.len();
    let mut buf = BytesMut::with_capacity(len);
    buf.put_u8(code.as_u8());
    buf.put_u8(identifier);
    buf.put_u16(len as u16);
    buf.put_u8(eap_type.as_u8());
    buf.put_slice(type_data);
    buf.to_vec()
}

/// Builds a canned EAP Success.
#[must_use]
pub fn build_success(identifier: u8) -> Vec<u8> {
    vec![EapCode::Success.as_u8(), identifier, 0x00, 0x04]
}

/// Builds a canned EAP Failure.
#[must_use]
pub fn build_failure(identifier: u8) -> Vec<u8> {
    vec![EapCode::Failure.as_u8(), identifier, 0x00, 0x04]
}

/// Builds a legacy NAK response listing the peer's preferred method
/// types, or the single octet 0 when nothing is acceptable
/// (RFC 3748 §5.3.1).
#[must_use]
pub fn build_nak(identifier: u8, preferred: &[EapType]) -> Vec<u8> {
    let body: Vec<u8> = if preferred.is_empty() {
        vec![0]
    } else {
        preferred.iter().map(|t| t.as_u8()).collect()
    };
    build_response(identifier, EapType::Nak, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_advance() {
        assert_eq!(next_id(None), 0);
        assert_eq!(next_id(Some(0)), 1);
        assert_eq!(next_id(Some(254)), 255);
        assert_eq!(next_id(Some(255)), 0);
    }

    #[test]
    fn decode_identity_response() {
        // Response, id 1, "alice"
        let pkt = [
            0x02, 0x01, 0x00, 0x0A, 0x01, b'a', b'l', b'i', b'c', b'e',
        ];
        let eap = EapPacket::decode(&pkt).unwrap();
        assert_eq!(eap.code, EapCode::Response);
        assert_eq!(eap.identifier, 1);
        assert_eq!(eap.eap_type().unwrap(), EapType::Identity);
        assert_eq!(eap.type_data(), b"alice");
    }

    #[test]
    fn decode_discards_overlong_length() {
        // declared length 32 but only 8 octets on the wire
        let pkt = [0x01, 0x05, 0x00, 0x20, 0x01, 0x00, 0x00, 0x00];
        assert!(matches!(
            EapPacket::decode(&pkt),
            Err(CodecError::EapTruncated {
                declared: 32,
                received: 8
            })
        ));
    }

    #[test]
    fn decode_ignores_octets_past_length() {
        let mut pkt = build_success(9);
        pkt.extend_from_slice(&[0xAA, 0xBB]);
        let eap = EapPacket::decode(&pkt).unwrap();
        assert_eq!(eap.code, EapCode::Success);
        assert!(eap.body.is_empty());
    }

    #[test]
    fn request_round_trip() {
        let pkt = build_request(0, EapType::Identity, b"User name:");
        let eap = EapPacket::decode(&pkt).unwrap();
        assert_eq!(eap.code, EapCode::Request);
        assert_eq!(eap.identifier, 0);
        assert_eq!(eap.eap_type().unwrap(), EapType::Identity);
        assert_eq!(eap.type_data(), b"User name:");
        assert_eq!(eap.encode(), pkt);
    }

    #[test]
    fn canned_success_is_four_octets() {
        assert_eq!(build_success(3), vec![0x03, 0x03, 0x00, 0x04]);
        assert_eq!(build_failure(4), vec![0x04, 0x04, 0x00, 0x04]);
    }

    #[test]
    fn nak_with_no_acceptable_method() {
        let pkt = build_nak(2, &[]);
        let eap = EapPacket::decode(&pkt).unwrap();
        assert_eq!(eap.eap_type().unwrap(), EapType::Nak);
        assert_eq!(eap.type_data(), &[0]);
    }

    #[test]
    fn nak_lists_preferences() {
        let pkt = build_nak(2, &[EapType::Tls, EapType::Md5Challenge]);
        let eap = EapPacket::decode(&pkt).unwrap();
        assert_eq!(eap.type_data(), &[13, 4]);
    }
}
