//! EAPOL PDU parsing and emission.

use bytes::{BufMut, BytesMut};
use strum::Display;

use crate::CodecError;

/// Protocol version emitted in every EAPOL PDU
/// (IEEE Std 802.1X-2004 §7.5.4; any version is accepted on receive).
pub const EAPOL_VERSION: u8 = 2;

/// Fixed EAPOL header length: version, type, body length.
pub const EAPOL_HEADER_LEN: usize = 4;

/// EAPOL packet type octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum EapolPacketType {
    /// Carries an EAP packet.
    EapPacket,
    /// Supplicant wants to (re)start authentication.
    Start,
    /// Supplicant is done; return the port to unauthorized.
    Logoff,
    /// EAPOL-Key (key distribution, not handled here).
    Key,
    /// Encapsulated ASF alert.
    AsfAlert,
}

impl EapolPacketType {
    /// Maps the wire octet to a packet type.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::EapPacket),
            1 => Some(Self::Start),
            2 => Some(Self::Logoff),
            3 => Some(Self::Key),
            4 => Some(Self::AsfAlert),
            _ => None,
        }
    }

    /// The wire octet for this packet type.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::EapPacket => 0,
            Self::Start => 1,
            Self::Logoff => 2,
            Self::Key => 3,
            Self::AsfAlert => 4,
        }
    }
}

/// A decoded EAPOL PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapolFrame {
    /// Protocol version from the header (recorded, never rejected).
    pub version: u8,
    /// Packet type.
    pub packet_type: EapolPacketType,
    /// Packet body, exactly `packet_body_length` octets.
    pub body: Vec<u8>,
}

impl EapolFrame {
    /// Decodes an EAPOL PDU from the octets following the Ethernet header.
    ///
    /// Trailing octets beyond the declared body length are ignored
    /// (Ethernet minimum-frame padding); a body shorter than declared is
    /// a length error the caller counts before discarding.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < EAPOL_HEADER_LEN {
            return Err(CodecError::ShortHeader(data.len()));
        }

        let version = data[0];
        let packet_type =
            EapolPacketType::from_u8(data[1]).ok_or(CodecError::UnknownPacketType(data[1]))?;
        let body_len = usize::from(u16::from_be_bytes([data[2], data[3]]));

        let received = data.len() - EAPOL_HEADER_LEN;
        if received < body_len {
            return Err(CodecError::BodyTruncated {
                declared: body_len,
                received,
            });
        }

        Ok(Self {
            version,
            packet_type,
            body: data[EAPOL_HEADER_LEN..EAPOL_HEADER_LEN + body_len].to_vec(),
        })
    }

    /// Encodes an EAPOL PDU with the current protocol version.
    #[must_use]
    pub fn encode(packet_type: EapolPacketType, body: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(EAPOL_HEADER_LEN + body.len());
        buf.put_u8(EAPOL_VERSION);
        buf.put_u8(packet_type.as_u8());
        buf.put_u16(body.len() as u16);
        buf.put_slice(body);
        buf.to_vec()
    }

    /// Encodes a bodyless PDU (EAPOL-Start, EAPOL-Logoff).
    #[must_use]
    pub fn encode_signal(packet_type: EapolPacketType) -> Vec<u8> {
        Self::encode(packet_type, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_eap_packet() {
        // version 1, type 0, body length 4, EAP Success id 7
        let pdu = [0x01, 0x00, 0x00, 0x04, 0x03, 0x07, 0x00, 0x04];
        let frame = EapolFrame::decode(&pdu).unwrap();
        assert_eq!(frame.version, 1);
        assert_eq!(frame.packet_type, EapolPacketType::EapPacket);
        assert_eq!(frame.body, &[0x03, 0x07, 0x00, 0x04]);
    }

    #[test]
    fn decode_ignores_trailing_padding() {
        // EAPOL-Start padded out to Ethernet minimum
        let mut pdu = vec![0x02, 0x01, 0x00, 0x00];
        pdu.extend_from_slice(&[0u8; 42]);
        let frame = EapolFrame::decode(&pdu).unwrap();
        assert_eq!(frame.packet_type, EapolPacketType::Start);
        assert!(frame.body.is_empty());
    }

    #[test]
    fn decode_rejects_short_body() {
        let pdu = [0x02, 0x00, 0x00, 0x08, 0x01, 0x00];
        assert_eq!(
            EapolFrame::decode(&pdu),
            Err(CodecError::BodyTruncated {
                declared: 8,
                received: 2
            })
        );
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let pdu = [0x02, 0x09, 0x00, 0x00];
        assert_eq!(EapolFrame::decode(&pdu), Err(CodecError::UnknownPacketType(9)));
    }

    #[test]
    fn encode_emits_version_2() {
        let pdu = EapolFrame::encode(EapolPacketType::EapPacket, &[0x03, 0x01, 0x00, 0x04]);
        assert_eq!(pdu, &[0x02, 0x00, 0x00, 0x04, 0x03, 0x01, 0x00, 0x04]);
    }

    #[test]
    fn signal_round_trip() {
        let pdu = EapolFrame::encode_signal(EapolPacketType::Logoff);
        let frame = EapolFrame::decode(&pdu).unwrap();
        assert_eq!(frame.packet_type, EapolPacketType::Logoff);
        assert!(frame.body.is_empty());
    }
}
