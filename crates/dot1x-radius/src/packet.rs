//! RADIUS packet construction and verification.

use bytes::{BufMut, BytesMut};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use std::net::IpAddr;

use dot1x_types::consts::{MAX_STATE_SIZE, MD5_DIGEST_SIZE, RADIUS_MAX_ATTR_VALUE_LEN};

use crate::attribute::{types, AttributeIter, NAS_PORT_TYPE_ETHERNET, SERVICE_TYPE_FRAMED};
use crate::{RadiusError, RADIUS_HEADER_LEN};

type HmacMd5 = Hmac<Md5>;

/// Largest RADIUS packet (RFC 2865 §3).
const MAX_RADIUS_LEN: usize = 4096;

/// RADIUS code octet, restricted to what an 802.1X client handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusCode {
    /// Access-Request (client to server).
    AccessRequest,
    /// Access-Accept.
    AccessAccept,
    /// Access-Reject.
    AccessReject,
    /// Access-Challenge.
    AccessChallenge,
}

impl RadiusCode {
    /// Maps the wire octet to a code a client may receive.
    #[must_use]
    pub const fn from_reply_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(Self::AccessAccept),
            3 => Some(Self::AccessReject),
            11 => Some(Self::AccessChallenge),
            _ => None,
        }
    }

    /// The wire octet for this code.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::AccessRequest => 1,
            Self::AccessAccept => 2,
            Self::AccessReject => 3,
            Self::AccessChallenge => 11,
        }
    }
}

/// Everything that goes into one Access-Request.
///
/// The caller owns identifier allocation and the random Request
/// Authenticator; a retransmission reuses both, byte for byte.
#[derive(Debug)]
pub struct AccessRequest<'a> {
    /// RADIUS identifier, unique among in-flight requests.
    pub identifier: u8,
    /// 16 random octets; also the key for verifying the reply.
    pub authenticator: [u8; 16],
    /// User-Name, the identity from EAP-Response/Identity.
    pub user_name: &'a str,
    /// Framed-MTU advertised to the server (the EAP fragment budget).
    pub framed_mtu: u32,
    /// NAS source address, selects NAS-IP-Address or NAS-IPv6-Address.
    pub nas_address: IpAddr,
    /// NAS-Port: the 1-based port index.
    pub nas_port: u32,
    /// NAS-Port-Id: `"<if_name>_<port>"`.
    pub nas_port_id: &'a str,
    /// Called-Station-Id: bridge MAC, lowercase dashed.
    pub called_station_id: &'a str,
    /// Calling-Station-Id: supplicant MAC, lowercase dashed.
    pub calling_station_id: &'a str,
    /// State attribute from the previous Access-Challenge, echoed
    /// verbatim; empty means absent.
    pub server_state: &'a [u8],
    /// The peer's EAP response, split across EAP-Message attributes.
    pub eap_message: &'a [u8],
}

impl AccessRequest<'_> {
    /// Encodes the request and seals it with the Message-Authenticator
    /// HMAC-MD5 under `secret`.
    pub fn encode(&self, secret: &[u8]) -> Result<Vec<u8>, RadiusError> {
        let mut buf = BytesMut::with_capacity(256);
        buf.put_u8(RadiusCode::AccessRequest.as_u8());
        buf.put_u8(self.identifier);
        buf.put_u16(0); // length, finalized below
        buf.put_slice(&self.authenticator);

        put_attr(&mut buf, types::USER_NAME, self.user_name.as_bytes());
        put_attr_u32(&mut buf, types::SERVICE_TYPE, SERVICE_TYPE_FRAMED);
        put_attr_u32(&mut buf, types::FRAMED_MTU, self.framed_mtu);
        match self.nas_address {
            IpAddr::V4(v4) => put_attr(&mut buf, types::NAS_IP_ADDRESS, &v4.octets()),
            IpAddr::V6(v6) => put_attr(&mut buf, types::NAS_IPV6_ADDRESS, &v6.octets()),
        }
        put_attr_u32(&mut buf, types::NAS_PORT, self.nas_port);
        put_attr_u32(&mut buf, types::NAS_PORT_TYPE, NAS_PORT_TYPE_ETHERNET);
        put_attr(&mut buf, types::NAS_PORT_ID, self.nas_port_id.as_bytes());
        put_attr(
            &mut buf,
            types::CALLED_STATION_ID,
            self.called_station_id.as_bytes(),
        );
        put_attr(
            &mut buf,
            types::CALLING_STATION_ID,
            self.calling_station_id.as_bytes(),
        );
        if !self.server_state.is_empty() {
            put_attr(&mut buf, types::STATE, self.server_state);
        }
        for chunk in self.eap_message.chunks(RADIUS_MAX_ATTR_VALUE_LEN) {
            put_attr(&mut buf, types::EAP_MESSAGE, chunk);
        }
        let ma_value_offset = buf.len() + 2;
        put_attr(
            &mut buf,
            types::MESSAGE_AUTHENTICATOR,
            &[0u8; MD5_DIGEST_SIZE],
        );

        if buf.len() > MAX_RADIUS_LEN {
            return Err(RadiusError::RequestTooLarge);
        }
        let len = buf.len() as u16;
        buf[2..4].copy_from_slice(&len.to_be_bytes());

        // HMAC-MD5 over the finished packet with the Message-Authenticator
        // value still zero-filled (RFC 3579 §3.2).
        let digest = hmac_md5(secret, &buf);
        buf[ma_value_offset..ma_value_offset + MD5_DIGEST_SIZE].copy_from_slice(&digest);

        Ok(buf.to_vec())
    }
}

fn put_attr(buf: &mut BytesMut, attr_type: u8, value: &[u8]) {
    debug_assert!(value.len() <= RADIUS_MAX_ATTR_VALUE_LEN);
    buf.put_u8(attr_type);
    buf.put_u8((value.len() + 2) as u8);
    buf.put_slice(value);
}

fn put_attr_u32(buf: &mut BytesMut, attr_type: u8, value: u32) {
    put_attr(buf, attr_type, &value.to_be_bytes());
}

fn hmac_md5(secret: &[u8], data: &[u8]) -> [u8; MD5_DIGEST_SIZE] {
    let mut mac = HmacMd5::new_from_slice(secret).expect("HMAC-MD5 accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// The cheap first look at a reply: code and identifier, with the
/// length sanity checks of RFC 2865 §3 applied. Used to find the port
/// whose outstanding request this answers before any crypto runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    /// Reply code.
    pub code: RadiusCode,
    /// Identifier copied from the request.
    pub identifier: u8,
}

impl ReplyHeader {
    /// Peeks at a datagram, rejecting bad lengths and non-reply codes.
    pub fn peek(data: &[u8]) -> Result<Self, RadiusError> {
        declared_len(data)?;
        let code =
            RadiusCode::from_reply_u8(data[0]).ok_or(RadiusError::UnexpectedCode(data[0]))?;
        Ok(Self {
            code,
            identifier: data[1],
        })
    }
}

fn declared_len(data: &[u8]) -> Result<usize, RadiusError> {
    if data.len() < RADIUS_HEADER_LEN {
        return Err(RadiusError::BadLength {
            declared: 0,
            received: data.len(),
        });
    }
    let declared = usize::from(u16::from_be_bytes([data[2], data[3]]));
    if declared < RADIUS_HEADER_LEN || declared > data.len() {
        return Err(RadiusError::BadLength {
            declared,
            received: data.len(),
        });
    }
    Ok(declared)
}

/// A fully verified reply, reduced to what the pass-through needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiusReply {
    /// Reply code.
    pub code: RadiusCode,
    /// Identifier copied from the request.
    pub identifier: u8,
    /// State attribute value to echo in the next request, if present.
    pub server_state: Option<Vec<u8>>,
    /// The EAP packet reassembled from the EAP-Message attributes.
    pub eap_message: Vec<u8>,
}

/// Verifies a reply against the outstanding request and extracts its
/// State and EAP-Message payload.
///
/// Runs the checks of RFC 2865 §3 and RFC 3579 §3.2 in order: Response
/// Authenticator, then mandatory Message-Authenticator. Octets beyond
/// the declared length are ignored.
pub fn verify_reply(
    data: &[u8],
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> Result<RadiusReply, RadiusError> {
    let declared = declared_len(data)?;
    let data = &data[..declared];
    let header = ReplyHeader::peek(data)?;
    let attributes = &data[RADIUS_HEADER_LEN..];

    // Response Authenticator:
    // MD5(code || id || length || request authenticator || attributes || secret)
    let mut md5 = Md5::new();
    md5.update(&data[0..4]);
    md5.update(request_authenticator);
    md5.update(attributes);
    md5.update(secret);
    let expected: [u8; MD5_DIGEST_SIZE] = md5.finalize().into();
    if expected != data[4..RADIUS_HEADER_LEN] {
        return Err(RadiusError::ResponseAuthenticator);
    }

    // Message-Authenticator: mandatory for EAP-carrying replies
    // (RFC 3579 §3.2). Recomputed with the Request Authenticator in the
    // authenticator field and the attribute value zero-filled.
    let ma_offset = AttributeIter::find_offset(attributes, types::MESSAGE_AUTHENTICATOR)?
        .ok_or(RadiusError::MissingMessageAuthenticator)?;
    let ma_value = AttributeIter::find(attributes, types::MESSAGE_AUTHENTICATOR)?
        .ok_or(RadiusError::MissingMessageAuthenticator)?;
    if ma_value.len() != MD5_DIGEST_SIZE {
        return Err(RadiusError::MalformedAttribute(ma_offset));
    }
    let mut check = data.to_vec();
    check[4..RADIUS_HEADER_LEN].copy_from_slice(request_authenticator);
    let value_start = RADIUS_HEADER_LEN + ma_offset + 2;
    check[value_start..value_start + MD5_DIGEST_SIZE].fill(0);
    let mut mac = HmacMd5::new_from_slice(secret).expect("HMAC-MD5 accepts any key length");
    mac.update(&check);
    if mac.verify_slice(ma_value).is_err() {
        return Err(RadiusError::MessageAuthenticator);
    }

    let server_state = match AttributeIter::find_offset(attributes, types::STATE)? {
        Some(offset) => {
            // The walk already validated this attribute's bounds.
            let attr_len = usize::from(attributes[offset + 1]);
            let value = &attributes[offset + 2..offset + attr_len];
            if value.len() > MAX_STATE_SIZE {
                return Err(RadiusError::MalformedAttribute(offset));
            }
            Some(value.to_vec())
        }
        None => None,
    };

    let mut eap_message = Vec::new();
    for item in AttributeIter::new(attributes) {
        let (attr_type, value) = item?;
        if attr_type == types::EAP_MESSAGE {
            eap_message.extend_from_slice(value);
        }
    }
    if eap_message.len() < 4 {
        return Err(RadiusError::ShortEapMessage(eap_message.len()));
    }

    Ok(RadiusReply {
        code: header.code,
        identifier: header.identifier,
        server_state,
        eap_message,
    })
}
