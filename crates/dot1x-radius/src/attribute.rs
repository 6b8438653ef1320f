//! RADIUS attribute TLV walk.

use crate::RadiusError;

/// Fixed RADIUS header length: code, identifier, length, authenticator.
pub const RADIUS_HEADER_LEN: usize = 20;

/// Attribute type codes used by the 802.1X authenticator
/// (RFC 2865 §5, RFC 2869 §5, RFC 3162 §2).
pub mod types {
    /// User-Name.
    pub const USER_NAME: u8 = 1;
    /// NAS-IP-Address.
    pub const NAS_IP_ADDRESS: u8 = 4;
    /// NAS-Port.
    pub const NAS_PORT: u8 = 5;
    /// Service-Type.
    pub const SERVICE_TYPE: u8 = 6;
    /// Framed-MTU.
    pub const FRAMED_MTU: u8 = 12;
    /// State, echoed verbatim from Access-Challenge.
    pub const STATE: u8 = 24;
    /// Called-Station-Id.
    pub const CALLED_STATION_ID: u8 = 30;
    /// Calling-Station-Id.
    pub const CALLING_STATION_ID: u8 = 31;
    /// NAS-Port-Type.
    pub const NAS_PORT_TYPE: u8 = 61;
    /// EAP-Message.
    pub const EAP_MESSAGE: u8 = 79;
    /// Message-Authenticator.
    pub const MESSAGE_AUTHENTICATOR: u8 = 80;
    /// NAS-Port-Id.
    pub const NAS_PORT_ID: u8 = 87;
    /// NAS-IPv6-Address.
    pub const NAS_IPV6_ADDRESS: u8 = 95;
}

/// Service-Type value Framed.
pub const SERVICE_TYPE_FRAMED: u32 = 2;

/// NAS-Port-Type value Ethernet.
pub const NAS_PORT_TYPE_ETHERNET: u32 = 15;

/// A bounds-checked iterator over the attribute region of a RADIUS
/// packet. Yields `(type, value)` pairs; a malformed attribute header
/// stops the walk with an error.
#[derive(Debug, Clone)]
pub struct AttributeIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AttributeIter<'a> {
    /// Walks the attribute octets (everything after the RADIUS header).
    #[must_use]
    pub const fn new(attributes: &'a [u8]) -> Self {
        Self {
            data: attributes,
            offset: 0,
        }
    }

    /// Finds the first attribute of the given type.
    pub fn find(attributes: &'a [u8], attr_type: u8) -> Result<Option<&'a [u8]>, RadiusError> {
        for item in Self::new(attributes) {
            let (t, value) = item?;
            if t == attr_type {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Byte offset of the first attribute of the given type, relative to
    /// the start of the attribute region.
    pub fn find_offset(attributes: &'a [u8], attr_type: u8) -> Result<Option<usize>, RadiusError> {
        let mut iter = Self::new(attributes);
        loop {
            let start = iter.offset;
            match iter.next() {
                Some(Ok((t, _))) if t == attr_type => return Ok(Some(start)),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Ok(None),
            }
        }
    }
}

impl<'a> Iterator for AttributeIter<'a> {
    type Item = Result<(u8, &'a [u8]), RadiusError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset == self.data.len() {
            return None;
        }
        let remaining = &self.data[self.offset..];
        if remaining.len() < 2 {
            let err = RadiusError::MalformedAttribute(self.offset);
            self.offset = self.data.len();
            return Some(Err(err));
        }
        let attr_type = remaining[0];
        let attr_len = usize::from(remaining[1]);
        if attr_len < 2 || attr_len > remaining.len() {
            let err = RadiusError::MalformedAttribute(self.offset);
            self.offset = self.data.len();
            return Some(Err(err));
        }
        self.offset += attr_len;
        Some(Ok((attr_type, &remaining[2..attr_len])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tlv(attr_type: u8, value: &[u8]) -> Vec<u8> {
        let mut out = vec![attr_type, (value.len() + 2) as u8];
        out.extend_from_slice(value);
        out
    }

    #[test]
    fn walk_yields_build_order() {
        let mut region = Vec::new();
        region.extend(tlv(types::USER_NAME, b"alice"));
        region.extend(tlv(types::STATE, &[0x01, 0x02, 0x03]));
        region.extend(tlv(types::EAP_MESSAGE, &[0x02, 0x01, 0x00, 0x04]));

        let attrs: Vec<_> = AttributeIter::new(&region)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            attrs,
            vec![
                (types::USER_NAME, b"alice".as_slice()),
                (types::STATE, [0x01, 0x02, 0x03].as_slice()),
                (types::EAP_MESSAGE, [0x02, 0x01, 0x00, 0x04].as_slice()),
            ]
        );
    }

    #[test]
    fn walk_rejects_undersized_length() {
        let region = [types::STATE, 1, 0xFF];
        let result: Result<Vec<_>, _> = AttributeIter::new(&region).collect();
        assert_eq!(result, Err(RadiusError::MalformedAttribute(0)));
    }

    #[test]
    fn walk_rejects_overrun() {
        let region = [types::STATE, 10, 0x01, 0x02];
        let result: Result<Vec<_>, _> = AttributeIter::new(&region).collect();
        assert_eq!(result, Err(RadiusError::MalformedAttribute(0)));
    }

    #[test]
    fn find_returns_first_match() {
        let mut region = Vec::new();
        region.extend(tlv(types::EAP_MESSAGE, b"one"));
        region.extend(tlv(types::EAP_MESSAGE, b"two"));
        let found = AttributeIter::find(&region, types::EAP_MESSAGE).unwrap();
        assert_eq!(found, Some(b"one".as_slice()));
        assert_eq!(
            AttributeIter::find(&region, types::USER_NAME).unwrap(),
            None
        );
    }
}
