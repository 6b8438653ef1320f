//! MAC address handling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// MAC address representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

/// The PAE group address all EAPOL frames are sent to
/// (IEEE Std 802.1X-2010 Table 11-1).
pub const PAE_GROUP_ADDR: MacAddress = MacAddress([0x01, 0x80, 0xC2, 0x00, 0x00, 0x03]);

/// EtherType assigned to EAPOL.
pub const ETHERTYPE_EAPOL: u16 = 0x888E;

impl MacAddress {
    /// Creates a new MAC address from bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Creates a zero MAC address (00:00:00:00:00:00).
    #[must_use]
    pub const fn zero() -> Self {
        Self([0x00; 6])
    }

    /// Returns the bytes of the MAC address.
    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Checks if this is a zero/null address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0x00; 6]
    }

    /// Checks if this is a multicast address.
    #[must_use]
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Derives the per-port source address used for EAPOL emission:
    /// the interface address plus the 1-based port index, added to the
    /// low byte with carry propagating upward.
    #[must_use]
    pub fn with_port_offset(&self, port: u16) -> Self {
        let mut bytes = self.0;
        let mut carry = u16::from(bytes[5]) + port;
        bytes[5] = (carry & 0xFF) as u8;
        carry >>= 8;
        for i in (0..5).rev() {
            if carry == 0 {
                break;
            }
            let sum = u16::from(bytes[i]) + carry;
            bytes[i] = (sum & 0xFF) as u8;
            carry = sum >> 8;
        }
        Self(bytes)
    }

    /// Formats the address the way RADIUS station-id attributes want it:
    /// lowercase hex, dash separated (RFC 3580 §3.20/§3.21).
    #[must_use]
    pub fn to_station_id(&self) -> String {
        format!(
            "{:02x}-{:02x}-{:02x}-{:02x}-{:02x}-{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(Error::InvalidAddress {
                message: format!("invalid MAC address format: {s}"),
            });
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(part, 16).map_err(|_| Error::InvalidAddress {
                message: format!("invalid hex digit in MAC address: {part}"),
            })?;
        }

        Ok(Self(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let mac: MacAddress = "00:11:22:aa:bb:cc".parse().unwrap();
        assert_eq!(mac.octets(), [0x00, 0x11, 0x22, 0xAA, 0xBB, 0xCC]);
        assert_eq!(mac.to_string(), "00:11:22:AA:BB:CC");
        assert_eq!(mac.to_station_id(), "00-11-22-aa-bb-cc");
    }

    #[test]
    fn pae_group_addr_is_multicast() {
        assert!(PAE_GROUP_ADDR.is_multicast());
        assert_eq!(PAE_GROUP_ADDR.to_string(), "01:80:C2:00:00:03");
    }

    #[test]
    fn port_offset_carries() {
        let base = MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0xFF]);
        assert_eq!(
            base.with_port_offset(1).octets(),
            [0x00, 0x11, 0x22, 0x33, 0x45, 0x00]
        );
        let base = MacAddress::new([0x00, 0x11, 0x22, 0xFF, 0xFF, 0xFE]);
        assert_eq!(
            base.with_port_offset(3).octets(),
            [0x00, 0x11, 0x23, 0x00, 0x00, 0x01]
        );
    }
}
