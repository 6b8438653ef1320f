//! Outbound traffic queued by the state machines.

use std::net::SocketAddr;

use dot1x_types::MacAddress;

/// An EAPOL PDU ready for the L2 endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxEapolFrame {
    /// 1-based port index (switch port tag for tagged endpoints).
    pub port: u16,
    /// Destination MAC, always the PAE group address.
    pub dest: MacAddress,
    /// Per-port source MAC.
    pub src: MacAddress,
    /// The encoded EAPOL PDU.
    pub pdu: Vec<u8>,
}

/// A RADIUS datagram ready for the UDP endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRadiusDatagram {
    /// Server address.
    pub dest: SocketAddr,
    /// The encoded RADIUS packet.
    pub data: Vec<u8>,
}
