//! Endpoint abstractions: the raw Ethernet side (pcap) and the RADIUS
//! UDP side (tokio + socket2).

use async_trait::async_trait;
use etherparse::{LinkSlice, SlicedPacket};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use dot1x_pae::TxEapolFrame;
use dot1x_types::net::ETHERTYPE_EAPOL;
use dot1x_types::MacAddress;

use crate::error::{DaemonError, Result};

/// One frame off the wire, already sliced down to the EAPOL PDU.
#[derive(Debug, Clone)]
pub struct RxFrame {
    /// Source MAC.
    pub src: MacAddress,
    /// Destination MAC.
    pub dest: MacAddress,
    /// EtherType.
    pub ethertype: u16,
    /// Switch port tag when the endpoint provides one.
    pub port: Option<u16>,
    /// The EAPOL PDU (everything after the Ethernet header).
    pub pdu: Vec<u8>,
}

/// Transmit half of an L2 endpoint.
#[async_trait]
pub trait L2Sink: Send {
    /// Sends one EAPOL frame.
    async fn send(&mut self, frame: &TxEapolFrame) -> Result<()>;
}

/// UDP endpoint for the RADIUS client side.
#[async_trait]
pub trait UdpEndpoint: Send + Sync {
    /// Sends one datagram.
    async fn send_to(&self, data: &[u8], dest: SocketAddr) -> Result<()>;

    /// Receives one datagram.
    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)>;
}

/// pcap-backed L2 endpoint. `open` starts a capture thread filtered to
/// the EAPOL EtherType and hands frames over an mpsc channel; the
/// returned sink owns a second handle for transmission.
pub struct PcapEndpoint;

impl PcapEndpoint {
    /// Opens the device and starts the receive thread.
    pub fn open(device: &str) -> Result<(mpsc::Receiver<RxFrame>, PcapSink)> {
        let rx_cap = Self::open_capture(device)?;
        let tx_cap = Self::open_capture(device)?;
        let (tx, rx) = mpsc::channel(256);

        let name = device.to_string();
        std::thread::spawn(move || {
            Self::capture_loop(rx_cap, &tx, &name);
        });

        Ok((rx, PcapSink { capture: tx_cap }))
    }

    fn open_capture(device: &str) -> Result<pcap::Capture<pcap::Active>> {
        let dev = pcap::Device::list()
            .map_err(|e| DaemonError::capture(device, e.to_string()))?
            .into_iter()
            .find(|d| d.name == device)
            .ok_or_else(|| DaemonError::capture(device, "device not found"))?;

        let mut cap = pcap::Capture::from_device(dev)
            .map_err(|e| DaemonError::capture(device, e.to_string()))?
            .promisc(true)
            .snaplen(2048)
            .timeout(200)
            .open()
            .map_err(|e| DaemonError::capture(device, e.to_string()))?;

        // Only EAPOL ever reaches the engine.
        cap.filter(&format!("ether proto {ETHERTYPE_EAPOL:#06x}"), true)
            .map_err(|e| DaemonError::capture(device, e.to_string()))?;
        Ok(cap)
    }

    fn capture_loop(
        mut cap: pcap::Capture<pcap::Active>,
        tx: &mpsc::Sender<RxFrame>,
        device: &str,
    ) {
        info!(device, "EAPOL capture started");
        loop {
            match cap.next_packet() {
                Ok(packet) => {
                    let Some(frame) = slice_frame(packet.data) else {
                        continue;
                    };
                    if tx.blocking_send(frame).is_err() {
                        debug!(device, "receiver dropped, stopping capture");
                        break;
                    }
                }
                Err(pcap::Error::TimeoutExpired) => {
                    if tx.is_closed() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(device, error = %e, "capture error");
                    break;
                }
            }
        }
        info!(device, "EAPOL capture stopped");
    }
}

/// Slices an Ethernet frame into the fields the engine wants.
fn slice_frame(data: &[u8]) -> Option<RxFrame> {
    let sliced = SlicedPacket::from_ethernet(data).ok()?;
    match sliced.link {
        Some(LinkSlice::Ethernet2(eth)) => Some(RxFrame {
            src: MacAddress::new(eth.source()),
            dest: MacAddress::new(eth.destination()),
            ethertype: eth.ether_type().0,
            port: None,
            pdu: eth.payload_slice().to_vec(),
        }),
        _ => None,
    }
}

/// Transmit half of the pcap endpoint.
pub struct PcapSink {
    capture: pcap::Capture<pcap::Active>,
}

#[async_trait]
impl L2Sink for PcapSink {
    async fn send(&mut self, frame: &TxEapolFrame) -> Result<()> {
        let mut wire = Vec::with_capacity(14 + frame.pdu.len());
        wire.extend_from_slice(&frame.dest.octets());
        wire.extend_from_slice(&frame.src.octets());
        wire.extend_from_slice(&ETHERTYPE_EAPOL.to_be_bytes());
        wire.extend_from_slice(&frame.pdu);
        self.capture
            .sendpacket(wire)
            .map_err(|e| DaemonError::capture("tx", e.to_string()))
    }
}

/// tokio UDP endpoint with socket2 buffer sizing.
pub struct TokioUdpEndpoint {
    socket: UdpSocket,
}

impl TokioUdpEndpoint {
    /// Binds a socket suitable for talking to the server address.
    pub async fn bind(server: SocketAddr) -> Result<Self> {
        let bind_addr: SocketAddr = if server.is_ipv4() {
            "0.0.0.0:0".parse().expect("valid address")
        } else {
            "[::]:0".parse().expect("valid address")
        };
        let socket = UdpSocket::bind(bind_addr).await?;

        // Bump the buffers; RADIUS bursts are small but loss is costly.
        let std_socket = socket.into_std()?;
        let raw = socket2::Socket::from(std_socket);
        raw.set_recv_buffer_size(256 * 1024)?;
        raw.set_send_buffer_size(256 * 1024)?;
        let socket = UdpSocket::from_std(raw.into())?;

        Ok(Self { socket })
    }

    /// The locally bound address (NAS source address selection).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl UdpEndpoint for TokioUdpEndpoint {
    async fn send_to(&self, data: &[u8], dest: SocketAddr) -> Result<()> {
        self.socket.send_to(data, dest).await?;
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(self.socket.recv_from(buf).await?)
    }
}
