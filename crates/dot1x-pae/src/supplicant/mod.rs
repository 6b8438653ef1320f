//! Supplicant context: per-port records, composite runner, receive
//! path, tick, and the small management surface a client needs.

mod backend;
mod pae;

pub use backend::SuppBackendState;
pub use pae::SuppPaeState;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error};

use dot1x_eap::{EapPeerSm, PeerConfig};
use dot1x_eapol::{CodecError, EapCode, EapPacket, EapolFrame, EapolPacketType};
use dot1x_types::counters::{EapolCounters, SessionStats, SessionTerminateCause};
use dot1x_types::net::{ETHERTYPE_EAPOL, PAE_GROUP_ADDR};
use dot1x_types::params::{Apply, PortControl, PortStatus, SuppPortParams};
use dot1x_types::{Error, MacAddress, Result};

use crate::observer::PortObserver;
use crate::output::TxEapolFrame;

/// Composite-runner iteration ceiling, as on the authenticator side.
const MAX_FSM_ITERATIONS: u32 = 256;

/// Everything a supplicant context needs to know at creation.
#[derive(Clone)]
pub struct SupplicantConfig {
    /// Interface name (logging only).
    pub interface: String,
    /// Interface MAC, the EAPOL source base.
    pub local_mac: MacAddress,
    /// Number of ports (clients normally run one).
    pub num_ports: u16,
    /// Initial per-port parameters.
    pub params: SuppPortParams,
    /// Identity, credentials, and method preferences for the EAP peer.
    pub peer: PeerConfig,
}

/// One supplicant port.
pub struct SuppPort {
    /// 1-based port index.
    pub index: u16,

    /// Link state reported by the endpoint; sampled by the tick.
    pub link_up: bool,
    prev_link_up: bool,

    // Timers, seconds.
    /// Interval until the next EAPOL-Start (`startWhen`).
    pub start_when: u32,
    /// Hold-off after a failure (`heldWhile`).
    pub held_while: u32,
    /// Wait for the authenticator's next move (`authWhile`).
    pub auth_while: u32,

    // Rendez-vous booleans.
    /// Management-requested reinitialization.
    pub initialize: bool,
    /// MAC-layer operational state.
    pub port_enabled: bool,
    /// Key exchange state permits authorization (constant true).
    pub port_valid: bool,
    /// The user asked to log off.
    pub user_logoff: bool,
    pub(crate) logoff_sent: bool,
    /// An EAP packet is waiting in the peer's `req_data`.
    pub eapol_eap: bool,
    /// Backend: start a conversation.
    pub supp_start: bool,
    /// Backend: conversation succeeded.
    pub supp_success: bool,
    /// Backend: conversation failed.
    pub supp_fail: bool,
    /// Backend: the authenticator went silent.
    pub supp_timeout: bool,
    /// Backend: abort the conversation.
    pub supp_abort: bool,
    /// Key machines would run now (unused without them).
    pub key_run: bool,
    /// Key machines finished (unused without them).
    pub key_done: bool,

    /// EAPOL-Start transmissions this attempt.
    pub start_count: u32,

    /// Supplicant PAE state.
    pub pae_state: SuppPaeState,
    /// Supplicant backend state.
    pub backend_state: SuppBackendState,

    /// Uncontrolled-port view of the authorization state.
    pub supp_port_status: PortStatus,
    /// The control mode the machines are currently operating under.
    pub s_port_mode: PortControl,

    /// Managed parameters.
    pub params: SuppPortParams,

    /// The RFC 4137 EAP peer for this port.
    pub peer: EapPeerSm,

    /// MAC address the last frame came from.
    pub authenticator_mac: MacAddress,

    /// EAPOL frame counters.
    pub counters: EapolCounters,
    /// Session statistics.
    pub session: SessionStats,
}

impl SuppPort {
    fn new(index: u16, params: SuppPortParams, peer: PeerConfig) -> Self {
        Self {
            index,
            link_up: false,
            prev_link_up: false,
            start_when: 0,
            held_while: 0,
            auth_while: 0,
            initialize: true,
            port_enabled: false,
            port_valid: true,
            user_logoff: false,
            logoff_sent: false,
            eapol_eap: false,
            supp_start: false,
            supp_success: false,
            supp_fail: false,
            supp_timeout: false,
            supp_abort: false,
            key_run: false,
            key_done: false,
            start_count: 0,
            pae_state: SuppPaeState::Disconnected,
            backend_state: SuppBackendState::Initialize,
            supp_port_status: PortStatus::Unauthorized,
            s_port_mode: PortControl::Auto,
            params,
            peer: EapPeerSm::new(peer),
            authenticator_mac: MacAddress::zero(),
            counters: EapolCounters::default(),
            session: SessionStats::default(),
        }
    }

    fn decrement_timers(&mut self) {
        self.start_when = self.start_when.saturating_sub(1);
        self.held_while = self.held_while.saturating_sub(1);
        self.auth_while = self.auth_while.saturating_sub(1);
        self.peer.tick();
    }
}

/// Transmit-side helpers for the supplicant machines.
pub(crate) struct SuppIo<'a> {
    frames: &'a mut Vec<TxEapolFrame>,
    local_mac: MacAddress,
}

impl SuppIo<'_> {
    fn push(&mut self, port: &mut SuppPort, pdu: Vec<u8>) {
        port.counters.eapol_frames_tx += 1;
        port.session.frames_tx += 1;
        port.session.octets_tx += pdu.len() as u64;
        self.frames.push(TxEapolFrame {
            port: port.index,
            dest: PAE_GROUP_ADDR,
            src: self.local_mac.with_port_offset(port.index),
            pdu,
        });
    }

    pub(crate) fn send_start(&mut self, port: &mut SuppPort) {
        self.push(port, EapolFrame::encode_signal(EapolPacketType::Start));
    }

    pub(crate) fn send_logoff(&mut self, port: &mut SuppPort) {
        self.push(port, EapolFrame::encode_signal(EapolPacketType::Logoff));
    }

    pub(crate) fn send_response(&mut self, port: &mut SuppPort) {
        if port.peer.resp_data.is_empty() {
            return;
        }
        let pdu = EapolFrame::encode(EapolPacketType::EapPacket, &port.peer.resp_data);
        self.push(port, pdu);
    }
}

/// The supplicant context.
pub struct SupplicantContext {
    config: SupplicantConfig,
    ports: Vec<SuppPort>,
    observer: Option<Arc<dyn PortObserver>>,
    /// EAPOL frames awaiting the L2 endpoint.
    pub tx_frames: Vec<TxEapolFrame>,
}

impl SupplicantContext {
    /// Creates the context and its ports.
    pub fn new(config: SupplicantConfig) -> Result<Self> {
        if config.num_ports == 0 {
            return Err(Error::invalid_parameter("num_ports", "must be at least 1"));
        }
        let ports = (1..=config.num_ports)
            .map(|index| SuppPort::new(index, config.params.clone(), config.peer.clone()))
            .collect();
        Ok(Self {
            config,
            ports,
            observer: None,
            tx_frames: Vec::new(),
        })
    }

    /// Registers the state-change observer.
    pub fn set_observer(&mut self, observer: Arc<dyn PortObserver>) {
        self.observer = Some(observer);
    }

    /// Number of ports.
    #[must_use]
    pub fn num_ports(&self) -> u16 {
        self.config.num_ports
    }

    /// Immutable access to a port, 1-based.
    pub fn port(&self, index: u16) -> Result<&SuppPort> {
        self.ports
            .get(usize::from(index.wrapping_sub(1)))
            .ok_or(Error::invalid_port(index, self.config.num_ports))
    }

    fn port_mut(&mut self, index: u16) -> Result<&mut SuppPort> {
        let num_ports = self.config.num_ports;
        self.ports
            .get_mut(usize::from(index.wrapping_sub(1)))
            .ok_or(Error::invalid_port(index, num_ports))
    }

    /// Updates the link state of a port; the next tick samples it.
    pub fn set_link(&mut self, index: u16, up: bool) -> Result<()> {
        self.port_mut(index)?.link_up = up;
        Ok(())
    }

    /// Starts or cancels a user logoff.
    pub fn set_user_logoff(&mut self, index: u16, value: bool, apply: Apply) -> Result<()> {
        self.port(index)?;
        if apply == Apply::Commit {
            self.port_mut(index)?.user_logoff = value;
            self.run();
        }
        Ok(())
    }

    /// Requests reinitialization of a port.
    pub fn set_initialize(&mut self, index: u16, apply: Apply) -> Result<()> {
        self.port(index)?;
        if apply == Apply::Commit {
            let port = self.port_mut(index)?;
            port.initialize = true;
            port.session.terminate_cause = SessionTerminateCause::PortReInit;
            self.run();
        }
        Ok(())
    }

    /// Handles one received EAPOL frame.
    pub fn process_eapol(
        &mut self,
        index: u16,
        src: MacAddress,
        dest: MacAddress,
        ethertype: u16,
        pdu: &[u8],
    ) -> Result<()> {
        let port = self.port_mut(index)?;

        if dest != PAE_GROUP_ADDR || ethertype != ETHERTYPE_EAPOL {
            port.counters.invalid_eapol_frames_rx += 1;
            return Ok(());
        }

        let frame = match EapolFrame::decode(pdu) {
            Ok(frame) => frame,
            Err(CodecError::BodyTruncated { .. }) => {
                port.counters.eap_length_error_frames_rx += 1;
                return Ok(());
            }
            Err(e) => {
                debug!(port = index, error = %e, "dropping EAPOL frame");
                port.counters.invalid_eapol_frames_rx += 1;
                return Ok(());
            }
        };

        port.counters.eapol_frames_rx += 1;
        port.counters.last_eapol_frame_version = frame.version;
        port.session.frames_rx += 1;
        port.session.octets_rx += pdu.len() as u64;
        port.authenticator_mac = src;

        if frame.packet_type == EapolPacketType::EapPacket {
            match EapPacket::decode(&frame.body) {
                // A supplicant never acts on a Response.
                Ok(packet) if packet.code == EapCode::Response => {
                    debug!(port = index, "discarding EAP response");
                }
                Ok(packet) => {
                    port.peer.req_data = packet.encode();
                    port.eapol_eap = true;
                }
                Err(e) => {
                    debug!(port = index, error = %e, "discarding EAP packet");
                }
            }
        } else {
            // Start/Logoff/Key mean nothing to a supplicant.
            debug!(port = index, kind = %frame.packet_type, "ignoring EAPOL frame");
        }

        self.run();
        Ok(())
    }

    /// The 1 Hz tick.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        for port in &mut self.ports {
            let up = port.link_up;
            if up && !port.prev_link_up {
                port.session.restart(now);
            } else if !up && port.prev_link_up {
                port.session.terminate_cause = SessionTerminateCause::PortFailure;
            } else if up {
                port.session.time += 1;
            }
            port.prev_link_up = up;
            port.port_enabled = up;
            port.decrement_timers();
        }
        self.run();
    }

    /// Runs every state machine of every port to quiescence.
    pub fn run(&mut self) {
        let mut iterations = 0u32;
        loop {
            let mut busy = false;
            let frames = &mut self.tx_frames;
            for port in &mut self.ports {
                let mut io = SuppIo {
                    frames: &mut *frames,
                    local_mac: self.config.local_mac,
                };
                let before = (port.pae_state, port.backend_state, port.peer.state());

                busy |= pae::step(port, &mut io);
                busy |= backend::step(port, &mut io);
                busy |= port.peer.step(port.port_enabled);

                if port.initialize {
                    port.initialize = false;
                    busy = true;
                }

                if let Some(observer) = &self.observer {
                    if before.0 != port.pae_state {
                        observer.on_supp_pae_state(port.index, port.pae_state);
                    }
                    if before.1 != port.backend_state {
                        observer.on_supp_backend_state(port.index, port.backend_state);
                    }
                    if before.2 != port.peer.state() {
                        observer.on_eap_peer_state(port.index, port.peer.state());
                    }
                }
            }
            if !busy {
                break;
            }
            iterations += 1;
            if iterations > MAX_FSM_ITERATIONS {
                error!("supplicant state machines did not stabilize, reinitializing");
                for port in &mut self.ports {
                    port.pae_state = SuppPaeState::Disconnected;
                    port.backend_state = SuppBackendState::Initialize;
                    port.supp_port_status = PortStatus::Unauthorized;
                    port.initialize = true;
                }
                break;
            }
        }
    }

    /// Per-port EAPOL counters.
    pub fn counters(&self, index: u16) -> Result<EapolCounters> {
        Ok(self.port(index)?.counters)
    }

    /// Per-port session statistics.
    pub fn session_stats(&self, index: u16) -> Result<SessionStats> {
        Ok(self.port(index)?.session)
    }

    /// Drains the queued EAPOL frames.
    pub fn drain_frames(&mut self) -> Vec<TxEapolFrame> {
        std::mem::take(&mut self.tx_frames)
    }
}
