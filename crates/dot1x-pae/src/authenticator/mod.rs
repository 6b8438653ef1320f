//! Authenticator context: per-port records, the composite FSM runner,
//! the EAPOL/RADIUS receive paths, the 1 Hz tick, the RADIUS
//! pass-through glue, and the management surface.

mod backend;
mod pae;
mod reauth;

pub use backend::BackendState;
pub use pae::AuthPaeState;
pub use reauth::ReauthTimerState;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, warn};

use dot1x_eap::{EapAuthSm, EapAuthState};
use dot1x_eapol::{
    build_failure, build_success, next_id, CodecError, EapCode, EapPacket, EapType, EapolFrame,
    EapolPacketType,
};
use dot1x_radius::packet::{verify_reply, AccessRequest, ReplyHeader};
use dot1x_types::consts::{
    MAX_RADIUS_RETRANS, MAX_SECRET_LEN, RADIUS_TIMEOUT,
};
use dot1x_types::counters::{EapolCounters, SessionStats, SessionTerminateCause};
use dot1x_types::net::{ETHERTYPE_EAPOL, PAE_GROUP_ADDR};
use dot1x_types::params::{Apply, AuthPortParams, PortControl, PortStatus};
use dot1x_types::{Error, MacAddress, Result};

use crate::observer::PortObserver;
use crate::output::{TxEapolFrame, TxRadiusDatagram};

/// Composite-runner iteration ceiling; exceeding it means the machines
/// are chasing each other and the port is reset fail-closed.
const MAX_FSM_ITERATIONS: u32 = 256;

/// Everything an authenticator context needs to know at creation.
#[derive(Debug, Clone)]
pub struct AuthenticatorConfig {
    /// Interface name, used in NAS-Port-Id.
    pub interface: String,
    /// Bridge MAC: Called-Station-Id and the EAPOL source base.
    pub local_mac: MacAddress,
    /// Source address advertised as NAS-IP-Address/NAS-IPv6-Address.
    pub nas_address: IpAddr,
    /// RADIUS server address.
    pub server: SocketAddr,
    /// RADIUS shared secret.
    pub shared_secret: String,
    /// Framed-MTU advertised to the server.
    pub framed_mtu: u32,
    /// Number of controlled ports.
    pub num_ports: u16,
    /// Initial per-port parameters.
    pub params: AuthPortParams,
}

/// One controlled port: timers, rendez-vous flags, machine states, the
/// EAP full-authenticator instance, the AAA working set, and counters.
pub struct AuthPort {
    /// 1-based port index.
    pub index: u16,

    /// Link state reported by the endpoint; sampled by the tick.
    pub link_up: bool,
    prev_link_up: bool,

    // Timers, seconds, decremented by the tick, saturating at zero.
    /// Backend wait for the AAA server (`aWhile`).
    pub a_while: u32,
    /// PAE hold-off after a failure (`quietWhile`).
    pub quiet_while: u32,
    /// Countdown to reauthentication (`reAuthWhen`).
    pub re_auth_when: u32,
    /// RADIUS retransmit timer.
    pub aaa_retrans_timer: u32,

    // Rendez-vous booleans between the machines.
    /// Management-requested reinitialization; consumed by one run.
    pub initialize: bool,
    /// MAC-layer operational state.
    pub port_enabled: bool,
    /// Key exchange state permits authorization (constant true without
    /// the key machines).
    pub port_valid: bool,
    /// Reauthentication requested.
    pub re_authenticate: bool,
    /// EAPOL-Start received.
    pub eapol_start: bool,
    /// EAPOL-Logoff received.
    pub eapol_logoff: bool,
    /// An EAP packet is waiting in the EAP machine's `resp_data`.
    pub eapol_eap: bool,
    /// Backend: start a conversation.
    pub auth_start: bool,
    /// Backend: abort the conversation.
    pub auth_abort: bool,
    /// Backend: conversation succeeded.
    pub auth_success: bool,
    /// Backend: conversation failed.
    pub auth_fail: bool,
    /// Backend: the AAA server went silent.
    pub auth_timeout: bool,
    /// Key machines would run now (unused without them).
    pub key_run: bool,
    /// Key machines finished (unused without them).
    pub key_done: bool,

    /// Authenticator PAE state.
    pub pae_state: AuthPaeState,
    /// Backend authentication state.
    pub backend_state: BackendState,
    /// Reauthentication timer state.
    pub reauth_state: ReauthTimerState,

    /// Controlled-port status.
    pub auth_port_status: PortStatus,
    /// The control mode the machines are currently operating under.
    pub port_mode: PortControl,
    /// Connection attempts since the last success.
    pub re_auth_count: u32,

    /// Managed parameters.
    pub params: AuthPortParams,

    /// The RFC 4137 full authenticator for this port.
    pub eap: EapAuthSm,

    /// Identifier of the last EAP packet delivered to the supplicant;
    /// canned Success/Failure packets advance from here.
    pub last_delivered_id: Option<u8>,

    // AAA working set.
    /// RADIUS identifier of the outstanding Access-Request.
    pub aaa_req_id: u8,
    /// The outstanding Access-Request, byte-exact for retransmission.
    pub aaa_req_data: Vec<u8>,
    /// Request Authenticator of the outstanding Access-Request.
    pub req_authenticator: [u8; 16],
    /// Retransmissions of the outstanding Access-Request so far.
    pub aaa_retrans_count: u32,
    /// True while an Access-Request awaits its reply.
    pub aaa_outstanding: bool,
    /// State attribute echoed from the last Access-Challenge.
    pub server_state: Vec<u8>,
    /// MAC address of the attached supplicant.
    pub supplicant_mac: MacAddress,

    /// EAPOL frame counters.
    pub counters: EapolCounters,
    /// Session statistics.
    pub session: SessionStats,
}

impl AuthPort {
    fn new(index: u16, params: AuthPortParams) -> Self {
        let max_retrans = params.max_retrans;
        Self {
            index,
            link_up: false,
            prev_link_up: false,
            a_while: 0,
            quiet_while: 0,
            re_auth_when: 0,
            aaa_retrans_timer: 0,
            initialize: true,
            port_enabled: false,
            port_valid: true,
            re_authenticate: false,
            eapol_start: false,
            eapol_logoff: false,
            eapol_eap: false,
            auth_start: false,
            auth_abort: false,
            auth_success: false,
            auth_fail: false,
            auth_timeout: false,
            key_run: false,
            key_done: false,
            pae_state: AuthPaeState::Initialize,
            backend_state: BackendState::Initialize,
            reauth_state: ReauthTimerState::Initialize,
            auth_port_status: PortStatus::Unauthorized,
            port_mode: PortControl::Auto,
            re_auth_count: 0,
            params,
            eap: EapAuthSm::new(max_retrans),
            last_delivered_id: None,
            aaa_req_id: 0,
            aaa_req_data: Vec::new(),
            req_authenticator: [0; 16],
            aaa_retrans_count: 0,
            aaa_outstanding: false,
            server_state: Vec::new(),
            supplicant_mac: MacAddress::zero(),
            counters: EapolCounters::default(),
            session: SessionStats::default(),
        }
    }

    fn decrement_timers(&mut self) {
        self.a_while = self.a_while.saturating_sub(1);
        self.quiet_while = self.quiet_while.saturating_sub(1);
        self.re_auth_when = self.re_auth_when.saturating_sub(1);
        self.aaa_retrans_timer = self.aaa_retrans_timer.saturating_sub(1);
        self.eap.tick();
    }
}

/// Transmit-side helpers shared by the PAE and backend entry actions.
pub(crate) struct PortIo<'a> {
    frames: &'a mut Vec<TxEapolFrame>,
    local_mac: MacAddress,
}

impl PortIo<'_> {
    fn push(&mut self, port: &mut AuthPort, eap: &[u8]) {
        if let Ok(packet) = EapPacket::decode(eap) {
            port.last_delivered_id = Some(packet.identifier);
            if packet.code == EapCode::Request {
                if packet.eap_type() == Ok(EapType::Identity) {
                    port.counters.eapol_req_id_frames_tx += 1;
                } else {
                    port.counters.eapol_req_frames_tx += 1;
                }
            }
        }
        let pdu = EapolFrame::encode(EapolPacketType::EapPacket, eap);
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

    /// Transmits the EAP machine's current request (`txReq`).
    pub(crate) fn send_eap_req(&mut self, port: &mut AuthPort) {
        if port.eap.req_data.is_empty() {
            return;
        }
        let data = port.eap.req_data.clone();
        self.push(port, &data);
    }

    /// Emits a canned EAP Success with the next identifier.
    pub(crate) fn send_canned_success(&mut self, port: &mut AuthPort) {
        let packet = build_success(next_id(port.last_delivered_id));
        self.push(port, &packet);
    }

    /// Emits a canned EAP Failure with the next identifier.
    pub(crate) fn send_canned_failure(&mut self, port: &mut AuthPort) {
        let packet = build_failure(next_id(port.last_delivered_id));
        self.push(port, &packet);
    }
}

/// The authenticator context: one per bridge, owning its ports, PRNG,
/// and outbound queues.
pub struct AuthenticatorContext {
    config: AuthenticatorConfig,
    ports: Vec<AuthPort>,
    rng: StdRng,
    radius_id_counter: u8,
    observer: Option<Arc<dyn PortObserver>>,
    /// EAPOL frames awaiting the L2 endpoint.
    pub tx_frames: Vec<TxEapolFrame>,
    /// RADIUS datagrams awaiting the UDP endpoint.
    pub tx_datagrams: Vec<TxRadiusDatagram>,
}

impl AuthenticatorContext {
    /// Creates the context and its ports, all in INITIALIZE.
    pub fn new(config: AuthenticatorConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Creates the context with a caller-supplied PRNG (tests seed it).
    pub fn with_rng(config: AuthenticatorConfig, rng: StdRng) -> Result<Self> {
        if config.num_ports == 0 {
            return Err(Error::invalid_parameter("num_ports", "must be at least 1"));
        }
        if config.shared_secret.is_empty() || config.shared_secret.len() > MAX_SECRET_LEN {
            return Err(Error::invalid_parameter(
                "shared_secret",
                format!("length must be 1..={MAX_SECRET_LEN}"),
            ));
        }
        config.params.validate()?;

        let ports = (1..=config.num_ports)
            .map(|index| AuthPort::new(index, config.params.clone()))
            .collect();
        Ok(Self {
            config,
            ports,
            rng,
            radius_id_counter: 0,
            observer: None,
            tx_frames: Vec::new(),
            tx_datagrams: Vec::new(),
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
    pub fn port(&self, index: u16) -> Result<&AuthPort> {
        self.ports
            .get(usize::from(index.wrapping_sub(1)))
            .ok_or(Error::invalid_port(index, self.config.num_ports))
    }

    fn port_mut(&mut self, index: u16) -> Result<&mut AuthPort> {
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

    /// Handles one received EAPOL frame.
    ///
    /// Malformed frames are counted and dropped without error; only an
    /// out-of-range port index is reported to the caller.
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
        port.supplicant_mac = src;

        match frame.packet_type {
            EapolPacketType::Start => {
                port.counters.eapol_start_frames_rx += 1;
                port.eapol_start = true;
            }
            EapolPacketType::Logoff => {
                port.counters.eapol_logoff_frames_rx += 1;
                port.eapol_logoff = true;
            }
            EapolPacketType::EapPacket => {
                match EapPacket::decode(&frame.body) {
                    Ok(packet) => match packet.code {
                        EapCode::Response => {
                            if packet.eap_type() == Ok(EapType::Identity) {
                                port.counters.eapol_resp_id_frames_rx += 1;
                            } else {
                                port.counters.eapol_resp_frames_rx += 1;
                            }
                            port.eap.resp_data = packet.encode();
                            port.eapol_eap = true;
                        }
                        EapCode::Request => {
                            // Nonsensical from a supplicant; let the EAP
                            // machine discard it by code.
                            port.eap.resp_data = packet.encode();
                            port.eapol_eap = true;
                        }
                        EapCode::Success | EapCode::Failure => {
                            debug!(port = index, code = %packet.code, "discarding EAP packet");
                        }
                    },
                    Err(e) => {
                        // RFC 3748 §4.1: silently discard.
                        debug!(port = index, error = %e, "discarding EAP packet");
                    }
                }
            }
            EapolPacketType::Key | EapolPacketType::AsfAlert => {
                debug!(port = index, kind = %frame.packet_type, "ignoring EAPOL frame");
            }
        }

        self.run();
        Ok(())
    }

    /// Handles one received RADIUS datagram. Anything that fails the
    /// RFC 2865/3579 checks is dropped silently.
    pub fn process_radius(&mut self, src: SocketAddr, data: &[u8]) {
        if src != self.config.server {
            debug!(%src, "dropping RADIUS datagram from unknown server");
            return;
        }
        let header = match ReplyHeader::peek(data) {
            Ok(header) => header,
            Err(e) => {
                debug!(error = %e, "dropping RADIUS datagram");
                return;
            }
        };

        let Some(slot) = self.ports.iter().position(|p| {
            p.aaa_outstanding
                && p.eap.is_aaa_idle()
                && !p.eap.aaa_eap_resp
                && p.aaa_req_id == header.identifier
        }) else {
            debug!(id = header.identifier, "RADIUS identifier matches no port");
            return;
        };

        let secret = self.config.shared_secret.clone();
        let port = &mut self.ports[slot];
        let reply = match verify_reply(data, &port.req_authenticator, secret.as_bytes()) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(port = port.index, error = %e, "dropping unverifiable RADIUS reply");
                return;
            }
        };

        port.server_state = reply.server_state.unwrap_or_default();
        port.aaa_outstanding = false;
        port.aaa_retrans_timer = 0;

        // Route by the EAP code the reply carries.
        match EapCode::from_u8(reply.eap_message[0]) {
            Some(EapCode::Request) => {
                port.eap.aaa_eap_req_data = reply.eap_message;
                port.eap.aaa_eap_req = true;
            }
            Some(EapCode::Success) => {
                port.eap.aaa_eap_req_data = reply.eap_message;
                port.eap.aaa_success = true;
            }
            Some(EapCode::Failure) => {
                port.eap.aaa_eap_req_data = reply.eap_message;
                port.eap.aaa_fail = true;
            }
            _ => {
                port.eap.aaa_eap_no_req = true;
            }
        }

        self.run();
    }

    /// The 1 Hz tick: link edges, session time, timers, then the
    /// composite run.
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

    /// Runs every state machine of every port to quiescence, then
    /// services the AAA glue; repeats until the glue is idle too.
    pub fn run(&mut self) {
        loop {
            self.run_fsms();
            if !self.service_aaa() {
                break;
            }
        }
    }

    fn run_fsms(&mut self) {
        let mut iterations = 0u32;
        loop {
            let mut busy = false;
            let frames = &mut self.tx_frames;
            for port in &mut self.ports {
                let mut io = PortIo {
                    frames: &mut *frames,
                    local_mac: self.config.local_mac,
                };
                let before = Snapshot::of(port);

                busy |= pae::step(port, &mut io);
                busy |= backend::step(port, &mut io);
                busy |= reauth::step(port);
                busy |= port.eap.step(port.port_enabled);

                // One composite run consumes the initialize request.
                if port.initialize {
                    port.initialize = false;
                    busy = true;
                }

                if let Some(observer) = &self.observer {
                    before.notify_changes(port, observer.as_ref());
                }
            }
            if !busy {
                break;
            }
            iterations += 1;
            if iterations > MAX_FSM_ITERATIONS {
                // Fail closed: unauthorized and back to INITIALIZE.
                error!("state machines did not stabilize, reinitializing context");
                for port in &mut self.ports {
                    port.pae_state = AuthPaeState::Initialize;
                    port.backend_state = BackendState::Initialize;
                    port.reauth_state = ReauthTimerState::Initialize;
                    port.auth_port_status = PortStatus::Unauthorized;
                    port.initialize = true;
                }
                break;
            }
        }
    }

    /// The pass-through glue (spec C9): ships Access-Requests for ports
    /// whose EAP machine parked in AAA_IDLE with a response pending, and
    /// drives the retransmit/timeout discipline. Returns true when it
    /// changed FSM inputs and the machines must run again.
    fn service_aaa(&mut self) -> bool {
        let mut rerun = false;
        for slot in 0..self.ports.len() {
            if !self.ports[slot].eap.is_aaa_idle() {
                continue;
            }
            if self.ports[slot].eap.aaa_eap_resp {
                self.send_access_request(slot);
            } else if self.ports[slot].aaa_outstanding
                && self.ports[slot].aaa_retrans_timer == 0
            {
                let port = &mut self.ports[slot];
                if port.aaa_retrans_count < MAX_RADIUS_RETRANS {
                    port.aaa_retrans_count += 1;
                    port.aaa_retrans_timer = RADIUS_TIMEOUT;
                    debug!(
                        port = port.index,
                        attempt = port.aaa_retrans_count,
                        "retransmitting Access-Request"
                    );
                    self.tx_datagrams.push(TxRadiusDatagram {
                        dest: self.config.server,
                        data: port.aaa_req_data.clone(),
                    });
                } else {
                    port.aaa_outstanding = false;
                    port.eap.aaa_timeout = true;
                    warn!(port = port.index, "RADIUS server unreachable");
                    rerun = true;
                }
            }
        }
        rerun
    }

    fn send_access_request(&mut self, slot: usize) {
        let identifier = self.alloc_radius_id();
        let authenticator: [u8; 16] = self.rng.gen();
        let port = &mut self.ports[slot];

        let nas_port_id = format!("{}_{}", self.config.interface, port.index);
        let called_station_id = self.config.local_mac.to_station_id();
        let calling_station_id = port.supplicant_mac.to_station_id();
        let request = AccessRequest {
            identifier,
            authenticator,
            user_name: &port.eap.aaa_identity,
            framed_mtu: self.config.framed_mtu,
            nas_address: self.config.nas_address,
            nas_port: u32::from(port.index),
            nas_port_id: &nas_port_id,
            called_station_id: &called_station_id,
            calling_station_id: &calling_station_id,
            server_state: &port.server_state,
            eap_message: &port.eap.aaa_eap_resp_data,
        };
        match request.encode(self.config.shared_secret.as_bytes()) {
            Ok(data) => {
                port.aaa_req_id = identifier;
                port.req_authenticator = authenticator;
                port.aaa_req_data = data.clone();
                port.aaa_outstanding = true;
                port.aaa_retrans_count = 0;
                port.aaa_retrans_timer = RADIUS_TIMEOUT;
                port.eap.aaa_eap_resp = false;
                port.eap.aaa_timeout = false;
                debug!(port = port.index, id = identifier, "sending Access-Request");
                self.tx_datagrams.push(TxRadiusDatagram {
                    dest: self.config.server,
                    data,
                });
            }
            Err(e) => {
                error!(port = port.index, error = %e, "Access-Request build failed");
                port.eap.aaa_eap_resp = false;
                port.eap.aaa_timeout = true;
            }
        }
    }

    /// Picks a RADIUS identifier colliding with no in-flight request.
    fn alloc_radius_id(&mut self) -> u8 {
        loop {
            let candidate = self.radius_id_counter;
            self.radius_id_counter = self.radius_id_counter.wrapping_add(1);
            if !self
                .ports
                .iter()
                .any(|p| p.aaa_outstanding && p.aaa_req_id == candidate)
            {
                return candidate;
            }
        }
    }

    // --- management surface -------------------------------------------

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

    /// Requests immediate reauthentication of a port.
    pub fn set_reauthenticate(&mut self, index: u16, apply: Apply) -> Result<()> {
        self.port(index)?;
        if apply == Apply::Commit {
            self.port_mut(index)?.re_authenticate = true;
            self.run();
        }
        Ok(())
    }

    /// Sets the administrative port control.
    pub fn set_port_control(&mut self, index: u16, value: PortControl, apply: Apply) -> Result<()> {
        self.port(index)?;
        if apply == Apply::Commit {
            self.port_mut(index)?.params.port_control = value;
            self.run();
        }
        Ok(())
    }

    /// Sets `quietPeriod` (any u16 is in range).
    pub fn set_quiet_period(&mut self, index: u16, value: u16, apply: Apply) -> Result<()> {
        self.port(index)?;
        if apply == Apply::Commit {
            self.port_mut(index)?.params.quiet_period = value;
            self.run();
        }
        Ok(())
    }

    /// Sets `serverTimeout` after range validation.
    pub fn set_server_timeout(&mut self, index: u16, value: u32, apply: Apply) -> Result<()> {
        self.port(index)?;
        AuthPortParams::check_server_timeout(value)?;
        if apply == Apply::Commit {
            self.port_mut(index)?.params.server_timeout = value;
            self.run();
        }
        Ok(())
    }

    /// Sets `reAuthPeriod` after range validation.
    pub fn set_re_auth_period(&mut self, index: u16, value: u32, apply: Apply) -> Result<()> {
        self.port(index)?;
        AuthPortParams::check_re_auth_period(value)?;
        if apply == Apply::Commit {
            self.port_mut(index)?.params.re_auth_period = value;
            self.run();
        }
        Ok(())
    }

    /// Enables or disables periodic reauthentication.
    pub fn set_re_auth_enabled(&mut self, index: u16, value: bool, apply: Apply) -> Result<()> {
        self.port(index)?;
        if apply == Apply::Commit {
            self.port_mut(index)?.params.re_auth_enabled = value;
            self.run();
        }
        Ok(())
    }

    /// Enables or disables key transmission.
    pub fn set_key_tx_enabled(&mut self, index: u16, value: bool, apply: Apply) -> Result<()> {
        self.port(index)?;
        if apply == Apply::Commit {
            self.port_mut(index)?.params.key_tx_enabled = value;
            self.run();
        }
        Ok(())
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

    /// Drains the queued RADIUS datagrams.
    pub fn drain_datagrams(&mut self) -> Vec<TxRadiusDatagram> {
        std::mem::take(&mut self.tx_datagrams)
    }
}

/// Per-port state snapshot for observer notifications.
struct Snapshot {
    pae: AuthPaeState,
    backend: BackendState,
    reauth: ReauthTimerState,
    eap: EapAuthState,
    status: PortStatus,
}

impl Snapshot {
    fn of(port: &AuthPort) -> Self {
        Self {
            pae: port.pae_state,
            backend: port.backend_state,
            reauth: port.reauth_state,
            eap: port.eap.state(),
            status: port.auth_port_status,
        }
    }

    fn notify_changes(&self, port: &AuthPort, observer: &dyn PortObserver) {
        if self.pae != port.pae_state {
            observer.on_pae_state(port.index, port.pae_state);
        }
        if self.backend != port.backend_state {
            observer.on_backend_state(port.index, port.backend_state);
        }
        if self.reauth != port.reauth_state {
            observer.on_reauth_state(port.index, port.reauth_state);
        }
        if self.eap != port.eap.state() {
            observer.on_eap_auth_state(port.index, port.eap.state());
        }
        if self.status != port.auth_port_status {
            observer.on_port_status(port.index, port.auth_port_status);
        }
    }
}
