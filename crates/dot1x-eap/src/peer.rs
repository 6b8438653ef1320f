//! RFC 4137 §4 EAP peer state machine.

use tracing::{debug, trace};

use dot1x_eapol::{build_nak, build_response, EapCode, EapPacket, EapType};

use crate::methods::{MethodState, PeerConfig, PeerDecision, PeerMethod};

/// Peer machine states (RFC 4137 Figure 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EapPeerState {
    /// Port is down.
    Disabled,
    /// Fresh conversation state.
    Initialize,
    /// Waiting for a request.
    Idle,
    /// Classifying a received packet.
    Received,
    /// Selecting a method for an unknown request type.
    GetMethod,
    /// Running the selected method.
    Method,
    /// Answering an Identity request.
    Identity,
    /// Answering a Notification request.
    Notification,
    /// Replaying the previous response to a duplicate identifier.
    Retransmit,
    /// Dropping the packet.
    Discard,
    /// Handing the response to the lower layer.
    SendResponse,
    /// Authentication succeeded.
    Success,
    /// Authentication failed.
    Failure,
}

/// Classification of the packet sitting in `req_data`.
#[derive(Debug, Clone, Copy, Default)]
struct ParsedReq {
    rx_req: bool,
    rx_success: bool,
    rx_failure: bool,
    req_id: u8,
    req_method: Option<EapType>,
}

/// The peer state machine. The `pub` booleans are the rendez-vous
/// variables shared with the supplicant PAE/backend; every reader of a
/// flag is also a writer, per the 802.1X convention.
pub struct EapPeerSm {
    state: EapPeerState,

    /// Lower layer: a request is available in `req_data`.
    pub eap_req: bool,
    /// Peer: a response is available in `resp_data`.
    pub eap_resp: bool,
    /// Peer: the request was dropped, nothing to send.
    pub eap_no_resp: bool,
    /// Peer: authentication finished successfully.
    pub eap_success: bool,
    /// Peer: authentication failed.
    pub eap_fail: bool,
    /// Lower layer: alternate success indication (e.g. key receipt).
    pub alt_accept: bool,
    /// Lower layer: alternate failure indication.
    pub alt_reject: bool,
    /// Lower layer: restart the conversation.
    pub eap_restart: bool,
    /// Seconds of idling before the decision alone resolves the outcome.
    pub idle_while: u32,
    /// Inbound EAP packet.
    pub req_data: Vec<u8>,
    /// Outbound EAP packet.
    pub resp_data: Vec<u8>,
    /// Exported key material is ready.
    pub key_available: bool,

    key_data: Option<Vec<u8>>,
    last_resp_data: Vec<u8>,
    selected_method: Option<EapType>,
    method: Option<Box<dyn PeerMethod>>,
    method_state: MethodState,
    decision: PeerDecision,
    last_id: Option<u8>,
    rx: ParsedReq,
    rx_packet: Option<EapPacket>,
    ignore: bool,
    allow_notifications: bool,
    config: PeerConfig,
}

impl EapPeerSm {
    /// Creates the machine in DISABLED, waiting for the port.
    #[must_use]
    pub fn new(config: PeerConfig) -> Self {
        Self {
            state: EapPeerState::Disabled,
            eap_req: false,
            eap_resp: false,
            eap_no_resp: false,
            eap_success: false,
            eap_fail: false,
            alt_accept: false,
            alt_reject: false,
            eap_restart: false,
            idle_while: 0,
            req_data: Vec::new(),
            resp_data: Vec::new(),
            key_available: false,
            key_data: None,
            last_resp_data: Vec::new(),
            selected_method: None,
            method: None,
            method_state: MethodState::Init,
            decision: PeerDecision::Fail,
            last_id: None,
            rx: ParsedReq::default(),
            rx_packet: None,
            ignore: false,
            allow_notifications: true,
            config,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> EapPeerState {
        self.state
    }

    /// One transition evaluation. Returns true if the state changed.
    pub fn step(&mut self, port_enabled: bool) -> bool {
        if let Some(next) = self.next_state(port_enabled) {
            self.enter(next);
            true
        } else {
            false
        }
    }

    /// One-second timer update.
    pub fn tick(&mut self) {
        self.idle_while = self.idle_while.saturating_sub(1);
    }

    #[allow(clippy::too_many_lines)]
    fn next_state(&self, port_enabled: bool) -> Option<EapPeerState> {
        use EapPeerState as S;

        if !port_enabled {
            return (self.state != S::Disabled).then_some(S::Disabled);
        }
        if self.eap_restart {
            return Some(S::Initialize);
        }

        match self.state {
            S::Disabled => Some(S::Initialize),
            S::Initialize | S::Discard | S::SendResponse => Some(S::Idle),
            S::Idle => {
                if self.eap_req {
                    Some(S::Received)
                } else if (self.alt_accept && self.decision != PeerDecision::Fail)
                    || (self.idle_while == 0 && self.decision == PeerDecision::UncondSucc)
                {
                    Some(S::Success)
                } else if self.alt_reject
                    || (self.alt_accept
                        && self.method_state != MethodState::Cont
                        && self.decision == PeerDecision::Fail)
                {
                    Some(S::Failure)
                } else {
                    // An expired idleWhile with a non-committal decision
                    // keeps waiting; the backend authWhile timer owns
                    // giving up on a silent authenticator.
                    None
                }
            }
            S::Received => Some(self.classify()),
            S::GetMethod => {
                if self.selected_method == self.rx.req_method {
                    Some(S::Method)
                } else {
                    Some(S::SendResponse)
                }
            }
            S::Method => {
                if self.ignore {
                    Some(S::Discard)
                } else if self.method_state == MethodState::Done
                    && self.decision == PeerDecision::Fail
                {
                    Some(S::Failure)
                } else {
                    Some(S::SendResponse)
                }
            }
            S::Identity | S::Notification | S::Retransmit => Some(S::SendResponse),
            S::Success | S::Failure => None,
        }
    }

    /// The RECEIVED branch table (RFC 4137 §4.5, plus the canned
    /// Success/Failure acceptance gate).
    fn classify(&self) -> EapPeerState {
        use EapPeerState as S;
        let rx = self.rx;
        let fresh_id = self.last_id != Some(rx.req_id);
        let duplicate_id = self.last_id == Some(rx.req_id);

        if rx.rx_req && fresh_id && rx.req_method == self.selected_method
            && self.selected_method.is_some()
            && self.method_state != MethodState::Done
        {
            S::Method
        } else if rx.rx_req
            && fresh_id
            && self.selected_method.is_none()
            && rx.req_method == Some(EapType::Identity)
        {
            S::Identity
        } else if rx.rx_req
            && fresh_id
            && self.selected_method.is_none()
            && rx.req_method == Some(EapType::Notification)
            && self.allow_notifications
        {
            S::Notification
        } else if rx.rx_req && duplicate_id {
            S::Retransmit
        } else if rx.rx_success && duplicate_id && self.decision != PeerDecision::Fail {
            S::Success
        } else if rx.rx_success
            && self.last_id.is_none()
            && self.config.allow_canned
            && self.decision != PeerDecision::Fail
        {
            S::Success
        } else if self.method_state != MethodState::Cont
            && duplicate_id
            && ((rx.rx_failure && self.decision != PeerDecision::UncondSucc)
                || (rx.rx_success && self.decision == PeerDecision::Fail))
        {
            S::Failure
        } else if rx.rx_failure
            && self.last_id.is_none()
            && self.config.allow_canned
            && self.method_state != MethodState::Cont
        {
            S::Failure
        } else if rx.rx_req && fresh_id && self.selected_method.is_none() {
            S::GetMethod
        } else {
            S::Discard
        }
    }

    fn enter(&mut self, next: EapPeerState) {
        use EapPeerState as S;
        trace!(from = %self.state, to = %next, "eap peer transition");
        self.state = next;
        match next {
            S::Disabled | S::Idle => {}
            S::Initialize => {
                self.selected_method = None;
                self.method = None;
                self.method_state = MethodState::Init;
                self.decision = PeerDecision::Fail;
                self.last_id = None;
                self.eap_success = false;
                self.eap_fail = false;
                self.eap_resp = false;
                self.eap_no_resp = false;
                self.key_data = None;
                self.key_available = false;
                self.alt_accept = false;
                self.alt_reject = false;
                self.allow_notifications = true;
                self.idle_while = self.config.client_timeout;
                self.eap_restart = false;
            }
            S::Received => {
                let (rx, packet) = Self::parse_req(&self.req_data);
                self.rx = rx;
                self.rx_packet = packet;
            }
            S::GetMethod => {
                let req_method = self.rx.req_method.unwrap_or(EapType::Other(0));
                if self.config.allows(req_method) {
                    self.method = self.config.create_method(req_method);
                    self.selected_method = Some(req_method);
                    self.method_state = MethodState::Init;
                    debug!(method = %req_method, "eap peer: method selected");
                } else {
                    debug!(method = %req_method, "eap peer: method refused, sending NAK");
                    self.resp_data = build_nak(self.rx.req_id, &self.config.preferred_methods());
                }
            }
            S::Method => {
                let (ignore, outcome) = match (self.method.as_mut(), self.rx_packet.as_ref()) {
                    (Some(method), Some(packet)) => {
                        if method.check(packet) {
                            let outcome = method.process(packet);
                            self.resp_data = method.build_resp(packet.identifier);
                            if let Some(key) = method.key() {
                                self.key_data = Some(key);
                            }
                            (false, Some(outcome))
                        } else {
                            (true, None)
                        }
                    }
                    _ => (true, None),
                };
                self.ignore = ignore;
                if let Some((method_state, decision)) = outcome {
                    self.method_state = method_state;
                    self.decision = decision;
                }
            }
            S::Identity => {
                if let Some(packet) = &self.rx_packet {
                    debug!(
                        prompt = %String::from_utf8_lossy(packet.type_data()),
                        "eap peer: identity requested"
                    );
                }
                self.resp_data = build_response(
                    self.rx.req_id,
                    EapType::Identity,
                    self.config.identity.as_bytes(),
                );
            }
            S::Notification => {
                if let Some(packet) = &self.rx_packet {
                    debug!(
                        notification = %String::from_utf8_lossy(packet.type_data()),
                        "eap peer: notification"
                    );
                }
                self.resp_data = build_response(self.rx.req_id, EapType::Notification, &[]);
            }
            S::Retransmit => {
                self.resp_data = self.last_resp_data.clone();
            }
            S::Discard => {
                self.eap_req = false;
                self.eap_no_resp = true;
            }
            S::SendResponse => {
                self.last_id = Some(self.rx.req_id);
                self.last_resp_data = self.resp_data.clone();
                self.eap_req = false;
                self.eap_resp = true;
                self.idle_while = self.config.client_timeout;
            }
            S::Success => {
                if self.key_data.is_some() {
                    self.key_available = true;
                }
                self.eap_success = true;
                debug!("eap peer: success");
            }
            S::Failure => {
                self.eap_fail = true;
                debug!("eap peer: failure");
            }
        }
    }

    fn parse_req(data: &[u8]) -> (ParsedReq, Option<EapPacket>) {
        let Ok(packet) = EapPacket::decode(data) else {
            return (ParsedReq::default(), None);
        };
        let mut rx = ParsedReq {
            req_id: packet.identifier,
            ..ParsedReq::default()
        };
        match packet.code {
            EapCode::Request => match packet.eap_type() {
                Ok(method) => {
                    rx.rx_req = true;
                    rx.req_method = Some(method);
                }
                Err(_) => return (ParsedReq::default(), None),
            },
            EapCode::Success => rx.rx_success = true,
            EapCode::Failure => rx.rx_failure = true,
            // A peer never acts on a Response.
            EapCode::Response => return (ParsedReq::default(), None),
        }
        (rx, Some(packet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dot1x_eapol::{build_failure, build_request, build_success};
    use md5::{Digest, Md5};

    fn run(sm: &mut EapPeerSm) {
        for _ in 0..64 {
            if !sm.step(true) {
                return;
            }
        }
        panic!("peer FSM did not reach quiescence");
    }

    fn peer(config: PeerConfig) -> EapPeerSm {
        let mut sm = EapPeerSm::new(config);
        sm.eap_restart = true;
        run(&mut sm);
        assert_eq!(sm.state(), EapPeerState::Idle);
        sm
    }

    fn deliver(sm: &mut EapPeerSm, packet: Vec<u8>) {
        sm.req_data = packet;
        sm.eap_req = true;
        run(sm);
    }

    fn md5_config() -> PeerConfig {
        PeerConfig {
            identity: "alice".into(),
            password: Some("secret".into()),
            allowed_methods: vec![EapType::Md5Challenge],
            ..PeerConfig::default()
        }
    }

    #[test]
    fn identity_request_yields_identity_response() {
        let mut sm = peer(md5_config());
        deliver(&mut sm, build_request(0, EapType::Identity, b"User name:"));

        assert!(sm.eap_resp);
        let resp = EapPacket::decode(&sm.resp_data).unwrap();
        assert_eq!(resp.code, EapCode::Response);
        assert_eq!(resp.identifier, 0);
        assert_eq!(resp.eap_type().unwrap(), EapType::Identity);
        assert_eq!(resp.type_data(), b"alice");
        assert_eq!(sm.state(), EapPeerState::Idle);
    }

    #[test]
    fn duplicate_identifier_replays_response() {
        let mut sm = peer(md5_config());
        deliver(&mut sm, build_request(0, EapType::Identity, b""));
        let first = sm.resp_data.clone();
        sm.eap_resp = false;

        deliver(&mut sm, build_request(0, EapType::Identity, b""));
        assert!(sm.eap_resp);
        assert_eq!(sm.resp_data, first);
    }

    #[test]
    fn md5_challenge_then_success() {
        let mut sm = peer(md5_config());
        deliver(&mut sm, build_request(0, EapType::Identity, b""));
        sm.eap_resp = false;

        let challenge = [0x0F; 8];
        let mut type_data = vec![challenge.len() as u8];
        type_data.extend_from_slice(&challenge);
        deliver(&mut sm, build_request(1, EapType::Md5Challenge, &type_data));

        assert!(sm.eap_resp);
        let resp = EapPacket::decode(&sm.resp_data).unwrap();
        assert_eq!(resp.eap_type().unwrap(), EapType::Md5Challenge);
        let mut md5 = Md5::new();
        md5.update([1u8]);
        md5.update(b"secret");
        md5.update(challenge);
        let expected: [u8; 16] = md5.finalize().into();
        assert_eq!(&resp.type_data()[1..17], &expected);
        sm.eap_resp = false;

        deliver(&mut sm, build_success(1));
        assert_eq!(sm.state(), EapPeerState::Success);
        assert!(sm.eap_success);
    }

    #[test]
    fn unacceptable_method_gets_nak() {
        let config = PeerConfig {
            identity: "alice".into(),
            password: Some("secret".into()),
            allowed_methods: vec![EapType::Md5Challenge],
            ..PeerConfig::default()
        };
        let mut sm = peer(config);
        deliver(&mut sm, build_request(0, EapType::Identity, b""));
        sm.eap_resp = false;

        // TLS is not in the allowed list.
        deliver(&mut sm, build_request(1, EapType::Tls, &[0x20]));
        assert!(sm.eap_resp);
        let resp = EapPacket::decode(&sm.resp_data).unwrap();
        assert_eq!(resp.eap_type().unwrap(), EapType::Nak);
        assert_eq!(resp.type_data(), &[EapType::Md5Challenge.as_u8()]);
    }

    #[test]
    fn nak_with_no_usable_method_is_zero() {
        let config = PeerConfig {
            identity: "alice".into(),
            password: None,
            allowed_methods: vec![EapType::Md5Challenge],
            ..PeerConfig::default()
        };
        let mut sm = peer(config);
        deliver(&mut sm, build_request(0, EapType::Md5Challenge, &[4, 1, 2, 3, 4]));
        assert!(sm.eap_resp);
        let resp = EapPacket::decode(&sm.resp_data).unwrap();
        assert_eq!(resp.eap_type().unwrap(), EapType::Nak);
        assert_eq!(resp.type_data(), &[0]);
    }

    #[test]
    fn canned_success_discarded_by_default() {
        let mut sm = peer(md5_config());
        deliver(&mut sm, build_success(0));
        assert_eq!(sm.state(), EapPeerState::Idle);
        assert!(!sm.eap_success);
        assert!(sm.eap_no_resp);
    }

    #[test]
    fn canned_failure_accepted_when_allowed() {
        let config = PeerConfig {
            allow_canned: true,
            ..md5_config()
        };
        let mut sm = peer(config);
        deliver(&mut sm, build_failure(0));
        assert_eq!(sm.state(), EapPeerState::Failure);
        assert!(sm.eap_fail);
    }

    #[test]
    fn response_code_is_discarded() {
        let mut sm = peer(md5_config());
        deliver(&mut sm, dot1x_eapol::build_response(0, EapType::Identity, b"x"));
        assert_eq!(sm.state(), EapPeerState::Idle);
        assert!(sm.eap_no_resp);
        assert!(!sm.eap_resp);
    }

    #[test]
    fn port_down_disables() {
        let mut sm = peer(md5_config());
        assert!(sm.step(false));
        assert_eq!(sm.state(), EapPeerState::Disabled);
    }
}
