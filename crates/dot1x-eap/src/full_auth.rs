//! RFC 4137 §5–7 EAP full authenticator state machine.
//!
//! The local half runs the initial Identity exchange; the minimal policy
//! then hands the conversation to the pass-through half, which shuttles
//! packets between the supplicant and the AAA interface (`aaa*`
//! variables, serviced by the RADIUS glue).

use tracing::{debug, trace};

use dot1x_eapol::{
    build_failure, build_request, build_success, next_id, EapCode, EapPacket, EapType,
};
use dot1x_types::consts::{MAX_IDENTITY_LEN, METHOD_TIMEOUT_DEFAULT};

/// Full-authenticator states, local half and pass-through half
/// (RFC 4137 Figures 4 and 5; the `2` suffix marks the pass-through
/// twins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum EapAuthState {
    Disabled,
    Initialize,
    SelectAction,
    ProposeMethod,
    MethodRequest,
    SendRequest,
    Idle,
    Retransmit,
    Received,
    Nak,
    IntegrityCheck,
    MethodResponse,
    Discard,
    TimeoutFailure,
    Failure,
    Success,
    InitializePassthrough,
    AaaRequest,
    AaaIdle,
    AaaResponse,
    SendRequest2,
    Idle2,
    Retransmit2,
    Received2,
    Discard2,
    TimeoutFailure2,
    Failure2,
    Success2,
}

/// Authenticator-side method state (RFC 4137 §5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMethodState {
    Proposed,
    Continue,
    End,
}

/// Policy decision (RFC 4137 §5.2, plus PASSTHROUGH from §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthDecision {
    Continue,
    Passthrough,
}

/// Classification of the packet sitting in `resp_data`.
#[derive(Debug, Clone, Copy, Default)]
struct ParsedResp {
    rx_resp: bool,
    resp_id: u8,
    resp_method: Option<EapType>,
}

/// The full-authenticator state machine for one port.
pub struct EapAuthSm {
    state: EapAuthState,

    /// Authenticator: a request is available in `req_data`.
    pub eap_req: bool,
    /// Authenticator: the response was consumed without a new request.
    pub eap_no_req: bool,
    /// Lower layer: a response is available in `resp_data`.
    pub eap_resp: bool,
    /// Authenticator: the conversation ended in success.
    pub eap_success: bool,
    /// Authenticator: the conversation ended in failure.
    pub eap_fail: bool,
    /// Authenticator: retransmissions or the AAA server ran out.
    pub eap_timeout: bool,
    /// Lower layer: restart the conversation.
    pub eap_restart: bool,
    /// EAP-layer retransmit timer, seconds.
    pub retrans_while: u32,
    /// Outbound EAP packet.
    pub req_data: Vec<u8>,
    /// Inbound EAP packet.
    pub resp_data: Vec<u8>,
    /// Identifier of the outstanding request; `None` before the first.
    pub current_id: Option<u8>,
    /// Retransmit budget for one request.
    pub max_retrans: u32,

    // AAA interface, serviced by the RADIUS pass-through glue.
    /// AAA produced a request in `aaa_eap_req_data`.
    pub aaa_eap_req: bool,
    /// AAA consumed the response without producing a request.
    pub aaa_eap_no_req: bool,
    /// A response is ready for the AAA server in `aaa_eap_resp_data`.
    pub aaa_eap_resp: bool,
    /// AAA accepted the conversation.
    pub aaa_success: bool,
    /// AAA rejected the conversation.
    pub aaa_fail: bool,
    /// The AAA server stopped answering.
    pub aaa_timeout: bool,
    /// EAP packet relayed from the AAA server.
    pub aaa_eap_req_data: Vec<u8>,
    /// EAP packet to relay to the AAA server.
    pub aaa_eap_resp_data: Vec<u8>,
    /// Identity from the first EAP-Response/Identity, for User-Name.
    pub aaa_identity: String,
    /// Retransmit timeout for AAA-relayed requests, seconds.
    pub aaa_method_timeout: u32,

    last_req_data: Vec<u8>,
    retrans_count: u32,
    method_timeout: u32,
    current_method: Option<EapType>,
    method_state: AuthMethodState,
    decision: AuthDecision,
    rx: ParsedResp,
    ignore: bool,
    identity_done: bool,
}

impl EapAuthSm {
    /// Creates the machine in DISABLED with the given retransmit budget.
    #[must_use]
    pub fn new(max_retrans: u32) -> Self {
        Self {
            state: EapAuthState::Disabled,
            eap_req: false,
            eap_no_req: false,
            eap_resp: false,
            eap_success: false,
            eap_fail: false,
            eap_timeout: false,
            eap_restart: false,
            retrans_while: 0,
            req_data: Vec::new(),
            resp_data: Vec::new(),
            current_id: None,
            max_retrans,
            aaa_eap_req: false,
            aaa_eap_no_req: false,
            aaa_eap_resp: false,
            aaa_success: false,
            aaa_fail: false,
            aaa_timeout: false,
            aaa_eap_req_data: Vec::new(),
            aaa_eap_resp_data: Vec::new(),
            aaa_identity: String::new(),
            aaa_method_timeout: METHOD_TIMEOUT_DEFAULT,
            last_req_data: Vec::new(),
            retrans_count: 0,
            method_timeout: METHOD_TIMEOUT_DEFAULT,
            current_method: None,
            method_state: AuthMethodState::Proposed,
            decision: AuthDecision::Continue,
            rx: ParsedResp::default(),
            ignore: false,
            identity_done: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> EapAuthState {
        self.state
    }

    /// Whether the pass-through half is parked waiting on AAA; the glue
    /// only services ports in this state.
    #[must_use]
    pub fn is_aaa_idle(&self) -> bool {
        self.state == EapAuthState::AaaIdle
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
        self.retrans_while = self.retrans_while.saturating_sub(1);
    }

    #[allow(clippy::too_many_lines)]
    fn next_state(&self, port_enabled: bool) -> Option<EapAuthState> {
        use EapAuthState as S;

        if !port_enabled {
            return (self.state != S::Disabled).then_some(S::Disabled);
        }
        if self.eap_restart {
            return Some(S::Initialize);
        }

        match self.state {
            S::Disabled => Some(S::Initialize),
            S::Initialize => Some(S::SelectAction),
            S::SelectAction => match self.decision {
                AuthDecision::Passthrough => Some(S::InitializePassthrough),
                AuthDecision::Continue => Some(S::ProposeMethod),
            },
            S::ProposeMethod => Some(S::MethodRequest),
            S::MethodRequest => Some(S::SendRequest),
            S::AaaResponse => Some(S::SendRequest2),
            S::SendRequest => Some(S::Idle),
            S::SendRequest2 => Some(S::Idle2),
            S::Idle => {
                if self.retrans_while == 0 {
                    Some(S::Retransmit)
                } else if self.eap_resp {
                    Some(S::Received)
                } else {
                    None
                }
            }
            S::Idle2 => {
                if self.retrans_while == 0 {
                    Some(S::Retransmit2)
                } else if self.eap_resp {
                    Some(S::Received2)
                } else {
                    None
                }
            }
            S::Retransmit => Some(if self.retrans_count > self.max_retrans {
                S::TimeoutFailure
            } else {
                S::Idle
            }),
            S::Retransmit2 => Some(if self.retrans_count > self.max_retrans {
                S::TimeoutFailure2
            } else {
                S::Idle2
            }),
            S::Received => {
                if self.rx.rx_resp
                    && Some(self.rx.resp_id) == self.current_id
                    && self.rx.resp_method == Some(EapType::Nak)
                    && self.method_state == AuthMethodState::Proposed
                {
                    Some(S::Nak)
                } else if self.rx.rx_resp
                    && Some(self.rx.resp_id) == self.current_id
                    && self.rx.resp_method == self.current_method
                    && self.method_state != AuthMethodState::Proposed
                {
                    Some(S::IntegrityCheck)
                } else {
                    Some(S::Discard)
                }
            }
            S::Received2 => {
                if self.rx.rx_resp && Some(self.rx.resp_id) == self.current_id {
                    Some(S::AaaRequest)
                } else {
                    Some(S::Discard2)
                }
            }
            S::Nak => Some(S::SelectAction),
            S::IntegrityCheck => Some(if self.ignore {
                S::Discard
            } else {
                S::MethodResponse
            }),
            S::MethodResponse => Some(if self.method_state == AuthMethodState::End {
                S::SelectAction
            } else {
                S::MethodRequest
            }),
            S::Discard => Some(S::Idle),
            S::Discard2 => Some(S::Idle2),
            S::InitializePassthrough => Some(if self.current_id.is_some() {
                S::AaaRequest
            } else {
                S::AaaIdle
            }),
            S::AaaRequest => Some(S::AaaIdle),
            S::AaaIdle => {
                if self.aaa_eap_req {
                    Some(S::AaaResponse)
                } else if self.aaa_eap_no_req {
                    Some(S::Discard2)
                } else if self.aaa_timeout {
                    Some(S::TimeoutFailure2)
                } else if self.aaa_fail {
                    Some(S::Failure2)
                } else if self.aaa_success {
                    Some(S::Success2)
                } else {
                    None
                }
            }
            S::TimeoutFailure
            | S::TimeoutFailure2
            | S::Failure
            | S::Failure2
            | S::Success
            | S::Success2 => None,
        }
    }

    #[allow(clippy::too_many_lines)]
    fn enter(&mut self, next: EapAuthState) {
        use EapAuthState as S;
        trace!(from = %self.state, to = %next, "eap auth transition");
        self.state = next;
        match next {
            S::Disabled | S::Nak => {}
            S::Idle | S::Idle2 => {
                self.retrans_while = self.method_timeout;
            }
            S::SelectAction => {
                self.decision = if self.identity_done {
                    AuthDecision::Passthrough
                } else {
                    AuthDecision::Continue
                };
            }
            S::Initialize => {
                self.current_id = None;
                self.eap_success = false;
                self.eap_fail = false;
                self.eap_timeout = false;
                self.eap_resp = false;
                self.eap_no_req = false;
                self.eap_restart = false;
                self.retrans_count = 0;
                self.identity_done = false;
                self.method_state = AuthMethodState::Proposed;
                self.decision = AuthDecision::Continue;
                self.aaa_eap_req = false;
                self.aaa_eap_no_req = false;
                self.aaa_eap_resp = false;
                self.aaa_success = false;
                self.aaa_fail = false;
                self.aaa_timeout = false;
            }
            S::ProposeMethod => {
                // Minimal policy: the only locally run method is Identity.
                self.current_method = Some(EapType::Identity);
                self.method_state = AuthMethodState::Continue;
            }
            S::MethodRequest => {
                let id = next_id(self.current_id);
                self.current_id = Some(id);
                self.req_data = build_request(id, EapType::Identity, b"User name:");
                self.method_timeout = METHOD_TIMEOUT_DEFAULT;
            }
            S::SendRequest | S::SendRequest2 => {
                self.retrans_count = 0;
                self.last_req_data = self.req_data.clone();
                self.eap_resp = false;
                self.eap_req = true;
            }
            S::Retransmit | S::Retransmit2 => {
                self.retrans_count += 1;
                if self.retrans_count <= self.max_retrans {
                    debug!(attempt = self.retrans_count, "eap auth: retransmit");
                    self.req_data = self.last_req_data.clone();
                    self.eap_req = true;
                }
            }
            S::Received | S::Received2 => {
                self.rx = Self::parse_resp(&self.resp_data);
            }
            S::IntegrityCheck => {
                // Identity responses have no integrity to check beyond
                // the type match RECEIVED already did.
                self.ignore = false;
            }
            S::MethodResponse => {
                let packet = EapPacket::decode(&self.resp_data).ok();
                if let Some(packet) = packet {
                    let identity = String::from_utf8_lossy(packet.type_data());
                    debug!(identity = %identity, "eap auth: identity received");
                }
                self.identity_done = true;
                self.method_state = AuthMethodState::End;
            }
            S::Discard | S::Discard2 => {
                self.eap_resp = false;
                self.eap_no_req = true;
            }
            S::InitializePassthrough => {
                self.aaa_eap_resp = false;
            }
            S::AaaRequest => {
                if self.rx.resp_method == Some(EapType::Identity) {
                    if let Ok(packet) = EapPacket::decode(&self.resp_data) {
                        let mut identity =
                            String::from_utf8_lossy(packet.type_data()).into_owned();
                        identity.truncate(MAX_IDENTITY_LEN);
                        self.aaa_identity = identity;
                    }
                }
                self.aaa_eap_resp_data = self.resp_data.clone();
            }
            S::AaaIdle => {
                self.aaa_fail = false;
                self.aaa_success = false;
                self.aaa_eap_req = false;
                self.aaa_eap_no_req = false;
                self.aaa_eap_resp = true;
            }
            S::AaaResponse => {
                self.req_data = self.aaa_eap_req_data.clone();
                // The identifier comes from the AAA-supplied request,
                // never from a local advance.
                if let Ok(packet) = EapPacket::decode(&self.req_data) {
                    self.current_id = Some(packet.identifier);
                }
                self.method_timeout = self.aaa_method_timeout;
            }
            S::TimeoutFailure | S::TimeoutFailure2 => {
                self.eap_timeout = true;
                debug!("eap auth: timeout failure");
            }
            S::Failure => {
                self.req_data = build_failure(self.current_id.unwrap_or(0));
                self.eap_fail = true;
            }
            S::Success => {
                if let Some(id) = self.current_id {
                    self.req_data = build_success(id);
                }
                self.eap_success = true;
            }
            S::Failure2 => {
                self.req_data = self.aaa_eap_req_data.clone();
                self.eap_fail = true;
                debug!("eap auth: server reject");
            }
            S::Success2 => {
                self.req_data = self.aaa_eap_req_data.clone();
                self.eap_success = true;
                debug!("eap auth: server accept");
            }
        }
    }

    fn parse_resp(data: &[u8]) -> ParsedResp {
        let Ok(packet) = EapPacket::decode(data) else {
            return ParsedResp::default();
        };
        if packet.code != EapCode::Response {
            return ParsedResp::default();
        }
        let Ok(method) = packet.eap_type() else {
            return ParsedResp::default();
        };
        ParsedResp {
            rx_resp: true,
            resp_id: packet.identifier,
            resp_method: Some(method),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dot1x_eapol::build_response;

    fn run(sm: &mut EapAuthSm) {
        for _ in 0..64 {
            if !sm.step(true) {
                return;
            }
        }
        panic!("full auth FSM did not reach quiescence");
    }

    fn started() -> EapAuthSm {
        let mut sm = EapAuthSm::new(4);
        sm.eap_restart = true;
        run(&mut sm);
        sm
    }

    fn to_aaa_idle() -> EapAuthSm {
        let mut sm = started();
        sm.eap_req = false;
        sm.resp_data = build_response(0, EapType::Identity, b"alice");
        sm.eap_resp = true;
        run(&mut sm);
        sm
    }

    #[test]
    fn proposes_identity_with_id_zero() {
        let sm = started();
        assert_eq!(sm.state(), EapAuthState::Idle);
        assert!(sm.eap_req);
        let req = EapPacket::decode(&sm.req_data).unwrap();
        assert_eq!(req.code, EapCode::Request);
        assert_eq!(req.identifier, 0);
        assert_eq!(req.eap_type().unwrap(), EapType::Identity);
        assert_eq!(req.type_data(), b"User name:");
        assert_eq!(sm.current_id, Some(0));
    }

    #[test]
    fn identity_response_moves_to_passthrough() {
        let sm = to_aaa_idle();
        assert_eq!(sm.state(), EapAuthState::AaaIdle);
        assert!(sm.aaa_eap_resp);
        assert_eq!(sm.aaa_identity, "alice");
        let relayed = EapPacket::decode(&sm.aaa_eap_resp_data).unwrap();
        assert_eq!(relayed.type_data(), b"alice");
    }

    #[test]
    fn identity_is_truncated_to_limit() {
        let mut sm = started();
        sm.eap_req = false;
        let long = "x".repeat(200);
        sm.resp_data = build_response(0, EapType::Identity, long.as_bytes());
        sm.eap_resp = true;
        run(&mut sm);
        assert_eq!(sm.aaa_identity.len(), MAX_IDENTITY_LEN);
    }

    #[test]
    fn aaa_request_is_relayed_with_server_identifier() {
        let mut sm = to_aaa_idle();
        // The glue consumes aaaEapResp when it ships the Access-Request.
        sm.aaa_eap_resp = false;
        let challenge = build_request(55, EapType::Md5Challenge, &[4, 1, 2, 3, 4]);
        sm.aaa_eap_req_data = challenge.clone();
        sm.aaa_eap_req = true;
        run(&mut sm);

        assert_eq!(sm.state(), EapAuthState::Idle2);
        assert!(sm.eap_req);
        assert_eq!(sm.req_data, challenge);
        assert_eq!(sm.current_id, Some(55));
        assert!(!sm.aaa_eap_resp);
    }

    #[test]
    fn retransmit_replays_identical_request() {
        let mut sm = started();
        sm.eap_req = false;
        let original = sm.req_data.clone();

        for _ in 0..METHOD_TIMEOUT_DEFAULT {
            sm.tick();
        }
        run(&mut sm);
        assert_eq!(sm.state(), EapAuthState::Idle);
        assert!(sm.eap_req);
        assert_eq!(sm.req_data, original);
        assert_eq!(sm.current_id, Some(0));
    }

    #[test]
    fn retransmit_budget_exhausts_to_timeout_failure() {
        let mut sm = started();
        sm.eap_req = false;

        for attempt in 0..=4u32 {
            for _ in 0..METHOD_TIMEOUT_DEFAULT {
                sm.tick();
            }
            run(&mut sm);
            if attempt < 4 {
                assert_eq!(sm.state(), EapAuthState::Idle);
                sm.eap_req = false;
            }
        }
        assert_eq!(sm.state(), EapAuthState::TimeoutFailure);
        assert!(sm.eap_timeout);
    }

    #[test]
    fn aaa_timeout_fails_the_passthrough() {
        let mut sm = to_aaa_idle();
        sm.aaa_timeout = true;
        run(&mut sm);
        assert_eq!(sm.state(), EapAuthState::TimeoutFailure2);
        assert!(sm.eap_timeout);
    }

    #[test]
    fn aaa_fail_relays_the_servers_failure_packet() {
        let mut sm = to_aaa_idle();
        let failure = build_failure(1);
        sm.aaa_eap_req_data = failure.clone();
        sm.aaa_fail = true;
        run(&mut sm);
        assert_eq!(sm.state(), EapAuthState::Failure2);
        assert!(sm.eap_fail);
        assert_eq!(sm.req_data, failure);
    }

    #[test]
    fn aaa_success_relays_the_servers_success_packet() {
        let mut sm = to_aaa_idle();
        let success = build_success(1);
        sm.aaa_eap_req_data = success.clone();
        sm.aaa_success = true;
        run(&mut sm);
        assert_eq!(sm.state(), EapAuthState::Success2);
        assert!(sm.eap_success);
        assert_eq!(sm.req_data, success);
    }

    #[test]
    fn mismatched_identifier_is_discarded() {
        let mut sm = to_aaa_idle();
        let challenge = build_request(55, EapType::Md5Challenge, &[4, 1, 2, 3, 4]);
        sm.aaa_eap_req_data = challenge;
        sm.aaa_eap_req = true;
        run(&mut sm);
        sm.eap_req = false;

        sm.resp_data = build_response(54, EapType::Md5Challenge, &[16; 17]);
        sm.eap_resp = true;
        run(&mut sm);
        assert_eq!(sm.state(), EapAuthState::Idle2);
        assert!(sm.eap_no_req);
        assert!(!sm.eap_req);
    }

    #[test]
    fn restart_resets_identifier_discipline() {
        let mut sm = to_aaa_idle();
        sm.eap_restart = true;
        run(&mut sm);
        // Fresh conversation proposes Identity with id 0 again.
        assert_eq!(sm.state(), EapAuthState::Idle);
        assert_eq!(sm.current_id, Some(0));
    }
}
