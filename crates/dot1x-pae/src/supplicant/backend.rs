//! Supplicant backend state machine (IEEE 802.1X-2004 §8.2.12).

use tracing::trace;

use super::{SuppIo, SuppPort};

/// Supplicant backend states (Figure 8-22).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum SuppBackendState {
    Initialize,
    Idle,
    Request,
    Response,
    Receive,
    Fail,
    Timeout,
    Success,
}

/// One transition evaluation; returns true if a transition fired.
pub(crate) fn step(port: &mut SuppPort, io: &mut SuppIo<'_>) -> bool {
    if let Some(next) = next_state(port) {
        enter(port, io, next);
        true
    } else {
        false
    }
}

fn next_state(port: &SuppPort) -> Option<SuppBackendState> {
    use SuppBackendState as S;

    if port.initialize || port.supp_abort {
        return (port.backend_state != S::Initialize).then_some(S::Initialize);
    }

    match port.backend_state {
        S::Initialize => Some(S::Idle),
        // suppStart gates the way out so indications left over from the
        // previous conversation cannot loop the machine.
        S::Idle => {
            if !port.supp_start {
                None
            } else if port.peer.eap_fail {
                Some(S::Fail)
            } else if port.eapol_eap {
                Some(S::Request)
            } else if port.peer.eap_success {
                Some(S::Success)
            } else {
                None
            }
        }
        S::Request => {
            if port.peer.eap_resp {
                Some(S::Response)
            } else if port.peer.eap_no_resp {
                Some(S::Receive)
            } else if port.peer.eap_fail {
                Some(S::Fail)
            } else if port.peer.eap_success {
                Some(S::Success)
            } else {
                None
            }
        }
        S::Response => Some(S::Receive),
        S::Receive => {
            if port.eapol_eap {
                Some(S::Request)
            } else if port.peer.eap_fail {
                Some(S::Fail)
            } else if port.peer.eap_success {
                Some(S::Success)
            } else if port.auth_while == 0 {
                Some(S::Timeout)
            } else {
                None
            }
        }
        S::Fail | S::Timeout | S::Success => Some(S::Idle),
    }
}

fn enter(port: &mut SuppPort, io: &mut SuppIo<'_>, next: SuppBackendState) {
    use SuppBackendState as S;
    trace!(port = port.index, from = %port.backend_state, to = %next, "supp backend transition");
    port.backend_state = next;
    match next {
        S::Initialize => {
            // abortSupp.
            port.eapol_eap = false;
            port.peer.eap_req = false;
            port.peer.eap_resp = false;
            port.peer.eap_no_resp = false;
            port.supp_abort = false;
        }
        S::Idle => {
            port.supp_start = false;
        }
        S::Request => {
            // Hand the request to the EAP peer; it answers through
            // eapResp/eapNoResp in the same composite run.
            port.eapol_eap = false;
            port.peer.eap_req = true;
        }
        S::Response => {
            io.send_response(port);
            port.peer.eap_resp = false;
        }
        S::Receive => {
            port.auth_while = port.params.auth_period;
            port.peer.eap_no_resp = false;
        }
        S::Fail => {
            port.supp_fail = true;
        }
        S::Timeout => {
            port.supp_timeout = true;
        }
        S::Success => {
            port.key_run = true;
            port.supp_success = true;
        }
    }
}
