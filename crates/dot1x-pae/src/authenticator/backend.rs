//! Backend authentication state machine (IEEE 802.1X-2004 §8.2.9).

use tracing::trace;

use dot1x_types::params::PortControl;

use super::{AuthPort, PortIo};

/// Backend authentication states (Figure 8-19).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum BackendState {
    Initialize,
    Idle,
    Request,
    Response,
    Ignore,
    Fail,
    Timeout,
    Success,
}

/// One transition evaluation; returns true if a transition fired.
pub(crate) fn step(port: &mut AuthPort, io: &mut PortIo<'_>) -> bool {
    if let Some(next) = next_state(port) {
        enter(port, io, next);
        true
    } else {
        false
    }
}

fn next_state(port: &AuthPort) -> Option<BackendState> {
    use BackendState as S;

    if port.params.port_control != PortControl::Auto || port.initialize || port.auth_abort {
        return (port.backend_state != S::Initialize).then_some(S::Initialize);
    }

    match port.backend_state {
        S::Initialize => Some(S::Idle),
        // The authStart gate keeps a stale eapSuccess/eapFail from the
        // previous conversation from looping the machine.
        S::Idle => {
            if !port.auth_start {
                None
            } else if port.eap.eap_fail {
                Some(S::Fail)
            } else if port.eap.eap_req {
                Some(S::Request)
            } else if port.eap.eap_success {
                Some(S::Success)
            } else if port.eap.eap_timeout {
                Some(S::Timeout)
            } else {
                None
            }
        }
        S::Request => {
            if port.eapol_eap {
                Some(S::Response)
            } else if port.eap.eap_req {
                Some(S::Request)
            } else if port.eap.eap_timeout {
                Some(S::Timeout)
            } else {
                None
            }
        }
        S::Response => {
            if port.eap.eap_no_req {
                Some(S::Ignore)
            } else if port.eap.eap_req {
                Some(S::Request)
            } else if port.eap.eap_success {
                Some(S::Success)
            } else if port.eap.eap_fail {
                Some(S::Fail)
            } else if port.a_while == 0 || port.eap.eap_timeout {
                Some(S::Timeout)
            } else {
                None
            }
        }
        S::Ignore => {
            if port.eapol_eap {
                Some(S::Response)
            } else if port.eap.eap_req {
                Some(S::Request)
            } else if port.eap.eap_timeout {
                Some(S::Timeout)
            } else {
                None
            }
        }
        S::Fail | S::Timeout | S::Success => Some(S::Idle),
    }
}

fn enter(port: &mut AuthPort, io: &mut PortIo<'_>, next: BackendState) {
    use BackendState as S;
    trace!(port = port.index, from = %port.backend_state, to = %next, "auth backend transition");
    port.backend_state = next;
    match next {
        S::Initialize => {
            // abortAuth: drop whatever conversation was in flight.
            port.eapol_eap = false;
            port.eap.eap_resp = false;
            port.eap.eap_no_req = false;
            port.auth_abort = false;
        }
        S::Idle => {
            port.auth_start = false;
        }
        S::Request => {
            io.send_eap_req(port);
            port.eap.eap_req = false;
        }
        S::Response => {
            port.auth_timeout = false;
            port.eapol_eap = false;
            port.eap.eap_no_req = false;
            port.eap.eap_resp = true;
            port.a_while = port.params.server_timeout;
        }
        S::Ignore => {
            port.eap.eap_no_req = false;
        }
        S::Fail => {
            // Deliver the server's Reject-carried EAP Failure.
            io.send_eap_req(port);
            port.auth_fail = true;
        }
        S::Timeout => {
            port.auth_timeout = true;
        }
        S::Success => {
            // Deliver the server's Accept-carried EAP Success.
            io.send_eap_req(port);
            port.auth_success = true;
            port.key_run = true;
        }
    }
}
