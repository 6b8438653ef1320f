//! Authenticator PAE state machine (IEEE 802.1X-2004 §8.2.4).

use tracing::{debug, trace};

use dot1x_types::counters::SessionTerminateCause;
use dot1x_types::params::{PortControl, PortStatus};

use super::{AuthPort, PortIo};

/// Authenticator PAE states (Figure 8-18).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum AuthPaeState {
    Initialize,
    Disconnected,
    Restart,
    Connecting,
    Authenticating,
    Authenticated,
    Aborting,
    Held,
    ForceAuth,
    ForceUnauth,
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

fn next_state(port: &AuthPort) -> Option<AuthPaeState> {
    use AuthPaeState as S;

    // Global transitions.
    if port.initialize || !port.port_enabled {
        return (port.pae_state != S::Initialize).then_some(S::Initialize);
    }
    match port.params.port_control {
        PortControl::ForceUnauthorized if port.port_mode != PortControl::ForceUnauthorized => {
            return Some(S::ForceUnauth);
        }
        PortControl::ForceAuthorized if port.port_mode != PortControl::ForceAuthorized => {
            return Some(S::ForceAuth);
        }
        PortControl::Auto if port.port_mode != PortControl::Auto => {
            return Some(S::Initialize);
        }
        _ => {}
    }

    match port.pae_state {
        S::Initialize => Some(S::Disconnected),
        S::Disconnected => Some(S::Restart),
        S::Restart => (!port.eap.eap_restart).then_some(S::Connecting),
        S::Connecting => {
            if port.eapol_logoff || port.re_auth_count > port.params.re_auth_max {
                Some(S::Disconnected)
            } else if (port.eap.eap_req && port.re_auth_count <= port.params.re_auth_max)
                || port.eap.eap_success
                || port.eap.eap_fail
            {
                Some(S::Authenticating)
            } else {
                None
            }
        }
        S::Authenticating => {
            if port.auth_success && port.port_valid {
                Some(S::Authenticated)
            } else if port.auth_fail
                || port.auth_timeout
                || (port.key_done && !port.port_valid)
            {
                Some(S::Held)
            } else if port.eapol_start || port.eapol_logoff {
                Some(S::Aborting)
            } else {
                None
            }
        }
        S::Authenticated => {
            if port.eapol_start || port.re_authenticate {
                Some(S::Restart)
            } else if port.eapol_logoff || !port.port_valid {
                Some(S::Disconnected)
            } else {
                None
            }
        }
        S::Aborting => {
            if port.auth_abort {
                None
            } else if port.eapol_logoff {
                Some(S::Disconnected)
            } else {
                Some(S::Restart)
            }
        }
        S::Held => (port.quiet_while == 0).then_some(S::Restart),
        // The errata behaviour: an EAPOL-Start in a forced state re-enters
        // it, emitting another canned packet.
        S::ForceAuth => port.eapol_start.then_some(S::ForceAuth),
        S::ForceUnauth => port.eapol_start.then_some(S::ForceUnauth),
    }
}

fn enter(port: &mut AuthPort, io: &mut PortIo<'_>, next: AuthPaeState) {
    use AuthPaeState as S;
    let prev = port.pae_state;
    trace!(port = port.index, from = %prev, to = %next, "auth pae transition");
    port.pae_state = next;
    match next {
        S::Initialize => {
            port.port_mode = PortControl::Auto;
        }
        S::Disconnected => {
            port.auth_port_status = PortStatus::Unauthorized;
            // Boot-time entry from INITIALIZE terminates nothing.
            if prev != S::Initialize {
                port.session.terminate_cause = if port.eapol_logoff {
                    SessionTerminateCause::SupplicantLogoff
                } else if port.re_auth_count > port.params.re_auth_max {
                    SessionTerminateCause::ReauthFailed
                } else {
                    SessionTerminateCause::PortFailure
                };
            }
            port.eapol_logoff = false;
            port.re_auth_count = 0;
        }
        S::Restart => {
            if prev == S::Authenticated {
                port.session.terminate_cause = SessionTerminateCause::SupplicantRestart;
            }
            port.eap.eap_restart = true;
        }
        S::Connecting => {
            port.re_authenticate = false;
            port.re_auth_count += 1;
        }
        S::Authenticating => {
            port.eapol_start = false;
            port.auth_success = false;
            port.auth_fail = false;
            port.auth_timeout = false;
            port.auth_start = true;
            port.key_run = false;
            port.key_done = false;
        }
        S::Authenticated => {
            port.auth_port_status = PortStatus::Authorized;
            port.re_auth_count = 0;
            debug!(port = port.index, "port authorized");
        }
        S::Aborting => {
            port.auth_abort = true;
        }
        S::Held => {
            port.auth_port_status = PortStatus::Unauthorized;
            port.quiet_while = u32::from(port.params.quiet_period);
            port.eapol_logoff = false;
            debug!(port = port.index, quiet = port.quiet_while, "authentication failed, holding");
        }
        S::ForceAuth => {
            port.auth_port_status = PortStatus::Authorized;
            port.port_mode = PortControl::ForceAuthorized;
            port.eapol_start = false;
            port.session.terminate_cause = SessionTerminateCause::NotTerminatedYet;
            io.send_canned_success(port);
        }
        S::ForceUnauth => {
            port.auth_port_status = PortStatus::Unauthorized;
            port.port_mode = PortControl::ForceUnauthorized;
            port.eapol_start = false;
            port.session.terminate_cause = SessionTerminateCause::AuthControlForceUnauth;
            io.send_canned_failure(port);
        }
    }
}
