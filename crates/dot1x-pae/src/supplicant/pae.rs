//! Supplicant PAE state machine (IEEE 802.1X-2004 §8.2.11).

use tracing::{debug, trace};

use dot1x_types::params::{PortControl, PortStatus};

use super::{SuppIo, SuppPort};

/// Supplicant PAE states (Figure 8-21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum SuppPaeState {
    Logoff,
    Disconnected,
    Connecting,
    Authenticating,
    Authenticated,
    Held,
    Restart,
    SForceAuth,
    SForceUnauth,
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

fn next_state(port: &SuppPort) -> Option<SuppPaeState> {
    use SuppPaeState as S;

    // Global transitions.
    if port.initialize || !port.port_enabled {
        return (port.pae_state != S::Disconnected).then_some(S::Disconnected);
    }
    if port.user_logoff && !port.logoff_sent {
        return (port.pae_state != S::Logoff).then_some(S::Logoff);
    }
    match port.params.port_control {
        PortControl::ForceAuthorized if port.s_port_mode != PortControl::ForceAuthorized => {
            return Some(S::SForceAuth);
        }
        PortControl::ForceUnauthorized if port.s_port_mode != PortControl::ForceUnauthorized => {
            return Some(S::SForceUnauth);
        }
        PortControl::Auto if port.s_port_mode != PortControl::Auto => {
            return Some(S::Disconnected);
        }
        _ => {}
    }

    match port.pae_state {
        S::Logoff => (!port.user_logoff).then_some(S::Disconnected),
        S::Disconnected => Some(S::Connecting),
        S::Connecting => {
            if port.eapol_eap {
                Some(S::Restart)
            } else if port.peer.eap_success || port.peer.eap_fail {
                Some(S::Authenticating)
            } else if port.start_when == 0 {
                if port.start_count < port.params.max_start {
                    // Re-enter: send another EAPOL-Start.
                    Some(S::Connecting)
                } else if port.port_valid {
                    // No authenticator answered; the network does not do
                    // 802.1X, treat the port as authorized.
                    Some(S::Authenticated)
                } else {
                    Some(S::Held)
                }
            } else {
                None
            }
        }
        S::Restart => (!port.peer.eap_restart).then_some(S::Authenticating),
        S::Authenticating => {
            if port.supp_success && port.port_valid {
                Some(S::Authenticated)
            } else if port.supp_fail || (port.key_done && !port.port_valid) {
                Some(S::Held)
            } else if port.supp_timeout {
                Some(S::Connecting)
            } else {
                None
            }
        }
        S::Authenticated => {
            if port.eapol_eap {
                Some(S::Restart)
            } else if !port.port_valid {
                Some(S::Disconnected)
            } else {
                None
            }
        }
        S::Held => {
            if port.held_while == 0 {
                Some(S::Connecting)
            } else if port.eapol_eap {
                Some(S::Restart)
            } else {
                None
            }
        }
        S::SForceAuth | S::SForceUnauth => None,
    }
}

fn enter(port: &mut SuppPort, io: &mut SuppIo<'_>, next: SuppPaeState) {
    use SuppPaeState as S;
    trace!(port = port.index, from = %port.pae_state, to = %next, "supp pae transition");
    port.pae_state = next;
    match next {
        S::Logoff => {
            io.send_logoff(port);
            port.logoff_sent = true;
            port.supp_port_status = PortStatus::Unauthorized;
        }
        S::Disconnected => {
            port.s_port_mode = PortControl::Auto;
            port.start_count = 0;
            port.logoff_sent = false;
            port.supp_port_status = PortStatus::Unauthorized;
            port.supp_abort = true;
        }
        S::Connecting => {
            port.start_when = port.params.start_period;
            port.start_count += 1;
            port.eapol_eap = false;
            // Restart the peer machine so indications left over from a
            // previous conversation cannot leak into this one.
            port.peer.eap_restart = true;
            io.send_start(port);
            debug!(port = port.index, attempt = port.start_count, "sent EAPOL-Start");
        }
        S::Restart => {
            port.peer.eap_restart = true;
        }
        S::Authenticating => {
            port.start_count = 0;
            port.supp_success = false;
            port.supp_fail = false;
            port.supp_timeout = false;
            port.key_run = false;
            port.key_done = false;
            port.supp_start = true;
        }
        S::Authenticated => {
            port.supp_port_status = PortStatus::Authorized;
            port.s_port_mode = PortControl::Auto;
            debug!(port = port.index, "supplicant authenticated");
        }
        S::Held => {
            port.held_while = port.params.held_period;
            port.supp_port_status = PortStatus::Unauthorized;
            port.s_port_mode = PortControl::Auto;
            debug!(port = port.index, hold = port.held_while, "authentication failed, holding");
        }
        S::SForceAuth => {
            port.supp_port_status = PortStatus::Authorized;
            port.s_port_mode = PortControl::ForceAuthorized;
        }
        S::SForceUnauth => {
            port.supp_port_status = PortStatus::Unauthorized;
            port.s_port_mode = PortControl::ForceUnauthorized;
            io.send_logoff(port);
        }
    }
}
