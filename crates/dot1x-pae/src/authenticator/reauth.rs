//! Reauthentication timer state machine (IEEE 802.1X-2004 §8.2.8).

use tracing::{debug, trace};

use dot1x_types::params::{PortControl, PortStatus};

use super::AuthPort;

/// Reauthentication timer states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum ReauthTimerState {
    Initialize,
    Reauthenticate,
}

/// One transition evaluation; returns true if a transition fired.
pub(crate) fn step(port: &mut AuthPort) -> bool {
    use ReauthTimerState as S;

    let held = port.params.port_control != PortControl::Auto
        || port.initialize
        || port.auth_port_status == PortStatus::Unauthorized
        || !port.params.re_auth_enabled;

    match port.reauth_state {
        S::Initialize => {
            if held {
                // Pin the timer while reauthentication cannot run.
                port.re_auth_when = port.params.re_auth_period;
                false
            } else if port.re_auth_when == 0 {
                trace!(port = port.index, "reauth timer expired");
                port.reauth_state = S::Reauthenticate;
                port.re_authenticate = true;
                debug!(port = port.index, "requesting reauthentication");
                true
            } else {
                false
            }
        }
        S::Reauthenticate => {
            port.reauth_state = S::Initialize;
            port.re_auth_when = port.params.re_auth_period;
            true
        }
    }
}
