//! The management surface: typed requests the worker answers between
//! FSM runs, each carrying a validate-only or commit flag.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use dot1x_eap::EapAuthState;
use dot1x_pae::{AuthPaeState, BackendState, ReauthTimerState};
use dot1x_types::counters::{EapolCounters, SessionStats};
use dot1x_types::params::{Apply, PortControl, PortStatus};

/// A management request for one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MgmtRequest {
    /// Reinitialize the port.
    Initialize,
    /// Force a reauthentication now.
    Reauthenticate,
    /// Set the administrative control.
    SetPortControl(PortControl),
    /// Set `quietPeriod`.
    SetQuietPeriod(u16),
    /// Set `serverTimeout`.
    SetServerTimeout(u32),
    /// Set `reAuthPeriod`.
    SetReauthPeriod(u32),
    /// Enable or disable periodic reauthentication.
    SetReauthEnabled(bool),
    /// Enable or disable key transmission.
    SetKeyTxEnabled(bool),
    /// Start or cancel a user logoff (supplicant role).
    SetUserLogoff(bool),
    /// Read the EAPOL counters.
    GetCounters,
    /// Read the session statistics.
    GetSessionStats,
    /// Read the machine states and port status.
    GetStatus,
}

/// Reply to a management request.
#[derive(Debug)]
pub enum MgmtResponse {
    /// The write was validated (and applied, if committed).
    Done,
    /// Counter snapshot.
    Counters(EapolCounters),
    /// Session snapshot.
    Session(SessionStats),
    /// State snapshot.
    Status(PortStatusReport),
    /// The request failed validation or referenced a missing port.
    Error(String),
}

/// A request envelope sent to the worker.
#[derive(Debug)]
pub struct MgmtCommand {
    /// 1-based port index.
    pub port: u16,
    /// The request.
    pub request: MgmtRequest,
    /// Validate-only or commit.
    pub apply: Apply,
    /// Where the reply goes.
    pub reply: oneshot::Sender<MgmtResponse>,
}

/// Machine states and port status for one authenticator port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortStatusReport {
    /// 1-based port index.
    pub port: u16,
    /// Controlled-port status.
    pub status: PortStatus,
    /// Administrative control currently in force.
    pub port_mode: PortControl,
    /// Authenticator PAE state.
    pub pae_state: String,
    /// Backend state.
    pub backend_state: String,
    /// Reauthentication timer state.
    pub reauth_state: String,
    /// EAP full-authenticator state.
    pub eap_state: String,
}

impl PortStatusReport {
    /// Builds the report from the live states.
    #[must_use]
    pub fn new(
        port: u16,
        status: PortStatus,
        port_mode: PortControl,
        pae: AuthPaeState,
        backend: BackendState,
        reauth: ReauthTimerState,
        eap: EapAuthState,
    ) -> Self {
        Self {
            port,
            status,
            port_mode,
            pae_state: pae.to_string(),
            backend_state: backend.to_string(),
            reauth_state: reauth.to_string(),
            eap_state: eap.to_string(),
        }
    }
}
