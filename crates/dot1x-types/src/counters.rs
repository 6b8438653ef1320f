//! Per-port counters and session statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Why the current or last session on a port ended
/// (`dot1xAuthSessionTerminateCause`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SessionTerminateCause {
    /// Session still active (or never started).
    #[default]
    NotTerminatedYet,
    /// Supplicant sent EAPOL-Logoff.
    SupplicantLogoff,
    /// Link went down.
    PortFailure,
    /// Supplicant restarted the exchange.
    SupplicantRestart,
    /// Reauthentication ran out of attempts.
    ReauthFailed,
    /// Management forced the port unauthorized.
    AuthControlForceUnauth,
    /// Management reinitialized the port.
    PortReInit,
    /// The port was administratively disabled.
    PortAdminDisabled,
}

/// EAPOL frame counters for one port (`dot1xAuthStatsTable`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EapolCounters {
    /// Valid EAPOL frames of any type received.
    pub eapol_frames_rx: u64,
    /// EAPOL frames of any type transmitted.
    pub eapol_frames_tx: u64,
    /// EAPOL-Start frames received.
    pub eapol_start_frames_rx: u64,
    /// EAPOL-Logoff frames received.
    pub eapol_logoff_frames_rx: u64,
    /// EAP-Response/Identity frames received.
    pub eapol_resp_id_frames_rx: u64,
    /// EAP Response frames other than Identity received.
    pub eapol_resp_frames_rx: u64,
    /// EAP-Request/Identity frames transmitted.
    pub eapol_req_id_frames_tx: u64,
    /// EAP Request frames other than Identity transmitted.
    pub eapol_req_frames_tx: u64,
    /// EAPOL frames dropped for an unrecognized type or bad addressing.
    pub invalid_eapol_frames_rx: u64,
    /// EAPOL frames whose body was shorter than the declared length.
    pub eap_length_error_frames_rx: u64,
    /// Protocol version of the most recently received EAPOL frame.
    pub last_eapol_frame_version: u8,
}

/// Session statistics for one port (`dot1xAuthSessionStatsTable`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Octets received during the session.
    pub octets_rx: u64,
    /// Octets transmitted during the session.
    pub octets_tx: u64,
    /// Frames received during the session.
    pub frames_rx: u64,
    /// Frames transmitted during the session.
    pub frames_tx: u64,
    /// Session duration, seconds.
    pub time: u64,
    /// Why the session ended.
    pub terminate_cause: SessionTerminateCause,
    /// When the session started.
    pub started_at: Option<DateTime<Utc>>,
}

impl SessionStats {
    /// Resets the session block for a fresh link-up.
    pub fn restart(&mut self, now: DateTime<Utc>) {
        *self = Self {
            started_at: Some(now),
            ..Self::default()
        };
    }
}
