//! Per-port managed parameters.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::consts;
use crate::error::{Error, Result};

/// Administrative control for a port (`AuthControlledPortControl`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PortControl {
    /// Port is always unauthorized.
    ForceUnauthorized,
    /// Port is always authorized.
    ForceAuthorized,
    /// Port state follows the outcome of authentication.
    #[default]
    Auto,
}

/// Controlled-port forwarding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PortStatus {
    /// User traffic is forwarded.
    Authorized,
    /// User traffic is blocked.
    Unauthorized,
}

/// Whether a management write should only be checked or also applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Apply {
    /// Validate the value, change nothing.
    ValidateOnly,
    /// Validate and commit; the FSM re-runs with the new value.
    Commit,
}

/// Authenticator per-port parameters with their managed ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPortParams {
    /// Administrative port control.
    #[serde(default)]
    pub port_control: PortControl,

    /// Held period after a failed authentication, seconds.
    #[serde(default = "default_quiet_period")]
    pub quiet_period: u16,

    /// Maximum reauthentication attempts before giving up.
    #[serde(default = "default_re_auth_max")]
    pub re_auth_max: u32,

    /// Reauthentication interval, seconds (10..=86400).
    #[serde(default = "default_re_auth_period")]
    pub re_auth_period: u32,

    /// Whether periodic reauthentication runs at all.
    #[serde(default)]
    pub re_auth_enabled: bool,

    /// Backend AAA response timeout, seconds (1..=3600).
    #[serde(default = "default_server_timeout")]
    pub server_timeout: u32,

    /// EAP request retransmit limit.
    #[serde(default = "default_max_retrans")]
    pub max_retrans: u32,

    /// Whether key transmission is enabled on this port.
    #[serde(default)]
    pub key_tx_enabled: bool,
}

fn default_quiet_period() -> u16 {
    consts::QUIET_PERIOD_DEFAULT
}

fn default_re_auth_max() -> u32 {
    consts::RE_AUTH_MAX_DEFAULT
}

fn default_re_auth_period() -> u32 {
    consts::RE_AUTH_PERIOD_DEFAULT
}

fn default_server_timeout() -> u32 {
    consts::SERVER_TIMEOUT_DEFAULT
}

fn default_max_retrans() -> u32 {
    consts::MAX_RETRANS_DEFAULT
}

impl Default for AuthPortParams {
    fn default() -> Self {
        Self {
            port_control: PortControl::Auto,
            quiet_period: default_quiet_period(),
            re_auth_max: default_re_auth_max(),
            re_auth_period: default_re_auth_period(),
            re_auth_enabled: false,
            server_timeout: default_server_timeout(),
            max_retrans: default_max_retrans(),
            key_tx_enabled: false,
        }
    }
}

impl AuthPortParams {
    /// Validates every parameter against its managed range.
    pub fn validate(&self) -> Result<()> {
        Self::check_re_auth_period(self.re_auth_period)?;
        Self::check_server_timeout(self.server_timeout)?;
        Ok(())
    }

    /// Range check for `reAuthPeriod`.
    pub fn check_re_auth_period(value: u32) -> Result<()> {
        if (consts::RE_AUTH_PERIOD_MIN..=consts::RE_AUTH_PERIOD_MAX).contains(&value) {
            Ok(())
        } else {
            Err(Error::wrong_value(
                "re_auth_period",
                u64::from(value),
                format!(
                    "{}..={}",
                    consts::RE_AUTH_PERIOD_MIN,
                    consts::RE_AUTH_PERIOD_MAX
                ),
            ))
        }
    }

    /// Range check for `serverTimeout`.
    pub fn check_server_timeout(value: u32) -> Result<()> {
        if (consts::SERVER_TIMEOUT_MIN..=consts::SERVER_TIMEOUT_MAX).contains(&value) {
            Ok(())
        } else {
            Err(Error::wrong_value(
                "server_timeout",
                u64::from(value),
                format!(
                    "{}..={}",
                    consts::SERVER_TIMEOUT_MIN,
                    consts::SERVER_TIMEOUT_MAX
                ),
            ))
        }
    }
}

/// Supplicant per-port parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppPortParams {
    /// Administrative port control.
    #[serde(default)]
    pub port_control: PortControl,

    /// EAPOL-Start transmit limit.
    #[serde(default = "default_max_start")]
    pub max_start: u32,

    /// Interval between EAPOL-Start transmissions, seconds.
    #[serde(default = "default_start_period")]
    pub start_period: u32,

    /// Hold-off after a failed authentication, seconds.
    #[serde(default = "default_held_period")]
    pub held_period: u32,

    /// How long to wait for the authenticator before timing out, seconds.
    #[serde(default = "default_auth_period")]
    pub auth_period: u32,
}

fn default_max_start() -> u32 {
    consts::MAX_START_DEFAULT
}

fn default_start_period() -> u32 {
    consts::START_PERIOD_DEFAULT
}

fn default_held_period() -> u32 {
    consts::HELD_PERIOD_DEFAULT
}

fn default_auth_period() -> u32 {
    consts::AUTH_PERIOD_DEFAULT
}

impl Default for SuppPortParams {
    fn default() -> Self {
        Self {
            port_control: PortControl::Auto,
            max_start: default_max_start(),
            start_period: default_start_period(),
            held_period: default_held_period(),
            auth_period: default_auth_period(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AuthPortParams::default().validate().unwrap();
    }

    #[test]
    fn re_auth_period_range() {
        assert!(AuthPortParams::check_re_auth_period(9).is_err());
        assert!(AuthPortParams::check_re_auth_period(10).is_ok());
        assert!(AuthPortParams::check_re_auth_period(86_400).is_ok());
        assert!(AuthPortParams::check_re_auth_period(86_401).is_err());
    }

    #[test]
    fn server_timeout_range() {
        assert!(AuthPortParams::check_server_timeout(0).is_err());
        assert!(AuthPortParams::check_server_timeout(1).is_ok());
        assert!(AuthPortParams::check_server_timeout(3601).is_err());
    }
}
