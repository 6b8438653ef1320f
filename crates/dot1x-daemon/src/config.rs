//! Daemon configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use dot1x_eap::methods::TlsCredentials;
use dot1x_eap::PeerConfig;
use dot1x_eapol::EapType;
use dot1x_types::consts;
use dot1x_types::params::{AuthPortParams, SuppPortParams};
use dot1x_types::MacAddress;

use crate::error::{DaemonError, Result};

/// Daemon configuration, one file per context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// General daemon settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// The interface this context runs on.
    pub interface: InterfaceConfig,

    /// RADIUS server settings (authenticator role).
    #[serde(default)]
    pub radius: Option<RadiusConfig>,

    /// Authenticator port parameters.
    #[serde(default)]
    pub authenticator: AuthPortParams,

    /// Supplicant settings (supplicant role).
    #[serde(default)]
    pub supplicant: Option<SupplicantSection>,
}

impl DaemonConfig {
    /// Loads configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| DaemonError::config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.interface.name.is_empty() {
            return Err(DaemonError::config("interface.name must be set"));
        }
        if self.interface.ports == 0 {
            return Err(DaemonError::config("interface.ports must be at least 1"));
        }
        self.authenticator
            .validate()
            .map_err(DaemonError::Engine)?;
        if let Some(radius) = &self.radius {
            radius.validate()?;
        }
        if let Some(supplicant) = &self.supplicant {
            supplicant.validate()?;
        }
        Ok(())
    }

    /// Returns the default configuration file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if cfg!(target_os = "macos") {
            PathBuf::from("/Library/Application Support/dot1x/dot1x.toml")
        } else if cfg!(target_os = "windows") {
            PathBuf::from(r"C:\ProgramData\dot1x\dot1x.toml")
        } else {
            PathBuf::from("/etc/dot1x/dot1x.toml")
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            interface: InterfaceConfig::default(),
            radius: Some(RadiusConfig::default()),
            authenticator: AuthPortParams::default(),
            supplicant: None,
        }
    }
}

/// General daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Interface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Interface name (the pcap device).
    pub name: String,

    /// Interface MAC address; EAPOL source addresses derive from it.
    #[serde(default = "MacAddress::zero")]
    pub mac: MacAddress,

    /// Number of controlled ports behind this interface.
    #[serde(default = "default_ports")]
    pub ports: u16,
}

fn default_ports() -> u16 {
    1
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            mac: MacAddress::zero(),
            ports: default_ports(),
        }
    }
}

/// RADIUS server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadiusConfig {
    /// Server address and port.
    #[serde(default = "default_server")]
    pub server: SocketAddr,

    /// Shared secret.
    #[serde(default)]
    pub secret: String,

    /// Source address advertised as NAS-IP-Address/NAS-IPv6-Address.
    pub nas_address: IpAddr,

    /// Framed-MTU advertised to the server.
    #[serde(default = "default_framed_mtu")]
    pub framed_mtu: u32,
}

fn default_server() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], consts::RADIUS_AUTH_PORT))
}

fn default_framed_mtu() -> u32 {
    1400
}

impl Default for RadiusConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            secret: String::new(),
            nas_address: IpAddr::from([127, 0, 0, 1]),
            framed_mtu: default_framed_mtu(),
        }
    }
}

impl RadiusConfig {
    fn validate(&self) -> Result<()> {
        if self.secret.is_empty() || self.secret.len() > consts::MAX_SECRET_LEN {
            return Err(DaemonError::config(format!(
                "radius.secret length must be 1..={}",
                consts::MAX_SECRET_LEN
            )));
        }
        Ok(())
    }
}

/// Supplicant identity, credentials and method preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplicantSection {
    /// Identity sent in EAP-Response/Identity.
    pub identity: String,

    /// Password for MD5-Challenge.
    #[serde(default)]
    pub password: Option<String>,

    /// Method preference order.
    #[serde(default = "default_methods")]
    pub methods: Vec<EapMethodName>,

    /// CA bundle for EAP-TLS server verification.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,

    /// Client certificate for EAP-TLS.
    #[serde(default)]
    pub cert_file: Option<PathBuf>,

    /// Client private key for EAP-TLS.
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Skip TLS server verification (testing only).
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Server name expected in the TLS certificate.
    #[serde(default)]
    pub tls_server_name: String,

    /// Accept a canned Success before any method ran.
    #[serde(default)]
    pub allow_canned: bool,

    /// Timer parameters.
    #[serde(default)]
    pub params: SuppPortParams,
}

fn default_methods() -> Vec<EapMethodName> {
    vec![EapMethodName::Tls, EapMethodName::Md5]
}

/// EAP method names accepted in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EapMethodName {
    /// EAP-TLS.
    Tls,
    /// MD5-Challenge.
    Md5,
}

impl From<EapMethodName> for EapType {
    fn from(name: EapMethodName) -> Self {
        match name {
            EapMethodName::Tls => Self::Tls,
            EapMethodName::Md5 => Self::Md5Challenge,
        }
    }
}

impl SupplicantSection {
    fn validate(&self) -> Result<()> {
        if self.identity.is_empty() {
            return Err(DaemonError::config("supplicant.identity must be set"));
        }
        if self.identity.len() > consts::MAX_IDENTITY_LEN {
            return Err(DaemonError::config(format!(
                "supplicant.identity longer than {} characters",
                consts::MAX_IDENTITY_LEN
            )));
        }
        let wants_tls = self.methods.contains(&EapMethodName::Tls);
        if wants_tls && !self.insecure_skip_verify && self.ca_file.is_none() {
            return Err(DaemonError::config(
                "supplicant.ca_file required for EAP-TLS unless insecure_skip_verify is set",
            ));
        }
        Ok(())
    }

    /// Builds the EAP peer configuration, loading TLS material if the
    /// preference list asks for EAP-TLS.
    pub fn peer_config(&self) -> Result<PeerConfig> {
        let tls = if self.methods.contains(&EapMethodName::Tls) {
            let creds = TlsCredentials {
                ca_file: self.ca_file.clone(),
                cert_file: self.cert_file.clone(),
                key_file: self.key_file.clone(),
                insecure_skip_verify: self.insecure_skip_verify,
            };
            Some(creds.build().map_err(DaemonError::Engine)?)
        } else {
            None
        };
        Ok(PeerConfig {
            identity: self.identity.clone(),
            password: self.password.clone(),
            tls,
            tls_server_name: self.tls_server_name.clone(),
            allowed_methods: self.methods.iter().map(|&m| m.into()).collect(),
            allow_canned: self.allow_canned,
            ..PeerConfig::default()
        })
    }
}
