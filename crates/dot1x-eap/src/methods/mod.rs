//! Peer-side EAP method dispatch.

pub mod md5;
pub mod tls;

use std::sync::Arc;

use dot1x_eapol::{EapPacket, EapType};

pub use md5::Md5ChallengeMethod;
pub use tls::{EapTlsMethod, TlsCredentials};

/// Method-layer state reported back to the peer FSM (RFC 4137 §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodState {
    /// Method instantiated, nothing processed yet.
    #[default]
    Init,
    /// The method must continue; a failure now is a failure.
    Cont,
    /// The method may continue; more round trips are expected but a
    /// clean end is also acceptable.
    MayCont,
    /// The method is finished.
    Done,
}

/// Method-layer decision reported back to the peer FSM (RFC 4137 §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerDecision {
    /// Refuse a Success; the exchange has not authenticated the server.
    #[default]
    Fail,
    /// Accept a Success if the authenticator sends one.
    CondSucc,
    /// The method completed on its own terms; Success is expected.
    UncondSucc,
}

/// A peer-side EAP method, dispatched from the METHOD state.
pub trait PeerMethod: Send {
    /// The type octet this method answers to.
    fn eap_type(&self) -> EapType;

    /// Integrity check; `false` means the request is ignored and the
    /// peer FSM discards it.
    fn check(&mut self, req: &EapPacket) -> bool;

    /// Processes a request, advancing the method's internal state.
    fn process(&mut self, req: &EapPacket) -> (MethodState, PeerDecision);

    /// Builds the full EAP response packet for the given identifier.
    fn build_resp(&mut self, identifier: u8) -> Vec<u8>;

    /// Exported key material, once the method has any.
    fn key(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Peer configuration: identity, credentials, and method preferences.
#[derive(Clone)]
pub struct PeerConfig {
    /// Identity sent in EAP-Response/Identity.
    pub identity: String,
    /// Password for MD5-Challenge; absent disables the method.
    pub password: Option<String>,
    /// Prepared TLS client configuration; absent disables EAP-TLS.
    pub tls: Option<Arc<rustls::ClientConfig>>,
    /// Server name presented to TLS for certificate matching.
    pub tls_server_name: String,
    /// Method preference order, used verbatim in NAK responses.
    pub allowed_methods: Vec<EapType>,
    /// Largest EAP packet the peer emits (drives EAP-TLS fragmentation).
    pub max_frag_size: usize,
    /// Accept a canned Success/Failure before any method ran.
    pub allow_canned: bool,
    /// Seconds the peer idles before reassessing its decision
    /// (`ClientTimeout`).
    pub client_timeout: u32,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            identity: String::new(),
            password: None,
            tls: None,
            tls_server_name: String::new(),
            allowed_methods: vec![EapType::Tls, EapType::Md5Challenge],
            max_frag_size: 1398,
            allow_canned: false,
            client_timeout: 60,
        }
    }
}

impl PeerConfig {
    /// Whether the peer is willing and able to run `eap_type`.
    #[must_use]
    pub fn allows(&self, eap_type: EapType) -> bool {
        if !self.allowed_methods.contains(&eap_type) {
            return false;
        }
        match eap_type {
            EapType::Md5Challenge => self.password.is_some(),
            EapType::Tls => self.tls.is_some(),
            _ => false,
        }
    }

    /// Instantiates the method for `eap_type`, if allowed.
    #[must_use]
    pub fn create_method(&self, eap_type: EapType) -> Option<Box<dyn PeerMethod>> {
        if !self.allows(eap_type) {
            return None;
        }
        match eap_type {
            EapType::Md5Challenge => Some(Box::new(Md5ChallengeMethod::new(
                self.identity.clone(),
                self.password.clone()?,
            ))),
            EapType::Tls => Some(Box::new(EapTlsMethod::new(
                self.tls.clone()?,
                &self.tls_server_name,
                self.max_frag_size,
            ))),
            _ => None,
        }
    }

    /// The methods the peer would rather run, for NAK construction.
    #[must_use]
    pub fn preferred_methods(&self) -> Vec<EapType> {
        self.allowed_methods
            .iter()
            .copied()
            .filter(|&t| self.allows(t))
            .collect()
    }
}
