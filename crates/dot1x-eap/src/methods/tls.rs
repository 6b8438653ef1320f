//! EAP-TLS (RFC 5216; RFC 9190 for TLS 1.3).
//!
//! The method owns a sans-io `rustls::ClientConnection` and acts as its
//! record transport: inbound EAP-TLS fragments are reassembled and fed
//! through `read_tls`, outbound records are drained with `write_tls` and
//! split back into fragments that respect the EAP MTU.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, ProtocolVersion, RootCertStore};
use tracing::{debug, warn};

use dot1x_eapol::{build_response, EapPacket, EapType};
use dot1x_types::{Error, Result};

use super::{MethodState, PeerDecision, PeerMethod};

/// Flags octet: total TLS message length field present.
pub const FLAG_LENGTH: u8 = 0x80;
/// Flags octet: more fragments follow.
pub const FLAG_MORE: u8 = 0x40;
/// Flags octet: EAP-TLS start.
pub const FLAG_START: u8 = 0x20;

/// EAP header, type octet and flags octet.
const EAP_TLS_HEADER: usize = 6;
/// The optional big-endian total-length field.
const LENGTH_FIELD: usize = 4;

/// TLS client material named in the supplicant configuration.
#[derive(Debug, Clone, Default)]
pub struct TlsCredentials {
    /// CA bundle used to verify the server certificate.
    pub ca_file: Option<PathBuf>,
    /// Client certificate chain, PEM.
    pub cert_file: Option<PathBuf>,
    /// Client private key, PEM.
    pub key_file: Option<PathBuf>,
    /// Skip server certificate verification entirely.
    pub insecure_skip_verify: bool,
}

impl TlsCredentials {
    /// Builds the rustls client configuration once at startup; session
    /// resumption state lives inside the returned config.
    pub fn build(&self) -> Result<Arc<ClientConfig>> {
        let builder = ClientConfig::builder();

        let builder = if self.insecure_skip_verify {
            builder
                .dangerous()
                .with_custom_certificate_verifier(danger::NoVerification::new())
        } else {
            let mut roots = RootCertStore::empty();
            let ca_file = self.ca_file.as_ref().ok_or_else(|| {
                Error::invalid_parameter("ca_file", "required unless verification is disabled")
            })?;
            let pem = std::fs::read(ca_file)?;
            for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
                let cert = cert.map_err(|e| Error::OpenFailed {
                    message: format!("bad certificate in {}: {e}", ca_file.display()),
                })?;
                roots.add(cert).map_err(|e| Error::OpenFailed {
                    message: format!("rejected CA certificate: {e}"),
                })?;
            }
            builder.with_root_certificates(roots)
        };

        let config = match (&self.cert_file, &self.key_file) {
            (Some(cert_file), Some(key_file)) => {
                let cert_pem = std::fs::read(cert_file)?;
                let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| Error::OpenFailed {
                        message: format!("bad certificate in {}: {e}", cert_file.display()),
                    })?;
                let key_pem = std::fs::read(key_file)?;
                let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
                    .map_err(|e| Error::OpenFailed {
                        message: format!("bad key in {}: {e}", key_file.display()),
                    })?
                    .ok_or_else(|| Error::OpenFailed {
                        message: format!("no private key in {}", key_file.display()),
                    })?;
                builder
                    .with_client_auth_cert(certs, key)
                    .map_err(|e| Error::OpenFailed {
                        message: format!("client certificate rejected: {e}"),
                    })?
            }
            _ => builder.with_no_client_auth(),
        };

        Ok(Arc::new(config))
    }
}

mod danger {
    use std::sync::Arc;

    use rustls::client::danger::{
        HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
    };
    use rustls::crypto::CryptoProvider;
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, SignatureScheme};

    /// Accepts any server certificate. Only reachable through an
    /// explicit `insecure_skip_verify` in the supplicant config.
    #[derive(Debug)]
    pub(super) struct NoVerification(CryptoProvider);

    impl NoVerification {
        pub(super) fn new() -> Arc<Self> {
            Arc::new(Self(rustls::crypto::ring::default_provider()))
        }
    }

    impl ServerCertVerifier for NoVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> std::result::Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.0.signature_verification_algorithms.supported_schemes()
        }
    }
}

/// Reassembles a fragmented inbound TLS message.
#[derive(Debug, Default)]
struct Assembler {
    buf: Vec<u8>,
    declared_total: Option<usize>,
}

impl Assembler {
    fn reset(&mut self) {
        self.buf.clear();
        self.declared_total = None;
    }

    fn push(&mut self, payload: &[u8], declared_total: Option<usize>) {
        if self.buf.is_empty() {
            self.declared_total = declared_total;
        }
        self.buf.extend_from_slice(payload);
    }

    /// Whether the accumulated octets contradict the declared total.
    fn overflowed(&self) -> bool {
        self.declared_total.is_some_and(|total| self.buf.len() > total)
    }

    fn take(&mut self) -> Vec<u8> {
        self.declared_total = None;
        std::mem::take(&mut self.buf)
    }
}

/// Splits outbound TLS records into EAP-TLS fragments. The first
/// fragment of a multi-fragment message carries L+M and the 4-octet
/// total; intermediate fragments carry M; the last clears M, after
/// which the buffer is rewound.
#[derive(Debug)]
struct Fragmenter {
    data: Vec<u8>,
    offset: usize,
    max_frag: usize,
}

impl Fragmenter {
    fn new(max_frag: usize) -> Self {
        Self {
            data: Vec::new(),
            offset: 0,
            max_frag,
        }
    }

    fn reset(&mut self) {
        self.data.clear();
        self.offset = 0;
    }

    fn extend(&mut self, records: &[u8]) {
        self.data.extend_from_slice(records);
    }

    fn has_pending(&self) -> bool {
        self.offset < self.data.len()
    }

    /// The next fragment as raw EAP-TLS Type-Data (flags, optional
    /// length, payload).
    fn next_fragment(&mut self) -> Option<Vec<u8>> {
        if !self.has_pending() {
            return None;
        }
        let total = self.data.len();
        let remaining = total - self.offset;
        let plain_budget = self.max_frag - EAP_TLS_HEADER;

        let (flags, with_length, take) = if self.offset == 0 {
            if remaining <= plain_budget {
                (0u8, false, remaining)
            } else {
                let budget = plain_budget - LENGTH_FIELD;
                (FLAG_LENGTH | FLAG_MORE, true, budget)
            }
        } else if remaining <= plain_budget {
            (0u8, false, remaining)
        } else {
            (FLAG_MORE, false, plain_budget)
        };

        let mut out = Vec::with_capacity(1 + LENGTH_FIELD + take);
        out.push(flags);
        if with_length {
            out.extend_from_slice(&(total as u32).to_be_bytes());
        }
        out.extend_from_slice(&self.data[self.offset..self.offset + take]);
        self.offset += take;
        if self.offset == total {
            self.reset();
        }
        Some(out)
    }
}

/// What the next response will carry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Response {
    /// Empty EAP-TLS packet: fragment acknowledgment or final handshake
    /// acknowledgment.
    Ack,
    /// Prepared Type-Data from the fragmenter.
    Fragment(Vec<u8>),
}

/// Peer side of EAP-TLS.
pub struct EapTlsMethod {
    config: Arc<ClientConfig>,
    server_name: Option<ServerName<'static>>,
    conn: Option<ClientConnection>,
    assembler: Assembler,
    fragmenter: Fragmenter,
    response: Response,
    state: MethodState,
    decision: PeerDecision,
    tls13: bool,
}

impl EapTlsMethod {
    /// Creates the method around a prepared client configuration.
    #[must_use]
    pub fn new(config: Arc<ClientConfig>, server_name: &str, max_frag_size: usize) -> Self {
        Self {
            config,
            server_name: ServerName::try_from(server_name.to_owned()).ok(),
            conn: None,
            assembler: Assembler::default(),
            fragmenter: Fragmenter::new(max_frag_size),
            response: Response::Ack,
            state: MethodState::Init,
            decision: PeerDecision::Fail,
            tls13: false,
        }
    }

    fn fail(&mut self) -> (MethodState, PeerDecision) {
        self.conn = None;
        self.state = MethodState::Done;
        self.decision = PeerDecision::Fail;
        self.response = Response::Ack;
        (self.state, self.decision)
    }

    /// Starts a fresh session; any cached session in the client config
    /// is offered for resumption automatically.
    fn start(&mut self) -> bool {
        let Some(name) = self.server_name.clone() else {
            warn!("eap-tls: no valid server name configured");
            return false;
        };
        match ClientConnection::new(self.config.clone(), name) {
            Ok(conn) => {
                self.conn = Some(conn);
                self.assembler.reset();
                self.fragmenter.reset();
                self.tls13 = false;
                true
            }
            Err(e) => {
                warn!("eap-tls: session setup failed: {e}");
                false
            }
        }
    }

    /// Feeds a complete inbound TLS message and drains whatever the
    /// handshake wants to send. Returns false on a fatal TLS error.
    fn drive(&mut self, inbound: &[u8]) -> bool {
        let Some(conn) = self.conn.as_mut() else {
            return false;
        };

        let mut cursor = inbound;
        while !cursor.is_empty() {
            match conn.read_tls(&mut cursor) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("eap-tls: record ingest failed: {e}");
                    return false;
                }
            }
            if let Err(e) = conn.process_new_packets() {
                warn!("eap-tls: handshake failed: {e}");
                // Drain the queued alert so the authenticator learns why.
                let mut alert = Vec::new();
                while conn.wants_write() {
                    if conn.write_tls(&mut alert).is_err() {
                        break;
                    }
                }
                self.fragmenter.extend(&alert);
                return false;
            }
        }

        let mut out = Vec::new();
        while conn.wants_write() {
            if let Err(e) = conn.write_tls(&mut out) {
                warn!("eap-tls: record emit failed: {e}");
                return false;
            }
        }
        self.fragmenter.extend(&out);
        true
    }

    /// Post-handshake work: on TLS 1.3 the server commits with a single
    /// 0x00 application-data octet (RFC 9190 §2.1.1) which must arrive
    /// before the method reports success.
    fn finish(&mut self) -> bool {
        let Some(conn) = self.conn.as_mut() else {
            return false;
        };
        self.tls13 = conn.protocol_version() == Some(ProtocolVersion::TLSv1_3);
        if self.tls13 {
            let mut indicator = [0u8; 1];
            match conn.reader().read(&mut indicator) {
                Ok(1) if indicator[0] == 0x00 => {}
                Ok(n) => {
                    warn!(
                        "eap-tls: bad protected success indicator ({n} octets, {:#04x})",
                        indicator[0]
                    );
                    return false;
                }
                Err(e) => {
                    warn!("eap-tls: protected success indicator missing: {e}");
                    return false;
                }
            }
        }
        true
    }
}

impl PeerMethod for EapTlsMethod {
    fn eap_type(&self) -> EapType {
        EapType::Tls
    }

    fn check(&mut self, req: &EapPacket) -> bool {
        let data = req.type_data();
        let Some(&flags) = data.first() else {
            return false;
        };
        if flags & FLAG_LENGTH != 0 && data.len() < 1 + LENGTH_FIELD {
            return false;
        }
        true
    }

    fn process(&mut self, req: &EapPacket) -> (MethodState, PeerDecision) {
        let data = req.type_data();
        let flags = data[0];
        let (declared_total, payload) = if flags & FLAG_LENGTH != 0 {
            let total = u32::from_be_bytes([data[1], data[2], data[3], data[4]]) as usize;
            (Some(total), &data[1 + LENGTH_FIELD..])
        } else {
            (None, &data[1..])
        };

        if flags & FLAG_START != 0 {
            debug!("eap-tls: start");
            if !self.start() || !self.drive(&[]) {
                return self.fail();
            }
            self.response = self
                .fragmenter
                .next_fragment()
                .map_or(Response::Ack, Response::Fragment);
            self.state = MethodState::MayCont;
            self.decision = PeerDecision::Fail;
            return (self.state, self.decision);
        }

        if self.conn.is_none() {
            return self.fail();
        }

        // A bare ACK from the authenticator: keep sending our fragments.
        if payload.is_empty() && flags & FLAG_MORE == 0 {
            self.response = self
                .fragmenter
                .next_fragment()
                .map_or(Response::Ack, Response::Fragment);
            return (self.state, self.decision);
        }

        self.assembler.push(payload, declared_total);
        if self.assembler.overflowed() {
            warn!("eap-tls: reassembly exceeds declared length");
            return self.fail();
        }
        if flags & FLAG_MORE != 0 {
            // More fragments coming; acknowledge this one.
            self.response = Response::Ack;
            self.state = MethodState::MayCont;
            self.decision = PeerDecision::Fail;
            return (self.state, self.decision);
        }

        let message = self.assembler.take();
        if !self.drive(&message) {
            // The alert (if any) still goes out before the method ends.
            self.response = self
                .fragmenter
                .next_fragment()
                .map_or(Response::Ack, Response::Fragment);
            self.state = MethodState::Done;
            self.decision = PeerDecision::Fail;
            return (self.state, self.decision);
        }

        let handshaking = self.conn.as_ref().is_some_and(|c| c.is_handshaking());
        if handshaking {
            self.response = self
                .fragmenter
                .next_fragment()
                .map_or(Response::Ack, Response::Fragment);
            self.state = MethodState::MayCont;
            self.decision = PeerDecision::Fail;
        } else if self.finish() {
            debug!("eap-tls: handshake complete");
            self.response = self
                .fragmenter
                .next_fragment()
                .map_or(Response::Ack, Response::Fragment);
            self.state = MethodState::Done;
            self.decision = PeerDecision::UncondSucc;
        } else {
            return self.fail();
        }
        (self.state, self.decision)
    }

    fn build_resp(&mut self, identifier: u8) -> Vec<u8> {
        let type_data = match &self.response {
            Response::Ack => vec![0u8],
            Response::Fragment(data) => data.clone(),
        };
        build_response(identifier, EapType::Tls, &type_data)
    }

    fn key(&self) -> Option<Vec<u8>> {
        let conn = self.conn.as_ref()?;
        if conn.is_handshaking() {
            return None;
        }
        let mut key = vec![0u8; 64];
        let (label, context): (&str, Option<&[u8]>) = if self.tls13 {
            ("EXPORTER_EAP_TLS_Key_Material", Some(&[0x0D]))
        } else {
            ("client EAP encryption", None)
        };
        conn.export_keying_material(&mut key, label.as_bytes(), context)
            .ok()?;
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragmenter_splits_large_message() {
        // 1800-octet ClientHello against a 1000-octet EAP budget.
        let record: Vec<u8> = (0..1800u32).map(|i| (i % 251) as u8).collect();
        let mut frag = Fragmenter::new(1000);
        frag.extend(&record);

        let mut fragments = Vec::new();
        while let Some(f) = frag.next_fragment() {
            fragments.push(f);
        }
        assert!(fragments.len() > 1);

        // First fragment: L|M, 4-octet total, payload fills the budget
        // minus the length field.
        let first = &fragments[0];
        assert_eq!(first[0], FLAG_LENGTH | FLAG_MORE);
        assert_eq!(u32::from_be_bytes([first[1], first[2], first[3], first[4]]), 1800);
        assert_eq!(first.len() - 5, 1000 - EAP_TLS_HEADER - LENGTH_FIELD);

        // Middle fragments carry M only, the last clears it.
        for f in &fragments[1..fragments.len() - 1] {
            assert_eq!(f[0], FLAG_MORE);
        }
        assert_eq!(fragments.last().unwrap()[0], 0);

        // Concatenated payloads equal the original record.
        let mut rebuilt = Vec::new();
        for (i, f) in fragments.iter().enumerate() {
            let skip = if i == 0 { 5 } else { 1 };
            rebuilt.extend_from_slice(&f[skip..]);
        }
        assert_eq!(rebuilt, record);

        // Buffer rewinds after the last fragment.
        assert!(!frag.has_pending());
    }

    #[test]
    fn fragmenter_small_message_is_single_plain_fragment() {
        let mut frag = Fragmenter::new(1000);
        frag.extend(&[0xAB; 100]);
        let f = frag.next_fragment().unwrap();
        assert_eq!(f[0], 0);
        assert_eq!(&f[1..], &[0xAB; 100]);
        assert!(frag.next_fragment().is_none());
    }

    #[test]
    fn assembler_rejoins_in_order() {
        let mut asm = Assembler::default();
        asm.push(&[1, 2, 3], Some(6));
        assert!(!asm.overflowed());
        asm.push(&[4, 5, 6], None);
        assert!(!asm.overflowed());
        assert_eq!(asm.take(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn assembler_detects_overflow() {
        let mut asm = Assembler::default();
        asm.push(&[1, 2, 3], Some(2));
        assert!(asm.overflowed());
    }

    #[test]
    fn check_requires_flags_octet() {
        let creds = TlsCredentials {
            insecure_skip_verify: true,
            ..TlsCredentials::default()
        };
        let config = creds.build().unwrap();
        let mut method = EapTlsMethod::new(config, "radius.example.net", 1000);

        let empty = dot1x_eapol::build_request(1, EapType::Tls, &[]);
        let req = EapPacket::decode(&empty).unwrap();
        assert!(!method.check(&req));

        let start = dot1x_eapol::build_request(1, EapType::Tls, &[FLAG_START]);
        let req = EapPacket::decode(&start).unwrap();
        assert!(method.check(&req));

        // L flag without the length field is malformed.
        let bad = dot1x_eapol::build_request(1, EapType::Tls, &[FLAG_LENGTH, 0x00]);
        let req = EapPacket::decode(&bad).unwrap();
        assert!(!method.check(&req));
    }

    #[test]
    fn start_produces_client_hello_fragment() {
        let creds = TlsCredentials {
            insecure_skip_verify: true,
            ..TlsCredentials::default()
        };
        let config = creds.build().unwrap();
        let mut method = EapTlsMethod::new(config, "radius.example.net", 1398);

        let start = dot1x_eapol::build_request(1, EapType::Tls, &[FLAG_START]);
        let req = EapPacket::decode(&start).unwrap();
        let (state, decision) = method.process(&req);
        assert_eq!(state, MethodState::MayCont);
        assert_eq!(decision, PeerDecision::Fail);

        let resp = EapPacket::decode(&method.build_resp(1)).unwrap();
        assert_eq!(resp.eap_type().unwrap(), EapType::Tls);
        // The response carries TLS records (a ClientHello), not a bare ACK.
        assert!(resp.type_data().len() > 1);
        // First octet of a TLS handshake record.
        let payload_start = if resp.type_data()[0] & FLAG_LENGTH != 0 { 5 } else { 1 };
        assert_eq!(resp.type_data()[payload_start], 0x16);
    }
}
