//! EAP MD5-Challenge (RFC 3748 §5.4).

use md5::{Digest, Md5};

use dot1x_eapol::{build_response, EapPacket, EapType};

use super::{MethodState, PeerDecision, PeerMethod};

/// Peer side of MD5-Challenge: answers one challenge with
/// `MD5(identifier || password || challenge)`, CHAP style.
pub struct Md5ChallengeMethod {
    identity: String,
    password: String,
    response_value: Option<[u8; 16]>,
    identifier: u8,
}

impl Md5ChallengeMethod {
    /// Creates the method with the credentials it answers with.
    #[must_use]
    pub fn new(identity: String, password: String) -> Self {
        Self {
            identity,
            password,
            response_value: None,
            identifier: 0,
        }
    }

    fn challenge<'a>(req: &'a EapPacket) -> Option<&'a [u8]> {
        let data = req.type_data();
        let value_size = usize::from(*data.first()?);
        if value_size == 0 || data.len() < 1 + value_size {
            return None;
        }
        Some(&data[1..1 + value_size])
    }
}

impl PeerMethod for Md5ChallengeMethod {
    fn eap_type(&self) -> EapType {
        EapType::Md5Challenge
    }

    fn check(&mut self, req: &EapPacket) -> bool {
        Self::challenge(req).is_some()
    }

    fn process(&mut self, req: &EapPacket) -> (MethodState, PeerDecision) {
        let Some(challenge) = Self::challenge(req) else {
            return (MethodState::Done, PeerDecision::Fail);
        };

        let mut md5 = Md5::new();
        md5.update([req.identifier]);
        md5.update(self.password.as_bytes());
        md5.update(challenge);
        self.response_value = Some(md5.finalize().into());
        self.identifier = req.identifier;

        // One round trip only; whether we pass is the server's call.
        (MethodState::Done, PeerDecision::CondSucc)
    }

    fn build_resp(&mut self, identifier: u8) -> Vec<u8> {
        let value = self.response_value.unwrap_or_default();
        let mut type_data = Vec::with_capacity(1 + value.len() + self.identity.len());
        type_data.push(value.len() as u8);
        type_data.extend_from_slice(&value);
        type_data.extend_from_slice(self.identity.as_bytes());
        build_response(identifier, EapType::Md5Challenge, &type_data)
    }
}
