//! Authenticator end-to-end scenarios driven through the public engine
//! API: EAPOL frames in, EAPOL frames and RADIUS datagrams out.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use chrono::Utc;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::rngs::StdRng;
use rand::SeedableRng;

use dot1x_eap::EapAuthState;
use dot1x_eapol::{
    build_response, EapCode, EapPacket, EapType, EapolFrame, EapolPacketType,
};
use dot1x_pae::{AuthPaeState, AuthenticatorConfig, AuthenticatorContext, BackendState};
use dot1x_radius::attribute::{types, AttributeIter, RADIUS_HEADER_LEN};
use dot1x_types::counters::SessionTerminateCause;
use dot1x_types::net::{ETHERTYPE_EAPOL, PAE_GROUP_ADDR};
use dot1x_types::params::{Apply, AuthPortParams, PortControl, PortStatus};
use dot1x_types::MacAddress;

const SECRET: &str = "testing123";

fn supp_mac() -> MacAddress {
    MacAddress::new([0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB])
}

fn context(params: AuthPortParams) -> AuthenticatorContext {
    let config = AuthenticatorConfig {
        interface: "eth0".to_string(),
        local_mac: MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
        nas_address: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
        server: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)), 1812),
        shared_secret: SECRET.to_string(),
        framed_mtu: 1400,
        num_ports: 2,
        params,
    };
    AuthenticatorContext::with_rng(config, StdRng::seed_from_u64(7)).unwrap()
}

fn deliver_eapol(ctx: &mut AuthenticatorContext, port: u16, pdu: &[u8]) {
    ctx.process_eapol(port, supp_mac(), PAE_GROUP_ADDR, ETHERTYPE_EAPOL, pdu)
        .unwrap();
}

fn deliver_eap(ctx: &mut AuthenticatorContext, port: u16, eap: &[u8]) {
    let pdu = EapolFrame::encode(EapolPacketType::EapPacket, eap);
    deliver_eapol(ctx, port, &pdu);
}

fn bring_up(ctx: &mut AuthenticatorContext, port: u16) {
    ctx.set_link(port, true).unwrap();
    ctx.tick(Utc::now());
}

/// Builds a RADIUS reply the way the server would: Message-Authenticator
/// over the packet with the Request Authenticator in the header, then
/// the Response Authenticator over the sealed attributes.
fn build_reply(
    code: u8,
    identifier: u8,
    req_auth: &[u8; 16],
    state: Option<&[u8]>,
    eap: &[u8],
) -> Vec<u8> {
    fn attr(buf: &mut Vec<u8>, t: u8, v: &[u8]) {
        buf.push(t);
        buf.push((v.len() + 2) as u8);
        buf.extend_from_slice(v);
    }

    let mut buf = vec![code, identifier, 0, 0];
    buf.extend_from_slice(req_auth);
    if let Some(state) = state {
        attr(&mut buf, types::STATE, state);
    }
    for chunk in eap.chunks(253) {
        attr(&mut buf, types::EAP_MESSAGE, chunk);
    }
    let ma_value = buf.len() + 2;
    attr(&mut buf, types::MESSAGE_AUTHENTICATOR, &[0u8; 16]);
    let len = buf.len() as u16;
    buf[2..4].copy_from_slice(&len.to_be_bytes());

    let mut mac = Hmac::<Md5>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(&buf);
    let digest: [u8; 16] = mac.finalize().into_bytes().into();
    buf[ma_value..ma_value + 16].copy_from_slice(&digest);

    let mut md5 = Md5::new();
    md5.update(&buf[0..4]);
    md5.update(req_auth);
    md5.update(&buf[RADIUS_HEADER_LEN..]);
    md5.update(SECRET.as_bytes());
    let resp_auth: [u8; 16] = md5.finalize().into();
    buf[4..RADIUS_HEADER_LEN].copy_from_slice(&resp_auth);
    buf
}

fn server_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)), 1812)
}

fn request_fields(datagram: &[u8]) -> (u8, [u8; 16]) {
    let mut auth = [0u8; 16];
    auth.copy_from_slice(&datagram[4..RADIUS_HEADER_LEN]);
    (datagram[1], auth)
}

/// Drives a fresh context through EAPOL-Start, Request/Identity and the
/// supplicant's Identity response; returns the first Access-Request.
fn to_first_access_request(ctx: &mut AuthenticatorContext) -> Vec<u8> {
    deliver_eapol(ctx, 1, &EapolFrame::encode_signal(EapolPacketType::Start));
    bring_up(ctx, 1);

    let frames = ctx.drain_frames();
    assert_eq!(frames.len(), 1, "expected exactly the Request/Identity");
    let eap = EapolFrame::decode(&frames[0].pdu).unwrap();
    let req = EapPacket::decode(&eap.body).unwrap();
    assert_eq!(req.code, EapCode::Request);
    assert_eq!(req.identifier, 0);
    assert_eq!(req.eap_type().unwrap(), EapType::Identity);
    assert_eq!(req.type_data(), b"User name:");

    deliver_eap(ctx, 1, &build_response(0, EapType::Identity, b"alice"));
    let datagrams = ctx.drain_datagrams();
    assert_eq!(datagrams.len(), 1, "identity response must reach RADIUS");
    datagrams[0].data.clone()
}

#[test]
fn s1_identity_exchange_times_out_without_radius() {
    let mut ctx = context(AuthPortParams {
        server_timeout: 3,
        ..AuthPortParams::default()
    });
    to_first_access_request(&mut ctx);

    let counters = ctx.counters(1).unwrap();
    assert_eq!(counters.eapol_req_id_frames_tx, 1);
    assert_eq!(counters.eapol_resp_id_frames_rx, 1);
    assert_eq!(counters.eapol_start_frames_rx, 1);
    assert_eq!(ctx.port(1).unwrap().eap.aaa_identity, "alice");

    // The server never answers; aWhile runs out first.
    for _ in 0..3 {
        ctx.tick(Utc::now());
    }
    let port = ctx.port(1).unwrap();
    assert_eq!(port.pae_state, AuthPaeState::Held);
    assert_eq!(port.auth_port_status, PortStatus::Unauthorized);
    assert_eq!(port.quiet_while, u32::from(port.params.quiet_period));
    assert!(matches!(
        port.session.terminate_cause,
        SessionTerminateCause::NotTerminatedYet | SessionTerminateCause::ReauthFailed
    ));
}

#[test]
fn s2_force_auth_emits_canned_success_and_advances_id() {
    let mut ctx = context(AuthPortParams::default());
    bring_up(&mut ctx, 1);
    // The link-up conversation already delivered Request/Identity id 0.
    ctx.drain_frames();

    ctx.set_port_control(1, PortControl::ForceAuthorized, Apply::Commit)
        .unwrap();
    let frames = ctx.drain_frames();
    assert_eq!(frames.len(), 1);
    let eap = EapPacket::decode(&EapolFrame::decode(&frames[0].pdu).unwrap().body).unwrap();
    assert_eq!(eap.code, EapCode::Success);
    assert_eq!(eap.identifier, 1);
    assert_eq!(eap.len(), 4);
    assert_eq!(
        ctx.port(1).unwrap().auth_port_status,
        PortStatus::Authorized
    );

    // Another EAPOL-Start re-enters FORCE_AUTH with the next identifier.
    deliver_eapol(&mut ctx, 1, &EapolFrame::encode_signal(EapolPacketType::Start));
    let frames = ctx.drain_frames();
    assert_eq!(frames.len(), 1);
    let eap = EapPacket::decode(&EapolFrame::decode(&frames[0].pdu).unwrap().body).unwrap();
    assert_eq!(eap.code, EapCode::Success);
    assert_eq!(eap.identifier, 2);
}

#[test]
fn s3_logoff_from_authenticated_disconnects() {
    let mut ctx = context(AuthPortParams::default());
    let request = to_first_access_request(&mut ctx);
    let (id, req_auth) = request_fields(&request);

    // Server accepts immediately.
    let accept = build_reply(2, id, &req_auth, None, &[0x03, 0x01, 0x00, 0x04]);
    ctx.process_radius(server_addr(), &accept);

    {
        let port = ctx.port(1).unwrap();
        assert_eq!(port.pae_state, AuthPaeState::Authenticated);
        assert_eq!(port.auth_port_status, PortStatus::Authorized);
    }
    // The Accept-carried EAP Success reached the supplicant.
    let frames = ctx.drain_frames();
    assert_eq!(frames.len(), 1);
    let eap = EapPacket::decode(&EapolFrame::decode(&frames[0].pdu).unwrap().body).unwrap();
    assert_eq!(eap.code, EapCode::Success);

    deliver_eapol(&mut ctx, 1, &EapolFrame::encode_signal(EapolPacketType::Logoff));
    let port = ctx.port(1).unwrap();
    assert_eq!(port.auth_port_status, PortStatus::Unauthorized);
    assert_eq!(
        port.session.terminate_cause,
        SessionTerminateCause::SupplicantLogoff
    );
    assert_ne!(port.pae_state, AuthPaeState::Authenticated);
}

#[test]
fn s4_challenge_state_is_echoed_in_next_request() {
    let mut ctx = context(AuthPortParams::default());
    let request = to_first_access_request(&mut ctx);
    let (id, req_auth) = request_fields(&request);
    ctx.drain_frames();

    // Challenge carrying an MD5-Challenge request and a State attribute.
    let challenge_eap = {
        let mut td = vec![4u8];
        td.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        dot1x_eapol::build_request(1, EapType::Md5Challenge, &td)
    };
    let challenge = build_reply(11, id, &req_auth, Some(&[0x01, 0x02, 0x03]), &challenge_eap);
    ctx.process_radius(server_addr(), &challenge);

    {
        let port = ctx.port(1).unwrap();
        assert_eq!(port.server_state, vec![0x01, 0x02, 0x03]);
        assert_eq!(port.backend_state, BackendState::Request);
    }
    // The challenge was relayed to the supplicant unchanged.
    let frames = ctx.drain_frames();
    assert_eq!(frames.len(), 1);
    let relayed = EapolFrame::decode(&frames[0].pdu).unwrap();
    assert_eq!(relayed.body, challenge_eap);

    // Supplicant answers; the next Access-Request echoes the State.
    deliver_eap(&mut ctx, 1, &build_response(1, EapType::Md5Challenge, &[16u8; 17]));
    let datagrams = ctx.drain_datagrams();
    assert_eq!(datagrams.len(), 1);
    let attrs = &datagrams[0].data[RADIUS_HEADER_LEN..];
    assert_eq!(
        AttributeIter::find(attrs, types::STATE).unwrap().unwrap(),
        &[0x01, 0x02, 0x03]
    );
}

#[test]
fn s4_tampered_reply_is_silently_discarded() {
    let mut ctx = context(AuthPortParams::default());
    let request = to_first_access_request(&mut ctx);
    let (id, req_auth) = request_fields(&request);

    let challenge_eap = dot1x_eapol::build_request(1, EapType::Md5Challenge, &[4, 1, 2, 3, 4]);
    let mut challenge =
        build_reply(11, id, &req_auth, Some(&[0x01, 0x02, 0x03]), &challenge_eap);
    // Corrupt the Message-Authenticator value.
    let ma_offset = challenge.len() - 16;
    challenge[ma_offset] ^= 0xFF;
    ctx.process_radius(server_addr(), &challenge);

    let port = ctx.port(1).unwrap();
    assert!(port.server_state.is_empty());
    assert_eq!(port.eap.state(), EapAuthState::AaaIdle);
    assert!(port.aaa_outstanding);
}

#[test]
fn s6_access_request_retransmits_identically_then_times_out() {
    let mut ctx = context(AuthPortParams::default());
    let request = to_first_access_request(&mut ctx);

    // Four retransmissions, each byte-identical to the original.
    for _ in 0..4 {
        for _ in 0..5 {
            ctx.tick(Utc::now());
        }
        let resent = ctx.drain_datagrams();
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0].data, request);
    }

    // The fifth expiry gives up and fails the pass-through.
    for _ in 0..5 {
        ctx.tick(Utc::now());
    }
    assert!(ctx.drain_datagrams().is_empty());
    let port = ctx.port(1).unwrap();
    assert_eq!(port.eap.state(), EapAuthState::TimeoutFailure2);
    assert_eq!(port.pae_state, AuthPaeState::Held);
}

#[test]
fn radius_identifiers_are_unique_across_ports() {
    let mut ctx = context(AuthPortParams::default());

    for port in 1..=2 {
        deliver_eapol(&mut ctx, port, &EapolFrame::encode_signal(EapolPacketType::Start));
        ctx.set_link(port, true).unwrap();
    }
    ctx.tick(Utc::now());
    ctx.drain_frames();
    for port in 1..=2 {
        deliver_eap(&mut ctx, port, &build_response(0, EapType::Identity, b"alice"));
    }

    let datagrams = ctx.drain_datagrams();
    assert_eq!(datagrams.len(), 2);
    assert_ne!(datagrams[0].data[1], datagrams[1].data[1]);

    let a = ctx.port(1).unwrap();
    let b = ctx.port(2).unwrap();
    assert!(a.aaa_outstanding && b.aaa_outstanding);
    assert_ne!(a.aaa_req_id, b.aaa_req_id);
}

#[test]
fn management_rejects_out_of_range_values() {
    let mut ctx = context(AuthPortParams::default());
    assert!(ctx.set_re_auth_period(1, 5, Apply::Commit).is_err());
    assert!(ctx.set_re_auth_period(1, 100_000, Apply::ValidateOnly).is_err());
    assert!(ctx.set_server_timeout(1, 0, Apply::Commit).is_err());
    assert!(ctx.set_server_timeout(3, 30, Apply::Commit).is_err());

    // Validate-only leaves the committed value untouched.
    ctx.set_re_auth_period(1, 7200, Apply::ValidateOnly).unwrap();
    assert_eq!(ctx.port(1).unwrap().params.re_auth_period, 3600);
    ctx.set_re_auth_period(1, 7200, Apply::Commit).unwrap();
    assert_eq!(ctx.port(1).unwrap().params.re_auth_period, 7200);
}

#[test]
fn malformed_eapol_frames_only_bump_counters() {
    let mut ctx = context(AuthPortParams::default());
    bring_up(&mut ctx, 1);
    ctx.drain_frames();

    // Wrong destination MAC.
    let start = EapolFrame::encode_signal(EapolPacketType::Start);
    ctx.process_eapol(1, supp_mac(), supp_mac(), ETHERTYPE_EAPOL, &start)
        .unwrap();
    // Body shorter than declared.
    deliver_eapol(&mut ctx, 1, &[0x02, 0x00, 0x00, 0x20, 0x01]);
    // Unknown packet type.
    deliver_eapol(&mut ctx, 1, &[0x02, 0x07, 0x00, 0x00]);

    let counters = ctx.counters(1).unwrap();
    assert_eq!(counters.invalid_eapol_frames_rx, 2);
    assert_eq!(counters.eap_length_error_frames_rx, 1);
    assert_eq!(counters.eapol_start_frames_rx, 0);

    // Port 0 and ports past the end are configuration errors.
    assert!(ctx
        .process_eapol(0, supp_mac(), PAE_GROUP_ADDR, ETHERTYPE_EAPOL, &start)
        .is_err());
    assert!(ctx
        .process_eapol(9, supp_mac(), PAE_GROUP_ADDR, ETHERTYPE_EAPOL, &start)
        .is_err());
}

#[test]
fn reauth_timer_requests_reauthentication() {
    let mut ctx = context(AuthPortParams {
        re_auth_enabled: true,
        re_auth_period: 10,
        ..AuthPortParams::default()
    });
    let request = to_first_access_request(&mut ctx);
    let (id, req_auth) = request_fields(&request);
    let accept = build_reply(2, id, &req_auth, None, &[0x03, 0x01, 0x00, 0x04]);
    ctx.process_radius(server_addr(), &accept);
    assert_eq!(ctx.port(1).unwrap().pae_state, AuthPaeState::Authenticated);
    ctx.drain_frames();

    // reAuthWhen runs down while authenticated; expiry restarts the
    // conversation with a fresh Request/Identity.
    for _ in 0..10 {
        ctx.tick(Utc::now());
    }
    let port = ctx.port(1).unwrap();
    assert_eq!(
        port.session.terminate_cause,
        SessionTerminateCause::SupplicantRestart
    );
    let frames = ctx.drain_frames();
    assert!(!frames.is_empty());
    let eap = EapPacket::decode(&EapolFrame::decode(&frames[0].pdu).unwrap().body).unwrap();
    assert_eq!(eap.code, EapCode::Request);
    assert_eq!(eap.eap_type().unwrap(), EapType::Identity);
}
