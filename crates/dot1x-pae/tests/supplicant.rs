//! Supplicant end-to-end scenarios: EAPOL-Start pacing, the EAP
//! conversation through the peer machine, and the hold-off behaviour.

use chrono::Utc;
use md5::{Digest, Md5};

use dot1x_eap::PeerConfig;
use dot1x_eapol::{
    build_failure, build_request, build_success, EapCode, EapPacket, EapType, EapolFrame,
    EapolPacketType,
};
use dot1x_pae::{SuppPaeState, SupplicantConfig, SupplicantContext};
use dot1x_types::net::{ETHERTYPE_EAPOL, PAE_GROUP_ADDR};
use dot1x_types::params::{Apply, PortStatus, SuppPortParams};
use dot1x_types::MacAddress;

fn auth_mac() -> MacAddress {
    MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])
}

fn context() -> SupplicantContext {
    SupplicantContext::new(SupplicantConfig {
        interface: "eth0".to_string(),
        local_mac: MacAddress::new([0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB]),
        num_ports: 1,
        params: SuppPortParams::default(),
        peer: PeerConfig {
            identity: "alice".into(),
            password: Some("secret".into()),
            allowed_methods: vec![EapType::Md5Challenge],
            ..PeerConfig::default()
        },
    })
    .unwrap()
}

fn bring_up(ctx: &mut SupplicantContext) {
    ctx.set_link(1, true).unwrap();
    ctx.tick(Utc::now());
}

fn deliver_eap(ctx: &mut SupplicantContext, eap: &[u8]) {
    let pdu = EapolFrame::encode(EapolPacketType::EapPacket, eap);
    ctx.process_eapol(1, auth_mac(), PAE_GROUP_ADDR, ETHERTYPE_EAPOL, &pdu)
        .unwrap();
}

fn single_eap_frame(ctx: &mut SupplicantContext) -> EapPacket {
    let frames = ctx.drain_frames();
    assert_eq!(frames.len(), 1);
    let eapol = EapolFrame::decode(&frames[0].pdu).unwrap();
    assert_eq!(eapol.packet_type, EapolPacketType::EapPacket);
    EapPacket::decode(&eapol.body).unwrap()
}

#[test]
fn link_up_sends_eapol_start() {
    let mut ctx = context();
    bring_up(&mut ctx);

    let frames = ctx.drain_frames();
    assert_eq!(frames.len(), 1);
    let eapol = EapolFrame::decode(&frames[0].pdu).unwrap();
    assert_eq!(eapol.packet_type, EapolPacketType::Start);
    assert_eq!(frames[0].dest, PAE_GROUP_ADDR);
    assert_eq!(ctx.port(1).unwrap().pae_state, SuppPaeState::Connecting);
}

#[test]
fn md5_conversation_reaches_authenticated() {
    let mut ctx = context();
    bring_up(&mut ctx);
    ctx.drain_frames();

    // Request/Identity.
    deliver_eap(&mut ctx, &build_request(0, EapType::Identity, b"User name:"));
    let resp = single_eap_frame(&mut ctx);
    assert_eq!(resp.code, EapCode::Response);
    assert_eq!(resp.eap_type().unwrap(), EapType::Identity);
    assert_eq!(resp.type_data(), b"alice");

    // MD5-Challenge.
    let challenge = [0xC0, 0xFF, 0xEE, 0x00];
    let mut td = vec![challenge.len() as u8];
    td.extend_from_slice(&challenge);
    deliver_eap(&mut ctx, &build_request(1, EapType::Md5Challenge, &td));
    let resp = single_eap_frame(&mut ctx);
    assert_eq!(resp.eap_type().unwrap(), EapType::Md5Challenge);
    let mut md5 = Md5::new();
    md5.update([1u8]);
    md5.update(b"secret");
    md5.update(challenge);
    let expected: [u8; 16] = md5.finalize().into();
    assert_eq!(&resp.type_data()[1..17], &expected);

    // Success.
    deliver_eap(&mut ctx, &build_success(1));
    let port = ctx.port(1).unwrap();
    assert_eq!(port.pae_state, SuppPaeState::Authenticated);
    assert_eq!(port.supp_port_status, PortStatus::Authorized);
}

#[test]
fn failure_holds_then_retries() {
    let mut ctx = context();
    bring_up(&mut ctx);
    ctx.drain_frames();

    deliver_eap(&mut ctx, &build_request(0, EapType::Identity, b""));
    ctx.drain_frames();
    deliver_eap(&mut ctx, &build_request(1, EapType::Md5Challenge, &[4, 1, 2, 3, 4]));
    ctx.drain_frames();
    deliver_eap(&mut ctx, &build_failure(1));

    let port = ctx.port(1).unwrap();
    assert_eq!(port.pae_state, SuppPaeState::Held);
    assert_eq!(port.supp_port_status, PortStatus::Unauthorized);
    let held = port.params.held_period;
    assert_eq!(port.held_while, held);

    // The hold expires and the supplicant starts over.
    for _ in 0..held {
        ctx.tick(Utc::now());
    }
    let port = ctx.port(1).unwrap();
    assert_eq!(port.pae_state, SuppPaeState::Connecting);
    let frames = ctx.drain_frames();
    assert!(frames
        .iter()
        .any(|f| EapolFrame::decode(&f.pdu).unwrap().packet_type == EapolPacketType::Start));
}

#[test]
fn silent_network_exhausts_starts_then_authorizes() {
    let mut ctx = context();
    bring_up(&mut ctx);

    let start_period = ctx.port(1).unwrap().params.start_period;
    let max_start = ctx.port(1).unwrap().params.max_start;

    // Two more EAPOL-Starts fire as startWhen expires...
    for _ in 1..max_start {
        for _ in 0..start_period {
            ctx.tick(Utc::now());
        }
    }
    let starts = ctx
        .drain_frames()
        .iter()
        .filter(|f| EapolFrame::decode(&f.pdu).unwrap().packet_type == EapolPacketType::Start)
        .count();
    assert_eq!(starts as u32, max_start);

    // ...then the supplicant concludes there is no authenticator.
    for _ in 0..start_period {
        ctx.tick(Utc::now());
    }
    let port = ctx.port(1).unwrap();
    assert_eq!(port.pae_state, SuppPaeState::Authenticated);
    assert_eq!(port.supp_port_status, PortStatus::Authorized);
}

#[test]
fn user_logoff_sends_eapol_logoff() {
    let mut ctx = context();
    bring_up(&mut ctx);
    ctx.drain_frames();
    deliver_eap(&mut ctx, &build_request(0, EapType::Identity, b""));
    ctx.drain_frames();

    ctx.set_user_logoff(1, true, Apply::Commit).unwrap();
    let frames = ctx.drain_frames();
    assert!(frames
        .iter()
        .any(|f| EapolFrame::decode(&f.pdu).unwrap().packet_type == EapolPacketType::Logoff));
    let port = ctx.port(1).unwrap();
    assert_eq!(port.pae_state, SuppPaeState::Logoff);
    assert_eq!(port.supp_port_status, PortStatus::Unauthorized);
}

#[test]
fn responses_from_the_wire_are_discarded() {
    let mut ctx = context();
    bring_up(&mut ctx);
    ctx.drain_frames();

    // A Response code is never acted on by a supplicant.
    deliver_eap(
        &mut ctx,
        &dot1x_eapol::build_response(0, EapType::Identity, b"mallory"),
    );
    assert!(ctx.drain_frames().is_empty());
    assert_eq!(ctx.port(1).unwrap().pae_state, SuppPaeState::Connecting);
}
