//! Per-context worker tasks.
//!
//! One task owns the context and both endpoints. Everything that
//! mutates port state funnels through its select loop: received EAPOL
//! frames, received RADIUS datagrams, the 1 Hz tick, and management
//! commands. After every event the outbound queues are flushed, so the
//! engine stays single-threaded exactly as the standard's "evaluate
//! until stable" model assumes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use dot1x_pae::{AuthenticatorContext, SupplicantContext};
use dot1x_types::params::Apply;

use crate::endpoint::{L2Sink, RxFrame, UdpEndpoint};
use crate::error::{DaemonError, Result};
use crate::management::{MgmtCommand, MgmtRequest, MgmtResponse, PortStatusReport};

/// Largest RADIUS datagram we accept off the socket.
const UDP_BUF_SIZE: usize = 4096;

/// Handle for talking to a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    mgmt_tx: mpsc::Sender<MgmtCommand>,
}

impl WorkerHandle {
    /// Sends a management request and awaits the reply.
    pub async fn request(
        &self,
        port: u16,
        request: MgmtRequest,
        apply: Apply,
    ) -> Result<MgmtResponse> {
        let (reply, rx) = oneshot::channel();
        self.mgmt_tx
            .send(MgmtCommand {
                port,
                request,
                apply,
                reply,
            })
            .await
            .map_err(|_| DaemonError::WorkerStopped)?;
        rx.await.map_err(|_| DaemonError::WorkerStopped)
    }
}

/// The authenticator worker.
pub struct AuthWorker {
    ctx: AuthenticatorContext,
    frames: mpsc::Receiver<RxFrame>,
    l2: Box<dyn L2Sink>,
    udp: Arc<dyn UdpEndpoint>,
    mgmt: mpsc::Receiver<MgmtCommand>,
}

impl AuthWorker {
    /// Creates the worker and its handle. All ports start with the link
    /// considered up; the first tick brings them into service.
    pub fn new(
        mut ctx: AuthenticatorContext,
        frames: mpsc::Receiver<RxFrame>,
        l2: Box<dyn L2Sink>,
        udp: Arc<dyn UdpEndpoint>,
    ) -> (Self, WorkerHandle) {
        for port in 1..=ctx.num_ports() {
            let _ = ctx.set_link(port, true);
        }
        let (mgmt_tx, mgmt) = mpsc::channel(16);
        (
            Self {
                ctx,
                frames,
                l2,
                udp,
                mgmt,
            },
            WorkerHandle { mgmt_tx },
        )
    }

    /// Runs until the capture dies or every handle is dropped.
    pub async fn run(mut self) -> Result<()> {
        info!("authenticator worker started");
        let mut tick = interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut buf = vec![0u8; UDP_BUF_SIZE];

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.ctx.tick(Utc::now());
                }
                frame = self.frames.recv() => {
                    let Some(frame) = frame else {
                        warn!("L2 endpoint closed, stopping worker");
                        break;
                    };
                    self.handle_frame(frame);
                }
                received = self.udp.recv_from(&mut buf) => {
                    match received {
                        Ok((len, src)) => {
                            let data = buf[..len].to_vec();
                            self.ctx.process_radius(src, &data);
                        }
                        Err(e) => warn!(error = %e, "UDP receive error"),
                    }
                }
                cmd = self.mgmt.recv() => {
                    let Some(cmd) = cmd else {
                        info!("management channel closed, stopping worker");
                        break;
                    };
                    self.handle_mgmt(cmd);
                }
            }
            self.flush().await;
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame: RxFrame) {
        let port = frame.port.unwrap_or(1);
        if let Err(e) = self.ctx.process_eapol(
            port,
            frame.src,
            frame.dest,
            frame.ethertype,
            &frame.pdu,
        ) {
            warn!(port, error = %e, "EAPOL frame rejected");
        }
    }

    fn handle_mgmt(&mut self, cmd: MgmtCommand) {
        let MgmtCommand {
            port,
            request,
            apply,
            reply,
        } = cmd;
        let response = self.dispatch(port, &request, apply);
        let _ = reply.send(response);
    }

    fn dispatch(&mut self, port: u16, request: &MgmtRequest, apply: Apply) -> MgmtResponse {
        use MgmtRequest as R;
        let outcome = match *request {
            R::Initialize => self.ctx.set_initialize(port, apply),
            R::Reauthenticate => self.ctx.set_reauthenticate(port, apply),
            R::SetPortControl(value) => self.ctx.set_port_control(port, value, apply),
            R::SetQuietPeriod(value) => self.ctx.set_quiet_period(port, value, apply),
            R::SetServerTimeout(value) => self.ctx.set_server_timeout(port, value, apply),
            R::SetReauthPeriod(value) => self.ctx.set_re_auth_period(port, value, apply),
            R::SetReauthEnabled(value) => self.ctx.set_re_auth_enabled(port, value, apply),
            R::SetKeyTxEnabled(value) => self.ctx.set_key_tx_enabled(port, value, apply),
            R::SetUserLogoff(_) => {
                return MgmtResponse::Error("user logoff applies to the supplicant role".into());
            }
            R::GetCounters => {
                return match self.ctx.counters(port) {
                    Ok(counters) => MgmtResponse::Counters(counters),
                    Err(e) => MgmtResponse::Error(e.to_string()),
                };
            }
            R::GetSessionStats => {
                return match self.ctx.session_stats(port) {
                    Ok(stats) => MgmtResponse::Session(stats),
                    Err(e) => MgmtResponse::Error(e.to_string()),
                };
            }
            R::GetStatus => {
                return match self.ctx.port(port) {
                    Ok(p) => MgmtResponse::Status(PortStatusReport::new(
                        p.index,
                        p.auth_port_status,
                        p.port_mode,
                        p.pae_state,
                        p.backend_state,
                        p.reauth_state,
                        p.eap.state(),
                    )),
                    Err(e) => MgmtResponse::Error(e.to_string()),
                };
            }
        };
        match outcome {
            Ok(()) => MgmtResponse::Done,
            Err(e) => MgmtResponse::Error(e.to_string()),
        }
    }

    async fn flush(&mut self) {
        for frame in self.ctx.drain_frames() {
            debug!(port = frame.port, len = frame.pdu.len(), "sending EAPOL frame");
            if let Err(e) = self.l2.send(&frame).await {
                warn!(port = frame.port, error = %e, "EAPOL send failed");
            }
        }
        for datagram in self.ctx.drain_datagrams() {
            debug!(dest = %datagram.dest, len = datagram.data.len(), "sending RADIUS datagram");
            if let Err(e) = self.udp.send_to(&datagram.data, datagram.dest).await {
                warn!(dest = %datagram.dest, error = %e, "RADIUS send failed");
            }
        }
    }
}

/// The supplicant worker: same loop without the RADIUS side.
pub struct SuppWorker {
    ctx: SupplicantContext,
    frames: mpsc::Receiver<RxFrame>,
    l2: Box<dyn L2Sink>,
    mgmt: mpsc::Receiver<MgmtCommand>,
}

impl SuppWorker {
    /// Creates the worker and its handle.
    pub fn new(
        mut ctx: SupplicantContext,
        frames: mpsc::Receiver<RxFrame>,
        l2: Box<dyn L2Sink>,
    ) -> (Self, WorkerHandle) {
        for port in 1..=ctx.num_ports() {
            let _ = ctx.set_link(port, true);
        }
        let (mgmt_tx, mgmt) = mpsc::channel(16);
        (
            Self {
                ctx,
                frames,
                l2,
                mgmt,
            },
            WorkerHandle { mgmt_tx },
        )
    }

    /// Runs until the capture dies or every handle is dropped.
    pub async fn run(mut self) -> Result<()> {
        info!(ports = self.ctx.num_ports(), "supplicant worker started");
        let mut tick = interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.ctx.tick(Utc::now());
                }
                frame = self.frames.recv() => {
                    let Some(frame) = frame else {
                        warn!("L2 endpoint closed, stopping worker");
                        break;
                    };
                    let port = frame.port.unwrap_or(1);
                    if let Err(e) = self.ctx.process_eapol(
                        port,
                        frame.src,
                        frame.dest,
                        frame.ethertype,
                        &frame.pdu,
                    ) {
                        warn!(port, error = %e, "EAPOL frame rejected");
                    }
                }
                cmd = self.mgmt.recv() => {
                    let Some(cmd) = cmd else {
                        info!("management channel closed, stopping worker");
                        break;
                    };
                    self.handle_mgmt(cmd);
                }
            }
            self.flush().await;
        }
        Ok(())
    }

    fn handle_mgmt(&mut self, cmd: MgmtCommand) {
        use MgmtRequest as R;
        let MgmtCommand {
            port,
            request,
            apply,
            reply,
        } = cmd;
        let response = match request {
            R::Initialize => match self.ctx.set_initialize(port, apply) {
                Ok(()) => MgmtResponse::Done,
                Err(e) => MgmtResponse::Error(e.to_string()),
            },
            R::SetUserLogoff(value) => match self.ctx.set_user_logoff(port, value, apply) {
                Ok(()) => MgmtResponse::Done,
                Err(e) => MgmtResponse::Error(e.to_string()),
            },
            R::GetCounters => match self.ctx.counters(port) {
                Ok(counters) => MgmtResponse::Counters(counters),
                Err(e) => MgmtResponse::Error(e.to_string()),
            },
            R::GetSessionStats => match self.ctx.session_stats(port) {
                Ok(stats) => MgmtResponse::Session(stats),
                Err(e) => MgmtResponse::Error(e.to_string()),
            },
            _ => MgmtResponse::Error("request applies to the authenticator role".into()),
        };
        let _ = reply.send(response);
    }

    async fn flush(&mut self) {
        for frame in self.ctx.drain_frames() {
            debug!(port = frame.port, len = frame.pdu.len(), "sending EAPOL frame");
            if let Err(e) = self.l2.send(&frame).await {
                warn!(port = frame.port, error = %e, "EAPOL send failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use tokio::time::timeout;

    use dot1x_eapol::{
        build_response, EapCode, EapPacket, EapType, EapolFrame, EapolPacketType,
    };
    use dot1x_pae::{AuthenticatorConfig, TxEapolFrame};
    use dot1x_types::net::{ETHERTYPE_EAPOL, PAE_GROUP_ADDR};
    use dot1x_types::params::AuthPortParams;
    use dot1x_types::MacAddress;

    struct MockSink(Arc<Mutex<Vec<TxEapolFrame>>>);

    #[async_trait]
    impl L2Sink for MockSink {
        async fn send(&mut self, frame: &TxEapolFrame) -> Result<()> {
            self.0.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    struct MockUdp(Arc<Mutex<Vec<Vec<u8>>>>);

    #[async_trait]
    impl UdpEndpoint for MockUdp {
        async fn send_to(&self, data: &[u8], _dest: SocketAddr) -> Result<()> {
            self.0.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        async fn recv_from(&self, _buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
            std::future::pending().await
        }
    }

    fn test_config() -> AuthenticatorConfig {
        AuthenticatorConfig {
            interface: "eth0".to_string(),
            local_mac: MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            nas_address: "192.168.1.1".parse().unwrap(),
            server: "192.168.1.10:1812".parse().unwrap(),
            shared_secret: "testing123".to_string(),
            framed_mtu: 1400,
            num_ports: 1,
            params: AuthPortParams::default(),
        }
    }

    async fn wait_for<T>(
        store: &Arc<Mutex<Vec<T>>>,
        check: impl Fn(&[T]) -> bool,
    ) {
        timeout(Duration::from_secs(5), async {
            loop {
                if check(&store.lock().unwrap()) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn worker_drives_identity_exchange_to_radius() {
        let ctx = AuthenticatorContext::new(test_config()).unwrap();
        let sent_frames = Arc::new(Mutex::new(Vec::new()));
        let sent_datagrams = Arc::new(Mutex::new(Vec::new()));
        let (frame_tx, frame_rx) = mpsc::channel(16);

        let (worker, handle) = AuthWorker::new(
            ctx,
            frame_rx,
            Box::new(MockSink(sent_frames.clone())),
            Arc::new(MockUdp(sent_datagrams.clone())),
        );
        let task = tokio::spawn(worker.run());

        // The first tick starts the conversation with Request/Identity.
        wait_for(&sent_frames, |frames| {
            frames.iter().any(|f| {
                let eapol = EapolFrame::decode(&f.pdu).unwrap();
                eapol.packet_type == EapolPacketType::EapPacket
                    && EapPacket::decode(&eapol.body)
                        .map(|p| p.code == EapCode::Request)
                        .unwrap_or(false)
            })
        })
        .await;

        // The supplicant answers; the worker must ship an Access-Request.
        let response = build_response(0, EapType::Identity, b"alice");
        frame_tx
            .send(RxFrame {
                src: MacAddress::new([0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB]),
                dest: PAE_GROUP_ADDR,
                ethertype: ETHERTYPE_EAPOL,
                port: None,
                pdu: EapolFrame::encode(EapolPacketType::EapPacket, &response),
            })
            .await
            .unwrap();

        wait_for(&sent_datagrams, |datagrams| {
            datagrams.iter().any(|d| d.first() == Some(&1))
        })
        .await;

        // Management path answers with a status snapshot.
        let status = handle
            .request(1, MgmtRequest::GetStatus, Apply::Commit)
            .await
            .unwrap();
        assert!(matches!(status, MgmtResponse::Status(_)));

        drop(handle);
        drop(frame_tx);
        timeout(Duration::from_secs(5), task)
            .await
            .expect("worker did not stop")
            .unwrap()
            .unwrap();
    }
}
