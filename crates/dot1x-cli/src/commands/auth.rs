//! `dot1x auth` - run the authenticator.

use std::sync::Arc;

use color_eyre::eyre::{eyre, Result};
use tracing::info;

use dot1x_daemon::endpoint::{PcapEndpoint, TokioUdpEndpoint};
use dot1x_daemon::AuthWorker;
use dot1x_pae::{AuthenticatorConfig, AuthenticatorContext};

use crate::app::RunArgs;
use crate::commands::load_config;

/// Runs the authenticator until interrupted.
pub async fn run(args: RunArgs) -> Result<()> {
    let config = load_config(args.config)?;
    let radius = config
        .radius
        .clone()
        .ok_or_else(|| eyre!("authenticator role needs a [radius] section"))?;
    if config.interface.mac.is_zero() {
        return Err(eyre!("interface.mac must be set"));
    }

    let ctx = AuthenticatorContext::new(AuthenticatorConfig {
        interface: config.interface.name.clone(),
        local_mac: config.interface.mac,
        nas_address: radius.nas_address,
        server: radius.server,
        shared_secret: radius.secret,
        framed_mtu: radius.framed_mtu,
        num_ports: config.interface.ports,
        params: config.authenticator.clone(),
    })?;

    let (frames, sink) = PcapEndpoint::open(&config.interface.name)?;
    let udp = TokioUdpEndpoint::bind(radius.server).await?;
    info!(
        interface = %config.interface.name,
        ports = config.interface.ports,
        server = %radius.server,
        "authenticator starting"
    );

    let (worker, handle) = AuthWorker::new(ctx, frames, Box::new(sink), Arc::new(udp));
    let task = tokio::spawn(worker.run());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    drop(handle);
    task.await??;
    Ok(())
}
