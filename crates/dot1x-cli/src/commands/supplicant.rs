//! `dot1x supplicant` - run the supplicant.

use color_eyre::eyre::{eyre, Result};
use tracing::info;

use dot1x_daemon::endpoint::PcapEndpoint;
use dot1x_daemon::SuppWorker;
use dot1x_pae::{SupplicantConfig, SupplicantContext};

use crate::app::RunArgs;
use crate::commands::load_config;

/// Runs the supplicant until interrupted.
pub async fn run(args: RunArgs) -> Result<()> {
    let config = load_config(args.config)?;
    let section = config
        .supplicant
        .clone()
        .ok_or_else(|| eyre!("supplicant role needs a [supplicant] section"))?;
    if config.interface.mac.is_zero() {
        return Err(eyre!("interface.mac must be set"));
    }

    let peer = section.peer_config()?;
    let ctx = SupplicantContext::new(SupplicantConfig {
        interface: config.interface.name.clone(),
        local_mac: config.interface.mac,
        num_ports: config.interface.ports,
        params: section.params.clone(),
        peer,
    })?;

    let (frames, sink) = PcapEndpoint::open(&config.interface.name)?;
    info!(
        interface = %config.interface.name,
        identity = %section.identity,
        "supplicant starting"
    );

    let (worker, handle) = SuppWorker::new(ctx, frames, Box::new(sink));
    let task = tokio::spawn(worker.run());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    drop(handle);
    task.await??;
    Ok(())
}
