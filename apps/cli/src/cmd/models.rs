//! `fleetbench models`: what every host has loaded.

use crate::Config;
use anyhow::Result;
use fcore::{CancellationToken, Provider};
use model::HostMux;

/// Print the loaded models of each configured host.
pub async fn run(config: &Config) -> Result<()> {
    let mux = HostMux::from_hosts(&config.hosts, &config.backend())?;
    let cancel = CancellationToken::new();

    for host in &config.hosts {
        match mux.loaded_models(host, &cancel).await {
            Ok(models) if models.is_empty() => println!("{}: (none)", host.label()),
            Ok(models) => println!("{}: {}", host.label(), models.join(", ")),
            Err(e) => println!("{}: error: {e:#}", host.label()),
        }
    }
    mux.close()
}
