//! Announce a service, then renounce it five seconds later.

use std::time::Duration;
use diont::{Diont, DiontConfig, InterfaceAddressProvider, UdpTransport};
use shared::types::ServiceRecord;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("diont=info")),
        )
        .init();

    let config = DiontConfig::default();
    let transport = UdpTransport::bind(&config)?;
    let diont = Diont::spawn(config, transport, InterfaceAddressProvider);

    // Host is left empty and filled with this machine's address.
    let service = ServiceRecord::new("TestServer 1", "", "1231")
        .with_metadata("someAdditionalInfo", "Any value is allowed");
    let id = diont.announce_service(service).await?;
    println!("Announced {}", id);

    tokio::time::sleep(Duration::from_secs(5)).await;
    diont.renounce_service(id).await?;

    // Give the renouncement time to leave before the socket closes.
    tokio::time::sleep(Duration::from_millis(100)).await;
    diont.shutdown();
    Ok(())
}
