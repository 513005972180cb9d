//! Print every service that appears or disappears on the segment.
//!
//! Run with `cargo run -p diont --example listener -- --broadcast` to use
//! broadcast instead of multicast.

use diont::{Diont, DiontConfig, InterfaceAddressProvider, ServiceEvent, UdpTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("diont=debug")),
        )
        .init();

    let config = if std::env::args().any(|arg| arg == "--broadcast") {
        DiontConfig::broadcast()
    } else {
        DiontConfig::default()
    };
    let transport = UdpTransport::bind(&config)?;
    let diont = Diont::spawn(config, transport, InterfaceAddressProvider);

    diont
        .subscribe(ServiceEvent::ServiceAnnounced, |info| {
            println!("A new service was announced: {:?}", info.service);
        })
        .await?;
    diont
        .subscribe(ServiceEvent::ServiceRenounced, |info| {
            println!("A service was renounced: {:?}", info.service);
        })
        .await?;

    tokio::signal::ctrl_c().await?;
    for info in diont.service_infos().await? {
        println!("Known at exit: {}", info.id());
    }
    diont.shutdown();
    Ok(())
}
