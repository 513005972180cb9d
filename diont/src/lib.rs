//! Brokerless service discovery for a local network segment.
//!
//! Every instance both announces its own services and listens for its
//! peers' over UDP multicast (or broadcast). There is no central registry:
//! each instance rebuilds its own view from the announce, renounce and query
//! messages it receives, and notifies listeners as services appear and
//! disappear.
//!
//! # Example
//!
//! ```no_run
//! use diont::{Diont, DiontConfig, InterfaceAddressProvider, ServiceEvent, UdpTransport};
//! use shared::types::ServiceRecord;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DiontConfig::default();
//!     let transport = UdpTransport::bind(&config)?;
//!     let diont = Diont::spawn(config, transport, InterfaceAddressProvider);
//!
//!     diont
//!         .subscribe(ServiceEvent::ServiceAnnounced, |info| {
//!             println!("new service: {:?}", info.service);
//!         })
//!         .await?;
//!
//!     let id = diont
//!         .announce_service(ServiceRecord::new("TestServer", "", "1233"))
//!         .await?;
//!     diont.renounce_service(id).await?;
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
mod handle;
mod instance;
pub mod registry;
pub mod transport;

pub use address::{AddressProvider, InterfaceAddressProvider, StaticAddressProvider};
pub use config::DiontConfig;
pub use engine::{Engine, RenounceTarget};
pub use error::{DiontError, Result};
pub use events::{ServiceEvent, SubscriptionId};
pub use handle::Diont;
pub use registry::Registry;
pub use transport::{MemoryNetwork, MemoryTransport, Transport, UdpTransport};
