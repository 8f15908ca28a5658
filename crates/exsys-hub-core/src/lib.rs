//! # Exsys Hub Core Library
//!
//! Core functionality for controlling Exsys managed USB hubs over a serial line.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - The hub's ASCII command set and its hex port-mask codec
//! - A serial transport with a single-outstanding-request serializer
//! - A hub session that tracks identity and per-port power state
//! - Serial port discovery and device probing
//! - A simulated hub for demo mode and tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use exsys_hub_core::{hub::HubSession, protocol::SerialTransport};
//!
//! let transport = SerialTransport::new("/dev/ttyUSB0", 9600);
//! let hub = HubSession::new("Bench hub", "/dev/ttyUSB0", Box::new(transport));
//! hub.setup().await?;
//!
//! // Power on physical port 4
//! hub.set_port_state(3, true).await;
//! println!("{}", hub.get_hub_state().await.unwrap_or_default());
//! ```

pub mod config;
pub mod demo;
pub mod hub;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::HubConfig;
    pub use crate::demo::SimulatedHub;
    pub use crate::hub::{HubIdentity, HubSession, PortState, SessionPhase};
    pub use crate::protocol::{
        list_ports, probe, CommandSerializer, ProtocolError, SerialTransport, Transport,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
