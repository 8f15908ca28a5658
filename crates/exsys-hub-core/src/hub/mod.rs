//! Hub session
//!
//! Ties the protocol pieces together: identifies the hub, caches its port
//! states and exposes the hub's operations as plain `bool`/`Option` results.

mod session;
mod types;

pub use session::HubSession;
pub use types::{HubIdentity, PortState, SessionPhase};
