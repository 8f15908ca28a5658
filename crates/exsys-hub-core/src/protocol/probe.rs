//! Device probe
//!
//! Checks that a serial port has an Exsys hub behind it before a session is
//! built for it.

use tracing::{debug, error};

use super::{codec, commands::Password, Command, ProbeError, Transport};
use crate::hub::HubIdentity;

/// Send one identify command and parse the reply
pub async fn probe(transport: &mut dyn Transport) -> Result<HubIdentity, ProbeError> {
    let frame = Command::Identify.frame(&Password::default(), "");
    let raw = transport.exchange(&frame).await.map_err(|e| {
        error!("Unable to connect to the serial device: {}", e);
        ProbeError::CannotConnect(e)
    })?;

    let identity = codec::response_text(&raw)
        .and_then(|text| codec::parse_identity(&text))
        .map_err(ProbeError::InvalidResponse)?;
    debug!("Probe found {}", identity);
    Ok(identity)
}
