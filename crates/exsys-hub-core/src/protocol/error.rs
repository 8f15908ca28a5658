//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to the hub
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unable to open serial device {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("Error while writing serial device: {0}")]
    Write(#[source] std::io::Error),

    #[error("Error while reading serial device: {0}")]
    Read(#[source] std::io::Error),

    #[error("No response from hub within {0} ms")]
    Timeout(u64),

    #[error("Connection closed before a full line was received")]
    ConnectionClosed,

    #[error("Response line exceeds {0} bytes")]
    ResponseTooLong(usize),

    #[error("Identify response has no version separator: '{0}'")]
    MissingVersionSeparator(String),

    #[error("Model code '{0}' does not end in a valid port count")]
    InvalidPortCount(String),

    #[error("Port state response must be 8 characters, got {0}: '{1}'")]
    InvalidStateLength(usize, String),

    #[error("Port state response is not hexadecimal: '{0}'")]
    InvalidHex(String),

    #[error("Response is not valid UTF-8")]
    InvalidEncoding,

    #[error("Port array has {actual} entries but the hub has {expected} ports")]
    PortCountMismatch { expected: u8, actual: usize },

    #[error("Hub has not been identified yet")]
    NotIdentified,

    #[error("Port state has not been read yet")]
    NoPortState,

    #[error("Port index {index} out of range for a {port_count}-port hub")]
    PortOutOfRange { index: usize, port_count: u8 },

    #[error("Hub rejected {command}: '{response}'")]
    CommandRejected {
        command: &'static str,
        response: String,
    },

    #[error("Password must be at most 8 ASCII characters")]
    InvalidPassword,
}

impl ProtocolError {
    /// True for failures of the serial line itself rather than of the reply
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProtocolError::Open { .. }
                | ProtocolError::Write(_)
                | ProtocolError::Read(_)
                | ProtocolError::Timeout(_)
                | ProtocolError::ConnectionClosed
                | ProtocolError::ResponseTooLong(_)
        )
    }
}

/// Reasons a port failed validation as an Exsys hub
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("cannot_connect: {0}")]
    CannotConnect(#[source] ProtocolError),

    #[error("invalid_response: {0}")]
    InvalidResponse(#[source] ProtocolError),
}

impl ProbeError {
    /// Short machine-readable reason
    pub fn code(&self) -> &'static str {
        match self {
            ProbeError::CannotConnect(_) => "cannot_connect",
            ProbeError::InvalidResponse(_) => "invalid_response",
        }
    }
}
