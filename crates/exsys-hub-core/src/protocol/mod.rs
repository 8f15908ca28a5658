//! Serial Protocol Communication
//!
//! Implements the Exsys managed hub command set: short ASCII mnemonics
//! terminated by a carriage return, answered by one newline-terminated line.
//!
//! Port power states travel as a 32-bit mask written in 8 hex digits with
//! the byte pairs reversed (see [`codec`]).

pub mod codec;
pub mod commands;
mod error;
mod probe;
pub mod serial;
mod serializer;
mod transport;

pub use commands::Command;
pub use error::{ProbeError, ProtocolError};
pub use probe::probe;
pub use serial::{list_ports, open_port, PortInfo};
pub use serializer::{CommandSerializer, Turn};
pub use transport::{SerialTransport, Transport};

/// Baud rate of the hub's management port
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Time allowed for the hub to answer one command, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Factory default management password
pub const DEFAULT_PASSWORD: &str = "pass";

/// Width of the password field on the wire
pub const PASSWORD_FIELD_LEN: usize = 8;

/// Terminator appended to every outbound command
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Terminator of every response line
pub const RESPONSE_TERMINATOR: u8 = b'\n';

/// Highest port count the 32-bit state word can describe
pub const MAX_PORTS: u8 = 32;

/// Longest response line accepted before the read is abandoned
pub const MAX_RESPONSE_LEN: usize = 256;
