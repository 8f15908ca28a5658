//! Wire codec
//!
//! Pure conversions between hub responses/payloads and domain values.
//!
//! The port mask is a 32-bit word (bit `i` = port `i + 1`) written as 8 hex
//! digits. On the wire the digits of every pair are swapped and the whole
//! string is reversed, so `0x78563412` travels as `"12345678"`. Bits at or
//! above the hub's port count are always sent as 1.

use super::{ProtocolError, MAX_PORTS};
use crate::hub::HubIdentity;

/// Number of characters in a packed port mask
pub const MASK_TEXT_LEN: usize = 8;

/// Separator between model code and firmware version in the identify reply
pub const VERSION_SEPARATOR: char = 'v';

/// Swap the two characters of every pair: `"abcdef"` -> `"badcfe"`.
///
/// A trailing unpaired character is kept in place.
pub fn swap_pairs(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(2)
        .flat_map(|pair| pair.iter().rev())
        .collect()
}

/// Unpack an 8-character wire mask into the port word
pub fn unpack_mask(text: &str) -> Result<u32, ProtocolError> {
    let len = text.chars().count();
    if len != MASK_TEXT_LEN {
        return Err(ProtocolError::InvalidStateLength(len, text.to_string()));
    }
    if !text.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProtocolError::InvalidHex(text.to_string()));
    }
    let reordered: String = swap_pairs(text).chars().rev().collect();
    u32::from_str_radix(&reordered, 16).map_err(|_| ProtocolError::InvalidHex(text.to_string()))
}

/// Pack a port word into its 8-character wire form (inverse of [`unpack_mask`])
pub fn pack_mask(mask: u32) -> String {
    let hex = format!("{:08X}", mask);
    swap_pairs(&hex).chars().rev().collect()
}

/// Bits that do not correspond to a physical port
pub fn unused_port_mask(port_count: u8) -> u32 {
    u32::MAX.checked_shl(u32::from(port_count)).unwrap_or(0)
}

/// Decode a `GP` response into one boolean per port
pub fn decode_port_state(text: &str, port_count: Option<u8>) -> Result<Vec<bool>, ProtocolError> {
    let port_count = port_count.ok_or(ProtocolError::NotIdentified)?;
    let mask = unpack_mask(text)?;
    Ok((0..u32::from(port_count))
        .map(|bit| (mask >> bit) & 1 == 1)
        .collect())
}

/// Encode a full port array into the `SP` payload
pub fn encode_port_state(ports: &[bool], port_count: Option<u8>) -> Result<String, ProtocolError> {
    let port_count = port_count.ok_or(ProtocolError::NotIdentified)?;
    if ports.len() != usize::from(port_count) {
        return Err(ProtocolError::PortCountMismatch {
            expected: port_count,
            actual: ports.len(),
        });
    }
    let mask = ports
        .iter()
        .enumerate()
        .filter(|(_, on)| **on)
        .fold(0u32, |acc, (bit, _)| acc | (1u32 << bit));
    Ok(pack_mask(mask | unused_port_mask(port_count)))
}

/// Parse a `?Q` response such as `"USB16v1.2.3"`
pub fn parse_identity(text: &str) -> Result<HubIdentity, ProtocolError> {
    let (model_code, firmware) = text
        .split_once(VERSION_SEPARATOR)
        .ok_or_else(|| ProtocolError::MissingVersionSeparator(text.to_string()))?;

    let port_count = parse_port_count(model_code)
        .ok_or_else(|| ProtocolError::InvalidPortCount(model_code.to_string()))?;

    Ok(HubIdentity {
        model_code: model_code.to_string(),
        port_count,
        firmware_version: format!("{}{}", VERSION_SEPARATOR, firmware),
    })
}

/// The last two characters of the model code, read as a decimal port count
fn parse_port_count(model_code: &str) -> Option<u8> {
    let bytes = model_code.as_bytes();
    if bytes.len() < 2 || !bytes[bytes.len() - 2..].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let count: u8 = model_code[bytes.len() - 2..].parse().ok()?;
    (1..=MAX_PORTS).contains(&count).then_some(count)
}

/// Convert a raw response line to trimmed text
pub fn response_text(raw: &[u8]) -> Result<String, ProtocolError> {
    std::str::from_utf8(raw)
        .map(|s| s.trim().to_string())
        .map_err(|_| ProtocolError::InvalidEncoding)
}

/// Mutating commands succeed when the reply starts with 'G'
pub fn is_acknowledged(text: &str) -> bool {
    text.starts_with('G')
}
