//! Hub identity, port state and session phase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Model and firmware reported by the hub's identify command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubIdentity {
    /// Model code, ending in the two-digit port count (e.g. "USB16")
    pub model_code: String,
    /// Number of switchable ports
    pub port_count: u8,
    /// Firmware version, including the leading 'v'
    pub firmware_version: String,
}

impl fmt::Display for HubIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} ports, firmware {})",
            self.model_code, self.port_count, self.firmware_version
        )
    }
}

/// Power state of every port; index 0 is physical port 1
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortState(Vec<bool>);

impl PortState {
    /// Wrap one flag per port
    pub fn new(ports: Vec<bool>) -> Self {
        Self(ports)
    }

    /// Number of ports
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no ports are described
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// State of the port at `index`
    pub fn get(&self, index: usize) -> Option<bool> {
        self.0.get(index).copied()
    }

    /// The flags as a slice
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Iterate over the flags in port order
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    /// Copy with a single port changed, or `None` if `index` is out of range
    pub fn with_port(&self, index: usize, on: bool) -> Option<Self> {
        let mut ports = self.0.clone();
        *ports.get_mut(index)? = on;
        Some(Self(ports))
    }

    /// 1-based numbers of the powered ports
    pub fn powered_ports(&self) -> Vec<usize> {
        self.iter()
            .enumerate()
            .filter_map(|(i, on)| on.then_some(i + 1))
            .collect()
    }
}

impl From<Vec<bool>> for PortState {
    fn from(ports: Vec<bool>) -> Self {
        Self(ports)
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, on) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}", i + 1, if on { "on" } else { "off" })?;
        }
        Ok(())
    }
}

/// Bring-up progress of a hub session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Constructed, nothing sent yet
    #[default]
    Uninitialized,
    /// Identify command in progress
    Identifying,
    /// Initial port state read in progress
    ReadingState,
    /// Identified and port state known
    Ready,
    /// Bring-up did not produce a valid response
    Failed,
}
