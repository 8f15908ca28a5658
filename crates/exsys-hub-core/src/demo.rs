//! Demo Mode - Simulated Exsys hub
//!
//! Answers the hub command set in-process so the CLI and tests can run
//! without hardware. Clones share one hub: keep a clone to inspect or
//! disturb the hub after handing another to a session.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::protocol::codec::{self, pack_mask, unpack_mask, unused_port_mask};
use crate::protocol::commands::Password;
use crate::protocol::{Command, ProtocolError, Transport, COMMAND_TERMINATOR};

/// Ways the simulated hub can misbehave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedFault {
    /// The port cannot be opened
    Unplugged,
    /// Commands are written but no reply arrives
    Silent,
    /// Every reply is line noise
    Garbled,
}

#[derive(Debug)]
struct HubModel {
    model_code: String,
    firmware_version: String,
    identify_reply: Option<String>,
    port_count: u8,
    password: Password,
    mask: u32,
    startup_mask: u32,
    acknowledgement: String,
    fault: Option<SimulatedFault>,
    frames: Vec<Vec<u8>>,
}

/// In-process stand-in for a hub on a serial line
#[derive(Debug, Clone)]
pub struct SimulatedHub {
    model: Arc<Mutex<HubModel>>,
    response_delay: Duration,
}

impl SimulatedHub {
    /// Hub with `port_count` ports, all powered, model code `USBnn`
    pub fn new(port_count: u8) -> Self {
        Self {
            model: Arc::new(Mutex::new(HubModel {
                model_code: format!("USB{:02}", port_count),
                firmware_version: "v1.0.0".to_string(),
                identify_reply: None,
                port_count,
                password: Password::default(),
                mask: u32::MAX,
                startup_mask: u32::MAX,
                acknowledgement: "G".to_string(),
                fault: None,
                frames: Vec::new(),
            })),
            response_delay: Duration::ZERO,
        }
    }

    /// Set the firmware version reported by identify (include the 'v')
    pub fn with_firmware(self, firmware_version: &str) -> Self {
        self.lock().firmware_version = firmware_version.to_string();
        self
    }

    /// Set the initial port states
    pub fn with_ports(self, ports: &[bool]) -> Self {
        {
            let mut model = self.lock();
            let mask = mask_of(ports) | unused_port_mask(model.port_count);
            model.mask = mask;
            model.startup_mask = mask;
        }
        self
    }

    /// Require a non-default management password
    pub fn with_password(self, password: Password) -> Self {
        self.lock().password = password;
        self
    }

    /// Wait this long before answering each command
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Answer identify with `reply` instead of `<model><firmware>`
    pub fn set_identify_reply(&self, reply: Option<&str>) {
        self.lock().identify_reply = reply.map(str::to_string);
    }

    /// Reply sent when a mutating command is accepted (default "G")
    pub fn set_acknowledgement(&self, reply: &str) {
        self.lock().acknowledgement = reply.to_string();
    }

    /// Start or stop misbehaving
    pub fn set_fault(&self, fault: Option<SimulatedFault>) {
        self.lock().fault = fault;
    }

    /// Change port states behind the session's back (e.g. a front-panel button)
    pub fn set_ports(&self, ports: &[bool]) {
        let mut model = self.lock();
        model.mask = mask_of(ports) | unused_port_mask(model.port_count);
    }

    /// Current port states
    pub fn ports(&self) -> Vec<bool> {
        let model = self.lock();
        bits(model.mask, model.port_count)
    }

    /// Port states restored on reset
    pub fn startup_ports(&self) -> Vec<bool> {
        let model = self.lock();
        bits(model.startup_mask, model.port_count)
    }

    /// Every frame received so far, in order
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().frames.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HubModel> {
        self.model.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl HubModel {
    fn respond(&mut self, frame: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        self.frames.push(frame.to_vec());
        match self.fault {
            Some(SimulatedFault::Unplugged) => {
                return Err(ProtocolError::Open {
                    port: "simulated".to_string(),
                    reason: "device unplugged".to_string(),
                })
            }
            Some(SimulatedFault::Silent) => return Err(ProtocolError::Timeout(0)),
            Some(SimulatedFault::Garbled) => return Ok(b"#~?\r\n".to_vec()),
            None => {}
        }

        let reply = self.answer(frame);
        Ok(format!("{}\r\n", reply).into_bytes())
    }

    fn answer(&mut self, frame: &[u8]) -> String {
        let Some(body) = frame
            .strip_suffix(&[COMMAND_TERMINATOR])
            .and_then(|b| std::str::from_utf8(b).ok())
        else {
            return "E00".to_string();
        };
        let Some(command) = body.get(..2).and_then(Command::from_mnemonic) else {
            return "E00".to_string();
        };
        let mut rest = &body[2..];
        if command.requires_password() {
            match rest.strip_prefix(self.password.field()) {
                Some(after) => rest = after,
                None => return "E02".to_string(),
            }
        }

        match command {
            Command::Identify => self
                .identify_reply
                .clone()
                .unwrap_or_else(|| format!("{}{}", self.model_code, self.firmware_version)),
            Command::GetPorts => pack_mask(self.mask),
            Command::SetPorts => match unpack_mask(rest) {
                Ok(mask) => {
                    self.mask = mask | unused_port_mask(self.port_count);
                    self.acknowledgement.clone()
                }
                Err(_) => "E03".to_string(),
            },
            Command::ResetHub => {
                self.mask = self.startup_mask;
                self.acknowledgement.clone()
            }
            Command::RestoreDefaults => {
                self.mask = u32::MAX;
                self.startup_mask = u32::MAX;
                self.acknowledgement.clone()
            }
            Command::SavePorts => {
                self.startup_mask = self.mask;
                self.acknowledgement.clone()
            }
        }
    }
}

#[async_trait]
impl Transport for SimulatedHub {
    async fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        if !self.response_delay.is_zero() {
            tokio::time::sleep(self.response_delay).await;
        }
        self.lock().respond(frame)
    }
}

fn mask_of(ports: &[bool]) -> u32 {
    ports
        .iter()
        .take(32)
        .enumerate()
        .filter(|(_, on)| **on)
        .fold(0u32, |acc, (bit, _)| acc | (1u32 << bit))
}

fn bits(mask: u32, port_count: u8) -> Vec<bool> {
    codec::decode_port_state(&pack_mask(mask), Some(port_count)).unwrap_or_default()
}
