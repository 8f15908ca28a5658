//! Hub session state machine
//!
//! `Uninitialized -> Identifying -> ReadingState -> Ready`, or `Failed` when
//! either bring-up step gets no valid answer. After setup, failed operations
//! are logged and reported as `false`/`None`; the session stays usable.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{HubIdentity, PortState, SessionPhase};
use crate::config::{ConfigError, HubConfig};
use crate::protocol::{
    codec, commands::Password, Command, CommandSerializer, ProtocolError, SerialTransport,
    Transport, Turn,
};

#[derive(Debug, Default)]
struct SessionState {
    phase: SessionPhase,
    identity: Option<HubIdentity>,
    ports: Option<PortState>,
}

/// Connection to one Exsys managed hub
pub struct HubSession {
    name: String,
    address: String,
    password: Password,
    serializer: CommandSerializer,
    state: RwLock<SessionState>,
}

impl HubSession {
    /// Create a session over `transport` (nothing is sent until [`setup`](Self::setup))
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            password: Password::default(),
            serializer: CommandSerializer::new(transport),
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Create a session on the serial port named in `config`
    pub fn from_config(config: &HubConfig) -> Result<Self, ConfigError> {
        let password = config.password()?;
        let port = config.port.as_deref().ok_or(ConfigError::MissingPort)?;
        let transport = SerialTransport::new(port, config.baud_rate)
            .with_timeout(Duration::from_millis(config.timeout_ms));
        Ok(Self::new(config.name.clone(), port, Box::new(transport)).with_password(password))
    }

    /// Use a non-default management password
    pub fn with_password(mut self, password: Password) -> Self {
        self.password = password;
        self
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transport address (serial device path)
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current bring-up phase
    pub fn phase(&self) -> SessionPhase {
        self.read_state().phase
    }

    /// True once setup has completed
    pub fn is_ready(&self) -> bool {
        self.phase() == SessionPhase::Ready
    }

    /// Hub identity, known after a successful identify
    pub fn identity(&self) -> Option<HubIdentity> {
        self.read_state().identity.clone()
    }

    /// Number of ports, known after a successful identify
    pub fn port_count(&self) -> Option<u8> {
        self.read_state().identity.as_ref().map(|id| id.port_count)
    }

    /// Last port state read from or acknowledged by the hub
    pub fn cached_ports(&self) -> Option<PortState> {
        self.read_state().ports.clone()
    }

    /// Get cumulative (exchanges, failed exchanges) counters
    pub fn counters(&self) -> (u64, u64) {
        self.serializer.counters()
    }

    /// Identify the hub and read its port states.
    ///
    /// On error the session is left `Failed` and should not be offered to
    /// users; the error tells transport trouble from a bad reply.
    pub async fn setup(&self) -> Result<(), ProtocolError> {
        if self.is_ready() {
            return Ok(());
        }
        let mut turn = self.serializer.acquire().await;
        // Another caller may have finished bring-up while we waited
        if self.is_ready() {
            return Ok(());
        }
        debug!("Setup of {} on {} has started", self.name, self.address);

        self.set_phase(SessionPhase::Identifying);
        let identity = match self.identify(&mut turn).await {
            Ok(identity) => identity,
            Err(e) => {
                error!("Could not read hub info from {}: {}", self.address, e);
                self.set_phase(SessionPhase::Failed);
                return Err(e);
            }
        };
        debug!("Device type = {}", identity.model_code);
        {
            let mut state = self.write_state();
            state.identity = Some(identity);
            state.phase = SessionPhase::ReadingState;
        }

        if let Err(e) = self.fetch_ports(&mut turn).await {
            error!("Could not read hub state from {}: {}", self.address, e);
            self.set_phase(SessionPhase::Failed);
            return Err(e);
        }
        self.set_phase(SessionPhase::Ready);
        if let Some(identity) = self.identity() {
            info!("{} ready: {}", self.name, identity);
        }
        Ok(())
    }

    /// Read all port states from the hub, replacing the cache
    pub async fn get_hub_state(&self) -> Option<PortState> {
        let mut turn = self.serializer.acquire().await;
        match self.fetch_ports(&mut turn).await {
            Ok(ports) => Some(ports),
            Err(e) => {
                error!("Could not read hub state: {}", e);
                None
            }
        }
    }

    /// Switch one port (0-based `index`). The cache only changes if the hub
    /// acknowledges.
    pub async fn set_port_state(&self, index: usize, on: bool) -> bool {
        let mut turn = self.serializer.acquire().await;
        match self.write_port(&mut turn, index, on).await {
            Ok(()) => true,
            Err(e) => {
                error!("Could not set port {} {}: {}", index + 1, on_off(on), e);
                false
            }
        }
    }

    /// Reboot the hub. Any reply counts as success.
    pub async fn reset_hub(&self) -> bool {
        let mut turn = self.serializer.acquire().await;
        match self.request(&mut turn, Command::ResetHub, "").await {
            Ok(reply) => {
                debug!("Reset answered '{}'", reply);
                true
            }
            Err(e) => {
                error!("Could not reset hub: {}", e);
                false
            }
        }
    }

    /// Restore factory defaults, then re-read the port states they imply
    pub async fn restore_factory_defaults(&self) -> bool {
        let mut turn = self.serializer.acquire().await;
        let result = match self.command(&mut turn, Command::RestoreDefaults).await {
            Ok(()) => self.fetch_ports(&mut turn).await.map(|_| ()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                error!("Could not restore factory defaults: {}", e);
                false
            }
        }
    }

    /// Store the current port states as the hub's start-up states
    pub async fn save_port_states(&self) -> bool {
        let mut turn = self.serializer.acquire().await;
        match self.command(&mut turn, Command::SavePorts).await {
            Ok(()) => true,
            Err(e) => {
                error!("Could not save port states: {}", e);
                false
            }
        }
    }

    async fn identify(&self, turn: &mut Turn<'_>) -> Result<HubIdentity, ProtocolError> {
        let reply = self.request(turn, Command::Identify, "").await?;
        codec::parse_identity(&reply)
    }

    async fn fetch_ports(&self, turn: &mut Turn<'_>) -> Result<PortState, ProtocolError> {
        let port_count = self.port_count().ok_or(ProtocolError::NotIdentified)?;
        let reply = self.request(turn, Command::GetPorts, "").await?;
        let ports = PortState::from(codec::decode_port_state(&reply, Some(port_count))?);
        self.write_state().ports = Some(ports.clone());
        Ok(ports)
    }

    async fn write_port(
        &self,
        turn: &mut Turn<'_>,
        index: usize,
        on: bool,
    ) -> Result<(), ProtocolError> {
        let (edited, port_count) = self.edited_ports(index, on)?;
        let payload = codec::encode_port_state(edited.as_slice(), Some(port_count))?;
        let reply = self.request(turn, Command::SetPorts, &payload).await?;
        acknowledged(Command::SetPorts, reply)?;
        self.write_state().ports = Some(edited);
        Ok(())
    }

    /// Send a mutating command and require the 'G' acknowledgement
    async fn command(&self, turn: &mut Turn<'_>, command: Command) -> Result<(), ProtocolError> {
        let reply = self.request(turn, command, "").await?;
        acknowledged(command, reply)
    }

    async fn request(
        &self,
        turn: &mut Turn<'_>,
        command: Command,
        payload: &str,
    ) -> Result<String, ProtocolError> {
        let frame = command.frame(&self.password, payload);
        let raw = turn.exchange(&frame).await?;
        codec::response_text(&raw)
    }

    fn edited_ports(&self, index: usize, on: bool) -> Result<(PortState, u8), ProtocolError> {
        let state = self.read_state();
        let port_count = state
            .identity
            .as_ref()
            .map(|id| id.port_count)
            .ok_or(ProtocolError::NotIdentified)?;
        let current = state.ports.as_ref().ok_or(ProtocolError::NoPortState)?;
        let edited = current
            .with_port(index, on)
            .ok_or(ProtocolError::PortOutOfRange { index, port_count })?;
        Ok((edited, port_count))
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.write_state().phase = phase;
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn acknowledged(command: Command, reply: String) -> Result<(), ProtocolError> {
    if codec::is_acknowledged(&reply) {
        Ok(())
    } else {
        Err(ProtocolError::CommandRejected {
            command: command.mnemonic(),
            response: reply,
        })
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
