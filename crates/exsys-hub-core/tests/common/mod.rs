//! Shared test transports

#![allow(dead_code)]

use async_trait::async_trait;
use exsys_hub_core::protocol::{ProtocolError, Transport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Route library logs to the test harness; set RUST_LOG to see them
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// What the wire saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    Start(Vec<u8>),
    End(Vec<u8>),
}

/// Observer shared between a test and its transport
#[derive(Clone, Default)]
pub struct Wire {
    events: Arc<Mutex<Vec<WireEvent>>>,
    in_flight: Arc<AtomicBool>,
}

impl Wire {
    pub fn events(&self) -> Vec<WireEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Frames in the order they were written
    pub fn frames(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                WireEvent::Start(frame) => Some(String::from_utf8(frame).unwrap()),
                WireEvent::End(_) => None,
            })
            .collect()
    }

    fn push(&self, event: WireEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Transport answering from a fixed script.
///
/// With an empty script it echoes the frame back as a line. Panics if two
/// exchanges ever overlap.
pub struct ScriptedTransport {
    wire: Wire,
    replies: VecDeque<Result<Vec<u8>, ProtocolError>>,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new(wire: Wire) -> Self {
        init_logging();
        Self {
            wire,
            replies: VecDeque::new(),
            delay: Duration::ZERO,
        }
    }

    /// Queue a reply line (the "\r\n" terminator is added)
    pub fn reply(mut self, line: &str) -> Self {
        self.replies
            .push_back(Ok(format!("{}\r\n", line).into_bytes()));
        self
    }

    /// Queue a transport failure
    pub fn fail(mut self, error: ProtocolError) -> Self {
        self.replies.push_back(Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        assert!(
            !self.wire.in_flight.swap(true, Ordering::SeqCst),
            "two exchanges were in flight at once"
        );
        self.wire.push(WireEvent::Start(frame.to_vec()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.wire.push(WireEvent::End(frame.to_vec()));
        self.wire.in_flight.store(false, Ordering::SeqCst);

        self.replies.pop_front().unwrap_or_else(|| {
            let mut echo = frame.to_vec();
            echo.push(b'\n');
            Ok(echo)
        })
    }
}
