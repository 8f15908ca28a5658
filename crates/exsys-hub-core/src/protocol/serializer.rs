//! Command serializer
//!
//! Only one exchange may be in flight on the serial line. Callers queue for
//! the transport's lock and are served in arrival order (tokio's `Mutex`
//! grants the lock FIFO).

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tracing::trace;

use super::{ProtocolError, Transport};

/// Hands out exclusive turns on a transport
pub struct CommandSerializer {
    transport: Mutex<Box<dyn Transport>>,
    exchanges: AtomicU64,
    failures: AtomicU64,
}

/// Exclusive right to run exchanges; released on drop
pub struct Turn<'a> {
    transport: MutexGuard<'a, Box<dyn Transport>>,
    serializer: &'a CommandSerializer,
}

impl CommandSerializer {
    /// Wrap a transport
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport: Mutex::new(transport),
            exchanges: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Wait for the turn. Several exchanges may run under one turn.
    pub async fn acquire(&self) -> Turn<'_> {
        trace!("Waiting for serial turn");
        let transport = self.transport.lock().await;
        trace!("Serial turn acquired");
        Turn {
            transport,
            serializer: self,
        }
    }

    /// Run a single exchange in its own turn
    pub async fn submit(&self, frame: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        self.acquire().await.exchange(frame).await
    }

    /// Get cumulative (exchanges, failed exchanges) counters
    pub fn counters(&self) -> (u64, u64) {
        (
            self.exchanges.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
        )
    }
}

impl Turn<'_> {
    /// Write one frame and read the response line
    pub async fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        self.serializer.exchanges.fetch_add(1, Ordering::Relaxed);
        let result = self.transport.exchange(frame).await;
        if result.is_err() {
            self.serializer.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}
