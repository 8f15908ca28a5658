//! Transport session
//!
//! One exchange = write a command frame, read back one response line.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio_serial::{ClearBuffer, SerialPort, SerialStream};
use tracing::{debug, warn};

use super::{
    open_port, ProtocolError, DEFAULT_TIMEOUT_MS, MAX_RESPONSE_LEN, RESPONSE_TERMINATOR,
};

/// A line-oriented command channel to a hub
///
/// Implementations perform exactly one write/read pair per call and never
/// retry; the caller decides what a failure means.
#[async_trait]
pub trait Transport: Send {
    /// Write `frame` and return the next response line, terminator included
    async fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, ProtocolError>;
}

/// Serial line to a physical hub
///
/// The port is opened on the first exchange and kept open. Any failure
/// drops the connection so the next exchange starts from a fresh open.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
    stream: Option<BufReader<SerialStream>>,
}

impl SerialTransport {
    /// Create a transport for `port_name` (not yet opened)
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            stream: None,
        }
    }

    /// Override the response timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Serial device path
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Whether a connection is currently held open
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn connection(&mut self) -> Result<&mut BufReader<SerialStream>, ProtocolError> {
        if self.stream.is_none() {
            let port = open_port(&self.port_name, self.baud_rate, self.timeout)?;
            debug!(
                "Serial device {} connected at {} baud",
                self.port_name, self.baud_rate
            );
            self.stream = Some(BufReader::new(port));
        }
        self.stream.as_mut().ok_or(ProtocolError::ConnectionClosed)
    }
}

/// Write `frame` and read one response line from a buffered stream
async fn round_trip<S>(
    conn: &mut BufReader<S>,
    frame: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Leftovers from an earlier, abandoned reply must not be read as ours
    let stale = conn.buffer().len();
    if stale > 0 {
        debug!("Discarding {} stale bytes", stale);
        conn.consume(stale);
    }

    conn.write_all(frame).await.map_err(ProtocolError::Write)?;
    conn.flush().await.map_err(ProtocolError::Write)?;

    let mut line = Vec::with_capacity(16);
    let mut limited = (&mut *conn).take(MAX_RESPONSE_LEN as u64);
    let n = tokio::time::timeout(timeout, limited.read_until(RESPONSE_TERMINATOR, &mut line))
        .await
        .map_err(|_| ProtocolError::Timeout(timeout.as_millis() as u64))?
        .map_err(ProtocolError::Read)?;

    if line.last() == Some(&RESPONSE_TERMINATOR) {
        Ok(line)
    } else if n >= MAX_RESPONSE_LEN {
        Err(ProtocolError::ResponseTooLong(MAX_RESPONSE_LEN))
    } else {
        Err(ProtocolError::ConnectionClosed)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let timeout = self.timeout;
        let result = match self.connection() {
            Ok(conn) => {
                if let Err(e) = conn.get_mut().clear(ClearBuffer::Input) {
                    debug!("Could not clear input buffer: {}", e);
                }
                debug!("Sending {}", frame.escape_ascii());
                round_trip(conn, frame, timeout).await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(line) => debug!("Serial device {} sent {}", self.port_name, line.escape_ascii()),
            Err(e) => {
                warn!("Serial device {}: {}", self.port_name, e);
                self.stream = None;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DEFAULT_BAUD_RATE;
    use pretty_assertions::assert_eq;
    use tokio::io::{duplex, DuplexStream};

    const TIMEOUT: Duration = Duration::from_millis(DEFAULT_TIMEOUT_MS);

    fn line_pair() -> (BufReader<DuplexStream>, DuplexStream) {
        let (ours, hub) = duplex(1024);
        (BufReader::new(ours), hub)
    }

    /// Read the frame the transport wrote, as the hub would
    async fn read_frame(hub: &mut DuplexStream) -> Vec<u8> {
        let mut buf = [0u8; 64];
        let n = hub.read(&mut buf).await.unwrap();
        buf[..n].to_vec()
    }

    #[tokio::test]
    async fn test_round_trip_returns_line_with_terminator() {
        let (mut conn, mut hub) = line_pair();
        hub.write_all(b"USB16v1.2.3\r\n").await.unwrap();

        let line = round_trip(&mut conn, b"?Q\r", TIMEOUT).await.unwrap();
        assert_eq!(line, b"USB16v1.2.3\r\n".to_vec());
        assert_eq!(read_frame(&mut hub).await, b"?Q\r".to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_joins_line_split_across_writes() {
        let (mut conn, mut hub) = line_pair();
        let device = tokio::spawn(async move {
            let frame = read_frame(&mut hub).await;
            hub.write_all(b"0000").await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            hub.write_all(b"00FF\r\n").await.unwrap();
            (frame, hub)
        });

        let line = round_trip(&mut conn, b"GP\r", TIMEOUT).await.unwrap();
        assert_eq!(line, b"000000FF\r\n".to_vec());
        let (frame, _hub) = device.await.unwrap();
        assert_eq!(frame, b"GP\r".to_vec());
    }

    #[tokio::test]
    async fn test_round_trip_discards_stale_reply() {
        let (mut conn, mut hub) = line_pair();
        hub.write_all(b"G\r\nlate\r\n").await.unwrap();
        let first = round_trip(&mut conn, b"WPpass    \r", TIMEOUT).await.unwrap();
        assert_eq!(first, b"G\r\n".to_vec());

        hub.write_all(b"000000FF\r\n").await.unwrap();
        let second = round_trip(&mut conn, b"GP\r", TIMEOUT).await.unwrap();
        assert_eq!(second, b"000000FF\r\n".to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_times_out_on_silent_hub() {
        let (mut conn, _hub) = line_pair();
        let err = round_trip(&mut conn, b"?Q\r", Duration::from_millis(250))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Timeout(250)));
    }

    #[tokio::test]
    async fn test_round_trip_caps_response_length() {
        let (mut conn, mut hub) = line_pair();
        hub.write_all(&[b'A'; MAX_RESPONSE_LEN + 44]).await.unwrap();

        let err = round_trip(&mut conn, b"?Q\r", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ResponseTooLong(MAX_RESPONSE_LEN)));
    }

    #[tokio::test]
    async fn test_round_trip_reports_closed_connection() {
        let (mut conn, mut hub) = line_pair();
        let device = tokio::spawn(async move {
            read_frame(&mut hub).await;
            hub.write_all(b"GO").await.unwrap();
        });

        let err = round_trip(&mut conn, b"RHpass    \r", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_on_missing_device_reports_open_failure() {
        let mut transport = SerialTransport::new("/dev/does-not-exist-exsys", DEFAULT_BAUD_RATE);
        let err = transport.exchange(b"?Q\r").await.unwrap_err();
        assert!(matches!(err, ProtocolError::Open { .. }));
        assert!(!transport.is_open());
    }

    #[test]
    fn test_timeout_override() {
        let transport =
            SerialTransport::new("/dev/ttyUSB0", 9600).with_timeout(Duration::from_millis(250));
        assert_eq!(transport.timeout, Duration::from_millis(250));
        assert_eq!(transport.port_name(), "/dev/ttyUSB0");
    }
}
