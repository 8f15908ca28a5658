mod common;

use common::{ScriptedTransport, Wire, WireEvent};
use exsys_hub_core::demo::{SimulatedFault, SimulatedHub};
use exsys_hub_core::protocol::{probe, CommandSerializer, ProtocolError};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_submit_returns_reply_line() {
    let wire = Wire::default();
    let serializer =
        CommandSerializer::new(Box::new(ScriptedTransport::new(wire.clone()).reply("USB16v1.2.3")));

    let reply = serializer.submit(b"?Q\r").await.unwrap();
    assert_eq!(reply, b"USB16v1.2.3\r\n".to_vec());
    assert_eq!(wire.frames(), vec!["?Q\r"]);
}

#[tokio::test]
async fn test_concurrent_submits_run_one_at_a_time_in_order() {
    let wire = Wire::default();
    let transport = ScriptedTransport::new(wire.clone()).with_delay(Duration::from_millis(5));
    let serializer = Arc::new(CommandSerializer::new(Box::new(transport)));

    let mut handles = Vec::new();
    for i in 0..8 {
        let serializer = serializer.clone();
        handles.push(tokio::spawn(async move {
            serializer.submit(format!("C{}\r", i).as_bytes()).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let reply = handle.await.unwrap().unwrap();
        assert_eq!(reply, format!("C{}\r\n", i).into_bytes());
    }

    let expected: Vec<WireEvent> = (0..8)
        .flat_map(|i| {
            let frame = format!("C{}\r", i).into_bytes();
            [WireEvent::Start(frame.clone()), WireEvent::End(frame)]
        })
        .collect();
    assert_eq!(wire.events(), expected);
    assert_eq!(serializer.counters(), (8, 0));
}

#[tokio::test]
async fn test_failed_exchange_releases_the_turn() {
    let wire = Wire::default();
    let transport = ScriptedTransport::new(wire.clone())
        .fail(ProtocolError::Timeout(1000))
        .reply("G");
    let serializer = CommandSerializer::new(Box::new(transport));

    let err = serializer.submit(b"WPpass    \r").await.unwrap_err();
    assert!(matches!(err, ProtocolError::Timeout(1000)));
    assert!(err.is_transport());

    let reply = serializer.submit(b"WPpass    \r").await.unwrap();
    assert_eq!(reply, b"G\r\n".to_vec());
    assert_eq!(serializer.counters(), (2, 1));
}

#[tokio::test]
async fn test_turn_covers_several_exchanges() {
    let wire = Wire::default();
    let transport = ScriptedTransport::new(wire.clone()).with_delay(Duration::from_millis(2));
    let serializer = Arc::new(CommandSerializer::new(Box::new(transport)));

    let mut turn = serializer.acquire().await;
    let other = {
        let serializer = serializer.clone();
        tokio::spawn(async move { serializer.submit(b"B\r").await })
    };
    tokio::task::yield_now().await;
    turn.exchange(b"A1\r").await.unwrap();
    turn.exchange(b"A2\r").await.unwrap();
    drop(turn);

    other.await.unwrap().unwrap();
    assert_eq!(wire.frames(), vec!["A1\r", "A2\r", "B\r"]);
}

#[tokio::test]
async fn test_probe_accepts_hub() {
    let mut hub = SimulatedHub::new(16).with_firmware("v1.2.3");
    let identity = probe(&mut hub).await.unwrap();
    assert_eq!(identity.model_code, "USB16");
    assert_eq!(identity.port_count, 16);
    assert_eq!(identity.firmware_version, "v1.2.3");
    assert_eq!(hub.frames(), vec![b"?Q\r".to_vec()]);
}

#[tokio::test]
async fn test_probe_classifies_failures() {
    let mut hub = SimulatedHub::new(8);
    hub.set_fault(Some(SimulatedFault::Unplugged));
    assert_eq!(probe(&mut hub).await.unwrap_err().code(), "cannot_connect");

    hub.set_fault(Some(SimulatedFault::Garbled));
    assert_eq!(probe(&mut hub).await.unwrap_err().code(), "invalid_response");

    hub.set_fault(None);
    hub.set_identify_reply(Some("HELLO"));
    assert_eq!(probe(&mut hub).await.unwrap_err().code(), "invalid_response");
}

#[test]
fn test_protocol_error_display() {
    let err = ProtocolError::InvalidStateLength(7, "0000000".to_string());
    assert_eq!(
        err.to_string(),
        "Port state response must be 8 characters, got 7: '0000000'"
    );
    assert!(!err.is_transport());
}
