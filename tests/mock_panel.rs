// End-to-end tests against a mock EnvisaLink that speaks TPI over a local socket.

use std::time::Duration;

use envisalink_tpi::codec::encode;
use envisalink_tpi::{
    ArmMode, EventReceiver, PartitionUpdate, PartitionUserUpdate, TpiClient, TpiConfig, TpiEvent,
    ZoneUpdate,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

async fn mock_panel() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Close with an RST instead of a FIN.
#[allow(deprecated)]
fn reset(stream: TcpStream) {
    stream.set_linger(Some(Duration::ZERO)).unwrap();
    drop(stream);
}

fn client_for(port: u16) -> TpiClient {
    let config = TpiConfig::builder()
        .host("127.0.0.1")
        .port(port)
        .password("user")
        .zones(8)
        .partitions(2)
        .disconnect_timeout_ms(500)
        .build();
    TpiClient::with_builtin_table(config).unwrap()
}

/// Drive the login prompt and return the stream once the status request arrives.
async fn accept_and_login(
    listener: &TcpListener,
) -> (BufReader<tokio::net::tcp::OwnedReadHalf>, OwnedWriteHalf) {
    let (stream, _) = listener.accept().await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    writer.write_all(encode("5053").as_bytes()).await.unwrap();
    assert_eq!(read_line(&mut reader).await, "005user54\r\n");

    writer.write_all(encode("5051").as_bytes()).await.unwrap();
    assert_eq!(read_line(&mut reader).await, "00191\r\n");

    (reader, writer)
}

async fn read_line(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> String {
    let mut line = String::new();
    timeout(Duration::from_secs(2), reader.read_line(&mut line))
        .await
        .unwrap()
        .unwrap();
    line
}

/// Collect update events until `count` have arrived.
async fn collect_updates(events: &mut EventReceiver, count: usize) -> Vec<TpiEvent> {
    timeout(Duration::from_secs(2), async {
        let mut updates = Vec::new();
        while updates.len() < count {
            let event = events.recv().await.unwrap();
            if matches!(
                event,
                TpiEvent::ZoneUpdate(_)
                    | TpiEvent::PartitionUpdate(_)
                    | TpiEvent::PartitionUserUpdate(_)
                    | TpiEvent::SystemUpdate(_)
            ) {
                updates.push(event);
            }
        }
        updates
    })
    .await
    .unwrap()
}

async fn wait_for(events: &mut EventReceiver, want: TpiEvent) {
    timeout(Duration::from_secs(2), async {
        while events.recv().await.unwrap() != want {}
    })
    .await
    .unwrap();
}

fn zone(zone: u32, code: &str, status: &str, initial_update: bool) -> TpiEvent {
    TpiEvent::ZoneUpdate(ZoneUpdate {
        zone,
        code: code.to_string(),
        status: status.to_string(),
        initial_update,
    })
}

fn partition_ready(initial_update: bool) -> TpiEvent {
    TpiEvent::PartitionUpdate(PartitionUpdate {
        partition: 1,
        code: "650".to_string(),
        mode_code: None,
        mode: None,
        status: "Partition Ready".to_string(),
        initial_update,
    })
}

fn user_closing(initial_update: bool) -> TpiEvent {
    TpiEvent::PartitionUserUpdate(PartitionUserUpdate {
        partition: 1,
        code: "700".to_string(),
        user: 4,
        status: "User Closing".to_string(),
        initial_update,
    })
}

#[tokio::test]
async fn test_login_and_status_dump() {
    let (listener, port) = mock_panel().await;
    let server = tokio::spawn(async move {
        let (_reader, mut writer) = accept_and_login(&listener).await;

        // The armed frame is cut across two writes
        writer.write_all(b"60900130\r\n6521").await.unwrap();
        writer.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        writer.write_all(b"0C4\r\n").await.unwrap();
        // zone 9 is beyond the configured count, 999 is unknown
        writer.write_all(b"60900938\r\n999000AA\r\n").await.unwrap();
        writer.write_all(encode("610001").as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let client = client_for(port);
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    wait_for(&mut events, TpiEvent::Connected).await;

    let updates = collect_updates(&mut events, 3).await;
    assert_eq!(
        updates,
        vec![
            zone(1, "609", "Zone Open", true),
            TpiEvent::PartitionUpdate(PartitionUpdate {
                partition: 1,
                code: "652".to_string(),
                mode_code: Some("0".to_string()),
                mode: Some(ArmMode::Away),
                status: "Partition Armed".to_string(),
                initial_update: true,
            }),
            zone(1, "610", "Zone Restored", false),
        ]
    );

    server.abort();
}

#[tokio::test]
async fn test_malformed_frame_reported_and_session_continues() {
    let (listener, port) = mock_panel().await;
    let server = tokio::spawn(async move {
        let (_reader, mut writer) = accept_and_login(&listener).await;
        writer.write_all(b"609\r\n60900232\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let client = client_for(port);
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    let error = timeout(Duration::from_secs(2), async {
        loop {
            if let TpiEvent::LogError(text) = events.recv().await.unwrap() {
                return text;
            }
        }
    })
    .await
    .unwrap();
    assert!(error.contains("Malformed frame"));

    assert_eq!(
        collect_updates(&mut events, 1).await,
        vec![zone(2, "609", "Zone Open", true)]
    );
    server.abort();
}

#[tokio::test]
async fn test_reconnect_rearms_initial_updates() {
    let (listener, port) = mock_panel().await;
    let server = tokio::spawn(async move {
        for _ in 0..2 {
            let (mut reader, mut writer) = accept_and_login(&listener).await;
            for frame in ["609003", "609003", "6501", "6501", "70010004", "70010004"] {
                writer.write_all(encode(frame).as_bytes()).await.unwrap();
            }
            // close once the client half-closes
            let mut line = String::new();
            let _ = reader.read_line(&mut line).await;
        }
    });

    let client = client_for(port);
    let mut events = client.subscribe();

    for _ in 0..2 {
        client.connect().await.unwrap();
        let updates = collect_updates(&mut events, 6).await;
        assert_eq!(
            updates,
            vec![
                zone(3, "609", "Zone Open", true),
                zone(3, "609", "Zone Open", false),
                partition_ready(true),
                partition_ready(false),
                user_closing(true),
                user_closing(false),
            ]
        );
        client.disconnect().await.unwrap();
        wait_for(&mut events, TpiEvent::Disconnected).await;
    }

    server.await.unwrap();
}

#[tokio::test]
async fn test_panel_close_emits_disconnect() {
    let (listener, port) = mock_panel().await;
    let server = tokio::spawn(async move {
        let (stream, _): (TcpStream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let client = client_for(port);
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    wait_for(&mut events, TpiEvent::Disconnected).await;
    assert!(!client.is_connected().await);
    server.await.unwrap();
}

#[tokio::test]
async fn test_connection_reset_emits_error_then_disconnect() {
    let (listener, port) = mock_panel().await;
    let server = tokio::spawn(async move {
        let (stream, _): (TcpStream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        reset(stream);
    });

    let client = client_for(port);
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    let seen = timeout(Duration::from_secs(2), async {
        let mut seen = Vec::new();
        loop {
            let event = events.recv().await.unwrap();
            let done = event == TpiEvent::Disconnected;
            seen.push(event);
            if done {
                return seen;
            }
        }
    })
    .await
    .unwrap();

    assert!(matches!(
        seen.as_slice(),
        [.., TpiEvent::Error(_), TpiEvent::Disconnected]
    ));
    assert!(!client.is_connected().await);
    server.await.unwrap();
}
