//! End-to-end tests against an in-process WebSocket gateway.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::ids::Snowflake;
use beacon_core::retry::BackoffConfig;
use beacon_dispatch::{CacheStore, Caches, ClientEvent, EventBus, Normalizer};
use beacon_gateway::{ConnectionConfig, ConnectionPhase, ShardHandle, spawn};
use beacon_settings::ReconnectSettings;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{WebSocketStream, accept_async};

const TIMEOUT: Duration = Duration::from_secs(5);

type ServerWs = WebSocketStream<TcpStream>;

// ── fake gateway ────────────────────────────────────────────────────────

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> ServerWs {
    let (stream, _) = timeout(TIMEOUT, listener.accept()).await.unwrap().unwrap();
    accept_async(stream).await.unwrap()
}

async fn send(ws: &mut ServerWs, frame: Value) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn recv(ws: &mut ServerWs) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Read until the client's close frame and return its code.
async fn recv_close(ws: &mut ServerWs) -> Option<u16> {
    while let Ok(Some(Ok(msg))) = timeout(TIMEOUT, ws.next()).await {
        if let Message::Close(frame) = msg {
            return frame.map(|f| u16::from(f.code));
        }
    }
    None
}

fn hello(interval_ms: u64) -> Value {
    json!({"op": 10, "d": {"heartbeat_interval": interval_ms}})
}

fn ready(seq: u64, resume_url: &str) -> Value {
    json!({
        "op": 0, "t": "READY", "s": seq,
        "d": {
            "v": 10,
            "user": {"id": "1", "username": "beacon"},
            "guilds": [],
            "session_id": "abc",
            "resume_gateway_url": resume_url,
        }
    })
}

// ── client ──────────────────────────────────────────────────────────────

fn config(url: &str) -> ConnectionConfig {
    ConnectionConfig {
        token: Some("tok".into()),
        url: url.into(),
        api_version: 10,
        shard: [0, 1],
        intents: 513,
        large_threshold: None,
        identify_on_open: false,
        zombie_detection: false,
    }
}

fn reconnect(enabled: bool) -> ReconnectSettings {
    ReconnectSettings {
        enabled,
        backoff: BackoffConfig {
            base_delay_ms: 10,
            max_delay_ms: 50,
            jitter_factor: 0.0,
            max_attempts: Some(3),
        },
    }
}

fn client(url: &str, enabled: bool) -> (ShardHandle, Arc<Normalizer>) {
    let bus = Arc::new(EventBus::default());
    let normalizer = Arc::new(Normalizer::new(Caches::in_memory(), bus));
    let handle = spawn(config(url), reconnect(enabled), Arc::clone(&normalizer));
    (handle, normalizer)
}

async fn eventually(mut check: impl FnMut() -> bool) {
    timeout(TIMEOUT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

// ── tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn identify_dispatch_heartbeat_and_shutdown() {
    let (listener, url) = bind().await;
    let resume_url = url.clone();
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send(&mut ws, hello(50)).await;

        let identify = recv(&mut ws).await;
        assert_eq!(identify["op"], 2);
        assert_eq!(identify["d"]["token"], "tok");
        assert_eq!(identify["d"]["shard"], json!([0, 1]));
        assert_eq!(identify["d"]["intents"], 513);

        send(&mut ws, ready(1, &resume_url)).await;
        send(
            &mut ws,
            json!({
                "op": 0, "t": "MESSAGE_CREATE", "s": 2,
                "d": {"id": "10", "channel_id": "5", "content": "hi",
                      "author": {"id": "2", "username": "ann"}}
            }),
        )
        .await;

        loop {
            let frame = recv(&mut ws).await;
            if frame["op"] == 1 && frame["d"] == 2 {
                break;
            }
        }
        send(&mut ws, json!({"op": 11})).await;
        recv_close(&mut ws).await
    });

    let (handle, normalizer) = client(&url, false);
    let mut all = normalizer.bus().subscribe_all();
    handle.connect().await.unwrap();

    let first = timeout(TIMEOUT, all.recv()).await.unwrap().unwrap();
    assert_eq!(first.name, "ready");
    assert_eq!(first.sequence, Some(1));
    let second = timeout(TIMEOUT, all.recv()).await.unwrap().unwrap();
    assert_eq!(second.name, "messageCreate");
    assert!(matches!(&second.event, ClientEvent::MessageCreate(m) if m.content == "hi"));
    assert!(normalizer.caches().messages.get(&Snowflake::new(10)).is_some());

    eventually(|| handle.latency().is_some()).await;
    let session = handle.session();
    assert_eq!(session.session_id.as_deref(), Some("abc"));
    assert_eq!(session.last_sequence, Some(2));
    assert_eq!(session.phase, ConnectionPhase::Heartbeating);

    handle.shutdown().await;
    assert_eq!(server.await.unwrap(), Some(1000));
}

#[tokio::test]
async fn server_reconnect_request_resumes_on_new_socket() {
    let (listener, url) = bind().await;
    let resume_url = url.clone();
    let server = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        send(&mut first, hello(45_000)).await;
        assert_eq!(recv(&mut first).await["op"], 2);
        send(&mut first, ready(1, &resume_url)).await;
        send(&mut first, json!({"op": 7, "d": null})).await;
        let close = recv_close(&mut first).await;

        let mut second = accept(&listener).await;
        send(&mut second, hello(45_000)).await;
        let resume = recv(&mut second).await;
        send(&mut second, json!({"op": 0, "t": "RESUMED", "s": 2, "d": null})).await;
        let _ = recv_close(&mut second).await;
        (close, resume)
    });

    let (handle, normalizer) = client(&url, false);
    let mut resumed = normalizer.bus().subscribe("resumed");
    handle.connect().await.unwrap();

    let event = timeout(TIMEOUT, resumed.recv()).await.unwrap().unwrap();
    assert_eq!(event.sequence, Some(2));
    eventually(|| handle.session().last_sequence == Some(2)).await;
    assert_eq!(handle.session().phase, ConnectionPhase::Heartbeating);

    handle.shutdown().await;
    let (close, resume) = server.await.unwrap();
    assert_eq!(close, Some(4000));
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["session_id"], "abc");
    assert_eq!(resume["d"]["seq"], 1);
    assert_eq!(resume["d"]["token"], "tok");
}

#[tokio::test]
async fn unexpected_close_is_retried_with_resume() {
    let (listener, url) = bind().await;
    let resume_url = url.clone();
    let server = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        send(&mut first, hello(45_000)).await;
        let _identify = recv(&mut first).await;
        send(&mut first, ready(3, &resume_url)).await;
        first
            .close(Some(CloseFrame {
                code: 4000_u16.into(),
                reason: "try again".into(),
            }))
            .await
            .unwrap();

        let mut second = accept(&listener).await;
        send(&mut second, hello(45_000)).await;
        recv(&mut second).await
    });

    let (handle, _normalizer) = client(&url, true);
    handle.connect().await.unwrap();

    let resume = timeout(TIMEOUT, server).await.unwrap().unwrap();
    assert_eq!(resume["op"], 6);
    assert_eq!(resume["d"]["seq"], 3);
    handle.shutdown().await;
}

#[tokio::test]
async fn fatal_close_is_not_retried() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send(&mut ws, hello(45_000)).await;
        let _identify = recv(&mut ws).await;
        ws.close(Some(CloseFrame {
            code: 4004_u16.into(),
            reason: "Authentication failed.".into(),
        }))
        .await
        .unwrap();
        timeout(Duration::from_millis(300), listener.accept())
            .await
            .is_err()
    });

    let (handle, _normalizer) = client(&url, true);
    handle.connect().await.unwrap();

    assert!(server.await.unwrap(), "client reconnected after a fatal close");
    assert_eq!(handle.session().phase, ConnectionPhase::Idle);
    handle.shutdown().await;
}

#[tokio::test]
async fn connect_twice_opens_one_socket() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send(&mut ws, hello(45_000)).await;
        let _identify = recv(&mut ws).await;
        let second = timeout(Duration::from_millis(200), listener.accept()).await;
        let _ = recv_close(&mut ws).await;
        second.is_err()
    });

    let (handle, _normalizer) = client(&url, false);
    handle.connect().await.unwrap();
    handle.connect().await.unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    handle.shutdown().await;
    assert!(server.await.unwrap());
}
