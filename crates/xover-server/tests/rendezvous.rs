//! End-to-end tests against an in-process rendezvous server.

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use xover_server::{serve, RendezvousStore, ServerState};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(ttl: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(ServerState::new(RendezvousStore::new(ttl)));
    tokio::spawn(serve(listener, state));
    addr
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    socket
}

async fn request(socket: &mut Socket, message: Value) -> Value {
    socket
        .send(Message::Text(message.to_string()))
        .await
        .unwrap();
    loop {
        match socket.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

fn by_code(kind: &str, code: &str) -> Value {
    json!({"type": kind, "payload": {"code": code}})
}

fn signal(code: &str, kind: &str, payload: Value, timestamp: u64) -> Value {
    json!({
        "type": "Signal",
        "payload": {
            "code": code,
            "message": {"type": kind, "payload": payload, "timestamp": timestamp}
        }
    })
}

#[tokio::test]
async fn test_two_peers_exchange_through_record() {
    let addr = start_server(Duration::from_secs(300)).await;
    let mut host = connect(addr).await;
    let mut joiner = connect(addr).await;

    let created = request(&mut host, by_code("Create", "ABC123")).await;
    assert_eq!(created, json!({"type": "Created", "payload": {"code": "ABC123"}}));

    let published = request(&mut host, signal("ABC123", "offer", json!({"sdp": "o"}), 1)).await;
    assert_eq!(published["payload"]["accepted"], json!(true));
    request(&mut host, signal("ABC123", "ice", json!({"candidate": "h1"}), 2)).await;

    // Lower-case input is normalized
    let fetched = request(&mut joiner, by_code("Fetch", "abc123")).await;
    assert_eq!(fetched["type"], json!("Record"));
    assert_eq!(fetched["payload"]["record"]["offer"]["payload"]["sdp"], json!("o"));
    assert_eq!(fetched["payload"]["record"]["hostIce"].as_array().unwrap().len(), 1);

    request(&mut joiner, signal("ABC123", "answer", json!({"sdp": "a"}), 3)).await;
    request(&mut joiner, signal("ABC123", "ice", json!({"candidate": "j1"}), 4)).await;

    let record = request(&mut host, by_code("Fetch", "ABC123")).await;
    let record = &record["payload"]["record"];
    assert_eq!(record["answer"]["payload"]["sdp"], json!("a"));
    assert_eq!(record["joinerIce"][0]["payload"]["candidate"], json!("j1"));
    assert_eq!(record["hostIce"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_code_and_bad_input() {
    let addr = start_server(Duration::from_secs(300)).await;
    let mut socket = connect(addr).await;

    let missing = request(&mut socket, by_code("Fetch", "NONE00")).await;
    assert_eq!(missing, json!({"type": "NotFound", "payload": {"code": "NONE00"}}));

    let dropped = request(&mut socket, signal("NONE00", "answer", json!({"sdp": "a"}), 1)).await;
    assert_eq!(dropped["payload"]["accepted"], json!(false));

    let garbage = request(&mut socket, json!({"type": "Launch"})).await;
    assert_eq!(garbage["type"], json!("Error"));

    let pong = request(&mut socket, json!({"type": "Ping"})).await;
    assert_eq!(pong, json!({"type": "Pong"}));
}

#[tokio::test]
async fn test_record_expires() {
    let addr = start_server(Duration::from_millis(50)).await;
    let mut socket = connect(addr).await;

    request(&mut socket, by_code("Create", "SHORT1")).await;
    tokio::time::sleep(Duration::from_millis(120)).await;

    let fetched = request(&mut socket, by_code("Fetch", "SHORT1")).await;
    assert_eq!(fetched["type"], json!("NotFound"));
}
