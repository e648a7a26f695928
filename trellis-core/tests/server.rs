//! End-to-end Tests over HTTP and WebSocket
//!
//! Each test boots the axum server on an ephemeral port and talks to it with
//! a raw HTTP request or a `tokio-tungstenite` client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use trellis_core::events::Reply;
use trellis_core::page::PageContext;
use trellis_core::protocol::{ClientMessage, ServerMessage};
use trellis_core::state::{MemorySessionStore, StateSchema};
use trellis_core::tree::Node;
use trellis_core::{App, Server};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn visits_schema() -> Arc<StateSchema> {
    StateSchema::new("Visits")
        .field("views", 0)
        .field("count", 0)
        .method("increment", |state, _| {
            state.update("count", |n: i64| n + 1)?;
            Ok(Reply::None)
        })
        .build()
}

/// An app whose home page counts its own renders.
fn app(schema: &Arc<StateSchema>) -> Server {
    app_with(App::new(), schema)
}

fn app_with(app: App, schema: &Arc<StateSchema>) -> Server {
    let page_state = schema.clone();
    app
        .state(schema)
        .page("/", move |ctx: &PageContext| {
            let (views, count) = ctx.state().with_instance(&page_state, |state| {
                state.update("views", |n: i64| n + 1)?;
                Ok::<_, trellis_core::error::StateError>((state.read("views"), state.read("count")))
            })?;
            Ok(Node::new("p")
                .id("stats")
                .child(format!("views={} count={}", views.unwrap_or_default(), count.unwrap_or_default())))
        })
        .page("/users/{id}", |ctx: &PageContext| {
            Ok(Node::with("h1", format!("user {}", ctx.param("id").unwrap_or("?"))))
        })
        .page("/about", |_: &PageContext| Ok(Node::with("h1", "About")))
        .build()
}

async fn start(server: Server) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener, std::future::pending()));
    addr
}

async fn http_get(addr: SocketAddr, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    let status = raw
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();
    let body = raw
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

fn session_of(document: &str) -> String {
    let start = document.find(r#""session":""#).unwrap() + r#""session":""#.len();
    let end = document[start..].find('"').unwrap();
    document[start..start + end].to_string()
}

async fn open_socket(addr: SocketAddr, query: &str) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}/ws{query}")).await.unwrap();
    socket
}

async fn send_json(socket: &mut Socket, message: &ClientMessage) {
    let text = serde_json::to_string(message).unwrap();
    socket.send(Message::Text(text)).await.unwrap();
}

async fn next_message(socket: &mut Socket) -> Message {
    loop {
        let message = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if !matches!(message, Message::Ping(_) | Message::Pong(_)) {
            return message;
        }
    }
}

async fn next_json(socket: &mut Socket) -> Value {
    match next_message(socket).await {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

/// The page document carries the rendered content and a session id.
#[tokio::test]
async fn page_document_is_served() {
    let addr = start(app(&visits_schema())).await;
    let (status, body) = http_get(addr, "/").await;

    assert_eq!(status, 200);
    assert!(body.starts_with("<!DOCTYPE html>"));
    assert!(body.contains(r#"<p class="" id="stats">views=1 count=0</p>"#));
    assert!(!session_of(&body).is_empty());
}

#[tokio::test]
async fn unknown_path_is_404_document() {
    let addr = start(app(&visits_schema())).await;
    let (status, body) = http_get(addr, "/missing").await;

    assert_eq!(status, 404);
    assert!(body.contains("Page not found: /missing"));
}

#[tokio::test]
async fn dynamic_route_renders_param() {
    let addr = start(app(&visits_schema())).await;
    let (status, body) = http_get(addr, "/users/42").await;
    assert_eq!(status, 200);
    assert!(body.contains("user 42"));
}

#[tokio::test]
async fn robots_and_sitemap() {
    let addr = start(app(&visits_schema())).await;

    let (status, robots) = http_get(addr, "/robots.txt").await;
    assert_eq!(status, 200);
    assert!(robots.contains("User-agent: *"));

    let (status, sitemap) = http_get(addr, "/sitemap.xml").await;
    assert_eq!(status, 200);
    assert!(sitemap.contains(&format!("<loc>http://{addr}/</loc>")));
    assert!(sitemap.contains(&format!("<loc>http://{addr}/about</loc>")));
    assert!(!sitemap.contains("users"));
}

/// A socket opened with the page's session continues from the page's state.
#[tokio::test]
async fn socket_resumes_page_session() {
    let addr = start(app(&visits_schema())).await;
    let (_, body) = http_get(addr, "/").await;
    let session = session_of(&body);

    let mut socket = open_socket(addr, &format!("?session={session}")).await;
    send_json(&mut socket, &ClientMessage::event("Visits.increment", json!({})).at("/")).await;

    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "navigate_content");
    assert_eq!(reply["path"], "/");
    assert_eq!(
        reply["content"],
        r#"<p class="" id="stats">views=2 count=1</p>"#
    );
}

#[tokio::test]
async fn socket_without_session_starts_fresh() {
    let addr = start(app(&visits_schema())).await;
    let mut socket = open_socket(addr, "").await;

    send_json(&mut socket, &ClientMessage::navigate("/")).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(
        reply["content"],
        r#"<p class="" id="stats">views=1 count=0</p>"#
    );
}

/// Malformed frames are skipped without closing the socket.
#[tokio::test]
async fn malformed_frame_keeps_socket_open() {
    let addr = start(app(&visits_schema())).await;
    let mut socket = open_socket(addr, "").await;

    socket.send(Message::Text("{\"type\":\"bogus\"}".into())).await.unwrap();
    socket.send(Message::Text("not json".into())).await.unwrap();
    send_json(&mut socket, &ClientMessage::navigate("/about")).await;

    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "navigate_content");
    assert_eq!(reply["content"], r#"<h1 class="" >About</h1>"#);
}

#[tokio::test]
async fn msgpack_socket_uses_binary_frames() {
    let addr = start(app(&visits_schema())).await;
    let mut socket = open_socket(addr, "?format=msgpack").await;

    let bytes = rmp_serde::to_vec_named(&ClientMessage::navigate("/about")).unwrap();
    socket.send(Message::Binary(bytes)).await.unwrap();

    let Message::Binary(reply) = next_message(&mut socket).await else {
        panic!("expected a binary frame");
    };
    let message: ServerMessage = rmp_serde::from_slice(&reply).unwrap();
    assert_eq!(
        message,
        ServerMessage::NavigateContent {
            path: "/about".into(),
            content: r#"<h1 class="" >About</h1>"#.into(),
        }
    );
}

/// Closing the socket removes the connection from the manager.
#[tokio::test]
async fn closing_socket_unregisters_connection() {
    let server = app(&visits_schema());
    let addr = start(server.clone()).await;

    let mut socket = open_socket(addr, "").await;
    send_json(&mut socket, &ClientMessage::navigate("/about")).await;
    next_json(&mut socket).await;
    assert_eq!(server.manager().len(), 1);

    socket.close(None).await.unwrap();
    timeout(Duration::from_secs(2), async {
        while !server.manager().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection still registered");
}

/// Only rendered pages keep a session, and an open socket holds its session
/// outside the store until it closes.
#[tokio::test]
async fn session_store_tracks_pages_and_sockets() {
    let store = Arc::new(MemorySessionStore::new());
    let server = app_with(App::new().session_store(store.clone()), &visits_schema());
    let addr = start(server.clone()).await;

    for path in ["/favicon.ico", "/wp-login.php"] {
        assert_eq!(http_get(addr, path).await.0, 404);
    }
    assert!(store.is_empty());

    let mut sessions = Vec::new();
    for _ in 0..3 {
        sessions.push(session_of(&http_get(addr, "/").await.1));
    }
    assert_eq!(store.len(), 3);

    let mut socket = open_socket(addr, &format!("?session={}", sessions[0])).await;
    send_json(&mut socket, &ClientMessage::navigate("/about")).await;
    next_json(&mut socket).await;
    assert_eq!(store.len(), 2);

    socket.close(None).await.unwrap();
    timeout(Duration::from_secs(2), async {
        while store.len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session not saved back on close");
    assert_eq!(store.len(), 3);
    assert!(server.manager().is_empty());
}
