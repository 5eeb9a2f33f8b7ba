//! WebSocket end-to-end tests
//!
//! Starts the accept loop on an ephemeral port and talks to it with a
//! tungstenite client, replaying the frames into a [`Client`].

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures_util::{SinkExt, StreamExt};
use tephra_client::{Client, ClientAction, ClientConfig};
use tephra_proto::{NodeId, SESSION_TOKEN_COOKIE};
use tephra_server::{Authority, ServerConfig, SystemEnv, demo::Counter};
use tokio::{
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::{HeaderValue, header::COOKIE},
    },
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const BUTTON: NodeId = NodeId(2);
const LABEL: NodeId = NodeId(3);
const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let authority = Arc::new(Authority::new(SystemEnv, ServerConfig::default()));
    tokio::spawn(tephra_server::run(listener, authority, Counter::new));
    addr
}

async fn open(addr: std::net::SocketAddr, path: &str, token: Option<&str>) -> Socket {
    let mut request = format!("ws://{addr}{path}").into_client_request().unwrap();
    if let Some(token) = token {
        let cookie = HeaderValue::from_str(&format!("{SESSION_TOKEN_COOKIE}={token}")).unwrap();
        request.headers_mut().insert(COOKIE, cookie);
    }
    let (socket, _) = connect_async(request).await.unwrap();
    socket
}

fn label(client: &Client) -> Option<String> {
    let dom = client.dom(LABEL)?;
    client.document().text(dom).map(str::to_owned)
}

/// Replay binary messages until `done` holds, sending whatever the client
/// queues back over the socket.
async fn pump_until(socket: &mut Socket, client: &mut Client, done: impl Fn(&Client) -> bool) {
    while !done(client) {
        let message = timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
        if let Message::Binary(frame) = message {
            client.on_frame(&frame, Instant::now()).unwrap();
            send_actions(socket, client).await;
        }
    }
}

async fn send_actions(socket: &mut Socket, client: &mut Client) {
    for action in client.take_actions() {
        if let ClientAction::Send(frame) = action {
            socket.send(Message::Binary(frame)).await.unwrap();
        }
    }
}

#[tokio::test]
async fn counter_survives_reconnect_over_websocket() {
    let addr = start_server().await;

    let mut client = Client::new(ClientConfig::default(), "/inbox");
    let mut socket = open(addr, "/inbox", None).await;
    client.on_connected();
    pump_until(&mut socket, &mut client, |c| label(c).is_some()).await;
    assert_eq!(label(&client).as_deref(), Some("0"));

    client.click(BUTTON, Instant::now()).unwrap();
    send_actions(&mut socket, &mut client).await;
    pump_until(&mut socket, &mut client, |c| label(c).as_deref() == Some("1")).await;

    let token = client.token().unwrap().to_owned();
    socket.close(None).await.unwrap();
    client.on_disconnected();

    let mut socket = open(addr, "/inbox", Some(&token)).await;
    client.on_connected();
    pump_until(&mut socket, &mut client, |c| label(c).is_some()).await;
    assert_eq!(label(&client).as_deref(), Some("1"));
}

#[tokio::test]
async fn request_path_becomes_location() {
    let addr = start_server().await;

    let mut client = Client::new(ClientConfig::default(), "/deep/link");
    let mut socket = open(addr, "/deep/link", None).await;
    client.on_connected();
    pump_until(&mut socket, &mut client, |c| label(c).is_some()).await;

    let root = client.document().root();
    assert!(client.document().text_content(root).ends_with("/deep/link"));
}
