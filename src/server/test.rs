//! Testing utilities for the server engine.
//!
//! A [`TestClient`] is the far end of an in-memory duplex stream whose near
//! end is wrapped in a [`User`] and handed to [`Server::connect`], so tests
//! drive the server exactly the way a TCP peer would, line by line.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use suzume_tokens::{Codec, Message};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use super::Server;
use crate::config::ServerConfig;
use crate::event::{Event, EventKind};
use crate::user::User;

pub(crate) const SERVER_NAME: &str = "testserver";

const EXPECT_TIMEOUT: Duration = Duration::from_secs(1);
const SILENCE_WINDOW: Duration = Duration::from_millis(100);

pub(crate) fn simple_server() -> Server {
    Server::new(SERVER_NAME)
}

pub(crate) fn discard_empty_server() -> Server {
    Server::with_config(ServerConfig {
        name: SERVER_NAME.to_owned(),
        discard_empty: true,
        ..ServerConfig::default()
    })
}

/// Subscribes a fresh queue to the server's events.
pub(crate) fn subscribe(server: &Server) -> mpsc::Receiver<Event> {
    let (queue, events) = mpsc::channel(10);
    server.subscribe(queue);
    events
}

pub(crate) async fn expect_event(events: &mut mpsc::Receiver<Event>, kind: EventKind) -> Event {
    match timeout(EXPECT_TIMEOUT, events.recv()).await {
        Ok(Some(event)) => {
            assert_eq!(event.kind(), kind, "unexpected event {:?}", event);
            event
        }
        Ok(None) => panic!("event bus closed while waiting for {:?}", kind),
        Err(_) => panic!("timed out waiting for {:?} event", kind),
    }
}

pub(crate) async fn expect_no_event(events: &mut mpsc::Receiver<Event>) {
    if let Ok(event) = timeout(SILENCE_WINDOW, events.recv()).await {
        panic!("expected no event, got {:?}", event);
    }
}

pub(crate) struct TestClient {
    framed: Framed<DuplexStream, Codec>,
}

impl TestClient {
    /// Connects a mock peer; the server sees `host` as its hostname.
    pub(crate) async fn connect(server: &Server, host: &str) -> TestClient {
        let (ours, theirs) = tokio::io::duplex(4096);
        let user = User::with_host(theirs, host);
        let server = server.clone();
        tokio::spawn(async move {
            let _ = server.connect(user).await;
        });
        TestClient {
            framed: Framed::new(ours, Codec),
        }
    }

    /// Connects and registers, swallowing the welcome reply.
    pub(crate) async fn register(server: &Server, nick: &str, host: &str) -> TestClient {
        let mut client = TestClient::connect(server, host).await;
        client.send(&format!("NICK {}", nick)).await;
        client.send("USER root 0 * :Mx Root").await;
        client
            .expect(&format!(":{} 001 {} :Welcome!", SERVER_NAME, nick))
            .await;
        client
    }

    pub(crate) async fn send(&mut self, line: &str) {
        let msg = Message::parse(line).expect("test sent an invalid message");
        self.framed.send(msg).await.expect("test connection closed");
    }

    pub(crate) async fn recv(&mut self) -> Message {
        match timeout(EXPECT_TIMEOUT, self.framed.next()).await {
            Ok(Some(Ok(msg))) => msg,
            Ok(broken) => panic!("connection broke while waiting for a reply: {:?}", broken),
            Err(_) => panic!("timed out waiting for a reply"),
        }
    }

    /// Asserts the next reply renders exactly as `line`.
    pub(crate) async fn expect(&mut self, line: &str) {
        let msg = self.recv().await;
        assert_eq!(msg.to_string(), line);
    }

    /// Asserts nothing is pending on this connection.
    pub(crate) async fn expect_silence(&mut self) {
        if let Ok(msg) = timeout(SILENCE_WINDOW, self.framed.next()).await {
            panic!("expected no reply, got {:?}", msg);
        }
    }

    /// Consumes every pending reply until the connection goes quiet.
    pub(crate) async fn drain(&mut self) {
        while let Ok(Some(Ok(_))) = timeout(SILENCE_WINDOW, self.framed.next()).await {}
    }

    /// Asserts the server has hung up on this connection.
    pub(crate) async fn expect_hangup(&mut self) {
        match timeout(EXPECT_TIMEOUT, async {
            loop {
                match self.framed.next().await {
                    Some(Ok(_)) => continue,
                    _ => break,
                }
            }
        })
        .await
        {
            Ok(()) => {}
            Err(_) => panic!("timed out waiting for the server to hang up"),
        }
    }
}

/// Polls until the predicate holds, for conditions settled by other tasks.
pub(crate) async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition did not hold within the timeout");
}

/// A registered pair (`foo` and `baz`) sharing `#chat`.
pub(crate) async fn joined_pair(server: &Server) -> (TestClient, TestClient) {
    let mut c1 = TestClient::register(server, "foo", "client1").await;
    let mut c2 = TestClient::register(server, "baz", "client2").await;

    c1.send("JOIN #chat").await;
    c1.expect(":foo!root@client1 JOIN #chat").await;
    c1.expect(&format!(":{} 353 foo = #chat :foo", SERVER_NAME))
        .await;
    c1.expect(&format!(":{} 366 foo :End of /NAMES list.", SERVER_NAME))
        .await;
    c1.expect(&format!(":{} 331 #chat :No topic is set", SERVER_NAME))
        .await;

    c2.send("JOIN #chat").await;
    c2.expect(":baz!root@client2 JOIN #chat").await;
    c2.expect(&format!(":{} 353 baz = #chat :baz foo", SERVER_NAME))
        .await;
    c2.expect(&format!(":{} 366 baz :End of /NAMES list.", SERVER_NAME))
        .await;
    c2.expect(&format!(":{} 331 #chat :No topic is set", SERVER_NAME))
        .await;
    c1.expect(":baz!root@client2 JOIN #chat").await;

    (c1, c2)
}
