//! End-to-end chat scenarios over real TCP connections
//!
//! Every scenario runs against both session strategies: the
//! task-per-connection `ChatServer` and the single-threaded `Reactor`.

use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use line_chat::{ChatServer, Reactor, ServerConfig};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_threaded(max_sessions: usize) -> SocketAddr {
    let config = ServerConfig {
        addr: "127.0.0.1:0".to_string(),
        max_sessions,
    };
    let server = ChatServer::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

fn start_reactor() -> SocketAddr {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut reactor = Reactor::bind("127.0.0.1:0").unwrap();
        tx.send(reactor.local_addr().unwrap()).unwrap();
        let _ = reactor.run();
    });
    rx.recv().unwrap()
}

async fn next_line<S>(lines: &mut S) -> String
where
    S: Stream<Item = Result<String, LinesCodecError>> + Unpin,
{
    timeout(RECV_TIMEOUT, lines.next())
        .await
        .expect("timed out waiting for a line")
        .expect("connection closed")
        .unwrap()
}

struct TestClient {
    framed: Framed<TcpStream, LinesCodec>,
}

impl TestClient {
    /// Connect and consume the greeting
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut client = Self {
            framed: Framed::new(stream, LinesCodec::new()),
        };
        assert!(client.recv().await.starts_with("WELCOME "));
        assert_eq!(client.recv().await, "SUBMITNAME");
        client
    }

    /// Connect and register under `name`
    async fn login(addr: SocketAddr, name: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(name).await;
        assert_eq!(client.recv().await, format!("NAMEACCEPTED {}", name));
        assert_eq!(client.recv().await, format!("NOTICE {} has joined", name));
        client
    }

    async fn send(&mut self, line: &str) {
        self.framed.send(line).await.unwrap();
    }

    async fn recv(&mut self) -> String {
        next_line(&mut self.framed).await
    }

    async fn expect_closed(&mut self) {
        let next = timeout(RECV_TIMEOUT, self.framed.next())
            .await
            .expect("timed out waiting for close");
        assert!(next.is_none(), "expected close, got {:?}", next);
    }
}

async fn name_conflict_reprompts(addr: SocketAddr) {
    let mut alice = TestClient::login(addr, "Alice").await;

    let mut bob = TestClient::connect(addr).await;
    bob.send("Alice").await;
    assert_eq!(bob.recv().await, "ERROR name 'Alice' is already taken");
    assert_eq!(bob.recv().await, "SUBMITNAME");

    bob.send("Bob").await;
    assert_eq!(bob.recv().await, "NAMEACCEPTED Bob");
    assert_eq!(bob.recv().await, "NOTICE Bob has joined");
    assert_eq!(alice.recv().await, "NOTICE Bob has joined");

    alice.send("/users").await;
    assert_eq!(alice.recv().await, "USERS Alice Bob");
}

async fn broadcast_and_private(addr: SocketAddr) {
    let mut alice = TestClient::login(addr, "Alice").await;
    let mut bob = TestClient::login(addr, "Bob").await;
    assert_eq!(alice.recv().await, "NOTICE Bob has joined");
    let mut carol = TestClient::login(addr, "Carol").await;
    assert_eq!(alice.recv().await, "NOTICE Carol has joined");
    assert_eq!(bob.recv().await, "NOTICE Carol has joined");

    alice.send("hello").await;
    for client in [&mut alice, &mut bob, &mut carol] {
        assert_eq!(client.recv().await, "Alice: hello");
    }

    alice.send("@Bob secret").await;
    assert_eq!(alice.recv().await, "PRIVATE Alice Bob secret");
    assert_eq!(bob.recv().await, "PRIVATE Alice Bob secret");

    alice.send("@Charlie hi").await;
    assert_eq!(alice.recv().await, "ERROR no such user: Charlie");

    // Carol's next line must be this marker, not the private or the error
    bob.send("marker").await;
    assert_eq!(carol.recv().await, "Bob: marker");
    assert_eq!(bob.recv().await, "Bob: marker");
    assert_eq!(alice.recv().await, "Bob: marker");
}

async fn drop_without_quit(addr: SocketAddr) {
    let mut alice = TestClient::login(addr, "Alice").await;
    let bob = TestClient::login(addr, "Bob").await;
    assert_eq!(alice.recv().await, "NOTICE Bob has joined");

    drop(bob);
    assert_eq!(alice.recv().await, "NOTICE Bob has left");

    // No second notice ahead of the listing
    alice.send("/users").await;
    assert_eq!(alice.recv().await, "USERS Alice");

    // The name is free again
    let _bob = TestClient::login(addr, "Bob").await;
    assert_eq!(alice.recv().await, "NOTICE Bob has joined");
}

async fn quit_closes_once(addr: SocketAddr) {
    let mut alice = TestClient::login(addr, "Alice").await;
    let mut bob = TestClient::login(addr, "Bob").await;
    assert_eq!(alice.recv().await, "NOTICE Bob has joined");

    bob.send("/quit").await;
    assert_eq!(bob.recv().await, "BYE");
    bob.expect_closed().await;

    assert_eq!(alice.recv().await, "NOTICE Bob has left");
    alice.send("/users").await;
    assert_eq!(alice.recv().await, "USERS Alice");
}

async fn sender_order_preserved(addr: SocketAddr) {
    let mut alice = TestClient::login(addr, "Alice").await;
    let mut bob = TestClient::login(addr, "Bob").await;
    assert_eq!(alice.recv().await, "NOTICE Bob has joined");

    for i in 0..20 {
        alice.send(&format!("m{}", i)).await;
    }
    for i in 0..20 {
        assert_eq!(bob.recv().await, format!("Alice: m{}", i));
    }
}

async fn concurrent_same_name(addr: SocketAddr) {
    let mut first = TestClient::connect(addr).await;
    let mut second = TestClient::connect(addr).await;

    tokio::join!(first.send("Dave"), second.send("Dave"));
    let (a, b) = tokio::join!(first.recv(), second.recv());

    let accepted = [&a, &b]
        .iter()
        .filter(|line| line.as_str() == "NAMEACCEPTED Dave")
        .count();
    let rejected = [&a, &b]
        .iter()
        .filter(|line| line.as_str() == "ERROR name 'Dave' is already taken")
        .count();
    assert_eq!((accepted, rejected), (1, 1));
}

async fn malformed_private_reported(addr: SocketAddr) {
    let mut alice = TestClient::login(addr, "Alice").await;

    alice.send("@Bob").await;
    assert_eq!(alice.recv().await, "ERROR usage: @<name> <message>");

    alice.send("still here").await;
    assert_eq!(alice.recv().await, "Alice: still here");
}

fn bulk_line(i: usize) -> String {
    format!("{:05} {}", i, "x".repeat(200))
}

async fn slow_reader_catches_up(addr: SocketAddr) {
    // A few MB in total: far more than the socket buffers hold
    const LINES: usize = 10_000;

    let alice = TestClient::login(addr, "Alice").await;
    let mut bob = TestClient::login(addr, "Bob").await;
    let (mut to_server, mut from_server) = alice.framed.split();

    // Alice keeps reading her own copies; Bob reads nothing meanwhile
    let send = async move {
        for i in 0..LINES {
            to_server.send(bulk_line(i)).await.unwrap();
        }
        to_server
    };
    let echo = async move {
        assert_eq!(next_line(&mut from_server).await, "NOTICE Bob has joined");
        for i in 0..LINES {
            assert_eq!(
                next_line(&mut from_server).await,
                format!("Alice: {}", bulk_line(i))
            );
        }
        from_server
    };
    let (_to_server, _from_server) = tokio::join!(send, echo);

    for i in 0..LINES {
        assert_eq!(bob.recv().await, format!("Alice: {}", bulk_line(i)));
    }
}

macro_rules! both_strategies {
    ($($scenario:ident => $threaded:ident, $reactor:ident;)*) => {
        $(
            #[tokio::test]
            async fn $threaded() {
                $scenario(start_threaded(16).await).await;
            }

            #[tokio::test]
            async fn $reactor() {
                $scenario(start_reactor()).await;
            }
        )*
    };
}

both_strategies! {
    name_conflict_reprompts => threaded_name_conflict, reactor_name_conflict;
    broadcast_and_private => threaded_broadcast_and_private, reactor_broadcast_and_private;
    drop_without_quit => threaded_drop_without_quit, reactor_drop_without_quit;
    quit_closes_once => threaded_quit_closes_once, reactor_quit_closes_once;
    sender_order_preserved => threaded_order_preserved, reactor_order_preserved;
    concurrent_same_name => threaded_concurrent_same_name, reactor_concurrent_same_name;
    malformed_private_reported => threaded_malformed_private, reactor_malformed_private;
    slow_reader_catches_up => threaded_slow_reader_catches_up, reactor_slow_reader_catches_up;
}

#[tokio::test]
async fn threaded_pool_queues_excess_connections() {
    let addr = start_threaded(1).await;

    let mut first = TestClient::login(addr, "Alice").await;

    // Accepted by the kernel backlog but not served yet
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut waiting = Framed::new(stream, LinesCodec::new());
    assert!(timeout(Duration::from_millis(300), waiting.next())
        .await
        .is_err());

    first.send("/quit").await;
    assert_eq!(first.recv().await, "BYE");

    let greeting = timeout(RECV_TIMEOUT, waiting.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(greeting.starts_with("WELCOME "));
}
