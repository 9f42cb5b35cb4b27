use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use serde_json::json;
use tokio::time::Instant;

use super::*;
use crate::{
    dispatch::Dispatcher,
    ws::{
        message::EntityType,
        transport::mock::{MockConnector, Server},
    },
    Client, Config,
};

const INTERVAL: Duration = Duration::from_secs(3);
const POLL: Duration = Duration::from_secs(1);

fn client(connector: &MockConnector) -> Client<MockConnector> {
    Client::with_connector(
        Config::new("ws://feed.test/ws")
            .reconnect_interval(INTERVAL)
            .max_reconnect_attempts(3),
        connector.clone(),
    )
    .unwrap()
}

fn lodging(id: &str) -> SubscriptionKey {
    SubscriptionKey::new(id, EntityType::Hospedaje)
}

fn counting_refresher() -> (Arc<AtomicUsize>, impl Fn() -> futures_util::future::Ready<()>) {
    let count = Arc::new(AtomicUsize::new(0));
    let refresher = {
        let count = Arc::clone(&count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(())
        }
    };
    (count, refresher)
}

async fn wait_until<C, F>(conn: &Connection<C>, pred: F) -> Snapshot
where
    C: Connector,
    F: Fn(&Snapshot) -> bool,
{
    let mut rx = conn.watch();
    loop {
        {
            let snapshot = rx.borrow_and_update();
            if pred(&*snapshot) {
                return snapshot.clone();
            }
        }
        rx.changed().await.expect("connection manager stopped");
    }
}

async fn open_server(
    conn: &Connection<MockConnector>,
    accepted: &mut tokio::sync::mpsc::UnboundedReceiver<Server>,
) -> Server {
    let mut server = accepted.recv().await.unwrap();
    wait_until(conn, Snapshot::is_connected).await;
    assert_eq!(
        server.recv().await.unwrap(),
        Envelope::subscribe(conn.key()),
        "first envelope on a new socket must be subscribe"
    );
    server
}

fn assert_polling_invariant(snapshot: &Snapshot) {
    assert_eq!(snapshot.polling, !snapshot.is_connected(), "{:?}", snapshot);
}

#[tokio::test(start_paused = true)]
async fn test_message_then_reconnect_after_abnormal_close() {
    let (connector, mut accepted) = MockConnector::new();
    let conn = client(&connector).connect(lodging("42"));

    assert_eq!(conn.snapshot().state, ConnectionState::Connecting);
    assert!(conn.last_message().is_none());

    let server = open_server(&conn, &mut accepted).await;
    assert!(server.url.as_str().ends_with("/ws/42?type=HOSPEDAJE"));

    server.push(&Envelope::new("reserva:nueva", json!({"id": 9})));
    let snapshot = wait_until(&conn, |s| s.last_message.is_some()).await;
    assert!(snapshot.is_connected());
    assert_eq!(snapshot.last_message.unwrap().payload["id"], 9);

    let dropped_at = Instant::now();
    drop(server);

    let snapshot = wait_until(&conn, |s| s.state == ConnectionState::Closed).await;
    assert_eq!(snapshot.reconnect_attempts, 1);
    assert!(!snapshot.exhausted);

    let mut server = accepted.recv().await.unwrap();
    let waited = dropped_at.elapsed();
    assert!(waited >= INTERVAL && waited < INTERVAL * 2, "{:?}", waited);

    wait_until(&conn, Snapshot::is_connected).await;
    assert_eq!(server.recv().await.unwrap(), Envelope::subscribe(&lodging("42")));
    assert_eq!(conn.snapshot().reconnect_attempts, 0);
    // last message survives the reconnection
    assert_eq!(conn.last_message().unwrap().kind, "reserva:nueva");
    assert_eq!(connector.attempts(), 2);

    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_counter_reset_when_open() {
    let (connector, mut accepted) = MockConnector::new();
    connector.set_online(false);

    let conn = client(&connector).connect(lodging("42"));

    let snapshot = wait_until(&conn, |s| s.reconnect_attempts == 3).await;
    assert_eq!(snapshot.state, ConnectionState::Closed);
    assert!(!snapshot.exhausted);
    assert_eq!(connector.attempts(), 3);

    connector.set_online(true);

    let _server = open_server(&conn, &mut accepted).await;
    assert_eq!(conn.snapshot().reconnect_attempts, 0);
    assert_eq!(connector.attempts(), 4);

    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded_until_manual_reconnect() {
    let (connector, mut accepted) = MockConnector::new();
    connector.set_online(false);

    let conn = client(&connector).connect(lodging("42"));

    let snapshot = wait_until(&conn, |s| s.exhausted).await;
    assert_eq!(snapshot.state, ConnectionState::Closed);
    assert_eq!(snapshot.reconnect_attempts, 3);
    assert_eq!(connector.attempts(), 4);

    connector.set_online(true);
    tokio::time::sleep(INTERVAL * 20).await;

    assert_eq!(connector.attempts(), 4);
    assert!(!conn.is_connected());

    conn.reconnect();

    let _server = open_server(&conn, &mut accepted).await;
    let snapshot = conn.snapshot();
    assert_eq!(snapshot.reconnect_attempts, 0);
    assert!(!snapshot.exhausted);
    assert_eq!(connector.attempts(), 5);

    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_is_dropped() {
    let (connector, mut accepted) = MockConnector::new();
    let conn = client(&connector).connect(lodging("42"));
    let server = open_server(&conn, &mut accepted).await;

    server.push(&Envelope::new("reserva:nueva", json!({"id": 1})));
    wait_until(&conn, |s| s.last_message.is_some()).await;

    server.push_text("<html>502 Bad Gateway</html>");
    server.push_text(r#"{"payload": "no type"}"#);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = conn.snapshot();
    assert!(snapshot.is_connected());
    assert_eq!(snapshot.last_message.unwrap().payload["id"], 1);
    assert_eq!(connector.attempts(), 1);

    server.push(&Envelope::new("reserva:actualizada", json!({"id": 1})));
    let snapshot = wait_until(&conn, |s| {
        s.last_message.as_ref().map(|m| m.kind.as_str()) == Some("reserva:actualizada")
    })
    .await;
    assert!(snapshot.is_connected());

    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_polling_active_iff_not_connected() {
    let (connector, mut accepted) = MockConnector::new();
    let (refreshes, refresher) = counting_refresher();

    let conn = client(&connector)
        .connect_with_fallback(lodging("42"), refresher, POLL)
        .unwrap();
    assert!(conn.snapshot().polling);

    // open
    let server = open_server(&conn, &mut accepted).await;
    assert_polling_invariant(&conn.snapshot());

    // closed
    drop(server);
    let snapshot = wait_until(&conn, |s| s.state == ConnectionState::Closed).await;
    assert_polling_invariant(&snapshot);

    // open again, fallback ticked while the socket was down
    let server = open_server(&conn, &mut accepted).await;
    assert_polling_invariant(&conn.snapshot());
    assert!(refreshes.load(Ordering::SeqCst) >= 2);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let while_open = refreshes.load(Ordering::SeqCst);
    tokio::time::sleep(POLL * 10).await;
    assert_eq!(refreshes.load(Ordering::SeqCst), while_open);

    // closed again
    drop(server);
    let snapshot = wait_until(&conn, |s| s.state == ConnectionState::Closed).await;
    assert_polling_invariant(&snapshot);

    tokio::time::sleep(POLL + Duration::from_millis(10)).await;
    assert!(refreshes.load(Ordering::SeqCst) > while_open);

    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_once_after_reconnect() {
    let (connector, mut accepted) = MockConnector::new();
    let (refreshes, refresher) = counting_refresher();

    // fallback ticks far slower than the reconnect interval
    let conn = client(&connector)
        .connect_with_fallback(lodging("42"), refresher, INTERVAL * 100)
        .unwrap();

    let server = open_server(&conn, &mut accepted).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(refreshes.load(Ordering::SeqCst), 0);

    drop(server);
    let _server = open_server(&conn, &mut accepted).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);

    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_sent_once_per_open() {
    let (connector, mut accepted) = MockConnector::new();
    connector.set_online(false);

    let conn = client(&connector).connect(lodging("42"));
    assert!(matches!(
        conn.send(Envelope::new("ping", json!(null))),
        Err(SendError::NotConnected)
    ));

    wait_until(&conn, |s| s.reconnect_attempts == 2).await;
    connector.set_online(true);

    let mut server = open_server(&conn, &mut accepted).await;
    assert_eq!(connector.attempts(), 3);

    conn.send(Envelope::new("pedido:visto", json!({"id": 3}))).unwrap();
    assert_eq!(server.recv().await.unwrap().kind, "pedido:visto");

    tokio::time::sleep(INTERVAL * 5).await;
    assert!(server.drain().is_empty());

    conn.close().await;

    // no other socket was opened
    assert!(accepted.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_every_timer() {
    let (connector, _accepted) = MockConnector::new();
    connector.set_online(false);
    let (refreshes, refresher) = counting_refresher();

    let conn = client(&connector)
        .connect_with_fallback(lodging("42"), refresher, POLL)
        .unwrap();

    wait_until(&conn, |s| s.reconnect_attempts == 1).await;
    tokio::time::sleep(POLL * 2).await;

    let watch = conn.watch();
    conn.close().await;

    let attempts = connector.attempts();
    let refreshed = refreshes.load(Ordering::SeqCst);
    assert!(refreshed > 0);

    tokio::time::sleep(INTERVAL * 10).await;

    assert_eq!(connector.attempts(), attempts);
    assert_eq!(refreshes.load(Ordering::SeqCst), refreshed);

    let snapshot = watch.borrow().clone();
    assert_eq!(snapshot.state, ConnectionState::Closed);
    assert!(!snapshot.polling);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_waits_for_running_refresh() {
    let (connector, _accepted) = MockConnector::new();
    connector.set_online(false);

    let alive = Arc::new(());
    let refresher = {
        let alive = Arc::clone(&alive);
        move || {
            let alive = Arc::clone(&alive);
            async move {
                let _alive = alive;
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    };

    let conn = client(&connector)
        .connect_with_fallback(lodging("42"), refresher, POLL)
        .unwrap();

    tokio::time::sleep(POLL + Duration::from_millis(10)).await;
    // test, refresher closure and the running refresh
    assert_eq!(Arc::strong_count(&alive), 3);

    conn.close().await;

    assert_eq!(Arc::strong_count(&alive), 1);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_while_handshake_hangs() {
    let (connector, mut accepted) = MockConnector::new();
    connector.set_hanging(true);

    let conn = client(&connector).connect(lodging("42"));

    tokio::time::sleep(INTERVAL).await;
    assert_eq!(connector.attempts(), 1);
    assert_eq!(conn.snapshot().state, ConnectionState::Connecting);

    // a manual reconnect abandons the hanging handshake
    conn.reconnect();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(connector.attempts(), 2);

    let watch = conn.watch();
    conn.close().await;

    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(connector.attempts(), 2);
    assert!(accepted.try_recv().is_err());

    let snapshot = watch.borrow().clone();
    assert_eq!(snapshot.state, ConnectionState::Closed);
    assert_eq!(snapshot.reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_when_open_closes_socket() {
    let (connector, mut accepted) = MockConnector::new();
    let conn = client(&connector).connect(lodging("42"));
    let mut server = open_server(&conn, &mut accepted).await;

    conn.close().await;

    assert!(server.recv().await.is_none());
    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_switch_key_isolates_subscriptions() {
    let (connector, mut accepted) = MockConnector::new();
    let mut conn = client(&connector).connect(lodging("A"));
    let mut server_a = open_server(&conn, &mut accepted).await;

    server_a.push(&Envelope::new("reserva:nueva", json!({"for": "A"})));
    wait_until(&conn, |s| s.last_message.is_some()).await;

    conn.switch(lodging("A")).await;
    assert_eq!(connector.attempts(), 1);

    conn.switch(lodging("B")).await;
    assert_eq!(conn.key(), &lodging("B"));

    // old socket is closed before the new one exists
    assert!(server_a.recv().await.is_none());
    server_a.push(&Envelope::new("reserva:nueva", json!({"for": "A", "late": true})));

    let mut server_b = open_server(&conn, &mut accepted).await;
    assert!(server_b.url.as_str().ends_with("/ws/B?type=HOSPEDAJE"));

    tokio::time::sleep(INTERVAL).await;
    assert!(conn.last_message().is_none());
    assert!(server_b.drain().is_empty());
    assert_eq!(connector.attempts(), 2);

    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_from_open() {
    let (connector, mut accepted) = MockConnector::new();
    let conn = client(&connector).connect(lodging("42"));
    let mut first = open_server(&conn, &mut accepted).await;

    conn.reconnect();

    assert!(first.recv().await.is_none());
    let _second = open_server(&conn, &mut accepted).await;
    assert_eq!(connector.attempts(), 2);

    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_and_token_on_connect() {
    let (connector, mut accepted) = MockConnector::new();
    let orders = Arc::new(AtomicUsize::new(0));

    let feed = {
        let orders = Arc::clone(&orders);
        client(&connector)
            .token_provider(|| Some("s3cret".to_string()))
            .dispatcher(Dispatcher::new().on("pedido:nuevo", move |_: &Envelope| {
                orders.fetch_add(1, Ordering::SeqCst);
            }))
    };

    let conn = feed.connect(SubscriptionKey::new("7", EntityType::Restaurante));
    let server = open_server(&conn, &mut accepted).await;
    assert_eq!(server.url.query(), Some("type=RESTAURANTE&token=s3cret"));

    server.push(&Envelope::new("pedido:nuevo", json!({"mesa": 4})));
    server.push(&Envelope::new("pedido:desconocido", json!({})));
    wait_until(&conn, |s| {
        s.last_message.as_ref().map(|m| m.kind.as_str()) == Some("pedido:desconocido")
    })
    .await;

    assert_eq!(orders.load(Ordering::SeqCst), 1);

    conn.close().await;
}
