//! Observers connected over a real socket see the subscriber count change.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    futures::{SinkExt, StreamExt},
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
};

use {
    lectern_channels::SubscriberId,
    lectern_gateway::{CountFrame, GatewayState, ObserverHub, build_gateway_app},
    lectern_relay::ObserverNotifier,
    lectern_sessions::{ManualClock, SessionEvent, SessionListener, SessionRegistry},
};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct HubListener(Arc<ObserverHub>);

impl SessionListener for HubListener {
    fn on_session_event(&self, _event: &SessionEvent, count: usize) {
        self.0.notify_all(count);
    }
}

struct Harness {
    addr: SocketAddr,
    hub: Arc<ObserverHub>,
    registry: SessionRegistry,
    clock: Arc<ManualClock>,
}

async fn start() -> Harness {
    let hub = Arc::new(ObserverHub::new());
    let clock = Arc::new(ManualClock::new());
    let registry = SessionRegistry::with_listener(
        clock.clone(),
        Duration::from_secs(60),
        Arc::new(HubListener(hub.clone())),
    );
    let app = build_gateway_app(GatewayState::new(hub.clone(), registry.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    Harness {
        addr,
        hub,
        registry,
        clock,
    }
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}{path}")).await.unwrap();
    ws
}

async fn next_count(ws: &mut Client) -> usize {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for a count frame")
        .expect("socket closed")
        .unwrap();
    let frame: CountFrame = serde_json::from_str(msg.to_text().unwrap()).unwrap();
    frame.count
}

async fn wait_for_observers(hub: &ObserverHub, expected: usize) {
    for _ in 0..100 {
        if hub.len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {expected} observers, have {}", hub.len());
}

#[tokio::test]
async fn observer_is_seeded_then_follows_registry() {
    let h = start().await;
    h.registry.subscribe(SubscriberId::from("100"));

    let mut ws = connect(h.addr, "/ws").await;
    assert_eq!(next_count(&mut ws).await, 1);

    h.registry.subscribe(SubscriberId::from("200"));
    assert_eq!(next_count(&mut ws).await, 2);

    h.registry.unsubscribe(&SubscriberId::from("100"));
    assert_eq!(next_count(&mut ws).await, 1);

    h.clock.advance(Duration::from_secs(60));
    assert_eq!(next_count(&mut ws).await, 0);
}

#[tokio::test]
async fn root_path_also_accepts_observers() {
    let h = start().await;
    let mut a = connect(h.addr, "/").await;
    let mut b = connect(h.addr, "/ws").await;
    assert_eq!(next_count(&mut a).await, 0);
    assert_eq!(next_count(&mut b).await, 0);
    wait_for_observers(&h.hub, 2).await;

    h.registry.subscribe(SubscriberId::from("7"));
    assert_eq!(next_count(&mut a).await, 1);
    assert_eq!(next_count(&mut b).await, 1);
}

#[tokio::test]
async fn closed_observer_is_removed_and_others_keep_receiving() {
    let h = start().await;
    let mut stays = connect(h.addr, "/ws").await;
    let mut leaves = connect(h.addr, "/ws").await;
    assert_eq!(next_count(&mut stays).await, 0);
    assert_eq!(next_count(&mut leaves).await, 0);
    wait_for_observers(&h.hub, 2).await;

    leaves.send(Message::Close(None)).await.unwrap();
    wait_for_observers(&h.hub, 1).await;

    h.registry.subscribe(SubscriberId::from("1"));
    assert_eq!(next_count(&mut stays).await, 1);
}

#[tokio::test]
async fn health_reports_active_count() {
    let h = start().await;
    h.registry.subscribe(SubscriberId::from("1"));
    h.registry.subscribe(SubscriberId::from("2"));

    let body: serde_json::Value = reqwest::get(format!("http://{}/health", h.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["count"], 2);
}
