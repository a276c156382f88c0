//! Gateway event stream client
//!
//! Owns at most one WebSocket connection to the gateway and re-emits every
//! parsed frame on an [`EventBus`]. Transient failures are retried with
//! bounded exponential backoff and surface only as
//! [`GatewayEvent::ConnectionState`] transitions:
//!
//! ```text
//! disconnected --connect()--> connecting --open--> connected
//!      ^                          ^                    |
//!      |                          |              close/error
//!  disconnect()             backoff fires              v
//!  (any state)                    +------------- reconnecting
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use super::bus::{EventBus, EventFilter, SubscriptionId};
use super::protocol::{ConnectionState, GatewayEvent};
use crate::config::{Config, ReconnectConfig};
use crate::core::storage::lock;
use crate::error::{Error, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `disconnect()` waits for a clean close before aborting the task
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Derive the event stream URL from the gateway's HTTP base URL
pub fn ws_url(gateway_url: &str, ws_path: &str) -> Result<Url> {
    let mut url = Url::parse(gateway_url)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::Config(format!(
                "Unsupported gateway URL scheme: {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::Config(format!("Cannot use scheme {} for {}", scheme, gateway_url)))?;

    let base = url.path().trim_end_matches('/').to_string();
    let suffix = if ws_path.starts_with('/') {
        ws_path.to_string()
    } else {
        format!("/{}", ws_path)
    };
    url.set_path(&format!("{}{}", base, suffix));
    Ok(url)
}

/// Shared state between the public handle and the connection task
struct ClientInner {
    ws_url: Url,
    token: SecretString,
    reconnect: ReconnectConfig,
    state: Mutex<ConnectionState>,
    bus: EventBus,
}

impl ClientInner {
    fn set_state(&self, next: ConnectionState) {
        if self.store_state(next) {
            self.announce(next);
        }
    }

    /// Record a transition without telling anyone; false if unchanged
    fn store_state(&self, next: ConnectionState) -> bool {
        let mut state = lock(&self.state);
        if *state == next {
            return false;
        }
        *state = next;
        true
    }

    fn announce(&self, state: ConnectionState) {
        info!(url = %self.ws_url, "Gateway connection {}", state);
        self.bus.dispatch(&GatewayEvent::ConnectionState(state));
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.reconnect.initial_delay)
            .with_max_interval(self.reconnect.max_delay)
            .with_multiplier(self.reconnect.multiplier)
            .with_randomization_factor(self.reconnect.jitter)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Parse and dispatch one text frame; malformed frames go nowhere
    fn handle_text(&self, text: &str) -> bool {
        match GatewayEvent::parse(text) {
            Some(event) => {
                self.bus.dispatch(&event);
                true
            }
            None => {
                debug!(len = text.len(), "Dropping malformed gateway frame");
                false
            }
        }
    }

    async fn open(&self) -> Result<Socket> {
        let mut request = self.ws_url.as_str().into_client_request()?;
        let token = self.token.expose_secret();
        if !token.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::Config(format!("Invalid gateway token format: {}", e)))?;
            request.headers_mut().insert(header::AUTHORIZATION, value);
        }
        let (socket, _response) = connect_async(request).await?;
        Ok(socket)
    }

    /// Read frames until the socket ends (returns false) or stop is requested (true)
    async fn pump(&self, mut socket: Socket, stop: &mut watch::Receiver<bool>) -> bool {
        loop {
            tokio::select! {
                frame = socket.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.handle_text(&text);
                    }
                    Some(Ok(Message::Close(reason))) => {
                        debug!(?reason, "Gateway closed the event stream");
                        return false;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Gateway event stream error: {}", e);
                        return false;
                    }
                    None => return false,
                },
                _ = stop.changed() => {
                    let _ = socket.close(None).await;
                    return true;
                }
            }
        }
    }

    /// Connection task. `announce_connecting` reports the transition that
    /// `connect()` recorded, from here rather than under the caller's lock.
    async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>, announce_connecting: bool) {
        if announce_connecting {
            self.announce(ConnectionState::Connecting);
        }
        let mut backoff = self.backoff();

        loop {
            let attempt = tokio::select! {
                result = self.open() => result,
                _ = stop.changed() => return,
            };

            match attempt {
                Ok(socket) => {
                    backoff.reset();
                    self.set_state(ConnectionState::Connected);
                    if self.pump(socket, &mut stop).await {
                        return;
                    }
                }
                Err(e) => warn!(url = %self.ws_url, "Gateway connection failed: {}", e),
            }

            if *stop.borrow() {
                return;
            }
            self.set_state(ConnectionState::Reconnecting);

            let delay = backoff
                .next_backoff()
                .unwrap_or(self.reconnect.max_delay)
                .min(self.reconnect.max_delay);
            debug!(?delay, "Scheduling gateway reconnect");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop.changed() => return,
            }
            self.set_state(ConnectionState::Connecting);
        }
    }
}

/// Running connection task
struct Run {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// WebSocket client for the gateway event stream
pub struct GatewayClient {
    inner: Arc<ClientInner>,
    run: Mutex<Option<Run>>,
}

impl GatewayClient {
    /// Create a client for an explicit WebSocket URL
    pub fn new(ws_url: Url, token: SecretString, reconnect: ReconnectConfig) -> Self {
        GatewayClient {
            inner: Arc::new(ClientInner {
                ws_url,
                token,
                reconnect,
                state: Mutex::new(ConnectionState::Disconnected),
                bus: EventBus::new(),
            }),
            run: Mutex::new(None),
        }
    }

    /// Create a client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let url = ws_url(&config.gateway.url, &config.gateway.ws_path)?;
        Ok(Self::new(
            url,
            config.gateway.token.clone(),
            config.reconnect.clone(),
        ))
    }

    /// Event stream URL
    pub fn url(&self) -> &Url {
        &self.inner.ws_url
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *lock(&self.inner.state)
    }

    /// Subscribe to events
    pub fn on<F>(&self, filter: impl Into<EventFilter>, handler: F) -> SubscriptionId
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        self.inner.bus.on(filter, handler)
    }

    /// Unsubscribe
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.bus.off(id)
    }

    /// Start connecting in the background.
    ///
    /// No-op (returns false) while already connecting, connected or
    /// reconnecting. Must be called from within a Tokio runtime.
    pub fn connect(&self) -> bool {
        let mut run = lock(&self.run);
        if let Some(ref existing) = *run {
            if !existing.handle.is_finished() {
                return false;
            }
        }

        let changed = self.inner.store_state(ConnectionState::Connecting);
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(self.inner.clone().run(stop_rx, changed));
        *run = Some(Run { stop, handle });
        true
    }

    /// Close the connection and cancel any pending reconnect.
    ///
    /// Terminal until [`connect`](Self::connect) is called again.
    pub async fn disconnect(&self) {
        let run = lock(&self.run).take();
        if let Some(Run { stop, mut handle }) = run {
            let _ = stop.send(true);
            if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                warn!("Gateway connection task did not stop in time, aborting");
                handle.abort();
            }
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Lifecycle alias for [`connect`](Self::connect)
    pub fn start(&self) {
        self.connect();
    }

    /// Lifecycle alias for [`disconnect`](Self::disconnect)
    pub async fn stop(&self) {
        self.disconnect().await;
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        if let Some(run) = lock(&self.run).take() {
            let _ = run.stop.send(true);
            run.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::protocol::EventKind;
    use futures::SinkExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::accept_async;

    fn fast_reconnect() -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    fn slow_reconnect() -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    fn client_for(addr: std::net::SocketAddr, reconnect: ReconnectConfig) -> GatewayClient {
        let url = Url::parse(&format!("ws://{}/ws", addr)).unwrap();
        GatewayClient::new(url, SecretString::from("test-token".to_string()), reconnect)
    }

    /// Forward connection state transitions into a channel
    fn watch_states(client: &GatewayClient) -> mpsc::UnboundedReceiver<ConnectionState> {
        let (tx, rx) = mpsc::unbounded_channel();
        client.on(EventKind::ConnectionState, move |event| {
            if let GatewayEvent::ConnectionState(state) = event {
                let _ = tx.send(*state);
            }
        });
        rx
    }

    async fn wait_for(rx: &mut mpsc::UnboundedReceiver<ConnectionState>, target: ConnectionState) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(state) = rx.recv().await {
                if state == target {
                    return;
                }
            }
            panic!("state channel closed before {}", target);
        })
        .await
        .expect("timed out waiting for connection state");
    }

    #[test]
    fn test_ws_url_derivation() {
        assert_eq!(
            ws_url("http://127.0.0.1:18789", "/ws").unwrap().as_str(),
            "ws://127.0.0.1:18789/ws"
        );
        assert_eq!(
            ws_url("https://gw.example/base/", "events").unwrap().as_str(),
            "wss://gw.example/base/events"
        );
        assert!(ws_url("ftp://gw.example", "/ws").is_err());
    }

    #[test]
    fn test_malformed_frame_reaches_no_subscriber() {
        let client = GatewayClient::new(
            Url::parse("ws://127.0.0.1:1/ws").unwrap(),
            SecretString::from(String::new()),
            fast_reconnect(),
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        client.on(EventFilter::Wildcard, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!client.inner.handle_text("{not json"));
        assert!(!client.inner.handle_text(""));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert!(client.inner.handle_text(r#"{"event":"chat.message","data":{}}"#));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_state_handler_may_call_back_into_client() {
        let client = Arc::new(client_for(
            "127.0.0.1:1".parse().unwrap(),
            slow_reconnect(),
        ));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let weak = Arc::downgrade(&client);
        client.on(EventKind::ConnectionState, move |event| {
            if let (GatewayEvent::ConnectionState(ConnectionState::Connecting), Some(client)) =
                (event, weak.upgrade())
            {
                // Already running, so this is a no-op
                let _ = tx.send(client.connect());
            }
        });

        assert!(client.connect());
        assert_eq!(client.state(), ConnectionState::Connecting);
        let reentered = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("handler never ran");
        assert_eq!(reentered, Some(false));

        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_delivers_events_and_drops_malformed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text("definitely not json".into())).await.unwrap();
            ws.send(Message::Text(
                r#"{"event":"chat.message","data":{"sessionKey":"s1","role":"assistant","content":"hi"}}"#.into(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(r#"{"event":"cron.fired","data":{}}"#.into()))
                .await
                .unwrap();
            // Hold the connection open until the client leaves
            while let Some(Ok(_)) = ws.next().await {}
        });

        let client = client_for(addr, slow_reconnect());
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, &'static str)>();

        let t = tx.clone();
        client.on(EventKind::ChatMessage, move |event| {
            let _ = t.send((event.name().to_string(), "named"));
        });
        client.on(EventFilter::Wildcard, move |event| {
            if event.kind() != EventKind::ConnectionState {
                let _ = tx.send((event.name().to_string(), "wildcard"));
            }
        });

        assert!(client.connect());
        assert!(!client.connect(), "second connect must be a no-op");

        let mut received = Vec::new();
        for _ in 0..3 {
            let item = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            received.push(item);
        }

        assert_eq!(
            received,
            vec![
                ("chat.message".to_string(), "named"),
                ("chat.message".to_string(), "wildcard"),
                ("cron.fired".to_string(), "wildcard"),
            ]
        );
        assert_eq!(client.state(), ConnectionState::Connected);

        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_server_close_moves_to_reconnecting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let client = client_for(addr, slow_reconnect());
        let mut states = watch_states(&client);

        client.connect();
        wait_for(&mut states, ConnectionState::Connected).await;
        wait_for(&mut states, ConnectionState::Reconnecting).await;
        assert_eq!(client.state(), ConnectionState::Reconnecting);

        // Still armed: connect() stays a no-op
        assert!(!client.connect());

        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_deliberate_disconnect_skips_reconnecting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let client = client_for(addr, fast_reconnect());
        let mut states = watch_states(&client);

        client.connect();
        wait_for(&mut states, ConnectionState::Connected).await;
        client.disconnect().await;

        assert_eq!(states.recv().await, Some(ConnectionState::Disconnected));
        assert!(states.try_recv().is_err());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnects_after_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let count = accepted.clone();
        tokio::spawn(async move {
            // First connection is dropped immediately, second one stays
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            count.fetch_add(1, Ordering::SeqCst);
            drop(ws);

            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            count.fetch_add(1, Ordering::SeqCst);
            while let Some(Ok(_)) = ws.next().await {}
        });

        let client = client_for(addr, fast_reconnect());
        let mut states = watch_states(&client);

        client.connect();
        wait_for(&mut states, ConnectionState::Connected).await;
        wait_for(&mut states, ConnectionState::Reconnecting).await;
        wait_for(&mut states, ConnectionState::Connected).await;
        assert_eq!(accepted.load(Ordering::SeqCst), 2);

        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_unreachable_gateway_keeps_reconnecting() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let client = client_for(addr, fast_reconnect());
        let mut states = watch_states(&client);

        client.connect();
        wait_for(&mut states, ConnectionState::Reconnecting).await;
        wait_for(&mut states, ConnectionState::Connecting).await;
        wait_for(&mut states, ConnectionState::Reconnecting).await;

        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
