//! Console service
//!
//! Owns every long-lived piece (gateway client, stores, poller) and wires
//! them together. Nothing runs until [`Console::start`]; [`Console::stop`]
//! tears the background work down again.

use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::activity::ActivityFeed;
use crate::config::{ensure_dir, state_dir, validate_config, Config};
use crate::core::storage::{lock, FileStore, StateStore};
use crate::error::{Error, Result};
use crate::gateway::{GatewayClient, SubscriptionId, ToolsClient};
use crate::notify::{bridge, NotificationStore, ToastExpiry, ToastStore};
use crate::palette::{default_commands, CommandPalette};
use crate::prefs::ConnectionSettings;
use crate::sessions::{SessionBoard, SessionPoller};

/// Background work owned by a started console
struct Running {
    poller: SessionPoller,
    expiry: ToastExpiry,
    subscriptions: Vec<SubscriptionId>,
}

/// The console and everything it owns
pub struct Console {
    config: Config,
    storage: StateStore,
    client: Arc<GatewayClient>,
    tools: ToolsClient,
    board: SessionBoard,
    activity: ActivityFeed,
    toasts: ToastStore,
    notifications: NotificationStore,
    palette: CommandPalette,
    running: Mutex<Option<Running>>,
}

impl Console {
    /// Build a console, letting saved connection settings fill in the
    /// gateway when the config has no token of its own.
    pub fn open(mut config: Config, storage: StateStore) -> Result<Self> {
        if let Some(saved) = ConnectionSettings::load(&storage) {
            if saved.apply_to(&mut config) {
                info!("Using saved connection settings for {}", config.gateway.url);
            }
        }
        Self::new(config, storage)
    }

    /// Build a console over an explicit store. Fails on an invalid config.
    pub fn new(config: Config, storage: StateStore) -> Result<Self> {
        let validation = validate_config(&config);
        if !validation.valid {
            let issues: Vec<String> = validation.errors.iter().map(|i| i.to_string()).collect();
            return Err(Error::Config(format!(
                "Invalid configuration: {}",
                issues.join("; ")
            )));
        }

        let client = Arc::new(GatewayClient::from_config(&config)?);
        let tools = ToolsClient::new(&config)?;
        let toasts = ToastStore::with_default_duration(config.notifications.toast_duration);
        let notifications =
            NotificationStore::with_capacity(storage.clone(), config.notifications.capacity);
        let palette = CommandPalette::new(default_commands(), storage.clone(), toasts.clone());

        let console = Console {
            config,
            storage,
            client,
            tools,
            board: SessionBoard::new(),
            activity: ActivityFeed::new(),
            toasts,
            notifications,
            palette,
            running: Mutex::new(None),
        };
        console.bind_actions();
        Ok(console)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &StateStore {
        &self.storage
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    pub fn tools(&self) -> &ToolsClient {
        &self.tools
    }

    pub fn board(&self) -> &SessionBoard {
        &self.board
    }

    pub fn activity(&self) -> &ActivityFeed {
        &self.activity
    }

    pub fn toasts(&self) -> &ToastStore {
        &self.toasts
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.notifications
    }

    pub fn palette(&self) -> &CommandPalette {
        &self.palette
    }

    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }

    /// Subscribe consumers, open the event stream and start polling.
    ///
    /// No-op if already started. Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut running = lock(&self.running);
        if running.is_some() {
            return Ok(());
        }

        let expiry = ToastExpiry::start(&self.toasts)?;

        let mut subscriptions = self.board.attach(&self.client);
        subscriptions.push(self.activity.attach(&self.client));
        subscriptions.push(bridge::attach(&self.client, &self.notifications));

        self.client.connect();

        let poller = SessionPoller::start(
            Arc::new(self.tools.clone()),
            self.board.clone(),
            self.config.polling.interval,
            self.config.polling.limit,
        );

        info!(
            gateway = %self.config.gateway.url,
            "Console started"
        );
        *running = Some(Running {
            poller,
            expiry,
            subscriptions,
        });
        Ok(())
    }

    /// Stop polling, cancel toast timers and close the event stream
    pub async fn stop(&self) {
        let running = lock(&self.running).take();
        if let Some(Running {
            poller,
            mut expiry,
            subscriptions,
        }) = running
        {
            poller.stop();
            expiry.stop();
            for id in subscriptions {
                self.client.off(id);
            }
        }
        self.client.disconnect().await;
        info!("Console stopped");
    }

    /// Bind the palette's stock actions to this console's capabilities
    fn bind_actions(&self) {
        let client = self.client.clone();
        self.palette.bind("reconnect", move || {
            let runtime = current_runtime()?;
            let client = client.clone();
            runtime.spawn(async move {
                client.disconnect().await;
                client.connect();
            });
            Ok(())
        });

        let tools = self.tools.clone();
        let toasts = self.toasts.clone();
        self.palette.bind("check-health", move || {
            let runtime = current_runtime()?;
            let tools = tools.clone();
            let toasts = toasts.clone();
            runtime.spawn(async move {
                match tools.health().await {
                    Ok(health) if health.ok => {
                        toasts.success(format!("Gateway healthy ({} ms)", health.latency.as_millis()));
                    }
                    Ok(health) => {
                        toasts.warning(format!("Gateway unhealthy (HTTP {})", health.status));
                    }
                    Err(e) => {
                        toasts.error(format!("Gateway unreachable: {}", e));
                    }
                }
            });
            Ok(())
        });

        let tools = self.tools.clone();
        let board = self.board.clone();
        let toasts = self.toasts.clone();
        let limit = self.config.polling.limit;
        self.palette.bind("refresh-sessions", move || {
            let runtime = current_runtime()?;
            let tools = tools.clone();
            let board = board.clone();
            let toasts = toasts.clone();
            runtime.spawn(async move {
                match tools.list_sessions(limit).await {
                    Ok(sessions) => {
                        board.apply_poll(sessions);
                    }
                    Err(e) => {
                        warn!("Session refresh failed: {}", e);
                        toasts.error(format!("Could not refresh sessions: {}", e));
                    }
                }
            });
            Ok(())
        });

        let notifications = self.notifications.clone();
        self.palette.bind("mark-all-read", move || {
            notifications.mark_all_read();
            Ok(())
        });

        let notifications = self.notifications.clone();
        self.palette.bind("clear-notifications", move || {
            notifications.clear();
            Ok(())
        });
    }
}

/// State store backed by the state directory
pub fn open_state() -> Result<StateStore> {
    let dir = state_dir();
    ensure_dir(&dir)?;
    Ok(StateStore::new(Arc::new(FileStore::new(dir))))
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|_| Error::Internal("No async runtime available".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ConnectionState;
    use crate::notify::NotificationKind;
    use crate::palette::Execution;
    use std::time::Duration;

    fn offline_config() -> Config {
        let mut config = Config::default();
        // Nothing listens on port 9
        config.gateway.url = "http://127.0.0.1:9".to_string();
        config.reconnect.initial_delay = Duration::from_secs(60);
        config.reconnect.max_delay = Duration::from_secs(60);
        config
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let console = Console::new(offline_config(), StateStore::in_memory()).unwrap();
        assert!(!console.is_running());

        console.start().unwrap();
        console.start().unwrap();
        assert!(console.is_running());
        assert_ne!(console.client().state(), ConnectionState::Disconnected);

        console.stop().await;
        assert!(!console.is_running());
        assert_eq!(console.client().state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_local_actions_work_without_runtime() {
        let console = Console::new(offline_config(), StateStore::in_memory()).unwrap();
        console.notifications().add(crate::notify::NewNotification::new(
            NotificationKind::System,
            "hello",
        ));

        assert_eq!(console.palette().execute("mark-all-read"), Execution::Ran);
        assert_eq!(console.notifications().unread_count(), 0);

        // Needs a runtime, so it fails with a toast instead of an error
        assert_eq!(console.palette().execute("check-health"), Execution::Failed);
        assert_eq!(console.toasts().snapshot().len(), 1);
    }

    #[test]
    fn test_open_applies_saved_connection() {
        let storage = StateStore::in_memory();
        ConnectionSettings::new("http://127.0.0.1:4242", "saved")
            .save(&storage)
            .unwrap();

        let console = Console::open(Config::default(), storage).unwrap();
        assert_eq!(console.config().gateway.url, "http://127.0.0.1:4242");
        assert_eq!(console.client().url().as_str(), "ws://127.0.0.1:4242/ws");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = offline_config();
        config.polling.interval = Duration::ZERO;
        match Console::new(config, StateStore::in_memory()) {
            Err(Error::Config(message)) => assert!(message.contains("polling.interval")),
            Err(other) => panic!("expected config error, got {:?}", other),
            Ok(_) => panic!("expected config error"),
        }
    }

    #[test]
    fn test_notification_capacity_from_config() {
        let mut config = offline_config();
        config.notifications.capacity = 3;
        let console = Console::new(config, StateStore::in_memory()).unwrap();
        assert_eq!(console.notifications().capacity(), 3);
    }
}
