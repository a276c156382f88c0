//! Gateway module - client side of the gateway control plane
//!
//! The console talks to a single gateway over two surfaces:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                   Gateway                     │
//! │   POST /tools/invoke   GET /health   WS /ws   │
//! └───────┬──────────────────────┬───────────────┘
//!         │ HTTP                 │ event frames
//!         ▼                      ▼
//!   ┌────────────┐        ┌───────────────┐
//!   │ ToolsClient│        │ GatewayClient │──► EventBus ──► subscribers
//!   └────────────┘        └───────────────┘
//! ```

pub mod bus;
pub mod client;
pub mod http;
pub mod protocol;

pub use bus::{EventBus, EventFilter, EventHandler, SubscriptionId};
pub use client::{ws_url, GatewayClient};
pub use http::{HealthStatus, ToolsClient};

pub use protocol::{
    AgentCompleteEvent, ChatMessageEvent, ConnectionState, EventFrame, EventKind, GatewayEvent,
    SessionEvent, ToolResultBody,
    events,
};
