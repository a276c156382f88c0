//! Gateway Protocol
//!
//! What the console must understand of the gateway's two surfaces:
//!
//! - **Event stream**: JSON text frames `{event, data}` over a single WebSocket
//! - **Tool invocation**: `POST /tools/invoke` with `{tool, args}`, answered by
//!   `{ok, result: {content?, details?}, error?: {message}}`
//!
//! Unknown event names are tolerated; they decode to [`GatewayEvent::Unknown`].

pub mod lenient;
pub mod schema;
pub mod types;

pub use schema::{EventFrame, ToolErrorBody, ToolInvokeRequest, ToolInvokeResponse, ToolResultBody};
pub use types::*;
