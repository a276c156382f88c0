//! Gateway protocol schema
//!
//! Wire format of the event stream and the `/tools/invoke` endpoint.

use serde::{Deserialize, Serialize};

/// Event frame as pushed over the WebSocket: `{"event": ..., "data": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    /// Event name
    pub event: String,
    /// Event payload
    #[serde(default, alias = "payload")]
    pub data: serde_json::Value,
}

impl EventFrame {
    /// Create a new event frame
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        EventFrame {
            event: event.into(),
            data,
        }
    }
}

/// Body of `POST /tools/invoke`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvokeRequest {
    /// Tool name
    pub tool: String,
    /// Tool arguments
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Response of `POST /tools/invoke`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInvokeResponse {
    /// Whether the tool ran successfully
    #[serde(default)]
    pub ok: bool,
    /// Tool output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResultBody>,
    /// Failure details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolErrorBody>,
}

/// Successful tool output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBody {
    /// Human-oriented content (usually `[{"type": "text", "text": ...}]`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    /// Structured details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Tool failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolErrorBody {
    /// Error message
    #[serde(default)]
    pub message: String,
}

impl ToolResultBody {
    /// Concatenate the text parts of `content`.
    ///
    /// Accepts either a plain string or an array of `{type: "text", text}` parts.
    pub fn text(&self) -> Option<String> {
        match self.content.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(parts) => {
                let texts: Vec<&str> = parts
                    .iter()
                    .filter(|p| p.get("type").and_then(|t| t.as_str()).unwrap_or("text") == "text")
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect();
                if texts.is_empty() {
                    None
                } else {
                    Some(texts.join("\n"))
                }
            }
            _ => None,
        }
    }

    /// Structured details, or the text content parsed as JSON
    pub fn structured(&self) -> Option<serde_json::Value> {
        if let Some(ref details) = self.details {
            return Some(details.clone());
        }
        self.text().and_then(|t| serde_json::from_str(&t).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_frame_accepts_payload_alias() {
        let frame: EventFrame =
            serde_json::from_str(r#"{"event":"chat.message","payload":{"role":"assistant"}}"#).unwrap();
        assert_eq!(frame.event, "chat.message");
        assert_eq!(frame.data["role"], "assistant");

        let frame: EventFrame = serde_json::from_str(r#"{"event":"heartbeat"}"#).unwrap();
        assert!(frame.data.is_null());
    }

    #[test]
    fn test_tool_result_text_parts() {
        let body = ToolResultBody {
            content: Some(json!([
                {"type": "text", "text": "first"},
                {"type": "image", "data": "..."},
                {"type": "text", "text": "second"}
            ])),
            details: None,
        };
        assert_eq!(body.text().as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn test_structured_falls_back_to_json_text() {
        let body = ToolResultBody {
            content: Some(json!([{"type": "text", "text": "{\"count\": 2}"}])),
            details: None,
        };
        assert_eq!(body.structured(), Some(json!({"count": 2})));

        let body = ToolResultBody {
            content: None,
            details: Some(json!({"sessions": []})),
        };
        assert_eq!(body.structured(), Some(json!({"sessions": []})));
    }
}
