//! Turns gateway events into persistent notifications

use crate::format::truncate;
use crate::gateway::protocol::GatewayEvent;
use crate::gateway::{EventFilter, GatewayClient, SubscriptionId};

use super::inbox::{NewNotification, NotificationKind, NotificationStore};

const BODY_PREVIEW_CHARS: usize = 140;

fn preview(text: &str) -> String {
    truncate(text.trim(), BODY_PREVIEW_CHARS)
}

/// Notification for an event, if it warrants one
pub fn notification_for(event: &GatewayEvent) -> Option<NewNotification> {
    match event {
        GatewayEvent::AgentComplete(done) => {
            let who = done
                .label
                .as_deref()
                .or(done.agent_id.as_deref())
                .or(done.session_key.as_deref())
                .unwrap_or("Agent");
            let mut n = NewNotification::new(
                NotificationKind::AgentComplete,
                format!("{} finished", who),
            );
            n.body = done.summary.as_deref().map(preview);
            Some(n)
        }
        GatewayEvent::SessionCompleted(session) => {
            let who = session
                .label
                .as_deref()
                .or(session.key.as_deref())
                .unwrap_or("Session");
            Some(NewNotification::new(
                NotificationKind::AgentComplete,
                format!("{} completed", who),
            ))
        }
        GatewayEvent::ChatMessage(message)
            if message
                .role
                .as_deref()
                .map_or(false, |r| r.eq_ignore_ascii_case("assistant")) =>
        {
            let title = match message.session_key.as_deref() {
                Some(key) => format!("New message in {}", key),
                None => "New message".to_string(),
            };
            let mut n = NewNotification::new(NotificationKind::MessageReceived, title);
            n.body = message.content.as_deref().map(preview);
            Some(n)
        }
        _ => None,
    }
}

/// Subscribe `store` to the client's event stream
pub fn attach(client: &GatewayClient, store: &NotificationStore) -> SubscriptionId {
    let store = store.clone();
    client.on(EventFilter::Wildcard, move |event| {
        if let Some(new) = notification_for(event) {
            store.add(new);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_complete() {
        let event = GatewayEvent::parse(
            r#"{"event":"agent.complete","data":{"label":"researcher","summary":"Found 3 papers"}}"#,
        )
        .unwrap();
        let n = notification_for(&event).unwrap();
        assert_eq!(n.kind, NotificationKind::AgentComplete);
        assert_eq!(n.title, "researcher finished");
        assert_eq!(n.body.as_deref(), Some("Found 3 papers"));
    }

    #[test]
    fn test_session_completed() {
        let event = GatewayEvent::parse(
            r#"{"event":"session.completed","data":{"key":"agent:main:cron"}}"#,
        )
        .unwrap();
        let n = notification_for(&event).unwrap();
        assert_eq!(n.kind, NotificationKind::AgentComplete);
        assert_eq!(n.title, "agent:main:cron completed");
    }

    #[test]
    fn test_only_assistant_messages_notify() {
        let assistant = GatewayEvent::parse(
            r#"{"event":"chat.message","data":{"sessionKey":"s1","role":"assistant","content":"hi"}}"#,
        )
        .unwrap();
        let user = GatewayEvent::parse(
            r#"{"event":"chat.message","data":{"sessionKey":"s1","role":"user","content":"hi"}}"#,
        )
        .unwrap();

        let n = notification_for(&assistant).unwrap();
        assert_eq!(n.kind, NotificationKind::MessageReceived);
        assert_eq!(n.title, "New message in s1");
        assert!(notification_for(&user).is_none());
    }

    #[test]
    fn test_other_events_ignored() {
        let updated =
            GatewayEvent::parse(r#"{"event":"session.updated","data":{"key":"s1"}}"#).unwrap();
        let unknown = GatewayEvent::parse(r#"{"event":"cron.tick","data":{}}"#).unwrap();
        assert!(notification_for(&updated).is_none());
        assert!(notification_for(&unknown).is_none());
    }

    #[test]
    fn test_long_bodies_are_shortened() {
        let long = "x".repeat(500);
        let body = preview(&long);
        assert_eq!(body.chars().count(), BODY_PREVIEW_CHARS);
        assert!(body.ends_with('…'));
    }
}
