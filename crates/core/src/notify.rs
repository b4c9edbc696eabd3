//! Notification intents and the dispatcher seam.
//!
//! The engine decides *that* a fan should be notified and *what* is said;
//! delivery belongs to an external dispatcher behind `Arc<dyn NotificationDispatcher>`.

use crate::error::{FanError, FanResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TierUpgrade,
    Achievement,
}

/// A notification the dispatcher should fan out. Not a delivery receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationIntent {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub channels: Vec<String>,
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, intent: &NotificationIntent) -> FanResult<()>;
}

/// Drops every intent. Used when notifications are disabled.
pub struct NoOpDispatcher;

#[async_trait]
impl NotificationDispatcher for NoOpDispatcher {
    async fn dispatch(&self, _intent: &NotificationIntent) -> FanResult<()> {
        Ok(())
    }
}

/// Records intents in memory; optionally fails every dispatch after recording it.
#[derive(Default)]
pub struct CaptureDispatcher {
    intents: Mutex<Vec<NotificationIntent>>,
    fail: bool,
}

impl CaptureDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher whose every delivery errors.
    pub fn failing() -> Self {
        Self {
            intents: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn intents(&self) -> Vec<NotificationIntent> {
        self.intents.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.intents.lock().len()
    }

    pub fn clear(&self) {
        self.intents.lock().clear();
    }
}

#[async_trait]
impl NotificationDispatcher for CaptureDispatcher {
    async fn dispatch(&self, intent: &NotificationIntent) -> FanResult<()> {
        self.intents.lock().push(intent.clone());
        if self.fail {
            return Err(FanError::Notification("dispatcher unavailable".to_string()));
        }
        Ok(())
    }
}

pub fn noop_dispatcher() -> Arc<dyn NotificationDispatcher> {
    Arc::new(NoOpDispatcher)
}

pub fn capture_dispatcher() -> Arc<CaptureDispatcher> {
    Arc::new(CaptureDispatcher::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intent() -> NotificationIntent {
        NotificationIntent {
            kind: NotificationKind::Achievement,
            user_id: "u1".into(),
            title: "Achievement Unlocked!".into(),
            message: "Loyal Listener".into(),
            data: json!({"artistId": "a1", "achievement": "Loyal Listener"}),
            channels: vec!["push".into(), "in_app".into()],
        }
    }

    #[tokio::test]
    async fn test_capture_dispatcher() {
        let d = capture_dispatcher();
        d.dispatch(&intent()).await.unwrap();
        assert_eq!(d.count(), 1);
        assert_eq!(d.intents()[0].message, "Loyal Listener");
        d.clear();
        assert_eq!(d.count(), 0);
    }

    #[tokio::test]
    async fn test_failing_dispatcher_still_records() {
        let d = CaptureDispatcher::failing();
        assert!(d.dispatch(&intent()).await.is_err());
        assert_eq!(d.count(), 1);
    }

    #[test]
    fn test_intent_wire_format() {
        let json = serde_json::to_value(intent()).unwrap();
        assert_eq!(json["type"], "achievement");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["channels"][1], "in_app");
    }
}
