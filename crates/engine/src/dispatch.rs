//! Notification dispatcher clients.

use async_trait::async_trait;
use fanscore_core::config::NotificationConfig;
use fanscore_core::notify::NoOpDispatcher;
use fanscore_core::{FanError, FanResult, NotificationDispatcher, NotificationIntent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// POSTs each intent as JSON to the external notification dispatcher.
pub struct HttpDispatcher {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpDispatcher {
    pub fn new(endpoint: impl Into<String>, auth_token: Option<String>, timeout: Duration) -> FanResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FanError::Config(format!("notification client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            auth_token,
        })
    }
}

#[async_trait]
impl NotificationDispatcher for HttpDispatcher {
    async fn dispatch(&self, intent: &NotificationIntent) -> FanResult<()> {
        let mut request = self.client.post(&self.endpoint).json(intent);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FanError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FanError::Notification(format!(
                "dispatcher returned {status}"
            )));
        }

        debug!(user_id = %intent.user_id, kind = ?intent.kind, "Notification dispatched");
        Ok(())
    }
}

/// Logs intents instead of delivering them.
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, intent: &NotificationIntent) -> FanResult<()> {
        info!(
            user_id = %intent.user_id,
            kind = ?intent.kind,
            title = %intent.title,
            message = %intent.message,
            "Notification intent (no dispatcher endpoint configured)"
        );
        Ok(())
    }
}

/// Pick the dispatcher for the configured notification settings.
pub fn from_config(config: &NotificationConfig) -> FanResult<Arc<dyn NotificationDispatcher>> {
    if !config.enabled {
        info!("Notifications disabled");
        return Ok(Arc::new(NoOpDispatcher));
    }
    match &config.endpoint {
        Some(endpoint) => {
            info!(endpoint = %endpoint, "Notification dispatcher configured");
            Ok(Arc::new(HttpDispatcher::new(
                endpoint.clone(),
                config.auth_token.clone(),
                Duration::from_millis(config.timeout_ms),
            )?))
        }
        None => Ok(Arc::new(LogDispatcher)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use fanscore_core::NotificationKind;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    fn intent() -> NotificationIntent {
        NotificationIntent {
            kind: NotificationKind::TierUpgrade,
            user_id: "u1".into(),
            title: "Tier Upgrade!".into(),
            message: "You've reached Gold tier!".into(),
            data: json!({"artistId": "a1", "previousTier": "Silver", "newTier": "Gold"}),
            channels: vec!["push".into(), "in_app".into()],
        }
    }

    async fn spawn_receiver(status: StatusCode) -> (String, mpsc::UnboundedReceiver<(Option<String>, Value)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new()
            .route(
                "/dispatch",
                post(
                    move |State(tx): State<mpsc::UnboundedSender<(Option<String>, Value)>>,
                          headers: HeaderMap,
                          Json(body): Json<Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        let _ = tx.send((auth, body));
                        status
                    },
                ),
            )
            .with_state(tx);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/dispatch"), rx)
    }

    #[tokio::test]
    async fn test_http_dispatcher_posts_intent() {
        let (url, mut rx) = spawn_receiver(StatusCode::OK).await;
        let dispatcher =
            HttpDispatcher::new(url, Some("secret".into()), Duration::from_secs(2)).unwrap();

        dispatcher.dispatch(&intent()).await.unwrap();

        let (auth, body) = rx.recv().await.unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer secret"));
        assert_eq!(body["type"], "tier_upgrade");
        assert_eq!(body["userId"], "u1");
        assert_eq!(body["data"]["newTier"], "Gold");
    }

    #[tokio::test]
    async fn test_http_dispatcher_error_status() {
        let (url, _rx) = spawn_receiver(StatusCode::SERVICE_UNAVAILABLE).await;
        let dispatcher = HttpDispatcher::new(url, None, Duration::from_secs(2)).unwrap();
        let err = dispatcher.dispatch(&intent()).await.unwrap_err();
        assert!(matches!(err, FanError::Notification(_)));
    }

    #[tokio::test]
    async fn test_unreachable_dispatcher_errors() {
        let dispatcher =
            HttpDispatcher::new("http://127.0.0.1:9/nowhere", None, Duration::from_millis(300)).unwrap();
        assert!(dispatcher.dispatch(&intent()).await.is_err());
    }

    #[tokio::test]
    async fn test_from_config_variants() {
        let disabled = NotificationConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(from_config(&disabled).unwrap().dispatch(&intent()).await.is_ok());

        let log_only = NotificationConfig::default();
        assert!(from_config(&log_only).unwrap().dispatch(&intent()).await.is_ok());
    }
}
