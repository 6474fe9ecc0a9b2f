//! Webhook channel adapter.
//!
//! Messages arrive through the gateway's `POST /webhook` handler, which
//! injects them here. Replies are POSTed as `{"chat_id", "text"}` JSON to a
//! configured callback URL, typically the messaging bridge.

use async_trait::async_trait;
use parley_config::WebhookConfig;
use parley_core::channel::{Channel, ChannelId, ChannelMessage};
use parley_core::error::ChannelError;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outbound reply body.
#[derive(Debug, Serialize)]
struct CallbackPayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

/// Webhook channel adapter.
pub struct WebhookChannel {
    config: WebhookConfig,
    channel_id: ChannelId,
    client: reqwest::Client,
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self {
            config,
            channel_id: ChannelId("webhook".into()),
            client,
            inject_tx: tokio::sync::Mutex::new(None),
        }
    }

    /// Whether `start` has been called and the receiver is still alive.
    pub async fn is_started(&self) -> bool {
        self.inject_tx
            .lock()
            .await
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Inject a webhook message (called by the HTTP handler).
    pub async fn inject_message(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        // Clone out of the lock so a full buffer does not block stop().
        let tx = self.inject_tx.lock().await.clone();
        let Some(tx) = tx else {
            return Err(ChannelError::NotConfigured(
                "Webhook channel not started".into(),
            ));
        };
        tx.send(Ok(msg))
            .await
            .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into()))
    }

    /// Validate an HMAC-SHA256 signature against the shared secret.
    ///
    /// The expected format is a hex-encoded HMAC-SHA256 digest, e.g.:
    /// `sha256=<hex_digest>` or just `<hex_digest>`.
    ///
    /// Uses constant-time comparison to prevent timing attacks.
    pub fn validate_signature(&self, payload: &[u8], signature: &str) -> bool {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        type HmacSha256 = Hmac<Sha256>;

        match &self.config.shared_secret {
            None => true, // No secret configured = no validation
            Some(secret) if secret.is_empty() => true,
            Some(secret) => {
                let sig_hex = signature.trim().strip_prefix("sha256=").unwrap_or(signature.trim());

                let Ok(provided_bytes) = hex::decode(sig_hex) else {
                    return false;
                };

                let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
                    return false;
                };
                mac.update(payload);

                mac.verify_slice(&provided_bytes).is_ok()
            }
        }
    }

    /// Whether inbound requests must carry a signature.
    pub fn requires_signature(&self) -> bool {
        self.config
            .shared_secret
            .as_ref()
            .is_some_and(|s| !s.is_empty())
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        info!("Webhook channel starting");
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<(), ChannelError> {
        let Some(callback) = self.config.callback_url.as_deref().filter(|u| !u.is_empty()) else {
            info!(
                chat_id = %chat_id,
                "Webhook: no callback URL configured, response discarded"
            );
            return Ok(());
        };

        let response = self
            .client
            .post(callback)
            .json(&CallbackPayload {
                chat_id,
                text: content,
                reply_to,
            })
            .send()
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "webhook".into(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            warn!(chat_id = %chat_id, status, "Webhook callback rejected reply");
            return Err(ChannelError::DeliveryFailed {
                channel: "webhook".into(),
                reason: format!("callback returned HTTP {status}"),
            });
        }

        debug!(chat_id = %chat_id, content_len = content.len(), "Webhook reply delivered");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        self.inject_tx.lock().await.take();
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(self.is_started().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    fn signed(secret: &str, payload: &[u8]) -> String {
        use hmac::{Hmac, Mac};
        let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn channel_name() {
        let ch = WebhookChannel::new(WebhookConfig::default());
        assert_eq!(ch.name(), "webhook");
    }

    #[test]
    fn no_secret_skips_validation() {
        let ch = WebhookChannel::new(WebhookConfig::default());
        assert!(!ch.requires_signature());
        assert!(ch.validate_signature(b"anything", "any"));
    }

    #[test]
    fn signature_checked_against_secret() {
        let ch = WebhookChannel::new(WebhookConfig {
            shared_secret: Some("s3cret".into()),
            callback_url: None,
        });
        let body = br#"{"chat_id":"a","text":"hi"}"#;

        assert!(ch.requires_signature());
        assert!(ch.validate_signature(body, &signed("s3cret", body)));
        assert!(!ch.validate_signature(body, &signed("other", body)));
        assert!(!ch.validate_signature(body, "sha256=not-hex"));
        assert!(!ch.validate_signature(b"tampered", &signed("s3cret", body)));
    }

    #[tokio::test]
    async fn inject_before_start_fails() {
        let ch = WebhookChannel::new(WebhookConfig::default());
        assert!(!ch.is_started().await);
        let result = ch
            .inject_message(ChannelMessage::text("webhook", "chat", "hi"))
            .await;
        assert!(matches!(result, Err(ChannelError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn inject_and_receive() {
        let ch = WebhookChannel::new(WebhookConfig::default());
        let mut rx = ch.start().await.unwrap();
        assert!(ch.is_started().await);

        ch.inject_message(ChannelMessage::text("webhook", "254711000111@s.whatsapp.net", "Habari"))
            .await
            .unwrap();
        let received = rx.recv().await.unwrap().unwrap();
        assert_eq!(received.content, "Habari");

        drop(rx);
        assert!(!ch.is_started().await);
    }

    #[tokio::test]
    async fn full_buffer_does_not_block_control_calls() {
        let ch = Arc::new(WebhookChannel::new(WebhookConfig::default()));
        let _rx = ch.start().await.unwrap();
        for i in 0..64 {
            ch.inject_message(ChannelMessage::text("webhook", "chat", format!("m{i}")))
                .await
                .unwrap();
        }

        let blocked = {
            let ch = ch.clone();
            tokio::spawn(async move {
                ch.inject_message(ChannelMessage::text("webhook", "chat", "overflow"))
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        let limit = std::time::Duration::from_secs(1);
        assert!(tokio::time::timeout(limit, ch.is_started()).await.unwrap());
        tokio::time::timeout(limit, ch.stop()).await.unwrap().unwrap();
        blocked.abort();
    }

    #[tokio::test]
    async fn stop_detaches_injection() {
        let ch = WebhookChannel::new(WebhookConfig::default());
        let _rx = ch.start().await.unwrap();
        ch.stop().await.unwrap();
        assert!(!ch.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn send_without_callback_is_dropped() {
        let ch = WebhookChannel::new(WebhookConfig::default());
        assert!(ch.send("chat1", "Response", None).await.is_ok());
    }

    #[tokio::test]
    async fn send_posts_to_callback() {
        let received: Arc<Mutex<Vec<serde_json::Value>>> = Arc::default();
        let sink = received.clone();
        let app = Router::new().route(
            "/reply",
            post(move |Json(body): Json<serde_json::Value>| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(body);
                    "ok"
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let ch = WebhookChannel::new(WebhookConfig {
            shared_secret: None,
            callback_url: Some(format!("http://{addr}/reply")),
        });
        ch.send("chat-9", "Karibu!", None).await.unwrap();

        let bodies = received.lock().unwrap().clone();
        assert_eq!(bodies, vec![serde_json::json!({"chat_id": "chat-9", "text": "Karibu!"})]);
    }

    #[tokio::test]
    async fn callback_error_is_delivery_failure() {
        let app = Router::new().route(
            "/reply",
            post(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let ch = WebhookChannel::new(WebhookConfig {
            shared_secret: None,
            callback_url: Some(format!("http://{addr}/reply")),
        });
        assert!(matches!(
            ch.send("chat-9", "Karibu!", None).await,
            Err(ChannelError::DeliveryFailed { .. })
        ));
    }
}
