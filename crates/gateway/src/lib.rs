//! HTTP surface for Parley.
//!
//! Exposes a liveness endpoint (for hosts that ping `/` to keep the process
//! awake) and the inbound webhook that feeds the webhook channel.
//!
//! Built on Axum.

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use parley_channels::WebhookChannel;
use parley_core::channel::{ChannelId, ChannelMessage};
use parley_core::error::ChannelError;

/// Header carrying the HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub webhook: Arc<WebhookChannel>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .layer(DefaultBodyLimit::max(256 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the gateway listener on the configured host and port.
pub async fn bind(config: &parley_config::GatewayConfig) -> std::io::Result<TcpListener> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    Ok(listener)
}

/// Serve the gateway routes on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    webhook: Arc<WebhookChannel>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(Arc::new(GatewayState { webhook }));

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown signal received");
        })
        .await
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct WebhookRequest {
    chat_id: String,
    text: String,
    #[serde(default)]
    sender_id: Option<String>,
    #[serde(default)]
    sender_name: Option<String>,
    #[serde(default)]
    from_self: bool,
}

#[derive(Serialize)]
struct WebhookResponse {
    status: &'static str,
}

fn reject(status: StatusCode, reason: &'static str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": reason })))
}

async fn webhook_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    if state.webhook.requires_signature() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if !state.webhook.validate_signature(&body, signature) {
            warn!("Webhook rejected: bad or missing signature");
            return reject(StatusCode::UNAUTHORIZED, "invalid signature").into_response();
        }
    }

    let payload: WebhookRequest = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "Webhook rejected: malformed body");
            return reject(StatusCode::BAD_REQUEST, "malformed payload").into_response();
        }
    };

    if payload.chat_id.trim().is_empty() {
        return reject(StatusCode::BAD_REQUEST, "chat_id is required").into_response();
    }

    info!(
        chat_id = %payload.chat_id,
        message_len = payload.text.len(),
        "Webhook message received"
    );

    let msg = ChannelMessage {
        channel_id: ChannelId("webhook".into()),
        sender_id: payload.sender_id.unwrap_or_else(|| payload.chat_id.clone()),
        sender_name: payload.sender_name,
        content: payload.text,
        chat_id: payload.chat_id,
        from_self: payload.from_self,
        metadata: serde_json::Map::new(),
    };

    match state.webhook.inject_message(msg).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(WebhookResponse { status: "accepted" })).into_response(),
        Err(e @ (ChannelError::NotConfigured(_) | ChannelError::ConnectionLost(_))) => {
            warn!(error = %e, "Webhook channel unavailable");
            reject(StatusCode::SERVICE_UNAVAILABLE, "channel not running").into_response()
        }
        Err(e) => {
            warn!(error = %e, "Webhook injection failed");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "injection failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use parley_config::WebhookConfig;
    use parley_core::channel::Channel;
    use tower::ServiceExt;

    fn state_with(config: WebhookConfig) -> (SharedState, Arc<WebhookChannel>) {
        let webhook = Arc::new(WebhookChannel::new(config));
        (
            Arc::new(GatewayState {
                webhook: webhook.clone(),
            }),
            webhook,
        )
    }

    fn post_webhook(body: &str, signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header(SIGNATURE_HEADER, sig);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn sign(secret: &str, body: &str) -> String {
        use hmac::{Hmac, Mac};
        let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[tokio::test]
    async fn health_endpoints() {
        let (state, _) = state_with(WebhookConfig::default());

        for uri in ["/", "/health"] {
            let app = build_router(state.clone());
            let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let response = app.oneshot(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);

            let body = response.into_body().collect().await.unwrap().to_bytes();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["status"], "ok");
        }
    }

    #[tokio::test]
    async fn webhook_before_start_is_unavailable() {
        let (state, _) = state_with(WebhookConfig::default());
        let app = build_router(state);

        let response = app
            .oneshot(post_webhook(r#"{"chat_id":"a","text":"hi"}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn webhook_injects_message() {
        let (state, webhook) = state_with(WebhookConfig::default());
        let mut rx = webhook.start().await.unwrap();
        let app = build_router(state);

        let response = app
            .oneshot(post_webhook(
                r#"{"chat_id":"254711000111@s.whatsapp.net","text":"Bei ya asali?","sender_name":"Amina"}"#,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let msg = rx.recv().await.unwrap().unwrap();
        assert_eq!(msg.chat_id, "254711000111@s.whatsapp.net");
        assert_eq!(msg.sender_id, msg.chat_id);
        assert_eq!(msg.sender_name.as_deref(), Some("Amina"));
        assert_eq!(msg.content, "Bei ya asali?");
        assert!(!msg.from_self);
    }

    #[tokio::test]
    async fn malformed_payload_is_bad_request() {
        let (state, webhook) = state_with(WebhookConfig::default());
        let _rx = webhook.start().await.unwrap();

        let response = build_router(state.clone())
            .oneshot(post_webhook(r#"{"text":"no chat"}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = build_router(state)
            .oneshot(post_webhook(r#"{"chat_id":" ","text":"hi"}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signature_is_enforced_when_secret_set() {
        let (state, webhook) = state_with(WebhookConfig {
            shared_secret: Some("s3cret".into()),
            callback_url: None,
        });
        let mut rx = webhook.start().await.unwrap();
        let body = r#"{"chat_id":"a","text":"hi"}"#;

        let unsigned = build_router(state.clone())
            .oneshot(post_webhook(body, None))
            .await
            .unwrap();
        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

        let forged = build_router(state.clone())
            .oneshot(post_webhook(body, Some(&sign("wrong", body))))
            .await
            .unwrap();
        assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

        let signed = build_router(state)
            .oneshot(post_webhook(body, Some(&sign("s3cret", body))))
            .await
            .unwrap();
        assert_eq!(signed.status(), StatusCode::ACCEPTED);
        assert_eq!(rx.recv().await.unwrap().unwrap().content, "hi");
    }

    #[tokio::test]
    async fn bind_reports_port_in_use() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = parley_config::GatewayConfig {
            host: "127.0.0.1".into(),
            port: taken.local_addr().unwrap().port(),
        };
        assert!(bind(&config).await.is_err());
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let config = parley_config::GatewayConfig {
            host: "127.0.0.1".into(),
            port: 0,
        };
        let listener = bind(&config).await.unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(
            listener,
            Arc::new(WebhookChannel::new(WebhookConfig::default())),
            async move {
                let _ = stop_rx.await;
            },
        ));

        stop_tx.send(()).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(3), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
