//! `parley serve` — Run the webhook gateway and the reply dispatcher.

use std::future::Future;
use std::sync::Arc;

use parley_agent::Orchestrator;
use parley_channels::WebhookChannel;
use parley_config::AppConfig;
use parley_core::channel::Channel;
use tracing::{error, info};

use crate::runtime;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = runtime::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let orchestrator = runtime::build_orchestrator(&config)?;
    let webhook = Arc::new(WebhookChannel::new(config.webhook.clone()));

    println!("💬 Parley Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "   Signatures required: {}",
        webhook.requires_signature()
    );

    serve_until(&config, orchestrator, webhook, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

/// Bind, start the webhook channel, dispatch and serve until `shutdown`.
///
/// The listener is bound before anything is started, so a busy port
/// returns its error with no dispatcher left behind.
async fn serve_until(
    config: &AppConfig,
    orchestrator: Arc<Orchestrator>,
    webhook: Arc<WebhookChannel>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = parley_gateway::bind(&config.gateway).await?;

    let inbound = webhook.start().await?;
    let dispatcher = tokio::spawn(orchestrator.dispatch(webhook.clone(), inbound));

    let served = parley_gateway::serve(listener, webhook.clone(), shutdown).await;

    // Dropping the only sender ends the inbound stream; in-flight replies finish.
    webhook.stop().await?;
    match dispatcher.await {
        Ok(()) => info!("Dispatcher drained"),
        Err(e) => error!(error = %e, "Dispatcher task aborted"),
    }

    Ok(served?)
}
