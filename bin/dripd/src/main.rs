//! Drip faucet service binary.
//!
//! Wires configured chain environments to orchestrators and exposes
//! the chat command surface as a webhook endpoint: the chat connector
//! POSTs inbound messages to `/api/command` and receives asynchronous
//! worker replies on its outbound webhook.

mod sink;

use anyhow::Context;
use axum::extract::State;
use axum::{routing::get, routing::post, Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use drip_chain::{ClientKind, CosmosClient, NetworkClient, SubstrateClient};
use drip_common::logging::init_logging;
use drip_faucet::commands::handle_command;
use drip_faucet::{AuditLog, FaucetConfig, FaucetOrchestrator, ReplySink};

use sink::WebhookSink;

/// Faucet service CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override the listen address from the config file
    #[arg(long)]
    listen_addr: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

struct ChannelRoute {
    orchestrator: Arc<FaucetOrchestrator>,
    sink: Arc<dyn ReplySink>,
}

struct AppState {
    routes: HashMap<String, ChannelRoute>,
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    channel: String,
    author: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    reply: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    info!("Starting drip faucet service v{}", env!("CARGO_PKG_VERSION"));

    let mut config: FaucetConfig =
        drip_common::load_config(&args.config).context("loading faucet configuration")?;
    if let Some(listen_addr) = args.listen_addr {
        config.listen_addr = listen_addr;
    }

    let privileged: HashSet<String> = config.privileged_requesters.iter().cloned().collect();
    let audit = AuditLog::new(&config.audit_log);

    let mut routes = HashMap::new();
    for env in &config.envs {
        let client: Arc<dyn NetworkClient> = match env.client {
            ClientKind::Cosmos => Arc::new(CosmosClient::new(env.cosmos_config())),
            ClientKind::Substrate => Arc::new(SubstrateClient::new(env.substrate_config())),
        };
        let orchestrator =
            FaucetOrchestrator::new(env.clone(), client, audit.clone(), privileged.clone());
        info!(
            env = %env.key,
            chain_id = %env.chain_id,
            channels = ?env.channels_to_listen,
            "environment configured"
        );

        for channel in &env.channels_to_listen {
            let sink: Arc<dyn ReplySink> = Arc::new(WebhookSink::new(
                config.outbound_webhook.clone(),
                channel.clone(),
            ));
            let previous = routes.insert(
                channel.clone(),
                ChannelRoute {
                    orchestrator: orchestrator.clone(),
                    sink,
                },
            );
            if previous.is_some() {
                warn!(%channel, "channel is claimed by more than one environment");
            }
        }
    }

    let state = Arc::new(AppState { routes });
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/status", get(status_handler))
        .route("/api/command", post(command_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config.listen_addr.parse().context("parsing listen_addr")?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down gracefully");
    Ok(())
}

async fn root_handler() -> &'static str {
    "drip faucet"
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn metrics_handler() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(error) = encoder.encode(&prometheus::gather(), &mut buffer) {
        warn!(%error, "metrics encoding failed");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let envs: Vec<_> = state
        .routes
        .iter()
        .map(|(channel, route)| {
            serde_json::json!({
                "channel": channel,
                "env": route.orchestrator.env().key,
                "chain_id": route.orchestrator.env().chain_id,
                "network": route.orchestrator.env().network_name,
            })
        })
        .collect();
    Json(serde_json::json!({ "routes": envs }))
}

async fn command_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> Json<CommandResponse> {
    // Only commands on routed channels get a reply.
    if !request.content.starts_with('$') {
        return Json(CommandResponse { reply: None });
    }
    let Some(route) = state.routes.get(&request.channel) else {
        return Json(CommandResponse { reply: None });
    };

    let reply = handle_command(
        &route.orchestrator,
        &request.author,
        &request.content,
        route.sink.clone(),
    )
    .await;
    Json(CommandResponse { reply: Some(reply) })
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
