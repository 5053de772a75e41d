// adforge - AI request orchestration for ad copy and voice generation
// Author: kelexine (https://github.com/kelexine)

use anyhow::{Context, Result};
use adforge::cli::Args;
use adforge::config::AppConfig;
use adforge::orchestrator::AdOrchestrator;
use adforge::providers::{AnthropicProvider, ElevenLabsProvider, MockVoiceProvider, VoiceProvider};
use adforge::server::create_router;
use adforge::utils::logging;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    if args.print_config {
        println!("{}", toml::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting adforge v{}", env!("CARGO_PKG_VERSION"));

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(serve(config))
}

async fn serve(config: AppConfig) -> Result<()> {
    // Phase 3: Build provider clients
    let text = Arc::new(AnthropicProvider::new(&config.text)?);
    info!(
        "Text provider ready: {} (fast: {}, capable: {})",
        config.text.api_base_url, config.text.fast_model, config.text.capable_model
    );

    let voice: Arc<dyn VoiceProvider> = if config.voice.api_key.is_empty() {
        warn!("No voice API key configured, using mock voice provider");
        Arc::new(MockVoiceProvider::new())
    } else {
        Arc::new(ElevenLabsProvider::new(&config.voice)?)
    };

    // Phase 4: Orchestrator and cache sweepers
    let orchestrator = Arc::new(AdOrchestrator::new(&config, text, voice));
    let sweepers = orchestrator.spawn_sweepers();

    // Phase 5: Build and start HTTP server
    let app = create_router(config.clone(), orchestrator)?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Phase 6: Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for sweeper in sweepers {
        sweeper.abort();
    }
    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
