//! Video ingestion worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vindex_ai::OpenAiClient;
use vindex_db::PgGateway;
use vindex_media::FfmpegToolkit;
use vindex_worker::controller::ControllerConfig;
use vindex_worker::http::{self, HealthState};
use vindex_worker::{
    DataLayout, JobController, PipelineContext, PipelineSettings, WorkerConfig,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vindex-worker");

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let gateway = match PgGateway::connect(&config.database_url).await {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!("Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    let openai = match OpenAiClient::new(&config.openai_api_key) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create OpenAI client: {e}");
            std::process::exit(1);
        }
    };

    let ctx = Arc::new(PipelineContext {
        storage: gateway.clone(),
        media: Arc::new(FfmpegToolkit::new()),
        speech: openai.clone(),
        vision: openai.clone(),
        embedder: openai,
        layout: DataLayout::new(&config.data_dir),
        settings: PipelineSettings {
            max_frames_per_video: config.max_frames_per_video,
            vision_max_concurrent: config.vision_max_concurrent,
            enable_transcription: config.enable_transcription,
            enable_vision_analysis: config.enable_vision_analysis,
            enable_embeddings: config.enable_embeddings,
        },
    });

    if config.dev_http {
        let state = HealthState {
            source: gateway.clone(),
            storage: gateway.clone(),
        };
        let port = config.http_port;
        tokio::spawn(async move {
            if let Err(e) = http::serve(state, port).await {
                error!("Health server error: {e}");
            }
        });
    }

    let controller = Arc::new(JobController::new(
        gateway,
        ctx,
        ControllerConfig::from_worker(&config),
    ));

    let signal_target = Arc::clone(&controller);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        signal_target.shutdown();
    });

    if let Err(e) = controller.run().await {
        error!("Worker loop error: {e}");
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);
    let default_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
