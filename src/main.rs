use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rebusbot::{
    config::{BotConfig, RunMode},
    content::FileContentSource,
    dispatch::Dispatcher,
    engine::DialogEngine,
    polling,
    report::{ErrorReporter, RollbarReporter, TracingReporter},
    server,
    store::{MemoryStore, UserStore},
    transport::TelegramClient,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rebusbot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting rebusbot...");
    let config = BotConfig::from_env()?;

    let content = Arc::new(FileContentSource::load(&config.content_dir).await?);

    let store = Arc::new(match &config.store_path {
        Some(path) => MemoryStore::open(path).await?,
        None => {
            tracing::warn!("STORE_PATH not set - participant data is lost on restart");
            MemoryStore::new()
        }
    });
    for window in FileContentSource::load_windows(&config.content_dir).await? {
        store.add_window(window).await?;
    }

    let client = Arc::new(TelegramClient::new(&config.api_url, &config.token)?);

    let reporter: Arc<dyn ErrorReporter> = match config.rollbar.clone() {
        Some(rollbar) => Arc::new(RollbarReporter::new(rollbar)),
        None => Arc::new(TracingReporter),
    };

    let engine = DialogEngine::start(store, content, client.clone(), reporter, config.game.clone());
    let dispatcher = Dispatcher::new(engine.clone());

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
                return;
            }
            tracing::info!("Shutdown requested");
            shutdown.cancel();
        });
    }

    match config.mode {
        RunMode::Polling => {
            client.delete_webhook().await?;
            polling::run(client, dispatcher.clone(), shutdown).await;
        }
        RunMode::Webhook {
            addr,
            secret,
            public_url,
        } => {
            if let Some(url) = &public_url {
                client.set_webhook(url, secret.as_deref()).await?;
                tracing::info!("Webhook registered at {}", url);
            }
            let app = server::router(dispatcher.clone(), secret);
            server::serve(addr, app, shutdown.cancelled_owned()).await?;
        }
    }

    dispatcher.shutdown().await;
    engine.scheduler().cancel_all().await;
    tracing::info!("Bye");
    Ok(())
}
