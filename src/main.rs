//! POLLX server entry point

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pollx::{
    aggregate::spawn_mood_task,
    config::Args,
    db::MongoClient,
    evaluator::{GeminiEvaluator, TextEvaluator},
    server::{self, AppState},
    store::Stores,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("pollx={},info", args.log_level).into());
    if args.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  POLLX - polling and social voting");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} (db {})", args.mongodb_uri, args.mongodb_db);
    info!(
        "Mood: every {}s over {}h, min {} polls",
        args.mood.mood_interval_secs, args.mood.mood_window_hours, args.mood.mood_min_polls
    );
    info!("======================================");

    // MongoDB is optional in dev mode
    let stores = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Stores::mongo(&client).await?
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                Stores::memory()
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let evaluator: Option<Arc<dyn TextEvaluator>> = match args.ai.ai_api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => {
            let gemini = GeminiEvaluator::new(
                &args.ai.ai_base_url,
                &args.ai.ai_model,
                key.trim(),
                args.ai_timeout(),
            )?;
            info!("Text evaluation via {}", args.ai.ai_model);
            Some(Arc::new(gemini))
        }
        _ => {
            warn!("GEMINI_API_KEY not set - candidate profiles use mock output, mood stays unchanged");
            None
        }
    };

    let mood_interval = Duration::from_secs(args.mood.mood_interval_secs.max(1));
    let state = Arc::new(AppState::new(args, stores, evaluator)?);

    spawn_mood_task(Arc::clone(&state.mood), mood_interval);

    server::run(state).await?;
    Ok(())
}
