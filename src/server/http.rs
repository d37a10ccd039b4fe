//! HTTP server
//!
//! Builds the shared state, wires the axum router and serves it until a
//! shutdown signal arrives.

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::aggregate::MoodAggregator;
use crate::auth::JwtValidator;
use crate::config::Args;
use crate::evaluator::TextEvaluator;
use crate::ledger::VoteLedger;
use crate::live::LiveHub;
use crate::notify::Fanout;
use crate::routes;
use crate::services::{
    AccountService, CommentService, ElectionService, NotificationService, PollService,
};
use crate::store::Stores;
use crate::types::{PollxError, Result};

use super::websocket;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub stores: Stores,
    pub jwt: Arc<JwtValidator>,
    /// Per-poll live tally topics
    pub live: Arc<LiveHub>,
    pub ledger: VoteLedger,
    pub accounts: AccountService,
    pub polls: PollService,
    pub comments: CommentService,
    pub notifications: NotificationService,
    pub elections: ElectionService,
    pub mood: Arc<MoodAggregator>,
}

impl AppState {
    /// Wire every service over `stores`. `evaluator` is `None` when no
    /// credential is configured.
    pub fn new(
        args: Args,
        stores: Stores,
        evaluator: Option<Arc<dyn TextEvaluator>>,
    ) -> Result<Self> {
        let secret = args
            .jwt_secret()
            .ok_or_else(|| PollxError::Config("JWT_SECRET is not set".into()))?;
        let jwt = Arc::new(JwtValidator::new(secret, args.jwt_expiry_seconds)?);

        let live = Arc::new(LiveHub::new(args.live_channel_capacity));
        let fanout = Arc::new(Fanout::new(
            stores.notifications.clone(),
            stores.users.clone(),
            stores.comments.clone(),
            live.clone(),
        ));

        let ledger = VoteLedger::new(
            stores.polls.clone(),
            stores.votes.clone(),
            stores.users.clone(),
            fanout.clone(),
        );
        let accounts = AccountService::new(stores.users.clone(), jwt.clone());
        let polls = PollService::new(
            stores.polls.clone(),
            stores.votes.clone(),
            stores.comments.clone(),
            fanout.clone(),
        );
        let comments = CommentService::new(stores.polls.clone(), stores.comments.clone(), fanout);
        let notifications = NotificationService::new(stores.notifications.clone());
        let elections = ElectionService::new(
            stores.candidates.clone(),
            stores.elections.clone(),
            evaluator.clone(),
            args.ai_timeout(),
        );
        let mood = Arc::new(MoodAggregator::new(
            stores.polls.clone(),
            stores.system.clone(),
            evaluator,
            chrono::Duration::hours(args.mood.mood_window_hours),
            args.mood.mood_min_polls,
            args.ai_timeout(),
        ));

        Ok(Self {
            args,
            stores,
            jwt,
            live,
            ledger,
            accounts,
            polls,
            comments,
            notifications,
            elections,
            mood,
        })
    }
}

fn cors_layer(args: &Args) -> CorsLayer {
    let origins: Vec<HeaderValue> = args
        .allowed_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// The full application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/ws", get(websocket::handle_live_ws))
        .nest("/api", routes::api_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.args))
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen)
        .await
        .map_err(|e| PollxError::Config(format!("Failed to bind {}: {}", state.args.listen, e)))?;

    info!("POLLX listening on {}", state.args.listen);
    if state.args.dev_mode {
        warn!("Development mode enabled - do not expose this instance");
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PollxError::Internal(format!("Server error: {}", e)))?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
