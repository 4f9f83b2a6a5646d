//! Documentation of ProjectFlow, a small project and task tracker for teams.
//!
//!
//!
//! # General Infrastructure
//! - One axum server serves both the JSON API under `/api` and the static frontend
//! - Redis holds every document (users, projects, tasks)
//! - Emails go out through an HTTP mail relay, or are only logged when none is configured
//!
//!
//!
//! # Endpoints
//!
//! ```text
//! GET  /health              - Liveness
//! POST /api/register        - Create account, returns { user, token }
//! POST /api/login           - Returns { user, token }
//! GET  /api/projects        - List projects          (auth)
//! POST /api/projects        - Create project         (auth)
//! GET  /api/tasks           - List tasks             (auth)
//! POST /api/tasks           - Create task            (auth)
//! POST /api/tasks/suggest   - Ranked assignee scores (auth)
//! GET  /api/users           - List users             (auth)
//! ```
//!
//! Authenticated routes expect `Authorization: Bearer <token>`.
//!
//!
//!
//! # Task Assignment
//!
//! A task created without `assigneeId` goes to the best scoring member, see the `assign` crate.
//! The winning score is stored on the task as `aiScore`.
//!
//!
//!
//! # Environment
//!
//! | Variable         | Default                     |
//! |------------------|-----------------------------|
//! | `RUST_PORT`      | `5000`                      |
//! | `STORE`          | `redis` (or `memory`)       |
//! | `REDIS_URL`      | `redis://127.0.0.1:6379`    |
//! | `FRONTEND_DIR`   | `frontend`                  |
//! | `JWT_SECRET`     | required, env or secret file |
//! | `TOKEN_TTL_DAYS` | `7`                         |
//! | `BCRYPT_COST`    | `10`                        |
//! | `MAIL_API_URL`   | unset, emails are logged    |
//! | `MAIL_API_KEY`   | unset                       |
//! | `MAIL_FROM`      | `noreply@projectflow.local` |
//!
//! Secrets are read from the environment first, then `/run/secrets/<NAME>`.
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! JWT_SECRET=dev RUST_LOG=info cargo run -p projectflow
//! ```
//!
//! Run without Redis.
//! ```sh
//! JWT_SECRET=dev STORE=memory RUST_LOG=info cargo run -p projectflow
//! ```
use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal, time::timeout};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod memory;
pub mod notify;
pub mod routes;
pub mod state;
pub mod utils;

use config::Config;
use routes::{
    create_project_handler, create_task_handler, health_handler, list_projects_handler,
    list_tasks_handler, list_users_handler, login_handler, register_handler, suggest_handler,
};
use state::State;

const MAIL_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load().inspect_err(|e| error!("Environment misconfigured: {e}"))?;

    info!("Initializing state...");
    let state = State::new(config).await.context("Failed to initialize store")?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Draining notification queue...");
    if timeout(MAIL_DRAIN_TIMEOUT, state.notifier.drain()).await.is_err() {
        warn!("Notification queue not drained after {MAIL_DRAIN_TIMEOUT:?}, pending emails dropped");
    }

    info!("Server shut down");
    Ok(())
}

pub fn app(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/projects", get(list_projects_handler).post(create_project_handler))
        .route("/tasks", get(list_tasks_handler).post(create_task_handler))
        .route("/tasks/suggest", post(suggest_handler))
        .route("/users", get(list_users_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .fallback_service(ServeDir::new(&state.config.frontend_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
