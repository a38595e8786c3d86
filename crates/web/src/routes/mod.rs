//! REST API routes
//!
//! ## Route Structure
//!
//! - `POST /api/heartbeat` - Agent check-in and task hand-out
//! - `POST /api/complete` - Report the outcome of an assigned task
//! - `POST /api/tasks` - Request paid tasks
//! - `GET /api/tasks` - Queue overview and the caller's own tasks
//! - `PUT /api/tasks` - Admin bulk creation of system tasks
//! - `GET|POST /api/credits` - Rates, balance, purchases and cash-outs
//! - `GET|POST /api/swarm-types` - Swarm type catalog
//! - `GET|POST /api/swarm-types/opt-in` - Per-agent opt-ins
//! - `GET /api/stats` - Real swarm statistics with a leaderboard
//! - `GET /api/public-stats` - Boosted statistics for the landing page
//! - `GET|POST /api/admin/stats-config` - Public stats boost settings
//! - `GET /api/health` - Health check with storage backend

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

pub mod admin;
pub mod complete;
pub mod credits;
pub mod health;
pub mod heartbeat;
pub mod stats;
pub mod swarm_types;
pub mod tasks;

/// Assemble every API route under `/api`.
pub fn create_router() -> Router<AppState> {
    let api_routes = Router::new()
        .route("/health", get(health::health))
        // Agent loop
        .route("/heartbeat", post(heartbeat::heartbeat))
        .route("/complete", post(complete::complete_task))
        // Tasks and credits
        .route(
            "/tasks",
            get(tasks::overview)
                .post(tasks::request_tasks)
                .put(tasks::create_system_tasks),
        )
        .route("/credits", get(credits::overview).post(credits::transact))
        // Swarm types
        .route(
            "/swarm-types",
            get(swarm_types::list_swarm_types).post(swarm_types::create_swarm_type),
        )
        .route(
            "/swarm-types/opt-in",
            get(swarm_types::opt_in_status).post(swarm_types::change_opt_in),
        )
        // Dashboards
        .route("/stats", get(stats::swarm_stats))
        .route("/public-stats", get(stats::public_stats))
        .route(
            "/admin/stats-config",
            get(admin::stats_config).post(admin::update_stats_config),
        );

    Router::new().nest("/api", api_routes)
}

/// A present, non-blank request field.
pub(crate) fn required(value: Option<String>, field: &str) -> hive_core::Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| hive_core::Error::missing_field(field))
}
