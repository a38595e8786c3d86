//! Admin endpoints - /api/admin/stats-config
//!
//! Both handlers require the `x-admin-key` header.

use axum::{extract::State, http::HeaderMap, response::Json};
use hive_ledger::{PublicStatsConfig, PublicStatsConfigPatch, SwarmStats};
use serde::Serialize;

use crate::error::Result;
use crate::extract::ApiJson;
use crate::state::AppState;

/// The real numbers the boost is applied on top of.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealStats {
    pub total_agents: u64,
    pub active_agents: u64,
    pub twitter_connected: u64,
    pub completed_tasks: u64,
    pub total_credits_in_circulation: u64,
}

impl From<SwarmStats> for RealStats {
    fn from(stats: SwarmStats) -> Self {
        Self {
            total_agents: stats.total_agents,
            active_agents: stats.active_agents,
            twitter_connected: stats.twitter_connected,
            completed_tasks: stats.completed_tasks,
            total_credits_in_circulation: stats.total_credits_in_circulation,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsConfigResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub config: PublicStatsConfig,
    pub real_stats: RealStats,
}

/// GET /api/admin/stats-config - Current boost settings and real stats
///
/// # Errors
///
/// 401 without the admin key.
pub async fn stats_config(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatsConfigResponse>> {
    state.require_admin(&headers, None)?;
    let stats = state.marketplace.stats();

    Ok(Json(StatsConfigResponse {
        success: None,
        config: stats.public_stats_config().await?,
        real_stats: stats.swarm_stats().await?.into(),
    }))
}

/// POST /api/admin/stats-config - Change the boost settings
///
/// Fields left out of the body keep their current value.
///
/// # Errors
///
/// - 401 without the admin key
/// - 400 for a malformed body
pub async fn update_stats_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(patch): ApiJson<PublicStatsConfigPatch>,
) -> Result<Json<StatsConfigResponse>> {
    state.require_admin(&headers, None)?;
    let stats = state.marketplace.stats();
    let config = stats.set_public_stats_config(patch).await?;
    tracing::info!(enabled = config.enabled, base_agents = config.base_agents, "public stats config updated");

    Ok(Json(StatsConfigResponse {
        success: Some(true),
        config,
        real_stats: stats.swarm_stats().await?.into(),
    }))
}
