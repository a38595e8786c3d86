//! Heartbeat endpoint - POST /api/heartbeat
//!
//! Agents check in on their own interval. Every heartbeat upserts the agent,
//! and a ready agent is handed the next task it did not request itself.

use axum::{extract::State, response::Json};
use hive_ledger::{AgentPatch, AgentStatus, Heartbeat};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extract::ApiJson;
use crate::routes::required;
use crate::state::AppState;
use crate::views::{AgentStatsView, PriceList, TaskView};

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub soul_id: Option<String>,
    pub twitter_handle: Option<String>,
    pub has_twitter_access: Option<bool>,
    pub status: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub recent_tweets: Option<Vec<String>>,
    pub referred_by: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatStatus {
    TaskAssigned,
    Acknowledged,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub status: HeartbeatStatus,
    pub task: Option<TaskView>,
    pub swarm_size: u64,
    pub active_agents: u64,
    pub twitter_connected: u64,
    pub your_stats: AgentStatsView,
    pub credit_rates: PriceList,
}

/// POST /api/heartbeat - Check in and maybe receive a task
///
/// # Errors
///
/// 400 without a `soul_id` or with an unknown `status`.
pub async fn heartbeat(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>> {
    let soul_id = required(request.soul_id, "soul_id")?;
    let status = request
        .status
        .as_deref()
        .map(str::parse::<AgentStatus>)
        .transpose()?;

    let patch = AgentPatch {
        twitter_handle: request.twitter_handle,
        has_twitter_access: request.has_twitter_access,
        capabilities: request.capabilities,
        recent_tweets: request.recent_tweets,
        status,
        referred_by: request.referred_by,
        reputation: None,
    };

    let Heartbeat { agent, task, stats } = state.marketplace.heartbeat(&soul_id, patch).await?;
    let rates = &state.marketplace.config().rates;

    Ok(Json(HeartbeatResponse {
        status: if task.is_some() {
            HeartbeatStatus::TaskAssigned
        } else {
            HeartbeatStatus::Acknowledged
        },
        task: task.as_ref().map(TaskView::from),
        swarm_size: stats.total_agents,
        active_agents: stats.active_agents,
        twitter_connected: stats.twitter_connected,
        your_stats: AgentStatsView::from(&agent),
        credit_rates: PriceList {
            earn: rates.earn,
            spend: rates.spend,
        },
    }))
}
