//! Task endpoints - /api/tasks
//!
//! - `POST` spends the caller's credits on new tasks
//! - `GET` shows the queue, the price list and optionally the caller's tasks
//! - `PUT` lets an admin publish free system tasks

use axum::{
    extract::State,
    http::HeaderMap,
    response::Json,
};
use hive_core::Error;
use hive_ledger::{SystemTaskSpec, TargetFields, TaskCounts, TaskRequest, TaskType};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extract::{ApiJson, ApiQuery};
use crate::routes::required;
use crate::state::AppState;
use crate::views::{PriceList, TaskView, task_views};

const RECENT_TASKS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct CreateTasksRequest {
    pub soul_id: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub tweet_url: Option<String>,
    pub reply_text: Option<String>,
    pub post_content: Option<String>,
    pub post_topic: Option<String>,
    pub count: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CreateTasksResponse {
    pub status: &'static str,
    pub count: usize,
    pub tasks: Vec<TaskView>,
    pub total_cost: u64,
    pub remaining_credits: u64,
}

#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    pub soul_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreditsSummary {
    pub credits: u64,
    pub credits_earned: u64,
    pub credits_spent: u64,
}

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub stats: TaskCounts,
    pub pricing: PriceList,
    pub recent_tasks: Vec<TaskView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_tasks: Option<Vec<TaskView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_credits: Option<CreditsSummary>,
}

#[derive(Debug, Deserialize)]
pub struct SystemTaskRequest {
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub tweet_url: Option<String>,
    pub reply_text: Option<String>,
    pub post_content: Option<String>,
    pub post_topic: Option<String>,
    pub description: Option<String>,
    pub credit_reward: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct BulkCreateRequest {
    pub api_key: Option<String>,
    #[serde(default)]
    pub tasks: Vec<SystemTaskRequest>,
}

#[derive(Debug, Serialize)]
pub struct CreatedTask {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
}

#[derive(Debug, Serialize)]
pub struct BulkCreateResponse {
    pub status: &'static str,
    pub count: usize,
    pub tasks: Vec<CreatedTask>,
}

fn parse_type(task_type: Option<String>) -> hive_core::Result<TaskType> {
    required(task_type, "type")?.parse()
}

/// POST /api/tasks - Request tasks paid for with the caller's credits
///
/// # Errors
///
/// - 400 for a bad type, target or count
/// - 402 when the caller cannot afford the batch
/// - 404 for unknown callers
pub async fn request_tasks(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateTasksRequest>,
) -> Result<Json<CreateTasksResponse>> {
    let soul_id = required(request.soul_id, "soul_id")?;
    let task_type = parse_type(request.task_type)?;

    let receipt = state
        .marketplace
        .request_tasks(TaskRequest {
            soul_id,
            task_type,
            fields: TargetFields {
                tweet_url: request.tweet_url,
                reply_text: request.reply_text,
                post_content: request.post_content,
                post_topic: request.post_topic,
            },
            count: request.count,
        })
        .await?;

    Ok(Json(CreateTasksResponse {
        status: "created",
        count: receipt.tasks.len(),
        tasks: task_views(&receipt.tasks),
        total_cost: receipt.total_cost,
        remaining_credits: receipt.remaining_credits,
    }))
}

/// GET /api/tasks - Queue overview
///
/// With `soul_id` the response also carries the caller's requested tasks
/// and balance.
///
/// # Errors
///
/// 500 on store failures.
pub async fn overview(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OverviewQuery>,
) -> Result<Json<OverviewResponse>> {
    let market = &state.marketplace;
    let stats = market.tasks().counts().await?;
    let recent_tasks = market.tasks().recent_tasks(RECENT_TASKS).await?;

    let (your_tasks, your_credits) = match query.soul_id.filter(|s| !s.trim().is_empty()) {
        Some(soul_id) => {
            let tasks = market.tasks().tasks_requested_by(&soul_id).await?;
            let credits = market.agents().get_agent(&soul_id).await?.map(|agent| CreditsSummary {
                credits: agent.credits,
                credits_earned: agent.credits_earned,
                credits_spent: agent.credits_spent,
            });
            (Some(task_views(&tasks)), credits)
        }
        None => (None, None),
    };

    let rates = &market.config().rates;
    Ok(Json(OverviewResponse {
        stats,
        pricing: PriceList {
            earn: rates.earn,
            spend: rates.spend,
        },
        recent_tasks: task_views(&recent_tasks),
        your_tasks,
        your_credits,
    }))
}

/// PUT /api/tasks - Bulk-create system tasks (admin)
///
/// # Errors
///
/// - 401 without the admin key
/// - 400 for an empty list or any bad entry; nothing is created then
pub async fn create_system_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<BulkCreateRequest>,
) -> Result<Json<BulkCreateResponse>> {
    state.require_admin(&headers, request.api_key.as_deref())?;
    if request.tasks.is_empty() {
        return Err(Error::missing_field("tasks").into());
    }

    let specs = request
        .tasks
        .into_iter()
        .map(|task| {
            Ok(SystemTaskSpec {
                task_type: parse_type(task.task_type)?,
                fields: TargetFields {
                    tweet_url: task.tweet_url,
                    reply_text: task.reply_text,
                    post_content: task.post_content,
                    post_topic: task.post_topic,
                },
                description: task.description,
                credit_reward: task.credit_reward,
            })
        })
        .collect::<hive_core::Result<Vec<_>>>()?;

    let created = state.marketplace.create_system_tasks(specs).await?;
    Ok(Json(BulkCreateResponse {
        status: "created",
        count: created.len(),
        tasks: created
            .into_iter()
            .map(|task| CreatedTask {
                id: task.id,
                task_type: task.task_type,
            })
            .collect(),
    }))
}
