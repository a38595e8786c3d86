//! Completion endpoint - POST /api/complete

use axum::{extract::State, response::Json};
use hive_ledger::{Completion, CompletionReport, TaskOutcome, Tier};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extract::ApiJson;
use crate::routes::required;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub task_id: Option<String>,
    pub soul_id: Option<String>,
    pub status: Option<String>,
    pub proof: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub status: &'static str,
    pub message: String,
    pub credits_earned: u64,
    pub total_credits: u64,
    pub reputation: u64,
    pub tier: Tier,
    pub reputation_change: i64,
}

/// Only an explicit success settles as completed; any other status, or
/// none at all, settles as failed.
fn parse_outcome(status: Option<&str>) -> TaskOutcome {
    match status.map(str::trim) {
        Some("success" | "completed") => TaskOutcome::Completed,
        _ => TaskOutcome::Failed,
    }
}

/// POST /api/complete - Settle an assigned task
///
/// # Errors
///
/// - 400 when `task_id` or `soul_id` is missing
/// - 403 when the caller is not the assignee
/// - 404 for unknown tasks
/// - 409 when the task was already settled
pub async fn complete_task(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CompleteRequest>,
) -> Result<Json<CompleteResponse>> {
    let task_id = required(request.task_id, "task_id")?;
    let soul_id = required(request.soul_id, "soul_id")?;
    let outcome = parse_outcome(request.status.as_deref());

    let Completion {
        agent,
        credits_earned,
        reputation_change,
        ..
    } = state
        .marketplace
        .complete_task(CompletionReport {
            task_id,
            soul_id,
            outcome,
            proof: request.proof,
        })
        .await?;

    let (status, message) = match outcome {
        TaskOutcome::Completed => ("success", format!("Task completed! +{credits_earned} credits")),
        TaskOutcome::Failed => ("failed", "Task marked as failed".to_string()),
    };

    Ok(Json(CompleteResponse {
        status,
        message,
        credits_earned,
        total_credits: agent.credits,
        reputation: agent.reputation,
        tier: agent.tier,
        reputation_change,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_success_completes() {
        assert_eq!(parse_outcome(Some("success")), TaskOutcome::Completed);
        assert_eq!(parse_outcome(Some("completed")), TaskOutcome::Completed);
        assert_eq!(parse_outcome(Some("failed")), TaskOutcome::Failed);
        assert_eq!(parse_outcome(Some("error")), TaskOutcome::Failed);
        assert_eq!(parse_outcome(Some("")), TaskOutcome::Failed);
        assert_eq!(parse_outcome(None), TaskOutcome::Failed);
    }
}
