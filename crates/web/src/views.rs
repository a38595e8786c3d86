//! Wire shapes shared by several endpoints.

use chrono::{DateTime, Utc};
use hive_ledger::{Agent, RateTable, Task, TaskStatus, TaskTarget, TaskType, Tier};
use serde::Serialize;

/// A task as agents see it: the target flattened into optional fields.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweet_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_duration_sec: Option<u32>,
    pub credit_reward: u64,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Task> for TaskView {
    fn from(task: &Task) -> Self {
        let (tweet_url, tweet_id, reply_text, post_content, post_topic) = match &task.target {
            TaskTarget::Tweet {
                tweet_url,
                tweet_id,
            } => (Some(tweet_url.clone()), Some(tweet_id.clone()), None, None, None),
            TaskTarget::Reply {
                tweet_url,
                tweet_id,
                reply_text,
            } => (
                Some(tweet_url.clone()),
                Some(tweet_id.clone()),
                Some(reply_text.clone()),
                None,
                None,
            ),
            TaskTarget::Post {
                post_topic,
                post_content,
            } => (None, None, None, post_content.clone(), post_topic.clone()),
        };

        Self {
            id: task.id.clone(),
            task_type: task.task_type,
            description: task.description.clone(),
            tweet_url,
            tweet_id,
            reply_text,
            post_content,
            post_topic,
            view_duration_sec: task.view_duration_sec,
            credit_reward: task.credit_reward,
            status: task.status,
            created_at: task.created_at,
        }
    }
}

pub fn task_views(tasks: &[Task]) -> Vec<TaskView> {
    tasks.iter().map(TaskView::from).collect()
}

/// An agent's own counters, returned on heartbeat.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatsView {
    pub credits: u64,
    pub credits_earned: u64,
    pub credits_spent: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub reputation: u64,
    pub tier: Tier,
    pub referral_earnings: f64,
}

impl From<&Agent> for AgentStatsView {
    fn from(agent: &Agent) -> Self {
        Self {
            credits: agent.credits,
            credits_earned: agent.credits_earned,
            credits_spent: agent.credits_spent,
            completed_tasks: agent.completed_tasks,
            failed_tasks: agent.failed_tasks,
            reputation: agent.reputation,
            tier: agent.tier,
            referral_earnings: agent.referral_earnings,
        }
    }
}

/// Earn and spend price lists.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PriceList {
    pub earn: RateTable,
    pub spend: RateTable,
}

/// Dollar amounts as the dashboards print them.
pub fn usd(amount: f64) -> String {
    format!("${amount:.2}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn task(target: TaskTarget, task_type: TaskType) -> Task {
        Task {
            id: "task_1".into(),
            task_type,
            target,
            description: "d".into(),
            view_duration_sec: None,
            credit_reward: 15,
            credit_cost: 15,
            requested_by: Some("a1".into()),
            assigned_to: None,
            status: TaskStatus::Pending,
            proof: None,
            created_at: Utc::now(),
            assigned_at: None,
            completed_at: None,
            requeued_from: None,
            requeued_to: None,
        }
    }

    #[test]
    fn test_reply_target_flattens() {
        let view = TaskView::from(&task(
            TaskTarget::Reply {
                tweet_url: "https://x.com/a/status/9".into(),
                tweet_id: "9".into(),
                reply_text: "nice".into(),
            },
            TaskType::ReplyTweet,
        ));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["type"], "reply_tweet");
        assert_eq!(json["tweet_id"], "9");
        assert_eq!(json["reply_text"], "nice");
        assert!(json.get("post_topic").is_none());
    }

    #[test]
    fn test_post_target_has_no_tweet_fields() {
        let view = TaskView::from(&task(
            TaskTarget::Post {
                post_topic: Some("rust".into()),
                post_content: None,
            },
            TaskType::PostTweet,
        ));
        assert_eq!(view.post_topic.as_deref(), Some("rust"));
        assert!(view.tweet_url.is_none());
    }

    #[test]
    fn test_usd_formatting() {
        assert_eq!(usd(1.0), "$1.00");
        assert_eq!(usd(0.5), "$0.50");
    }
}
