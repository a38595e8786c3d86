//! Task ledger.
//!
//! Tasks are queued as `pending`, claimed exactly once by an agent that did
//! not request them, and settled as `completed` or `failed`. The pending and
//! assigned index sets mirror the record status so the matcher and the
//! statistics never have to scan every task.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use hive_core::{Clock, Error, Result, ResultExt};
use hive_store::{KvStore, Mutation, Records, keys};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::config::LedgerConfig;
use crate::target::TaskTarget;

/// Proof recorded on assignments that ran out of time.
pub const LEASE_EXPIRED_PROOF: &str = "lease expired";

/// Kind of work a task asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ViewTweet,
    LikeTweet,
    ReplyTweet,
    PostTweet,
}

impl TaskType {
    /// Every task type, in price-list order.
    pub const ALL: [Self; 4] = [
        Self::ViewTweet,
        Self::LikeTweet,
        Self::ReplyTweet,
        Self::PostTweet,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ViewTweet => "view_tweet",
            Self::LikeTweet => "like_tweet",
            Self::ReplyTweet => "reply_tweet",
            Self::PostTweet => "post_tweet",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::invalid_field("type", format!("invalid task type: {s}")))
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Legal moves: pending→assigned→{completed|failed}.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Assigned)
                | (Self::Assigned, Self::Completed)
                | (Self::Assigned, Self::Failed)
        )
    }

    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub target: TaskTarget,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_duration_sec: Option<u32>,
    pub credit_reward: u64,
    pub credit_cost: u64,
    #[serde(default)]
    pub requested_by: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requeued_from: Option<String>,
    /// Replica published after this task's lease expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requeued_to: Option<String>,
}

impl Task {
    /// Whether `soul_id` may be handed this task.
    #[must_use]
    pub fn is_claimable_by(&self, soul_id: Option<&str>) -> bool {
        self.status == TaskStatus::Pending
            && self.assigned_to.is_none()
            && (soul_id.is_none() || self.requested_by.as_deref() != soul_id)
    }

    /// Whether the assignment has outlived `lease` at `now`.
    #[must_use]
    pub fn lease_expired(&self, now: DateTime<Utc>, lease: Duration) -> bool {
        self.status == TaskStatus::Assigned
            && self
                .assigned_at
                .and_then(|at| at.checked_add_signed(lease))
                .is_some_and(|deadline| deadline <= now)
    }

    /// Whether the task was failed by the lease sweep.
    #[must_use]
    pub fn expired_by_lease(&self) -> bool {
        self.status == TaskStatus::Failed && self.proof.as_deref() == Some(LEASE_EXPIRED_PROOF)
    }
}

/// Input for a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub task_type: TaskType,
    pub target: TaskTarget,
    pub description: String,
    pub view_duration_sec: Option<u32>,
    pub credit_reward: u64,
    pub credit_cost: u64,
    pub requested_by: Option<String>,
    pub requeued_from: Option<String>,
}

impl NewTask {
    /// A pending copy of `task` that points back at it.
    #[must_use]
    pub fn replica_of(task: &Task) -> Self {
        Self {
            task_type: task.task_type,
            target: task.target.clone(),
            description: task.description.clone(),
            view_duration_sec: task.view_duration_sec,
            credit_reward: task.credit_reward,
            credit_cost: task.credit_cost,
            requested_by: task.requested_by.clone(),
            requeued_from: Some(task.id.clone()),
        }
    }
}

/// Partial task update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<String>,
    pub proof: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// How the assignee reported on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
}

impl TaskOutcome {
    const fn status(self) -> TaskStatus {
        match self {
            Self::Completed => TaskStatus::Completed,
            Self::Failed => TaskStatus::Failed,
        }
    }
}

/// Task counts from index cardinalities and settlement counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub total: u64,
    pub pending: u64,
    pub assigned: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Task ledger backed by the key-value store.
#[derive(Clone)]
pub struct TaskLedger {
    records: Records<Task>,
    clock: Arc<dyn Clock>,
    scan_batch_size: usize,
}

impl TaskLedger {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: &LedgerConfig) -> Self {
        Self {
            records: Records::new(store, keys::TASK),
            clock,
            scan_batch_size: config.scan_batch_size.max(1),
        }
    }

    fn store(&self) -> &Arc<dyn KvStore> {
        self.records.store()
    }

    /// Create and publish a task.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn add_task(&self, new_task: NewTask) -> Result<Task> {
        let task = self.write_unpublished(new_task).await?;
        self.publish(&task).await?;
        Ok(task)
    }

    /// Create and publish several tasks. Each one is independent; a failure
    /// leaves the tasks created before it in place.
    ///
    /// # Errors
    ///
    /// Returns the first store error.
    pub async fn add_tasks(&self, new_tasks: Vec<NewTask>) -> Result<Vec<Task>> {
        let mut created = Vec::with_capacity(new_tasks.len());
        for new_task in new_tasks {
            created.push(self.add_task(new_task).await?);
        }
        Ok(created)
    }

    /// Persist a task record without adding it to any index. Nothing can
    /// match or list it until [`TaskLedger::publish`] runs.
    ///
    /// # Errors
    ///
    /// Returns a store error, or a conflict on an id collision.
    pub async fn write_unpublished(&self, new_task: NewTask) -> Result<Task> {
        let task = Task {
            id: format!("task_{}", Ulid::new()),
            task_type: new_task.task_type,
            target: new_task.target,
            description: new_task.description,
            view_duration_sec: new_task.view_duration_sec,
            credit_reward: new_task.credit_reward,
            credit_cost: new_task.credit_cost,
            requested_by: new_task.requested_by,
            assigned_to: None,
            status: TaskStatus::Pending,
            proof: None,
            created_at: self.clock.now(),
            assigned_at: None,
            completed_at: None,
            requeued_from: new_task.requeued_from,
            requeued_to: None,
        };

        if !self.records.insert_new(&task.id, &task).await? {
            return Err(Error::conflict(format!("task id collision: {}", task.id)));
        }
        Ok(task)
    }

    /// Add a written task to the indexes.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn publish(&self, task: &Task) -> Result<()> {
        let store = self.store();
        if let Some(requester) = &task.requested_by {
            store
                .set_add(&keys::tasks_requested_by(requester), &task.id)
                .await?;
        }
        store.set_add(keys::TASK_INDEX, &task.id).await?;
        if task.status == TaskStatus::Pending {
            store.set_add(keys::PENDING_TASKS, &task.id).await?;
        }
        tracing::debug!(task_id = %task.id, task_type = %task.task_type, "task published");
        Ok(())
    }

    /// Take a written task out of every index [`TaskLedger::publish`] puts
    /// it in.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn unpublish(&self, task: &Task) -> Result<()> {
        let store = self.store();
        store.set_remove(keys::PENDING_TASKS, &task.id).await?;
        store.set_remove(keys::TASK_INDEX, &task.id).await?;
        if let Some(requester) = &task.requested_by {
            store
                .set_remove(&keys::tasks_requested_by(requester), &task.id)
                .await?;
        }
        Ok(())
    }

    /// Pending task ids in queue order, minus the ones `exclude` requested.
    async fn candidates(&self, exclude: Option<&str>) -> Result<Vec<String>> {
        let store = self.store();
        let pending = store.set_members(keys::PENDING_TASKS).await?;
        let Some(soul_id) = exclude else {
            return Ok(pending);
        };

        let own: HashSet<String> = store
            .set_members(&keys::tasks_requested_by(soul_id))
            .await?
            .into_iter()
            .collect();
        Ok(pending.into_iter().filter(|id| !own.contains(id)).collect())
    }

    /// First claimable pending task not requested by `exclude`, without
    /// changing anything.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn get_next_task(&self, exclude: Option<&str>) -> Result<Option<Task>> {
        let ids = self.candidates(exclude).await?;
        for chunk in ids.chunks(self.scan_batch_size) {
            let found = self
                .records
                .get_many(chunk)
                .await?
                .into_iter()
                .find(|task| task.is_claimable_by(exclude));
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// Atomically assign the first claimable task to `soul_id`.
    ///
    /// Candidates that another agent claims first are skipped.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn claim_next_task(&self, soul_id: &str, now: DateTime<Utc>) -> Result<Option<Task>> {
        for id in self.candidates(Some(soul_id)).await? {
            let claimed = self
                .records
                .mutate(&id, |current| match current {
                    Some(mut task) if task.is_claimable_by(Some(soul_id)) => {
                        task.status = TaskStatus::Assigned;
                        task.assigned_to = Some(soul_id.to_string());
                        task.assigned_at = Some(now);
                        Ok(Mutation::Write(task.clone(), Some(task)))
                    }
                    _ => Ok(Mutation::Skip(None)),
                })
                .await;

            match claimed {
                Ok(Some(task)) => {
                    self.move_index(&task.id, TaskStatus::Pending, TaskStatus::Assigned)
                        .await?;
                    tracing::info!(task_id = %task.id, soul_id, "task assigned");
                    return Ok(Some(task));
                }
                Ok(None) => {}
                Err(Error::Conflict { .. }) => {
                    tracing::debug!(task_id = %id, "claim contended, trying next task");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Merge `patch` into a task; `None` if the task is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] for illegal status changes, or a
    /// store error.
    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Option<Task>> {
        let updated = self
            .records
            .mutate(id, |current| {
                let Some(mut task) = current else {
                    return Ok(Mutation::Skip(None));
                };
                let before = task.status;
                if let Some(next) = patch.status {
                    if next != before && !before.can_transition_to(next) {
                        return Err(Error::invalid_transition(before, next));
                    }
                    task.status = next;
                }
                if let Some(assignee) = &patch.assigned_to {
                    task.assigned_to = Some(assignee.clone());
                }
                if let Some(proof) = &patch.proof {
                    task.proof = Some(proof.clone());
                }
                if patch.assigned_at.is_some() {
                    task.assigned_at = patch.assigned_at;
                }
                if patch.completed_at.is_some() {
                    task.completed_at = patch.completed_at;
                }
                if task.status != TaskStatus::Pending && task.assigned_to.is_none() {
                    return Err(Error::invalid_field(
                        "assigned_to",
                        format!("{} task needs an assignee", task.status),
                    ));
                }
                Ok(Mutation::Write(task.clone(), Some((before, task))))
            })
            .await?;

        let Some((before, task)) = updated else {
            return Ok(None);
        };
        if before != task.status {
            self.move_index(&task.id, before, task.status).await?;
            self.count_settlement(task.status).await?;
        }
        Ok(Some(task))
    }

    /// Record the assignee's report on a task.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for unknown tasks
    /// - [`Error::Forbidden`] when `soul_id` is not the assignee
    /// - [`Error::Conflict`] when the task was already settled
    pub async fn settle(
        &self,
        id: &str,
        soul_id: &str,
        outcome: TaskOutcome,
        proof: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let task = self
            .records
            .mutate(id, |current| {
                let mut task = current.ok_or_else(|| Error::not_found("task", id))?;
                if task.assigned_to.as_deref() != Some(soul_id) {
                    return Err(Error::forbidden("task not assigned to this agent"));
                }
                if task.status.is_settled() {
                    return Err(Error::conflict(format!("task already {}", task.status)));
                }
                task.status = outcome.status();
                task.proof.clone_from(&proof);
                task.completed_at = Some(now);
                Ok(Mutation::Write(task.clone(), task))
            })
            .await?;

        self.move_index(&task.id, TaskStatus::Assigned, task.status)
            .await?;
        self.count_settlement(task.status).await?;
        tracing::info!(task_id = %task.id, soul_id, status = %task.status, "task settled");
        Ok(task)
    }

    /// Fail an assignment whose lease ran out; `None` if it was settled or
    /// is still within its lease.
    ///
    /// The task joins the requeue backlog before its status changes, so
    /// [`TaskLedger::requeue_expired`] always finds it.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn expire_assignment(
        &self,
        id: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Option<Task>> {
        self.store().set_add(keys::REQUEUE_BACKLOG, id).await?;
        let expired = self
            .records
            .mutate(id, |current| match current {
                Some(mut task) if task.lease_expired(now, lease) => {
                    task.status = TaskStatus::Failed;
                    task.proof = Some(LEASE_EXPIRED_PROOF.to_string());
                    task.completed_at = Some(now);
                    Ok(Mutation::Write(task.clone(), Some(task)))
                }
                _ => Ok(Mutation::Skip(None)),
            })
            .await?;

        if let Some(task) = &expired {
            // The record is authoritative; a stale index entry is dropped by
            // the next stale_assignments scan.
            self.move_index(&task.id, TaskStatus::Assigned, TaskStatus::Failed)
                .await
                .into_option_logged("failed to move expired task out of the assigned index");
            self.count_settlement(TaskStatus::Failed)
                .await
                .into_option_logged("failed to count expired task");
            tracing::warn!(
                task_id = %task.id,
                assignee = ?task.assigned_to,
                "assignment lease expired"
            );
        }
        Ok(expired)
    }

    /// Publish a pending replica of every task in the requeue backlog.
    ///
    /// Each task is handled on its own: one that fails stays in the backlog
    /// for the next call. The replica is linked from the expired task's
    /// `requeued_to` before it is published, so a task never gets two.
    /// Returns the replicas published by this call.
    ///
    /// # Errors
    ///
    /// Returns a store error when the backlog cannot be read.
    pub async fn requeue_expired(&self) -> Result<Vec<Task>> {
        let backlog = self.store().set_members(keys::REQUEUE_BACKLOG).await?;
        let mut replicas = Vec::new();
        for id in backlog {
            let requeued = self
                .requeue(&id)
                .await
                .into_option_logged(&format!("failed to requeue expired task {id}"));
            replicas.extend(requeued.flatten());
        }
        Ok(replicas)
    }

    async fn requeue(&self, id: &str) -> Result<Option<Task>> {
        let task = match self.records.get(id).await? {
            Some(task) if task.status == TaskStatus::Assigned => return Ok(None),
            Some(task) if task.expired_by_lease() => task,
            _ => {
                self.store().set_remove(keys::REQUEUE_BACKLOG, id).await?;
                return Ok(None);
            }
        };

        let replica = match &task.requeued_to {
            Some(replica_id) => self
                .records
                .get(replica_id)
                .await?
                .ok_or_else(|| Error::not_found("task", replica_id))?,
            None => self.link_replica(&task).await?,
        };

        self.publish(&replica).await?;
        self.store().set_remove(keys::REQUEUE_BACKLOG, id).await?;
        tracing::info!(expired = %task.id, replica = %replica.id, "requeued expired task");
        Ok(Some(replica))
    }

    /// Write an unpublished replica and record it on `task`. When another
    /// sweep linked one first, that replica wins.
    async fn link_replica(&self, task: &Task) -> Result<Task> {
        let replica = self.write_unpublished(NewTask::replica_of(task)).await?;
        let linked = self
            .records
            .mutate(&task.id, |current| {
                let mut current = current.ok_or_else(|| Error::not_found("task", &task.id))?;
                match current.requeued_to.clone() {
                    Some(winner) => Ok(Mutation::Skip(winner)),
                    None => {
                        current.requeued_to = Some(replica.id.clone());
                        Ok(Mutation::Write(current, replica.id.clone()))
                    }
                }
            })
            .await?;

        if linked == replica.id {
            return Ok(replica);
        }
        self.records
            .get(&linked)
            .await?
            .ok_or_else(|| Error::not_found("task", linked))
    }

    /// Assigned tasks whose lease ran out at `now`.
    ///
    /// Index entries left behind by a task that is no longer assigned are
    /// dropped on the way.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn stale_assignments(&self, now: DateTime<Utc>, lease: Duration) -> Result<Vec<Task>> {
        let store = self.store();
        let ids = store.set_members(keys::ASSIGNED_TASKS).await?;
        let mut stale = Vec::new();
        for chunk in ids.chunks(self.scan_batch_size) {
            for task in self.records.get_many(chunk).await? {
                if task.status != TaskStatus::Assigned {
                    store
                        .set_remove(keys::ASSIGNED_TASKS, &task.id)
                        .await
                        .into_option_logged("failed to drop settled task from the assigned index");
                } else if task.lease_expired(now, lease) {
                    stale.push(task);
                }
            }
        }
        Ok(stale)
    }

    async fn move_index(&self, id: &str, from: TaskStatus, to: TaskStatus) -> Result<()> {
        let store = self.store();
        match from {
            TaskStatus::Pending => {
                store.set_remove(keys::PENDING_TASKS, id).await?;
            }
            TaskStatus::Assigned => {
                store.set_remove(keys::ASSIGNED_TASKS, id).await?;
            }
            TaskStatus::Completed | TaskStatus::Failed => {}
        }
        if to == TaskStatus::Assigned {
            store.set_add(keys::ASSIGNED_TASKS, id).await?;
        }
        Ok(())
    }

    async fn count_settlement(&self, status: TaskStatus) -> Result<()> {
        let counter = match status {
            TaskStatus::Completed => keys::TASKS_COMPLETED,
            TaskStatus::Failed => keys::TASKS_FAILED,
            TaskStatus::Pending | TaskStatus::Assigned => return Ok(()),
        };
        self.store().incr_by(counter, 1).await.map(|_| ())
    }

    /// # Errors
    ///
    /// Returns a store error.
    pub async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.records.get(id).await
    }

    /// Tasks requested by `soul_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn tasks_requested_by(&self, soul_id: &str) -> Result<Vec<Task>> {
        let ids = self
            .store()
            .set_members(&keys::tasks_requested_by(soul_id))
            .await?;
        self.load_newest_first(ids).await
    }

    /// The `limit` most recently created tasks, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn recent_tasks(&self, limit: usize) -> Result<Vec<Task>> {
        let mut ids = self.store().set_members(keys::TASK_INDEX).await?;
        newest_first(&mut ids);
        ids.truncate(limit);
        self.load_newest_first(ids).await
    }

    async fn load_newest_first(&self, mut ids: Vec<String>) -> Result<Vec<Task>> {
        newest_first(&mut ids);
        let mut tasks = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(self.scan_batch_size) {
            tasks.extend(self.records.get_many(chunk).await?);
        }
        Ok(tasks)
    }

    /// Task numbers without loading any record.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn counts(&self) -> Result<TaskCounts> {
        let store = self.store();
        Ok(TaskCounts {
            total: store.set_len(keys::TASK_INDEX).await? as u64,
            pending: store.set_len(keys::PENDING_TASKS).await? as u64,
            assigned: store.set_len(keys::ASSIGNED_TASKS).await? as u64,
            completed: non_negative(store.counter(keys::TASKS_COMPLETED).await?),
            failed: non_negative(store.counter(keys::TASKS_FAILED).await?),
        })
    }
}

/// Task ids embed a ULID, so descending id order is newest first.
fn newest_first(ids: &mut [String]) {
    ids.sort_unstable_by(|a, b| b.cmp(a));
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use hive_core::ManualClock;
    use hive_store::InMemoryKvStore;

    fn ledger() -> (TaskLedger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let ledger = TaskLedger::new(
            InMemoryKvStore::new_arc(),
            clock.clone(),
            &LedgerConfig::default(),
        );
        (ledger, clock)
    }

    fn view_task(requested_by: Option<&str>) -> NewTask {
        NewTask {
            task_type: TaskType::ViewTweet,
            target: TaskTarget::Tweet {
                tweet_url: "https://x.com/a/status/1".into(),
                tweet_id: "1".into(),
            },
            description: "View tweet".into(),
            view_duration_sec: Some(60),
            credit_reward: 2,
            credit_cost: 2,
            requested_by: requested_by.map(str::to_string),
            requeued_from: None,
        }
    }

    #[test]
    fn test_status_transitions() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(Completed));
        assert!(Assigned.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Assigned.can_transition_to(Pending));
    }

    #[test]
    fn test_task_type_round_trip_names() {
        for t in TaskType::ALL {
            assert_eq!(t.as_str().parse::<TaskType>().unwrap(), t);
        }
        assert!("retweet".parse::<TaskType>().is_err());
    }

    #[tokio::test]
    async fn test_add_task_indexes_pending() {
        let (ledger, _) = ledger();
        let task = ledger.add_task(view_task(Some("a1"))).await.unwrap();

        assert!(task.id.starts_with("task_"));
        assert_eq!(task.status, TaskStatus::Pending);
        let counts = ledger.counts().await.unwrap();
        assert_eq!(counts.total, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(ledger.tasks_requested_by("a1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unpublished_task_is_invisible() {
        let (ledger, _) = ledger();
        let task = ledger.write_unpublished(view_task(None)).await.unwrap();

        assert!(ledger.get_next_task(None).await.unwrap().is_none());
        assert!(ledger.get_task(&task.id).await.unwrap().is_some());

        ledger.publish(&task).await.unwrap();
        assert!(ledger.get_next_task(None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_next_task_excludes_own_requests() {
        let (ledger, _) = ledger();
        ledger.add_task(view_task(Some("a1"))).await.unwrap();

        assert!(ledger.get_next_task(Some("a1")).await.unwrap().is_none());
        assert!(ledger.get_next_task(Some("a2")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_next_task_is_read_only() {
        let (ledger, _) = ledger();
        let task = ledger.add_task(view_task(None)).await.unwrap();

        ledger.get_next_task(Some("a2")).await.unwrap();
        let stored = ledger.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Pending);
        assert!(stored.assigned_to.is_none());
    }

    #[tokio::test]
    async fn test_claim_assigns_once() {
        let (ledger, clock) = ledger();
        ledger.add_task(view_task(Some("a1"))).await.unwrap();

        let claimed = ledger
            .claim_next_task("a2", clock.now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.status, TaskStatus::Assigned);
        assert_eq!(claimed.assigned_to.as_deref(), Some("a2"));
        assert!(claimed.assigned_at.is_some());

        assert!(ledger.claim_next_task("a3", clock.now()).await.unwrap().is_none());
        let counts = ledger.counts().await.unwrap();
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.assigned, 1);
    }

    #[tokio::test]
    async fn test_settle_guards_assignee_and_double_report() {
        let (ledger, clock) = ledger();
        let task = ledger.add_task(view_task(Some("a1"))).await.unwrap();
        ledger.claim_next_task("a2", clock.now()).await.unwrap();

        let wrong = ledger
            .settle(&task.id, "a3", TaskOutcome::Completed, None, clock.now())
            .await;
        assert!(matches!(wrong, Err(Error::Forbidden { .. })));

        let done = ledger
            .settle(&task.id, "a2", TaskOutcome::Completed, Some("ok".into()), clock.now())
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.proof.as_deref(), Some("ok"));

        let again = ledger
            .settle(&task.id, "a2", TaskOutcome::Failed, None, clock.now())
            .await;
        assert!(matches!(again, Err(Error::Conflict { .. })));

        let counts = ledger.counts().await.unwrap();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 0);
        assert_eq!(counts.assigned, 0);
    }

    #[tokio::test]
    async fn test_settle_unknown_task() {
        let (ledger, clock) = ledger();
        let result = ledger
            .settle("task_missing", "a1", TaskOutcome::Completed, None, clock.now())
            .await;
        assert!(matches!(result, Err(Error::NotFound { entity: "task", .. })));
    }

    #[tokio::test]
    async fn test_update_task_rejects_illegal_transition() {
        let (ledger, _) = ledger();
        let task = ledger.add_task(view_task(None)).await.unwrap();

        let result = ledger
            .update_task(
                &task.id,
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    ..TaskPatch::default()
                },
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_update_task_maintains_indexes() {
        let (ledger, clock) = ledger();
        let task = ledger.add_task(view_task(None)).await.unwrap();

        let updated = ledger
            .update_task(
                &task.id,
                TaskPatch {
                    status: Some(TaskStatus::Assigned),
                    assigned_to: Some("a9".into()),
                    assigned_at: Some(clock.now()),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Assigned);

        let counts = ledger.counts().await.unwrap();
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.assigned, 1);

        assert!(
            ledger
                .update_task("task_nope", TaskPatch::default())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_assignment_requires_assignee() {
        let (ledger, _) = ledger();
        let task = ledger.add_task(view_task(None)).await.unwrap();
        let result = ledger
            .update_task(
                &task.id,
                TaskPatch {
                    status: Some(TaskStatus::Assigned),
                    ..TaskPatch::default()
                },
            )
            .await;
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn test_expire_assignment_after_lease() {
        let (ledger, clock) = ledger();
        let task = ledger.add_task(view_task(None)).await.unwrap();
        ledger.claim_next_task("a2", clock.now()).await.unwrap();
        let lease = Duration::minutes(30);

        assert!(ledger.stale_assignments(clock.now(), lease).await.unwrap().is_empty());
        assert!(
            ledger
                .expire_assignment(&task.id, clock.now(), lease)
                .await
                .unwrap()
                .is_none()
        );

        clock.advance(Duration::minutes(31));
        assert_eq!(ledger.stale_assignments(clock.now(), lease).await.unwrap().len(), 1);

        let expired = ledger
            .expire_assignment(&task.id, clock.now(), lease)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(expired.status, TaskStatus::Failed);
        assert_eq!(expired.proof.as_deref(), Some(LEASE_EXPIRED_PROOF));

        let late = ledger
            .settle(&task.id, "a2", TaskOutcome::Completed, None, clock.now())
            .await;
        assert!(matches!(late, Err(Error::Conflict { .. })));
        assert_eq!(ledger.counts().await.unwrap().failed, 1);
    }

    #[tokio::test]
    async fn test_recent_tasks_newest_first() {
        let (ledger, _) = ledger();
        let first = ledger.add_task(view_task(None)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = ledger.add_task(view_task(None)).await.unwrap();

        let recent = ledger.recent_tasks(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, second.id);

        let all = ledger.recent_tasks(10).await.unwrap();
        assert_eq!(all.last().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn test_recent_tasks_are_newest_of_all() {
        // The in-memory index enumerates oldest first.
        let (ledger, _) = ledger();
        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(ledger.add_task(view_task(None)).await.unwrap());
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let recent: Vec<String> = ledger
            .recent_tasks(2)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(recent, vec![created[4].id.clone(), created[3].id.clone()]);
    }

    #[tokio::test]
    async fn test_add_tasks_unique_ids() {
        let (ledger, _) = ledger();
        let specs = (0..25).map(|_| view_task(None)).collect();
        let created = ledger.add_tasks(specs).await.unwrap();

        let ids: HashSet<_> = created.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids.len(), 25);
        for task in &created {
            assert!(ledger.get_task(&task.id).await.unwrap().is_some());
        }
    }
}
