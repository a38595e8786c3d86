//! Marketplace flows that span several ledgers.
//!
//! Each flow is a short sequence of individually atomic steps. Where a later
//! step can fail after credits moved, the flow compensates explicitly.

use std::sync::Arc;

use hive_core::{Clock, Error, Result, ResultExt, SystemClock};
use hive_store::KvStore;

use crate::agent::{Agent, AgentPatch, AgentRegistry, AgentStatus};
use crate::config::LedgerConfig;
use crate::credits::{CreditLedger, CreditSource, DebitPurpose};
use crate::stats::{StatsAggregator, SwarmStats};
use crate::swarm::SwarmCatalog;
use crate::target::{TargetFields, TaskTarget};
use crate::task::{NewTask, Task, TaskLedger, TaskOutcome, TaskType};

/// Result of a heartbeat.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    pub agent: Agent,
    pub task: Option<Task>,
    pub stats: SwarmStats,
}

/// An assignee's report on a task.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    pub task_id: String,
    pub soul_id: String,
    pub outcome: TaskOutcome,
    pub proof: Option<String>,
}

/// Result of a completion report.
#[derive(Debug, Clone)]
pub struct Completion {
    pub task: Task,
    pub agent: Agent,
    pub credits_earned: u64,
    pub reputation_change: i64,
}

/// A paid request for tasks on the requester's content.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub soul_id: String,
    pub task_type: TaskType,
    pub fields: TargetFields,
    pub count: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TaskRequestReceipt {
    pub tasks: Vec<Task>,
    pub total_cost: u64,
    pub remaining_credits: u64,
}

/// One admin-created task.
#[derive(Debug, Clone)]
pub struct SystemTaskSpec {
    pub task_type: TaskType,
    pub fields: TargetFields,
    pub description: Option<String>,
    pub credit_reward: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum Purchase {
    /// No payment proof yet; the caller has to pay `cost_usd` first.
    AwaitingPayment { amount: u64, cost_usd: f64 },
    Completed { agent: Agent },
}

#[derive(Debug, Clone)]
pub struct CashOut {
    pub agent: Agent,
    pub payout_usd: f64,
}

/// Entry point for every marketplace operation.
#[derive(Clone)]
pub struct Marketplace {
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn KvStore>,
    agents: AgentRegistry,
    tasks: TaskLedger,
    credits: CreditLedger,
    swarms: SwarmCatalog,
    stats: StatsAggregator,
}

impl Marketplace {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        let agents = AgentRegistry::new(Arc::clone(&store), Arc::clone(&clock), &config);
        let tasks = TaskLedger::new(Arc::clone(&store), Arc::clone(&clock), &config);
        let credits = CreditLedger::new(agents.clone());
        let swarms = SwarmCatalog::new(Arc::clone(&store), agents.clone(), Arc::clone(&clock));
        let stats = StatsAggregator::new(
            Arc::clone(&store),
            agents.clone(),
            tasks.clone(),
            Arc::clone(&clock),
            config.active_window,
        );
        Self {
            config,
            clock,
            store,
            agents,
            tasks,
            credits,
            swarms,
            stats,
        }
    }

    /// Marketplace on the wall clock.
    pub fn with_system_clock(store: Arc<dyn KvStore>, config: LedgerConfig) -> Self {
        Self::new(store, Arc::new(SystemClock), config)
    }

    #[must_use]
    pub const fn config(&self) -> &LedgerConfig {
        &self.config
    }

    #[must_use]
    pub const fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    #[must_use]
    pub const fn tasks(&self) -> &TaskLedger {
        &self.tasks
    }

    #[must_use]
    pub const fn credits(&self) -> &CreditLedger {
        &self.credits
    }

    #[must_use]
    pub const fn swarms(&self) -> &SwarmCatalog {
        &self.swarms
    }

    #[must_use]
    pub const fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    /// Name of the storage backend.
    #[must_use]
    pub fn storage_backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Check an agent in and hand it work when it is ready.
    ///
    /// A heartbeat without a status counts as `ready`. An agent that gets a
    /// task is marked `busy`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad soul id, or a store error.
    pub async fn heartbeat(&self, soul_id: &str, mut patch: AgentPatch) -> Result<Heartbeat> {
        let status = patch.status.unwrap_or(AgentStatus::Ready);
        patch.status = Some(status);
        let mut agent = self.agents.register_agent(soul_id, patch).await?;

        let task = if status == AgentStatus::Ready {
            self.tasks.claim_next_task(soul_id, self.clock.now()).await?
        } else {
            None
        };

        if task.is_some() {
            let busy = AgentPatch {
                status: Some(AgentStatus::Busy),
                ..AgentPatch::default()
            };
            if let Some(updated) = self.agents.update_agent(soul_id, busy).await? {
                agent = updated;
            }
        }

        let stats = self.stats.swarm_stats().await?;
        Ok(Heartbeat { agent, task, stats })
    }

    /// Settle a task and pay (or penalise) the assignee.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for unknown tasks
    /// - [`Error::Forbidden`] when the reporter is not the assignee
    /// - [`Error::Conflict`] when the task was already settled
    pub async fn complete_task(&self, report: CompletionReport) -> Result<Completion> {
        let CompletionReport {
            task_id,
            soul_id,
            outcome,
            proof,
        } = report;

        let task = self
            .tasks
            .settle(&task_id, &soul_id, outcome, proof, self.clock.now())
            .await?;

        match outcome {
            TaskOutcome::Completed => self.reward(task, &soul_id).await,
            TaskOutcome::Failed => self.penalise(task, &soul_id).await,
        }
    }

    async fn reward(&self, task: Task, soul_id: &str) -> Result<Completion> {
        let reward = task.credit_reward;
        let reputation_reward = self.config.reputation_reward;

        self.credits
            .credit(soul_id, reward, CreditSource::Earned)
            .await?;
        let agent = self
            .agents
            .modify(soul_id, |agent| {
                agent.completed_tasks = agent.completed_tasks.saturating_add(1);
                agent.reputation = agent.reputation.saturating_add(reputation_reward);
                agent.status = AgentStatus::Ready;
                Ok(())
            })
            .await?
            .ok_or_else(|| Error::not_found("agent", soul_id))?;

        if let Some(referrer) = agent.referred_by.as_deref() {
            self.pay_referral(referrer, reward).await;
        }

        tracing::info!(task_id = %task.id, soul_id, reward, "task completed");
        Ok(Completion {
            task,
            agent,
            credits_earned: reward,
            reputation_change: i64::try_from(reputation_reward).unwrap_or(i64::MAX),
        })
    }

    #[allow(clippy::cast_precision_loss)]
    async fn pay_referral(&self, referrer: &str, reward: u64) {
        let bonus = reward as f64 * self.config.referral_rate;
        let paid = self
            .agents
            .modify(referrer, |agent| {
                agent.referral_earnings += bonus;
                Ok(())
            })
            .await
            .into_option_logged("failed to pay referral bonus");
        match paid {
            Some(Some(_)) => tracing::debug!(referrer, bonus, "referral bonus paid"),
            Some(None) => tracing::debug!(referrer, "referrer unknown, no bonus paid"),
            None => {}
        }
    }

    /// Count a failure against `soul_id` and free it for new work.
    async fn record_failure(&self, soul_id: &str) -> Result<Option<Agent>> {
        let penalty = self.config.reputation_penalty;
        self.agents
            .modify(soul_id, |agent| {
                agent.failed_tasks = agent.failed_tasks.saturating_add(1);
                agent.reputation = agent.reputation.saturating_sub(penalty);
                agent.status = AgentStatus::Ready;
                Ok(())
            })
            .await
    }

    async fn penalise(&self, task: Task, soul_id: &str) -> Result<Completion> {
        let penalty = self.config.reputation_penalty;
        let agent = self
            .record_failure(soul_id)
            .await?
            .ok_or_else(|| Error::not_found("agent", soul_id))?;

        tracing::info!(task_id = %task.id, soul_id, penalty, "task failed");
        Ok(Completion {
            task,
            agent,
            credits_earned: 0,
            reputation_change: 0_i64.saturating_sub(i64::try_from(penalty).unwrap_or(i64::MAX)),
        })
    }

    /// Charge the requester and queue `count` tasks on their content.
    ///
    /// The debit happens first. A failed write refunds the whole cost; a
    /// failed publish withdraws the half-published task and refunds every
    /// task not yet published.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for bad input
    /// - [`Error::NotFound`] for unknown requesters
    /// - [`Error::InsufficientCredits`] when the requester cannot pay
    pub async fn request_tasks(&self, request: TaskRequest) -> Result<TaskRequestReceipt> {
        let TaskRequest {
            soul_id,
            task_type,
            fields,
            count,
        } = request;

        if soul_id.trim().is_empty() {
            return Err(Error::missing_field("soul_id"));
        }
        let count = self.clamp_count(count)?;
        let target = TaskTarget::from_fields(task_type, fields)?;
        self.agents.require(&soul_id).await?;

        let per_task_cost = self.config.rates.spend.for_type(task_type);
        let total_cost = per_task_cost
            .checked_mul(u64::from(count))
            .ok_or_else(|| Error::invalid_field("count", "count too large"))?;

        let agent = self
            .credits
            .debit(&soul_id, total_cost, DebitPurpose::Spent)
            .await?;

        let template = NewTask {
            task_type,
            description: target.describe(task_type),
            target,
            view_duration_sec: (task_type == TaskType::ViewTweet)
                .then_some(self.config.default_view_duration_sec),
            credit_reward: self.config.rates.earn.for_type(task_type),
            credit_cost: per_task_cost,
            requested_by: Some(soul_id.clone()),
            requeued_from: None,
        };

        let mut written = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
        for _ in 0..count {
            match self.tasks.write_unpublished(template.clone()).await {
                Ok(task) => written.push(task),
                Err(e) => {
                    self.refund(&soul_id, total_cost).await;
                    return Err(e);
                }
            }
        }

        for (published, task) in (0_u64..).zip(&written) {
            if let Err(e) = self.tasks.publish(task).await {
                self.tasks
                    .unpublish(task)
                    .await
                    .into_option_logged("failed to withdraw half-published task");
                let unpublished = u64::from(count).saturating_sub(published);
                self.refund(&soul_id, per_task_cost.saturating_mul(unpublished))
                    .await;
                return Err(e);
            }
        }

        tracing::info!(
            soul_id = %soul_id,
            %task_type,
            count,
            total_cost,
            "tasks requested"
        );
        Ok(TaskRequestReceipt {
            tasks: written,
            total_cost,
            remaining_credits: agent.credits,
        })
    }

    fn clamp_count(&self, count: Option<u32>) -> Result<u32> {
        match count.unwrap_or(1) {
            0 => Err(Error::invalid_field("count", "count must be at least 1")),
            n => Ok(n.min(self.config.max_tasks_per_request.max(1))),
        }
    }

    async fn refund(&self, soul_id: &str, amount: u64) {
        if amount == 0 {
            return;
        }
        let refunded = self
            .credits
            .credit(soul_id, amount, CreditSource::Refund)
            .await
            .into_option_logged("refund failed");
        if let Some(agent) = refunded {
            tracing::warn!(soul_id, amount, balance = agent.credits, "refunded task request");
        }
    }

    /// Queue tasks with no requester and no cost.
    ///
    /// Every entry is validated before anything is written.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty list or a bad entry, or a
    /// store error.
    pub async fn create_system_tasks(&self, specs: Vec<SystemTaskSpec>) -> Result<Vec<Task>> {
        if specs.is_empty() {
            return Err(Error::missing_field("tasks"));
        }

        let mut new_tasks = Vec::with_capacity(specs.len());
        for spec in specs {
            let target = TaskTarget::from_fields(spec.task_type, spec.fields)?;
            new_tasks.push(NewTask {
                task_type: spec.task_type,
                description: spec
                    .description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| target.describe(spec.task_type)),
                target,
                view_duration_sec: (spec.task_type == TaskType::ViewTweet)
                    .then_some(self.config.default_view_duration_sec),
                credit_reward: spec
                    .credit_reward
                    .unwrap_or_else(|| self.config.rates.earn.for_type(spec.task_type)),
                credit_cost: 0,
                requested_by: None,
                requeued_from: None,
            });
        }

        let created = self.tasks.add_tasks(new_tasks).await?;
        tracing::info!(count = created.len(), "system tasks created");
        Ok(created)
    }

    /// Buy credits. Without a payment proof nothing is credited and the
    /// caller gets the price to pay.
    ///
    /// # Errors
    ///
    /// Returns a validation error outside the purchase limits or when the
    /// balance would overflow, or not-found for unknown agents.
    #[allow(clippy::cast_precision_loss)]
    pub async fn buy_credits(
        &self,
        soul_id: &str,
        amount: u64,
        payment_proof: Option<&str>,
    ) -> Result<Purchase> {
        self.agents.require(soul_id).await?;
        if amount < self.config.min_purchase {
            return Err(Error::invalid_field(
                "amount",
                format!("Minimum purchase: {} credits", self.config.min_purchase),
            ));
        }
        if amount > self.config.max_purchase {
            return Err(Error::invalid_field(
                "amount",
                format!("Maximum purchase: {} credits", self.config.max_purchase),
            ));
        }

        match payment_proof.filter(|p| !p.trim().is_empty()) {
            None => Ok(Purchase::AwaitingPayment {
                amount,
                cost_usd: amount as f64 * self.config.rates.buy_rate,
            }),
            Some(proof) => {
                let agent = self
                    .credits
                    .credit(soul_id, amount, CreditSource::Purchased)
                    .await?;
                tracing::info!(soul_id, amount, proof, "credits purchased");
                Ok(Purchase::Completed { agent })
            }
        }
    }

    /// Convert credits back to a notional payout.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] below the minimum cash-out
    /// - [`Error::NotFound`] for unknown agents
    /// - [`Error::InsufficientCredits`] when the balance is too low
    #[allow(clippy::cast_precision_loss)]
    pub async fn cash_out(&self, soul_id: &str, amount: u64) -> Result<CashOut> {
        self.agents.require(soul_id).await?;
        if amount < self.config.min_cashout {
            return Err(Error::invalid_field(
                "amount",
                format!("Minimum cashout: {} credits", self.config.min_cashout),
            ));
        }

        let agent = self
            .credits
            .debit(soul_id, amount, DebitPurpose::CashOut)
            .await?;
        let payout_usd = amount as f64 * self.config.rates.cash_out_rate;
        tracing::info!(soul_id, amount, payout_usd, "cash-out initiated");
        Ok(CashOut { agent, payout_usd })
    }

    /// Fail every assignment past its lease, penalise the assignee and put
    /// a fresh copy of the work back in the queue. Returns how many
    /// assignments expired.
    ///
    /// A failure on one task is logged and the sweep moves on. Replicas that
    /// could not be published are retried by the next sweep.
    ///
    /// # Errors
    ///
    /// Returns a store error when the assigned index or the requeue backlog
    /// cannot be read.
    pub async fn expire_stale_assignments(&self) -> Result<usize> {
        let Some(lease) = self.config.assignment_lease else {
            return Ok(0);
        };
        let now = self.clock.now();

        let mut expired: usize = 0;
        for stale in self.tasks.stale_assignments(now, lease).await? {
            let Some(task) = self
                .tasks
                .expire_assignment(&stale.id, now, lease)
                .await
                .into_option_logged(&format!("failed to expire task {}", stale.id))
                .flatten()
            else {
                continue;
            };
            expired = expired.saturating_add(1);

            if let Some(assignee) = task.assigned_to.as_deref() {
                self.record_failure(assignee)
                    .await
                    .into_option_logged(&format!("failed to penalise {assignee} for an expired lease"));
            }
        }

        let replicas = self.tasks.requeue_expired().await?;
        if !replicas.is_empty() {
            tracing::info!(replicas = replicas.len(), "published replicas of expired tasks");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::task::TaskStatus;
    use chrono::Duration;
    use hive_core::ManualClock;
    use hive_store::InMemoryKvStore;

    fn market() -> (Marketplace, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let market = Marketplace::new(
            InMemoryKvStore::new_arc(),
            clock.clone(),
            LedgerConfig::default(),
        );
        (market, clock)
    }

    fn view_request(soul_id: &str, count: Option<u32>) -> TaskRequest {
        TaskRequest {
            soul_id: soul_id.into(),
            task_type: TaskType::ViewTweet,
            fields: TargetFields {
                tweet_url: Some("https://x.com/someone/status/123".into()),
                ..TargetFields::default()
            },
            count,
        }
    }

    #[tokio::test]
    async fn test_heartbeat_without_work_acknowledges() {
        let (market, _) = market();
        let beat = market.heartbeat("a1", AgentPatch::default()).await.unwrap();
        assert!(beat.task.is_none());
        assert_eq!(beat.agent.status, AgentStatus::Ready);
        assert_eq!(beat.stats.total_agents, 1);
    }

    #[tokio::test]
    async fn test_heartbeat_assigns_and_marks_busy() {
        let (market, _) = market();
        market.heartbeat("a1", AgentPatch::default()).await.unwrap();
        market.request_tasks(view_request("a1", Some(1))).await.unwrap();

        let own = market.heartbeat("a1", AgentPatch::default()).await.unwrap();
        assert!(own.task.is_none());

        let beat = market.heartbeat("a2", AgentPatch::default()).await.unwrap();
        assert!(beat.task.is_some());
        assert_eq!(beat.agent.status, AgentStatus::Busy);
    }

    #[tokio::test]
    async fn test_busy_heartbeat_gets_no_task() {
        let (market, _) = market();
        market.heartbeat("a1", AgentPatch::default()).await.unwrap();
        market.request_tasks(view_request("a1", Some(1))).await.unwrap();

        let beat = market
            .heartbeat(
                "a2",
                AgentPatch {
                    status: Some(AgentStatus::Busy),
                    ..AgentPatch::default()
                },
            )
            .await
            .unwrap();
        assert!(beat.task.is_none());
    }

    #[tokio::test]
    async fn test_request_validates_before_charging() {
        let (market, _) = market();
        market.heartbeat("a1", AgentPatch::default()).await.unwrap();

        let mut bad_url = view_request("a1", Some(2));
        bad_url.fields.tweet_url = Some("https://example.com/nope".into());
        assert!(matches!(
            market.request_tasks(bad_url).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            market.request_tasks(view_request("a1", Some(0))).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            market.request_tasks(view_request("ghost", None)).await,
            Err(Error::NotFound { .. })
        ));

        assert_eq!(market.agents().require("a1").await.unwrap().credits, 100);
    }

    #[tokio::test]
    async fn test_request_count_is_clamped() {
        let clock = Arc::new(ManualClock::default());
        let market = Marketplace::new(
            InMemoryKvStore::new_arc(),
            clock,
            LedgerConfig {
                max_tasks_per_request: 5,
                ..LedgerConfig::default()
            },
        );
        market.heartbeat("a1", AgentPatch::default()).await.unwrap();

        let receipt = market.request_tasks(view_request("a1", Some(50))).await.unwrap();
        assert_eq!(receipt.tasks.len(), 5);
        assert_eq!(receipt.total_cost, 10);
        assert_eq!(receipt.remaining_credits, 90);
    }

    #[tokio::test]
    async fn test_failed_report_penalises_reputation() {
        let (market, _) = market();
        market.heartbeat("a1", AgentPatch::default()).await.unwrap();
        market.request_tasks(view_request("a1", Some(1))).await.unwrap();
        let beat = market.heartbeat("a2", AgentPatch::default()).await.unwrap();
        market
            .agents()
            .update_agent(
                "a2",
                AgentPatch {
                    reputation: Some(15),
                    ..AgentPatch::default()
                },
            )
            .await
            .unwrap();

        let completion = market
            .complete_task(CompletionReport {
                task_id: beat.task.unwrap().id,
                soul_id: "a2".into(),
                outcome: TaskOutcome::Failed,
                proof: None,
            })
            .await
            .unwrap();

        assert_eq!(completion.task.status, TaskStatus::Failed);
        assert_eq!(completion.agent.reputation, 0);
        assert_eq!(completion.agent.failed_tasks, 1);
        assert_eq!(completion.agent.credits, 100);
        assert_eq!(completion.reputation_change, -20);
    }

    #[tokio::test]
    async fn test_completion_pays_referrer() {
        let (market, _) = market();
        market.heartbeat("ref", AgentPatch::default()).await.unwrap();
        market.heartbeat("a1", AgentPatch::default()).await.unwrap();
        market.request_tasks(view_request("a1", Some(1))).await.unwrap();

        let beat = market
            .heartbeat(
                "a2",
                AgentPatch {
                    referred_by: Some("ref".into()),
                    ..AgentPatch::default()
                },
            )
            .await
            .unwrap();

        let completion = market
            .complete_task(CompletionReport {
                task_id: beat.task.unwrap().id,
                soul_id: "a2".into(),
                outcome: TaskOutcome::Completed,
                proof: Some("https://x.com/a2/status/9".into()),
            })
            .await
            .unwrap();
        assert_eq!(completion.credits_earned, 2);
        assert_eq!(completion.agent.status, AgentStatus::Ready);
        assert_eq!(completion.agent.reputation, 10);

        let referrer = market.agents().require("ref").await.unwrap();
        assert!((referrer.referral_earnings - 0.04).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_buy_without_proof_is_pending() {
        let (market, _) = market();
        market.heartbeat("a1", AgentPatch::default()).await.unwrap();

        let pending = market.buy_credits("a1", 50, None).await.unwrap();
        assert!(matches!(pending, Purchase::AwaitingPayment { amount: 50, .. }));
        assert_eq!(market.agents().require("a1").await.unwrap().credits, 100);

        let done = market.buy_credits("a1", 50, Some("0xabc")).await.unwrap();
        let Purchase::Completed { agent } = done else {
            unreachable!("proof was supplied");
        };
        assert_eq!(agent.credits, 150);
        assert_eq!(agent.credits_purchased, 50);

        assert!(matches!(
            market.buy_credits("a1", 5, Some("0xabc")).await,
            Err(Error::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_cash_out_limits() {
        let (market, _) = market();
        market.heartbeat("a1", AgentPatch::default()).await.unwrap();

        assert!(matches!(
            market.cash_out("a1", 50).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            market.cash_out("a1", 150).await,
            Err(Error::InsufficientCredits { .. })
        ));

        let cash = market.cash_out("a1", 100).await.unwrap();
        assert_eq!(cash.agent.credits, 0);
        assert_eq!(cash.agent.credits_cashed_out, 100);
        assert!((cash.payout_usd - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_system_tasks_have_no_requester() {
        let (market, _) = market();
        let created = market
            .create_system_tasks(vec![SystemTaskSpec {
                task_type: TaskType::LikeTweet,
                fields: TargetFields {
                    tweet_url: Some("https://twitter.com/a/status/5".into()),
                    ..TargetFields::default()
                },
                description: None,
                credit_reward: None,
            }])
            .await
            .unwrap();

        assert_eq!(created.len(), 1);
        assert!(created[0].requested_by.is_none());
        assert_eq!(created[0].credit_cost, 0);
        assert_eq!(created[0].credit_reward, 5);

        assert!(market.create_system_tasks(Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_lease_expiry_requeues_replica() {
        let (market, clock) = market();
        market.heartbeat("a1", AgentPatch::default()).await.unwrap();
        market.request_tasks(view_request("a1", Some(1))).await.unwrap();
        let beat = market.heartbeat("a2", AgentPatch::default()).await.unwrap();
        let original = beat.task.unwrap();

        assert_eq!(market.expire_stale_assignments().await.unwrap(), 0);
        clock.advance(Duration::minutes(31));
        assert_eq!(market.expire_stale_assignments().await.unwrap(), 1);

        let expired = market.tasks().get_task(&original.id).await.unwrap().unwrap();
        assert_eq!(expired.status, TaskStatus::Failed);

        let replica = market.tasks().get_next_task(Some("a3")).await.unwrap().unwrap();
        assert_eq!(replica.requeued_from.as_deref(), Some(original.id.as_str()));
        assert_eq!(replica.requested_by.as_deref(), Some("a1"));

        let a1 = market.agents().require("a1").await.unwrap();
        assert_eq!(a1.credits, 98);
        let a2 = market.agents().require("a2").await.unwrap();
        assert_eq!(a2.failed_tasks, 1);

        let late = market
            .complete_task(CompletionReport {
                task_id: original.id,
                soul_id: "a2".into(),
                outcome: TaskOutcome::Completed,
                proof: None,
            })
            .await;
        assert!(matches!(late, Err(Error::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_lease_disabled() {
        let market = Marketplace::new(
            InMemoryKvStore::new_arc(),
            Arc::new(ManualClock::default()),
            LedgerConfig {
                assignment_lease: None,
                ..LedgerConfig::default()
            },
        );
        assert_eq!(market.expire_stale_assignments().await.unwrap(), 0);
    }
}
