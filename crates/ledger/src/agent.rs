//! Agent registry.
//!
//! Agents are keyed by their client-supplied `soulId`. The first heartbeat
//! creates the record, every later heartbeat overlays whatever fields the
//! client sent, and settlement flows adjust counters and balances. Every
//! write goes through a compare-and-swap loop so concurrent requests for the
//! same agent never lose each other's updates.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hive_core::{Clock, Error, Result};
use hive_store::{KvStore, Mutation, Records, keys};
use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;

/// Longest soul id accepted.
const MAX_SOUL_ID_LEN: usize = 128;

/// Liveness reported by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Available for a new task.
    #[default]
    Ready,
    /// Working on a task.
    Busy,
    /// Not taking work.
    Offline,
}

impl From<AgentStatus> for String {
    fn from(status: AgentStatus) -> Self {
        match status {
            AgentStatus::Ready => "ready".to_string(),
            AgentStatus::Busy => "busy".to_string(),
            AgentStatus::Offline => "offline".to_string(),
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: String = (*self).into();
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ready" => Ok(Self::Ready),
            "busy" => Ok(Self::Busy),
            "offline" => Ok(Self::Offline),
            other => Err(Error::invalid_field(
                "status",
                format!("unknown agent status '{other}' (expected ready, busy or offline)"),
            )),
        }
    }
}

/// Display rank derived from reputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Larva,
    Worker,
    Soldier,
    Queen,
}

impl Tier {
    /// Tier for a reputation score: 0 / 100 / 500 / 2000 thresholds.
    #[must_use]
    pub const fn from_reputation(reputation: u64) -> Self {
        match reputation {
            r if r >= 2000 => Self::Queen,
            r if r >= 500 => Self::Soldier,
            r if r >= 100 => Self::Worker,
            _ => Self::Larva,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Larva => "larva",
            Self::Worker => "worker",
            Self::Soldier => "soldier",
            Self::Queen => "queen",
        };
        write!(f, "{s}")
    }
}

/// Agent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub soul_id: String,
    #[serde(default)]
    pub twitter_handle: Option<String>,
    #[serde(default)]
    pub has_twitter_access: bool,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub recent_tweets: Vec<String>,
    pub status: AgentStatus,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub completed_tasks: u64,
    #[serde(default)]
    pub failed_tasks: u64,
    /// Spendable balance. Unsigned, and only lowered through a guarded debit.
    #[serde(default)]
    pub credits: u64,
    #[serde(default)]
    pub credits_earned: u64,
    #[serde(default)]
    pub credits_spent: u64,
    #[serde(default)]
    pub credits_cashed_out: u64,
    #[serde(default)]
    pub credits_purchased: u64,
    #[serde(default)]
    pub reputation: u64,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub referred_by: Option<String>,
    #[serde(default)]
    pub referral_earnings: f64,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    /// Fresh agent with the starter grant.
    #[must_use]
    pub fn new(soul_id: impl Into<String>, starter_credits: u64, now: DateTime<Utc>) -> Self {
        Self {
            soul_id: soul_id.into(),
            twitter_handle: None,
            has_twitter_access: false,
            capabilities: Vec::new(),
            recent_tweets: Vec::new(),
            status: AgentStatus::Ready,
            last_seen: now,
            completed_tasks: 0,
            failed_tasks: 0,
            credits: starter_credits,
            credits_earned: 0,
            credits_spent: 0,
            credits_cashed_out: 0,
            credits_purchased: 0,
            reputation: 0,
            tier: Tier::Larva,
            referred_by: None,
            referral_earnings: 0.0,
            registered_at: now,
        }
    }

    /// Recompute the tier from the current reputation.
    pub fn refresh_tier(&mut self) {
        self.tier = Tier::from_reputation(self.reputation);
    }

    /// Whether the agent checked in within `window` of `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_seen) < window
    }
}

/// Explicit partial update: every `Some` field overwrites, every `None`
/// keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentPatch {
    pub twitter_handle: Option<String>,
    pub has_twitter_access: Option<bool>,
    pub capabilities: Option<Vec<String>>,
    pub recent_tweets: Option<Vec<String>>,
    pub status: Option<AgentStatus>,
    pub referred_by: Option<String>,
    pub reputation: Option<u64>,
}

impl AgentPatch {
    /// Overlay the patch onto an agent.
    ///
    /// A referrer is only recorded once and never the agent itself.
    pub fn apply(&self, agent: &mut Agent) {
        if let Some(handle) = &self.twitter_handle {
            agent.twitter_handle = Some(handle.clone());
        }
        if let Some(access) = self.has_twitter_access {
            agent.has_twitter_access = access;
        }
        if let Some(capabilities) = &self.capabilities {
            agent.capabilities.clone_from(capabilities);
        }
        if let Some(tweets) = &self.recent_tweets {
            agent.recent_tweets.clone_from(tweets);
        }
        if let Some(status) = self.status {
            agent.status = status;
        }
        if let Some(referrer) = &self.referred_by {
            if agent.referred_by.is_none() && referrer != &agent.soul_id {
                agent.referred_by = Some(referrer.clone());
            }
        }
        if let Some(reputation) = self.reputation {
            agent.reputation = reputation;
        }
        agent.refresh_tier();
    }
}

/// Agent registry backed by the key-value store.
#[derive(Clone)]
pub struct AgentRegistry {
    records: Records<Agent>,
    clock: Arc<dyn Clock>,
    starter_credits: u64,
    scan_batch_size: usize,
}

impl AgentRegistry {
    /// Create a registry over `store`.
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: &LedgerConfig) -> Self {
        Self {
            records: Records::new(store, keys::AGENT),
            clock,
            starter_credits: config.starter_credits,
            scan_batch_size: config.scan_batch_size.max(1),
        }
    }

    /// Create or refresh an agent.
    ///
    /// New agents get the starter grant and zeroed counters. Existing agents
    /// keep counters, balance and `registeredAt`; only fields present in
    /// `patch` change. `lastSeen` is always stamped.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or oversized soul id, or a
    /// store error.
    pub async fn register_agent(&self, soul_id: &str, patch: AgentPatch) -> Result<Agent> {
        validate_soul_id(soul_id)?;
        let now = self.clock.now();
        let starter = self.starter_credits;

        let (agent, created) = self
            .records
            .mutate(soul_id, |current| {
                let (mut agent, created) = match current {
                    Some(existing) => (existing, false),
                    None => (Agent::new(soul_id, starter, now), true),
                };
                patch.apply(&mut agent);
                agent.last_seen = now;
                Ok(Mutation::Write(agent.clone(), (agent, created)))
            })
            .await?;

        self.records
            .store()
            .set_add(keys::AGENT_INDEX, soul_id)
            .await?;

        if created {
            tracing::info!(soul_id, credits = agent.credits, "registered new agent");
        }
        Ok(agent)
    }

    /// Apply a patch to an existing agent; `None` if the agent is unknown.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn update_agent(&self, soul_id: &str, patch: AgentPatch) -> Result<Option<Agent>> {
        self.modify(soul_id, |agent| {
            patch.apply(agent);
            Ok(())
        })
        .await
    }

    /// Atomically modify an existing agent and return the stored result;
    /// `None` if the agent is unknown.
    ///
    /// The tier is recomputed after `f` runs. `f` may be called more than
    /// once under contention and must not have side effects.
    ///
    /// # Errors
    ///
    /// Propagates errors from `f` and store errors.
    pub async fn modify<F>(&self, soul_id: &str, mut f: F) -> Result<Option<Agent>>
    where
        F: FnMut(&mut Agent) -> Result<()> + Send,
    {
        self.records
            .mutate(soul_id, |current| match current {
                None => Ok(Mutation::Skip(None)),
                Some(mut agent) => {
                    f(&mut agent)?;
                    agent.refresh_tier();
                    Ok(Mutation::Write(agent.clone(), Some(agent)))
                }
            })
            .await
    }

    /// Load an agent.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn get_agent(&self, soul_id: &str) -> Result<Option<Agent>> {
        self.records.get(soul_id).await
    }

    /// Load an agent or fail with not-found.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown soul ids, or a store error.
    pub async fn require(&self, soul_id: &str) -> Result<Agent> {
        self.get_agent(soul_id)
            .await?
            .ok_or_else(|| Error::not_found("agent", soul_id))
    }

    /// Enumerate every agent through the index, in batches.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn list_agents(&self) -> Result<Vec<Agent>> {
        let ids = self
            .records
            .store()
            .set_members(keys::AGENT_INDEX)
            .await?;

        let mut agents = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(self.scan_batch_size) {
            agents.extend(self.records.get_many(chunk).await?);
        }
        Ok(agents)
    }
}

fn validate_soul_id(soul_id: &str) -> Result<()> {
    if soul_id.trim().is_empty() {
        return Err(Error::missing_field("soul_id"));
    }
    if soul_id.len() > MAX_SOUL_ID_LEN {
        return Err(Error::invalid_field(
            "soul_id",
            format!("soul_id too long (max {MAX_SOUL_ID_LEN} characters)"),
        ));
    }
    Ok(())
}
