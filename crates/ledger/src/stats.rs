//! Swarm statistics and the public display transform.
//!
//! Real numbers come from a batched scan of the agent index plus the task
//! index cardinalities and settlement counters. The public view is a pure
//! function of the real numbers and [`PublicStatsConfig`]; nothing in the
//! matching or ledger path ever reads it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use hive_core::{Clock, Result};
use hive_store::{KvStore, Mutation, Records, keys};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentRegistry};
use crate::task::TaskLedger;

/// Characters of a soul id shown on the leaderboard.
const LEADERBOARD_ID_PREFIX: usize = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmStats {
    pub total_agents: u64,
    pub active_agents: u64,
    pub twitter_connected: u64,
    pub total_tasks: u64,
    pub pending_tasks: u64,
    pub assigned_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub total_credits_in_circulation: u64,
    pub total_credits_earned: u64,
    pub total_credits_spent: u64,
    pub total_credits_cashed_out: u64,
}

impl SwarmStats {
    /// Display view of these numbers under `config`.
    ///
    /// Disabled: unchanged. Enabled: `baseAgents` is added to the agent and
    /// twitter-connected totals, everything else stays real.
    #[must_use]
    pub const fn boosted(self, config: &PublicStatsConfig) -> Self {
        if !config.enabled {
            return self;
        }
        Self {
            total_agents: self.total_agents.saturating_add(config.base_agents),
            twitter_connected: self.twitter_connected.saturating_add(config.base_agents),
            ..self
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_credits_per_agent(&self) -> f64 {
        if self.total_agents == 0 {
            0.0
        } else {
            self.total_credits_earned as f64 / self.total_agents as f64
        }
    }
}

/// Admin-tunable display settings for the public statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStatsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_agents: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStatsConfigPatch {
    pub enabled: Option<bool>,
    pub base_agents: Option<u64>,
}

/// Leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopEarner {
    pub soul_id: String,
    pub credits_earned: u64,
    pub completed_tasks: u64,
    pub status: &'static str,
}

/// Everything the dashboard shows, computed from one agent scan.
#[derive(Debug, Clone, PartialEq)]
pub struct SwarmReport {
    pub stats: SwarmStats,
    pub top_earners: Vec<TopEarner>,
    /// Agents advertising each capability.
    pub capability_breakdown: BTreeMap<String, u64>,
}

/// Computes statistics and owns the public display config.
#[derive(Clone)]
pub struct StatsAggregator {
    agents: AgentRegistry,
    tasks: TaskLedger,
    config: Records<PublicStatsConfig>,
    clock: Arc<dyn Clock>,
    active_window: Duration,
}

impl StatsAggregator {
    pub fn new(
        store: Arc<dyn KvStore>,
        agents: AgentRegistry,
        tasks: TaskLedger,
        clock: Arc<dyn Clock>,
        active_window: Duration,
    ) -> Self {
        Self {
            agents,
            tasks,
            config: Records::new(store, keys::CONFIG),
            clock,
            active_window,
        }
    }

    /// Real swarm statistics.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn swarm_stats(&self) -> Result<SwarmStats> {
        let agents = self.agents.list_agents().await?;
        self.aggregate(&agents).await
    }

    async fn aggregate(&self, agents: &[Agent]) -> Result<SwarmStats> {
        let now = self.clock.now();
        let counts = self.tasks.counts().await?;

        let seed = SwarmStats {
            total_agents: u64::try_from(agents.len()).unwrap_or(u64::MAX),
            total_tasks: counts.total,
            pending_tasks: counts.pending,
            assigned_tasks: counts.assigned,
            completed_tasks: counts.completed,
            failed_tasks: counts.failed,
            ..SwarmStats::default()
        };
        Ok(agents.iter().fold(seed, |stats, agent| SwarmStats {
            active_agents: stats
                .active_agents
                .saturating_add(u64::from(agent.is_active(now, self.active_window))),
            twitter_connected: stats
                .twitter_connected
                .saturating_add(u64::from(agent.has_twitter_access)),
            total_credits_in_circulation: stats
                .total_credits_in_circulation
                .saturating_add(agent.credits),
            total_credits_earned: stats.total_credits_earned.saturating_add(agent.credits_earned),
            total_credits_spent: stats.total_credits_spent.saturating_add(agent.credits_spent),
            total_credits_cashed_out: stats
                .total_credits_cashed_out
                .saturating_add(agent.credits_cashed_out),
            ..stats
        }))
    }

    /// Statistics as shown publicly.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn public_swarm_stats(&self) -> Result<SwarmStats> {
        let config = self.public_stats_config().await?;
        Ok(self.swarm_stats().await?.boosted(&config))
    }

    /// Real statistics, the leaderboard and the capability breakdown, from
    /// a single agent scan.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn swarm_report(&self, leaderboard_size: usize) -> Result<SwarmReport> {
        let agents = self.agents.list_agents().await?;
        let stats = self.aggregate(&agents).await?;
        let capability_breakdown = capability_breakdown(&agents);
        Ok(SwarmReport {
            stats,
            top_earners: self.rank(agents, leaderboard_size),
            capability_breakdown,
        })
    }

    fn rank(&self, agents: Vec<Agent>, limit: usize) -> Vec<TopEarner> {
        let now = self.clock.now();
        agents
            .into_iter()
            .sorted_by(|a, b| {
                b.credits_earned
                    .cmp(&a.credits_earned)
                    .then_with(|| a.soul_id.cmp(&b.soul_id))
            })
            .take(limit)
            .map(|agent| TopEarner {
                soul_id: truncate_id(&agent.soul_id),
                credits_earned: agent.credits_earned,
                completed_tasks: agent.completed_tasks,
                status: if agent.is_active(now, self.active_window) {
                    "active"
                } else {
                    "offline"
                },
            })
            .collect()
    }

    /// Current display config; defaults when never set.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn public_stats_config(&self) -> Result<PublicStatsConfig> {
        Ok(self
            .config
            .get(keys::PUBLIC_STATS_CONFIG)
            .await?
            .unwrap_or_default())
    }

    /// Merge `patch` into the display config.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn set_public_stats_config(&self, patch: PublicStatsConfigPatch) -> Result<PublicStatsConfig> {
        let now = self.clock.now();
        let config = self
            .config
            .mutate(keys::PUBLIC_STATS_CONFIG, |current| {
                let mut config = current.unwrap_or_default();
                if let Some(enabled) = patch.enabled {
                    config.enabled = enabled;
                }
                if let Some(base_agents) = patch.base_agents {
                    config.base_agents = base_agents;
                }
                config.updated_at = Some(now);
                Ok(Mutation::Write(config, config))
            })
            .await?;

        tracing::info!(
            enabled = config.enabled,
            base_agents = config.base_agents,
            "public stats config updated"
        );
        Ok(config)
    }
}

fn capability_breakdown(agents: &[Agent]) -> BTreeMap<String, u64> {
    agents
        .iter()
        .flat_map(|agent| agent.capabilities.iter())
        .fold(BTreeMap::new(), |mut counts, capability| {
            let count: &mut u64 = counts.entry(capability.clone()).or_default();
            *count = count.saturating_add(1);
            counts
        })
}

fn truncate_id(soul_id: &str) -> String {
    if soul_id.chars().count() <= LEADERBOARD_ID_PREFIX {
        return soul_id.to_string();
    }
    let prefix: String = soul_id.chars().take(LEADERBOARD_ID_PREFIX).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_boost_disabled_is_identity() {
        let stats = SwarmStats {
            total_agents: 3,
            twitter_connected: 1,
            ..SwarmStats::default()
        };
        let config = PublicStatsConfig {
            enabled: false,
            base_agents: 50,
            updated_at: None,
        };
        assert_eq!(stats.boosted(&config), stats);
    }

    #[test]
    fn test_boost_touches_two_fields() {
        let stats = SwarmStats {
            total_agents: 3,
            active_agents: 2,
            twitter_connected: 1,
            completed_tasks: 7,
            total_credits_in_circulation: 300,
            ..SwarmStats::default()
        };
        let config = PublicStatsConfig {
            enabled: true,
            base_agents: 50,
            updated_at: None,
        };
        let boosted = stats.boosted(&config);

        assert_eq!(boosted.total_agents, 53);
        assert_eq!(boosted.twitter_connected, 51);
        assert_eq!(boosted.active_agents, 2);
        assert_eq!(boosted.completed_tasks, 7);
        assert_eq!(boosted.total_credits_in_circulation, 300);
    }

    #[test]
    fn test_truncate_id() {
        assert_eq!(truncate_id("short"), "short");
        assert_eq!(truncate_id("abcdefghijklmnop"), "abcdefghijkl...");
    }

    #[test]
    fn test_average_credits() {
        assert!(SwarmStats::default().average_credits_per_agent().abs() < f64::EPSILON);
        let stats = SwarmStats {
            total_agents: 4,
            total_credits_earned: 10,
            ..SwarmStats::default()
        };
        assert!((stats.average_credits_per_agent() - 2.5).abs() < f64::EPSILON);
    }
}
