//! Hive ledger: agents, tasks, credits, swarm types and statistics.
//!
//! Every component here talks to storage only through
//! [`hive_store::KvStore`], and every read-modify-write goes through the
//! optimistic [`hive_store::Records::mutate`] loop. [`Marketplace`] wires
//! the components together and implements the flows the HTTP layer exposes.

pub mod agent;
pub mod config;
pub mod credits;
pub mod lease;
pub mod marketplace;
pub mod stats;
pub mod swarm;
pub mod target;
pub mod task;

pub use agent::{Agent, AgentPatch, AgentRegistry, AgentStatus, Tier};
pub use config::{CreditRates, LedgerConfig, RateTable};
pub use credits::{CreditLedger, CreditSource, DebitPurpose};
pub use lease::LeaseSweeper;
pub use marketplace::{
    CashOut, Completion, CompletionReport, Heartbeat, Marketplace, Purchase, SystemTaskSpec,
    TaskRequest, TaskRequestReceipt,
};
pub use stats::{
    PublicStatsConfig, PublicStatsConfigPatch, StatsAggregator, SwarmReport, SwarmStats, TopEarner,
};
pub use swarm::{
    NewSwarmType, OptInSettings, SwarmCatalog, SwarmCategory, SwarmType, SwarmTypeSettings,
    UserSwarmOptIn,
};
pub use target::{TargetFields, TaskTarget, parse_tweet_id};
pub use task::{NewTask, Task, TaskCounts, TaskLedger, TaskOutcome, TaskPatch, TaskStatus, TaskType};
