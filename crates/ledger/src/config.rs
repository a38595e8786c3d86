//! Ledger tuning knobs and the credit price list.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::task::TaskType;

/// Credits per task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    pub view_tweet: u64,
    pub like_tweet: u64,
    pub reply_tweet: u64,
    pub post_tweet: u64,
}

impl RateTable {
    /// Rate for one task type.
    #[must_use]
    pub const fn for_type(&self, task_type: TaskType) -> u64 {
        match task_type {
            TaskType::ViewTweet => self.view_tweet,
            TaskType::LikeTweet => self.like_tweet,
            TaskType::ReplyTweet => self.reply_tweet,
            TaskType::PostTweet => self.post_tweet,
        }
    }
}

/// What agents earn, what requesters pay, and the notional exchange rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditRates {
    /// Credits paid to the executor of a task.
    pub earn: RateTable,
    /// Credits charged to the requester of a task.
    pub spend: RateTable,
    /// USD paid out per credit on cash-out.
    pub cash_out_rate: f64,
    /// USD charged per credit on purchase.
    pub buy_rate: f64,
}

impl Default for CreditRates {
    fn default() -> Self {
        let table = RateTable {
            view_tweet: 2,
            like_tweet: 5,
            reply_tweet: 15,
            post_tweet: 15,
        };
        Self {
            earn: table,
            spend: table,
            cash_out_rate: 0.01,
            buy_rate: 0.01,
        }
    }
}

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Credits granted on first registration.
    pub starter_credits: u64,
    /// Upper bound for `count` in a single task request.
    pub max_tasks_per_request: u32,
    /// An agent seen within this window counts as active.
    pub active_window: Duration,
    /// How long an assignee has to report; `None` keeps assignments forever.
    pub assignment_lease: Option<Duration>,
    /// Price list.
    pub rates: CreditRates,
    /// Smallest credit purchase accepted.
    pub min_purchase: u64,
    /// Largest credit purchase accepted in one call.
    pub max_purchase: u64,
    /// Smallest cash-out accepted.
    pub min_cashout: u64,
    /// Share of a task reward credited to the executor's referrer.
    pub referral_rate: f64,
    /// Reputation gained per completed task.
    pub reputation_reward: u64,
    /// Reputation lost per failed task.
    pub reputation_penalty: u64,
    /// Viewing time requested for view tasks.
    pub default_view_duration_sec: u32,
    /// Records loaded per round trip when scanning an index.
    pub scan_batch_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starter_credits: 100,
            max_tasks_per_request: 100,
            active_window: Duration::minutes(10),
            assignment_lease: Some(Duration::minutes(30)),
            rates: CreditRates::default(),
            min_purchase: 10,
            max_purchase: 1_000_000,
            min_cashout: 100,
            referral_rate: 0.02,
            reputation_reward: 10,
            reputation_penalty: 20,
            default_view_duration_sec: 60,
            scan_batch_size: 100,
        }
    }
}
