//! Credit ledger.
//!
//! Balances live on the agent record, so every credit movement is an agent
//! mutation: the balance check and the write happen inside the same
//! compare-and-swap attempt and concurrent debits cannot overdraw.

use hive_core::{Error, Result};

use crate::agent::{Agent, AgentRegistry};

/// Where incoming credits come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditSource {
    /// Paid for completed work.
    Earned,
    /// Bought with money.
    Purchased,
    /// Returned after a failed request.
    Refund,
}

/// What outgoing credits are for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitPurpose {
    /// Paid for requested tasks.
    Spent,
    /// Converted back to money.
    CashOut,
}

/// Credit movements on top of the agent registry.
#[derive(Clone)]
pub struct CreditLedger {
    agents: AgentRegistry,
}

impl CreditLedger {
    #[must_use]
    pub const fn new(agents: AgentRegistry) -> Self {
        Self { agents }
    }

    /// Add credits; `false` if the agent does not exist.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn add_credits(&self, soul_id: &str, amount: u64, source: CreditSource) -> Result<bool> {
        match self.credit(soul_id, amount, source).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove credits; `false` if the agent does not exist or cannot cover
    /// `amount`. The balance is untouched on `false`.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub async fn deduct_credits(&self, soul_id: &str, amount: u64, purpose: DebitPurpose) -> Result<bool> {
        match self.debit(soul_id, amount, purpose).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound { .. } | Error::InsufficientCredits { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Add credits and return the updated agent.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for unknown agents
    /// - [`Error::Validation`] when the balance would overflow
    pub async fn credit(&self, soul_id: &str, amount: u64, source: CreditSource) -> Result<Agent> {
        let agent = self
            .agents
            .modify(soul_id, |agent| {
                agent.credits = agent
                    .credits
                    .checked_add(amount)
                    .ok_or_else(|| Error::invalid_field("amount", "balance would overflow"))?;
                match source {
                    CreditSource::Earned => {
                        agent.credits_earned = agent.credits_earned.saturating_add(amount);
                    }
                    CreditSource::Purchased => {
                        agent.credits_purchased = agent.credits_purchased.saturating_add(amount);
                    }
                    CreditSource::Refund => {}
                }
                Ok(())
            })
            .await?
            .ok_or_else(|| Error::not_found("agent", soul_id))?;

        tracing::debug!(soul_id, amount, ?source, balance = agent.credits, "credits added");
        Ok(agent)
    }

    /// Remove credits and return the updated agent.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for unknown agents
    /// - [`Error::InsufficientCredits`] when the balance is below `amount`
    pub async fn debit(&self, soul_id: &str, amount: u64, purpose: DebitPurpose) -> Result<Agent> {
        let result = self
            .agents
            .modify(soul_id, |agent| {
                agent.credits = agent
                    .credits
                    .checked_sub(amount)
                    .ok_or(Error::InsufficientCredits {
                        available: agent.credits,
                        requested: amount,
                    })?;
                match purpose {
                    DebitPurpose::Spent => {
                        agent.credits_spent = agent.credits_spent.saturating_add(amount);
                    }
                    DebitPurpose::CashOut => {
                        agent.credits_cashed_out = agent.credits_cashed_out.saturating_add(amount);
                    }
                }
                Ok(())
            })
            .await;

        match result {
            Ok(Some(agent)) => {
                tracing::debug!(soul_id, amount, ?purpose, balance = agent.credits, "credits deducted");
                Ok(agent)
            }
            Ok(None) => Err(Error::not_found("agent", soul_id)),
            Err(e) => {
                if let Error::InsufficientCredits { available, requested } = &e {
                    tracing::warn!(soul_id, available, requested, "debit refused");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use std::sync::Arc;

    use super::*;
    use crate::agent::AgentPatch;
    use crate::config::LedgerConfig;
    use hive_core::ManualClock;
    use hive_store::InMemoryKvStore;

    async fn ledger_with(soul_id: &str) -> (CreditLedger, AgentRegistry) {
        let agents = AgentRegistry::new(
            InMemoryKvStore::new_arc(),
            Arc::new(ManualClock::default()),
            &LedgerConfig::default(),
        );
        agents
            .register_agent(soul_id, AgentPatch::default())
            .await
            .unwrap();
        (CreditLedger::new(agents.clone()), agents)
    }

    #[tokio::test]
    async fn test_add_credits_by_source() {
        let (ledger, agents) = ledger_with("a1").await;

        assert!(ledger.add_credits("a1", 5, CreditSource::Earned).await.unwrap());
        assert!(ledger.add_credits("a1", 10, CreditSource::Purchased).await.unwrap());
        assert!(ledger.add_credits("a1", 3, CreditSource::Refund).await.unwrap());

        let agent = agents.require("a1").await.unwrap();
        assert_eq!(agent.credits, 118);
        assert_eq!(agent.credits_earned, 5);
        assert_eq!(agent.credits_purchased, 10);
    }

    #[tokio::test]
    async fn test_credit_overflow_leaves_balance() {
        let (ledger, agents) = ledger_with("a1").await;

        let result = ledger.credit("a1", u64::MAX, CreditSource::Purchased).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let agent = agents.require("a1").await.unwrap();
        assert_eq!(agent.credits, 100);
        assert_eq!(agent.credits_purchased, 0);
    }

    #[tokio::test]
    async fn test_add_credits_unknown_agent() {
        let (ledger, _) = ledger_with("a1").await;
        assert!(!ledger.add_credits("ghost", 5, CreditSource::Earned).await.unwrap());
    }

    #[tokio::test]
    async fn test_deduct_more_than_balance_is_refused() {
        let (ledger, agents) = ledger_with("a1").await;

        assert!(!ledger.deduct_credits("a1", 1000, DebitPurpose::Spent).await.unwrap());
        let agent = agents.require("a1").await.unwrap();
        assert_eq!(agent.credits, 100);
        assert_eq!(agent.credits_spent, 0);
    }

    #[tokio::test]
    async fn test_deduct_purposes_are_exclusive() {
        let (ledger, agents) = ledger_with("a1").await;

        assert!(ledger.deduct_credits("a1", 6, DebitPurpose::Spent).await.unwrap());
        assert!(ledger.deduct_credits("a1", 4, DebitPurpose::CashOut).await.unwrap());

        let agent = agents.require("a1").await.unwrap();
        assert_eq!(agent.credits, 90);
        assert_eq!(agent.credits_spent, 6);
        assert_eq!(agent.credits_cashed_out, 4);
    }

    #[tokio::test]
    async fn test_debit_reports_shortfall() {
        let (ledger, _) = ledger_with("a1").await;
        let result = ledger.debit("a1", 101, DebitPurpose::Spent).await;
        assert!(matches!(
            result,
            Err(Error::InsufficientCredits {
                available: 100,
                requested: 101
            })
        ));
    }

    #[tokio::test]
    async fn test_debit_unknown_agent() {
        let (ledger, _) = ledger_with("a1").await;
        let result = ledger.debit("ghost", 1, DebitPurpose::Spent).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_never_overdraw() {
        let (ledger, agents) = ledger_with("a1").await;

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.deduct_credits("a1", 5, DebitPurpose::Spent).await })
            })
            .collect();

        let mut successes = 0;
        for result in futures::future::join_all(handles).await {
            match result.unwrap() {
                Ok(true) => successes += 1,
                Ok(false) | Err(Error::Conflict { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        let agent = agents.require("a1").await.unwrap();
        assert!(successes <= 20);
        assert_eq!(agent.credits, 100 - successes * 5);
        assert_eq!(agent.credits_spent, successes * 5);
    }
}
