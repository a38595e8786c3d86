//! Credit endpoints - /api/credits
//!
//! Payments are notional: a purchase accepts any payment proof string and a
//! cash-out only records the payout owed.

use axum::{extract::State, response::Json};
use hive_core::Error;
use hive_ledger::{CashOut, Purchase, RateTable};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extract::{ApiJson, ApiQuery};
use crate::routes::required;
use crate::state::AppState;
use crate::views::usd;

#[derive(Debug, Deserialize)]
pub struct CreditsQuery {
    pub soul_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RatesView {
    pub earn: RateTable,
    pub spend: RateTable,
    pub cash_out_rate: String,
    pub buy_rate: String,
}

#[derive(Debug, Serialize)]
pub struct CreditsInfo {
    pub how_to_earn: &'static str,
    pub how_to_spend: &'static str,
    pub cash_out: &'static str,
    pub buy: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BalanceView {
    Known {
        credits: u64,
        credits_earned: u64,
        credits_spent: u64,
        credits_cashed_out: u64,
        credits_purchased: u64,
        cash_value: String,
    },
    Unknown {
        error: &'static str,
    },
}

#[derive(Debug, Serialize)]
pub struct CreditsOverview {
    pub rates: RatesView,
    pub info: CreditsInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<BalanceView>,
}

#[derive(Debug, Deserialize)]
pub struct CreditsRequest {
    pub soul_id: Option<String>,
    pub action: Option<String>,
    pub amount: Option<u64>,
    pub payment_proof: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreditsResponse {
    Pending {
        message: String,
        amount: u64,
        cost_usd: f64,
        instructions: &'static str,
    },
    Success {
        message: String,
        new_balance: u64,
    },
    PendingPayout {
        message: String,
        payout_usd: f64,
        new_balance: u64,
        instructions: &'static str,
    },
}

/// GET /api/credits - Rates, and the caller's balance when `soul_id` is given
///
/// # Errors
///
/// 500 on store failures.
#[allow(clippy::cast_precision_loss)]
pub async fn overview(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CreditsQuery>,
) -> Result<Json<CreditsOverview>> {
    let market = &state.marketplace;
    let rates = &market.config().rates;

    let balance = match query.soul_id.filter(|s| !s.trim().is_empty()) {
        Some(soul_id) => Some(match market.agents().get_agent(&soul_id).await? {
            Some(agent) => BalanceView::Known {
                credits: agent.credits,
                credits_earned: agent.credits_earned,
                credits_spent: agent.credits_spent,
                credits_cashed_out: agent.credits_cashed_out,
                credits_purchased: agent.credits_purchased,
                cash_value: usd(agent.credits as f64 * rates.cash_out_rate),
            },
            None => BalanceView::Unknown {
                error: "Agent not found",
            },
        }),
        None => None,
    };

    Ok(Json(CreditsOverview {
        rates: RatesView {
            earn: rates.earn,
            spend: rates.spend,
            cash_out_rate: format!("${} per credit", rates.cash_out_rate),
            buy_rate: format!("${} per credit", rates.buy_rate),
        },
        info: CreditsInfo {
            how_to_earn: "Complete tasks for other agents",
            how_to_spend: "Request tasks on your own tweets",
            cash_out: "Convert credits to a payout (processed manually)",
            buy: "Buy credits with a payment proof",
        },
        balance,
    }))
}

/// POST /api/credits - Buy credits or cash them out
///
/// # Errors
///
/// - 400 for a missing field, unknown action or an amount under the minimum
/// - 402 when a cash-out exceeds the balance
/// - 404 for unknown agents
pub async fn transact(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreditsRequest>,
) -> Result<Json<CreditsResponse>> {
    let soul_id = required(request.soul_id, "soul_id")?;
    let action = required(request.action, "action")?;
    let amount = request.amount.unwrap_or(0);
    let market = &state.marketplace;

    let response = match action.as_str() {
        "buy" => match market
            .buy_credits(&soul_id, amount, request.payment_proof.as_deref())
            .await?
        {
            Purchase::AwaitingPayment { amount, cost_usd } => CreditsResponse::Pending {
                message: "Send payment to complete purchase".to_string(),
                amount,
                cost_usd,
                instructions: "Call again with payment_proof once paid",
            },
            Purchase::Completed { agent } => CreditsResponse::Success {
                message: format!("Purchased {amount} credits"),
                new_balance: agent.credits,
            },
        },
        "cashout" => {
            let CashOut { agent, payout_usd } = market.cash_out(&soul_id, amount).await?;
            CreditsResponse::PendingPayout {
                message: format!("Cashout initiated for {amount} credits"),
                payout_usd,
                new_balance: agent.credits,
                instructions: "Payouts are processed manually",
            }
        }
        _ => {
            return Err(Error::invalid_field("action", "Invalid action. Use: buy or cashout").into());
        }
    };

    Ok(Json(response))
}
