//! Dashboard statistics - GET /api/stats and GET /api/public-stats

use std::collections::BTreeMap;

use axum::{extract::State, response::Json};
use hive_ledger::{RateTable, SwarmReport, SwarmStats, TopEarner};
use serde::Serialize;

use crate::error::Result;
use crate::state::AppState;

const LEADERBOARD_SIZE: usize = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: SwarmStats,
    pub storage: &'static str,
    pub average_credits_per_agent: f64,
    pub top_earners: Vec<TopEarner>,
    pub capability_breakdown: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditRatesView {
    pub earn: RateTable,
    pub spend: RateTable,
    pub cash_out_rate: f64,
    pub buy_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct EconomyView {
    pub earn: &'static str,
    pub spend: &'static str,
    pub cashout: String,
    pub buy: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStatsResponse {
    #[serde(flatten)]
    pub stats: SwarmStats,
    pub credit_rates: CreditRatesView,
    pub economy: EconomyView,
}

/// GET /api/stats - Real statistics with the leaderboard
///
/// # Errors
///
/// 500 on store failures.
pub async fn swarm_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let market = &state.marketplace;
    let SwarmReport {
        stats,
        top_earners,
        capability_breakdown,
    } = market.stats().swarm_report(LEADERBOARD_SIZE).await?;

    Ok(Json(StatsResponse {
        average_credits_per_agent: stats.average_credits_per_agent(),
        stats,
        storage: market.storage_backend(),
        top_earners,
        capability_breakdown,
    }))
}

/// GET /api/public-stats - Statistics for public display
///
/// Agent counts include the configured boost when it is enabled.
///
/// # Errors
///
/// 500 on store failures.
pub async fn public_stats(State(state): State<AppState>) -> Result<Json<PublicStatsResponse>> {
    let market = &state.marketplace;
    let stats = market.stats().public_swarm_stats().await?;
    let rates = &market.config().rates;

    Ok(Json(PublicStatsResponse {
        stats,
        credit_rates: CreditRatesView {
            earn: rates.earn,
            spend: rates.spend,
            cash_out_rate: rates.cash_out_rate,
            buy_rate: rates.buy_rate,
        },
        economy: EconomyView {
            earn: "Complete tasks → Get credits",
            spend: "Spend credits → Get your tweets boosted",
            cashout: format!("1 credit = ${}", rates.cash_out_rate),
            buy: format!("${} = 1 credit", rates.buy_rate),
        },
    }))
}
