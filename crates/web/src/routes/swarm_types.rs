//! Swarm type endpoints - /api/swarm-types
//!
//! These endpoints speak camelCase, like the dashboard that calls them.

use axum::{extract::State, response::Json};
use hive_core::Error;
use hive_ledger::{NewSwarmType, OptInSettings, SwarmCategory, SwarmType, SwarmTypeSettings, UserSwarmOptIn};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiQuery};
use crate::routes::required;
use crate::state::AppState;

#[derive(Debug, Default, Serialize)]
pub struct GroupedSwarmTypes {
    pub twitter: Vec<SwarmType>,
    pub reddit: Vec<SwarmType>,
    pub blogs: Vec<SwarmType>,
    pub github: Vec<SwarmType>,
    pub custom: Vec<SwarmType>,
}

impl GroupedSwarmTypes {
    fn group(types: &[SwarmType]) -> Self {
        types.iter().cloned().fold(Self::default(), |mut grouped, swarm_type| {
            match swarm_type.category {
                SwarmCategory::Twitter => grouped.twitter.push(swarm_type),
                SwarmCategory::Reddit => grouped.reddit.push(swarm_type),
                SwarmCategory::Blogs => grouped.blogs.push(swarm_type),
                SwarmCategory::Github => grouped.github.push(swarm_type),
                SwarmCategory::Custom => grouped.custom.push(swarm_type),
            }
            grouped
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmTypesResponse {
    pub swarm_types: Vec<SwarmType>,
    pub grouped: GroupedSwarmTypes,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSwarmTypeRequest {
    pub soul_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub settings: Option<SwarmTypeSettings>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSwarmTypeResponse {
    pub success: bool,
    pub swarm_type: SwarmType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptInQuery {
    pub soul_id: Option<String>,
    pub swarm_type_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum OptInStatusResponse {
    Single { is_opted_in: bool },
    All { opt_ins: Vec<UserSwarmOptIn> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptInRequest {
    pub soul_id: Option<String>,
    pub swarm_type_id: Option<String>,
    pub action: Option<String>,
    pub settings: Option<OptInSettings>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptInResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opt_in: Option<UserSwarmOptIn>,
}

/// GET /api/swarm-types - All swarm types, flat and grouped by category
///
/// # Errors
///
/// 500 on store failures.
pub async fn list_swarm_types(State(state): State<AppState>) -> Result<Json<SwarmTypesResponse>> {
    let swarm_types = state.marketplace.swarms().list_swarm_types().await?;
    Ok(Json(SwarmTypesResponse {
        grouped: GroupedSwarmTypes::group(&swarm_types),
        total: swarm_types.len(),
        swarm_types,
    }))
}

/// POST /api/swarm-types - Create a custom swarm type
///
/// # Errors
///
/// - 400 for missing fields or an unknown category
/// - 404 when the creator is not a known agent
pub async fn create_swarm_type(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateSwarmTypeRequest>,
) -> Result<Json<CreateSwarmTypeResponse>> {
    let soul_id = required(request.soul_id, "soulId")?;
    let category = request
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(str::parse::<SwarmCategory>)
        .transpose()?;

    let swarm_type = state
        .marketplace
        .swarms()
        .create_swarm_type(
            &soul_id,
            NewSwarmType {
                name: required(request.name, "name")?,
                description: required(request.description, "description")?,
                icon: request.icon,
                category,
                settings: request.settings,
            },
        )
        .await?;

    Ok(Json(CreateSwarmTypeResponse {
        success: true,
        swarm_type,
    }))
}

/// GET /api/swarm-types/opt-in - One opt-in flag, or all active opt-ins
///
/// # Errors
///
/// 400 without `soulId`.
pub async fn opt_in_status(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OptInQuery>,
) -> Result<Json<OptInStatusResponse>> {
    let soul_id = required(query.soul_id, "soulId")?;
    let swarms = state.marketplace.swarms();

    let response = match query.swarm_type_id.filter(|id| !id.trim().is_empty()) {
        Some(swarm_type_id) => OptInStatusResponse::Single {
            is_opted_in: swarms.is_opted_in(&soul_id, &swarm_type_id).await?,
        },
        None => OptInStatusResponse::All {
            opt_ins: swarms.user_opt_ins(&soul_id).await?,
        },
    };
    Ok(Json(response))
}

/// POST /api/swarm-types/opt-in - Opt in, opt out or update opt-in settings
///
/// # Errors
///
/// - 400 for missing fields, an unknown action, or updating settings
///   without an active opt-in
/// - 404 for unknown agents or swarm types
pub async fn change_opt_in(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<OptInRequest>,
) -> Result<Json<OptInResponse>> {
    let soul_id = required(request.soul_id, "soulId")?;
    let swarm_type_id = required(request.swarm_type_id, "swarmTypeId")?;
    let action = required(request.action, "action")?;

    let market = &state.marketplace;
    market.agents().require(&soul_id).await?;
    let swarms = market.swarms();

    let response = match action.as_str() {
        "opt-in" => {
            let opt_in = swarms
                .opt_in(&soul_id, &swarm_type_id, request.settings)
                .await?
                .ok_or_else(|| Error::not_found("swarm type", &swarm_type_id))?;
            OptInResponse {
                success: true,
                opt_in: Some(opt_in),
            }
        }
        "opt-out" => OptInResponse {
            success: swarms.opt_out(&soul_id, &swarm_type_id).await?,
            opt_in: None,
        },
        "update-settings" => {
            let opt_in = swarms
                .update_settings(&soul_id, &swarm_type_id, request.settings.unwrap_or_default())
                .await?
                .ok_or_else(|| AppError::BadRequest("Not opted in to this swarm".to_string()))?;
            OptInResponse {
                success: true,
                opt_in: Some(opt_in),
            }
        }
        _ => {
            return Err(AppError::BadRequest(
                "Invalid action. Use: opt-in, opt-out or update-settings".to_string(),
            ));
        }
    };

    Ok(Json(response))
}
