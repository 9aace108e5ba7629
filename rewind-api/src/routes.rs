//! HTTP surface.
//!
//! Axum router over the Riot client, the insights service and the account
//! collection. Successful payloads ride the `{ success, data }` envelope;
//! failures serialize through [`ApiError`](crate::error::ApiError).

use crate::accounts::{index_account, AccountService, PlayerAccount};
use crate::error::ApiResult;
use crate::insights::InsightsService;
use crate::riot::{regions, Region, RiotClient};
use crate::stats;
use crate::types::{ProcessedStats, WrappedData};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rewind_engine::ListRequest;
use rewind_types::PaginatedResponse;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub riot: Arc<RiotClient>,
    pub insights: Arc<InsightsService>,
    pub accounts: AccountService,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/generate-wrapped", post(generate_wrapped))
        .route("/api/quick-stats", post(quick_stats))
        .route("/api/validate", post(validate_summoner))
        .route("/api/regions", get(list_regions))
        .route("/api/accounts", get(list_accounts))
        .fallback(not_found)
        .with_state(state)
}

/// The success half of the response envelope.
#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummonerRequest {
    game_name: String,
    tag_line: String,
    /// Advisory; lookups ride the configured regional route.
    #[serde(default)]
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountListParams {
    page: Option<u64>,
    page_size: Option<u64>,
    game_name: Option<String>,
    search: Option<String>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }))
}

async fn generate_wrapped(
    State(state): State<AppState>,
    Json(request): Json<SummonerRequest>,
) -> ApiResult<Json<Envelope<WrappedData>>> {
    info!(
        game_name = %request.game_name,
        tag_line = %request.tag_line,
        region = ?request.region,
        "generating wrapped"
    );
    let account = state
        .riot
        .account_by_riot_id(&request.game_name, &request.tag_line)
        .await?;
    let matches = state.riot.all_matches(&account.puuid).await?;
    let wrapped = state
        .insights
        .generate_full_wrapped(&matches, &account.puuid, &account.game_name, &account.tag_line)
        .await;

    // Remember the account and the matches we saw. Losing this step costs a
    // re-pull later, not the response.
    let match_ids: Vec<String> = matches
        .iter()
        .map(|m| m.metadata.match_id.clone())
        .collect();
    if let Err(err) = index_account(
        &state.accounts,
        &account.puuid,
        &account.game_name,
        &account.tag_line,
        &match_ids,
    )
    .await
    {
        warn!(error = %err, puuid = %account.puuid, "account indexing failed");
    }

    Ok(ok(wrapped))
}

async fn quick_stats(
    State(state): State<AppState>,
    Json(request): Json<SummonerRequest>,
) -> ApiResult<Json<Envelope<ProcessedStats>>> {
    debug!(game_name = %request.game_name, tag_line = %request.tag_line, "quick stats");
    let account = state
        .riot
        .account_by_riot_id(&request.game_name, &request.tag_line)
        .await?;
    let matches = state.riot.all_matches(&account.puuid).await?;
    Ok(ok(stats::process_match_data(&matches, &account.puuid)))
}

#[derive(Debug, Serialize)]
struct ValidationResult {
    exists: bool,
    puuid: String,
    level: i64,
    icon: i32,
}

async fn validate_summoner(
    State(state): State<AppState>,
    Json(request): Json<SummonerRequest>,
) -> ApiResult<Json<Envelope<ValidationResult>>> {
    let account = state
        .riot
        .account_by_riot_id(&request.game_name, &request.tag_line)
        .await?;
    let summoner = state.riot.summoner_by_puuid(&account.puuid).await?;
    Ok(ok(ValidationResult {
        exists: true,
        puuid: summoner.puuid,
        level: summoner.summoner_level,
        icon: summoner.profile_icon_id,
    }))
}

async fn list_regions() -> Json<Envelope<Vec<Region>>> {
    ok(regions())
}

async fn list_accounts(
    State(state): State<AppState>,
    Query(params): Query<AccountListParams>,
) -> ApiResult<Json<Envelope<PaginatedResponse<PlayerAccount>>>> {
    let mut request = ListRequest::new();
    if let Some(page) = params.page {
        request = request.page(page);
    }
    if let Some(page_size) = params.page_size {
        request = request.page_size(page_size);
    }
    if let Some(game_name) = params.game_name {
        request = request.filter("gameName", Value::String(game_name));
    }
    if let Some(search) = params.search {
        request = request.search(search);
    }
    let page = state.accounts.get_all(&request).await?;
    Ok(ok(page))
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Route not found" })),
    )
}
