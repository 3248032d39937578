//! 链目录与健康检查 API

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    config::DispatchPolicy,
    domain::chain_directory::ChainProfile,
    error::AppError,
};

/// 链摘要（不暴露 RPC URL，其中可能包含 API key）
#[derive(Debug, Serialize, ToSchema)]
pub struct ChainSummary {
    pub chain_id: u64,
    pub name: String,
    pub endpoint_count: usize,
}

impl From<&ChainProfile> for ChainSummary {
    fn from(profile: &ChainProfile) -> Self {
        Self {
            chain_id: profile.chain_id,
            name: profile.name.clone(),
            endpoint_count: profile.endpoints.len(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Healthz {
    pub status: String,
    pub version: String,
    pub chains: usize,
    #[schema(value_type = String, example = "relay")]
    pub dispatch_policy: DispatchPolicy,
    pub timestamp: String,
}

/// 列出支持的链
#[utoipa::path(
    get,
    path = "/api/v1/chains",
    responses((status = 200, description = "Configured chains", body = [ChainSummary])),
    tag = "chains"
)]
pub async fn list_chains(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ChainSummary>>>, AppError> {
    success_response(state.chains.iter().map(ChainSummary::from).collect())
}

/// 查询单条链
#[utoipa::path(
    get,
    path = "/api/v1/chains/{chain_id}",
    params(("chain_id" = u64, Path, description = "EIP-155 chain id")),
    responses(
        (status = 200, description = "Chain found", body = ChainSummary),
        (status = 400, description = "chain_id is not an integer"),
        (status = 404, description = "Chain not configured")
    ),
    tag = "chains"
)]
pub async fn get_chain(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<String>,
) -> Result<Json<ApiResponse<ChainSummary>>, AppError> {
    let chain_id: u64 = chain_id
        .trim()
        .parse()
        .map_err(|_| AppError::bad_request(format!("Invalid chainId: {}", chain_id)))?;

    let profile = state
        .chains
        .get(chain_id)
        .ok_or_else(|| AppError::chain_not_supported(format!("Chain not found for chainId: {}", chain_id)))?;

    success_response(ChainSummary::from(profile))
}

/// 健康检查
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Service is up", body = Healthz)),
    tag = "health"
)]
pub async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Healthz>>, AppError> {
    let status = if state.chains.is_empty() {
        "degraded"
    } else {
        "ok"
    };

    success_response(Healthz {
        status: status.into(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chains: state.chains.len(),
        dispatch_policy: state.orchestrator.settings().policy,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
