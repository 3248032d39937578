//! 转账 API
//!
//! POST /transfer 与 /api/v1/transfer：校验 → 中继批次 → 统一响应体。
//! 批次在独立任务中运行；客户端断开时通过 drop guard 触发取消，批次在下一个跳边界停止。

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tokio_util::sync::CancellationToken;

use crate::{
    app_state::AppState,
    domain::transfer::BatchOutcome,
    infrastructure::log_redact::SensitiveRedact,
    service::{
        batch_reporter::{self, BatchResponse},
        request_validator::TransferPayload,
    },
};

fn reply(status: StatusCode, body: BatchResponse) -> Response {
    (status, Json(body)).into_response()
}

fn respond(outcome: &BatchOutcome) -> Response {
    let (status, body) = batch_reporter::report(outcome);
    reply(status, body)
}

/// 批次超时后触发取消；批次先结束时 token 被 drop guard 取消，定时任务随之退出
fn spawn_batch_deadline(cancel: CancellationToken, limit: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(limit) => {
                tracing::warn!(timeout_secs = limit.as_secs(), "Relay batch deadline reached, cancelling");
                cancel.cancel();
            }
        }
    });
}

/// 执行一次中继转账批次
#[utoipa::path(
    post,
    path = "/api/v1/transfer",
    request_body = TransferPayload,
    responses(
        (status = 200, description = "All transfers confirmed", body = BatchResponse),
        (status = 400, description = "Request rejected before any on-chain action", body = BatchResponse),
        (status = 500, description = "Batch aborted; confirmed transfers are listed", body = BatchResponse),
        (status = 502, description = "No RPC endpoint reachable", body = BatchResponse)
    ),
    tag = "transfer"
)]
pub async fn transfer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TransferPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Malformed /transfer body");
            return reply(
                StatusCode::BAD_REQUEST,
                BatchResponse::failure(rejection.body_text()),
            );
        }
    };

    tracing::info!(request = %payload.redact(), "Received /transfer request");

    let validated = match state.validator.validate(&payload) {
        Ok(validated) => validated,
        Err(e) => {
            tracing::warn!(error = %e, "Transfer request rejected");
            return respond(&BatchOutcome::rejected(e));
        }
    };
    // 私钥已复制进 Zeroizing 容器，请求体尽早清零
    drop(payload);

    let chain = validated.chain().clone();
    let request = match validated.into_request() {
        Ok(request) => request,
        Err(e) => return respond(&BatchOutcome::rejected(e)),
    };

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    if let Some(limit) = state.config.relay.batch_timeout() {
        spawn_batch_deadline(cancel.clone(), limit);
    }

    let orchestrator = state.orchestrator.clone();
    let batch = tokio::spawn(async move { orchestrator.run(&chain, request, cancel).await });

    match batch.await {
        Ok(outcome) => respond(&outcome),
        Err(e) => {
            tracing::error!(error = %e, "Relay batch task failed");
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                BatchResponse::failure("Relay batch task failed"),
            )
        }
    }
}
