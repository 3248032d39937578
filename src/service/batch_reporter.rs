//! 批次结果 → HTTP 响应
//!
//! 响应体只有一种形状：`{ success, transactions?, error? }`

use axum::http::StatusCode;
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    batch_error::BatchError,
    transfer::{BatchOutcome, TransferResult},
};

/// 一笔已确认交易
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransactionRecord {
    /// 收款方（payout 为收款人，relay 为下一个钱包）
    #[schema(example = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8")]
    pub receiver: String,
    #[schema(example = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060")]
    pub hash: String,
    #[schema(example = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")]
    pub sender: String,
}

impl From<&TransferResult> for TransactionRecord {
    fn from(result: &TransferResult) -> Self {
        Self {
            receiver: to_checksum(&result.receiver, None),
            hash: format!("{:?}", result.tx_hash),
            sender: to_checksum(&result.sender, None),
        }
    }
}

/// POST /transfer 响应体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<TransactionRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResponse {
    /// 仅包含错误信息的失败响应（请求体无法解析等）
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            transactions: None,
            error: Some(message.into()),
        }
    }
}

/// 中止原因 → HTTP 状态码
pub fn status_for(reason: &BatchError) -> StatusCode {
    match reason {
        BatchError::Validation(_) => StatusCode::BAD_REQUEST,
        BatchError::Connectivity(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 把批次结果渲染为 (状态码, 响应体)
///
/// 成功时 transactions 总是存在；失败时只有在已有确认交易时才附带
pub fn report(outcome: &BatchOutcome) -> (StatusCode, BatchResponse) {
    let records: Vec<TransactionRecord> =
        outcome.results().iter().map(TransactionRecord::from).collect();

    match outcome {
        BatchOutcome::Success { .. } => (
            StatusCode::OK,
            BatchResponse {
                success: true,
                transactions: Some(records),
                error: None,
            },
        ),
        BatchOutcome::Failure { reason, .. } => (
            status_for(reason),
            BatchResponse {
                success: false,
                transactions: (!records.is_empty()).then_some(records),
                error: Some(reason.to_string()),
            },
        ),
    }
}
