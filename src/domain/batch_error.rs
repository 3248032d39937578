//! 批次错误分类
//!
//! 校验错误在任何链上操作前返回；其余错误都带有出错的钱包序号与阶段。

use ethers::types::{H256, U256};
use thiserror::Error;

use crate::{
    domain::transfer::HopPhase,
    service::{ledger_client::LedgerError, signer::SigningError},
};

/// 请求校验错误（按检查顺序排列）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid chainId: {0}")]
    MalformedChainId(String),

    #[error("Chain not found for chainId: {0}")]
    UnknownChain(u64),

    #[error("Not enough wallets: {wallets} wallets for {receivers} receivers")]
    InsufficientWallets { wallets: usize, receivers: usize },

    #[error("Invalid receiver address at index {index}: {address}")]
    InvalidReceiver { index: usize, address: String },

    #[error("Invalid wallet private key format at index {index}")]
    InvalidWalletKey { index: usize },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// 批次中止原因
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to connect to network: {0}")]
    Connectivity(#[source] LedgerError),

    #[error("Gas estimation failed for wallet {wallet_index} ({phase}): {message}")]
    EstimationFailed {
        wallet_index: usize,
        phase: HopPhase,
        message: String,
    },

    #[error(
        "Insufficient balance in wallet {wallet_index} ({phase}): need {required} wei, have {available} wei"
    )]
    InsufficientBalance {
        wallet_index: usize,
        phase: HopPhase,
        required: U256,
        available: U256,
    },

    #[error("No relayable balance left in wallet {wallet_index} after payout")]
    NoRelayableBalance { wallet_index: usize },

    #[error("Transaction failed for wallet {wallet_index} ({phase}), hash: {tx_hash:?}")]
    TransactionFailed {
        wallet_index: usize,
        phase: HopPhase,
        tx_hash: H256,
    },

    #[error("Signing failed for wallet {wallet_index}: {source}")]
    Signing {
        wallet_index: usize,
        #[source]
        source: SigningError,
    },

    #[error("RPC error for wallet {wallet_index} ({phase}): {source}")]
    Ledger {
        wallet_index: usize,
        phase: HopPhase,
        #[source]
        source: LedgerError,
    },

    #[error("Batch cancelled before hop {next_index}")]
    Cancelled { next_index: usize },
}

impl BatchError {
    /// 出错的钱包序号（校验/连接类错误没有）
    pub fn wallet_index(&self) -> Option<usize> {
        match self {
            BatchError::EstimationFailed { wallet_index, .. }
            | BatchError::InsufficientBalance { wallet_index, .. }
            | BatchError::NoRelayableBalance { wallet_index }
            | BatchError::TransactionFailed { wallet_index, .. }
            | BatchError::Signing { wallet_index, .. }
            | BatchError::Ledger { wallet_index, .. } => Some(*wallet_index),
            BatchError::Validation(_)
            | BatchError::Connectivity(_)
            | BatchError::Cancelled { .. } => None,
        }
    }

    /// 稳定的错误码（日志/响应使用）
    pub fn code(&self) -> &'static str {
        match self {
            BatchError::Validation(_) => "validation_failed",
            BatchError::Connectivity(_) => "network_unreachable",
            BatchError::EstimationFailed { .. } => "gas_estimation_failed",
            BatchError::InsufficientBalance { .. } => "insufficient_balance",
            BatchError::NoRelayableBalance { .. } => "no_relayable_balance",
            BatchError::TransactionFailed { .. } => "transaction_failed",
            BatchError::Signing { .. } => "signing_failed",
            BatchError::Ledger { .. } => "rpc_error",
            BatchError::Cancelled { .. } => "cancelled",
        }
    }

    /// 将账本错误归类：估算失败单独成类，其余视为 RPC 错误
    pub fn from_ledger(wallet_index: usize, phase: HopPhase, err: LedgerError) -> Self {
        match err {
            LedgerError::EstimationFailed(message) => BatchError::EstimationFailed {
                wallet_index,
                phase,
                message,
            },
            source => BatchError::Ledger {
                wallet_index,
                phase,
                source,
            },
        }
    }
}
