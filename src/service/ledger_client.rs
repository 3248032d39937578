//! 账本客户端
//!
//! 编排器只通过 `LedgerClient` 读写链上状态：余额、gas 价格、gas 估算、
//! pending nonce、广播与确认等待。生产实现基于 ethers `Provider<Http>`。

use std::time::Duration;

use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, PendingTransaction, Provider},
    types::{
        transaction::eip2718::TypedTransaction, Address, BlockNumber, Bytes, TransactionRequest,
        H256, U256,
    },
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("All RPCs failed for chainId {chain_id} ({attempted} endpoints tried)")]
    AllEndpointsUnreachable { chain_id: u64, attempted: usize },

    #[error("Gas estimation failed: {0}")]
    EstimationFailed(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Timed out waiting for confirmation of {tx_hash:?}")]
    ConfirmationTimeout { tx_hash: H256 },

    #[error("Transaction {tx_hash:?} was dropped before confirmation")]
    Dropped { tx_hash: H256 },
}

/// receipt 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Success,
    Failure,
}

/// 确认结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: H256,
    pub status: ReceiptStatus,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

impl Confirmation {
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// 当前使用的端点（日志用）
    fn endpoint(&self) -> &str;

    async fn balance_of(&self, address: Address) -> Result<U256, LedgerError>;

    async fn gas_price(&self) -> Result<U256, LedgerError>;

    /// `from` 为 `None` 时不带发送方估算：节点在发送方余额低于 `value` 时会直接拒绝估算
    async fn estimate_gas(
        &self,
        from: Option<Address>,
        to: Address,
        value: U256,
    ) -> Result<U256, LedgerError>;

    /// 包含 pending 交易的 nonce
    async fn pending_nonce(&self, address: Address) -> Result<U256, LedgerError>;

    /// 广播已签名交易，返回交易哈希
    async fn submit(&self, signed: Bytes) -> Result<H256, LedgerError>;

    /// 等待交易达到指定确认数并返回 receipt 状态
    async fn await_confirmation(
        &self,
        tx_hash: H256,
        confirmations: usize,
    ) -> Result<Confirmation, LedgerError>;
}

/// 基于 ethers Provider 的账本客户端
pub struct EthersLedgerClient {
    provider: Provider<Http>,
    endpoint: String,
    confirmation_timeout: Duration,
}

impl EthersLedgerClient {
    pub fn new(provider: Provider<Http>, endpoint: String, confirmation_timeout: Duration) -> Self {
        Self {
            provider,
            endpoint,
            confirmation_timeout,
        }
    }
}

#[async_trait]
impl LedgerClient for EthersLedgerClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn balance_of(&self, address: Address) -> Result<U256, LedgerError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| LedgerError::Rpc(format!("eth_getBalance failed: {}", e)))
    }

    async fn gas_price(&self) -> Result<U256, LedgerError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| LedgerError::Rpc(format!("eth_gasPrice failed: {}", e)))
    }

    async fn estimate_gas(
        &self,
        from: Option<Address>,
        to: Address,
        value: U256,
    ) -> Result<U256, LedgerError> {
        let mut request = TransactionRequest::new().to(to).value(value);
        if let Some(from) = from {
            request = request.from(from);
        }
        let tx: TypedTransaction = request.into();

        self.provider
            .estimate_gas(&tx, None)
            .await
            .map_err(|e| LedgerError::EstimationFailed(e.to_string()))
    }

    async fn pending_nonce(&self, address: Address) -> Result<U256, LedgerError> {
        self.provider
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| LedgerError::Rpc(format!("eth_getTransactionCount failed: {}", e)))
    }

    async fn submit(&self, signed: Bytes) -> Result<H256, LedgerError> {
        let pending = self
            .provider
            .send_raw_transaction(signed)
            .await
            .map_err(|e| LedgerError::Rpc(format!("eth_sendRawTransaction failed: {}", e)))?;

        Ok(pending.tx_hash())
    }

    async fn await_confirmation(
        &self,
        tx_hash: H256,
        confirmations: usize,
    ) -> Result<Confirmation, LedgerError> {
        let pending = PendingTransaction::new(tx_hash, &self.provider)
            .confirmations(confirmations.max(1))
            .interval(self.provider.get_interval());

        let receipt = tokio::time::timeout(self.confirmation_timeout, pending)
            .await
            .map_err(|_| LedgerError::ConfirmationTimeout { tx_hash })?
            .map_err(|e| LedgerError::Rpc(format!("receipt polling failed: {}", e)))?
            .ok_or(LedgerError::Dropped { tx_hash })?;

        let status = match receipt.status {
            Some(s) if s.as_u64() == 1 => ReceiptStatus::Success,
            _ => ReceiptStatus::Failure,
        };

        Ok(Confirmation {
            tx_hash,
            status,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            gas_used: receipt.gas_used,
        })
    }
}
