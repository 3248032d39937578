//! 交易签名
//!
//! 签名器只暴露地址和 `sign`，私钥不离开签名器。

use std::fmt;

use async_trait::async_trait;
use ethers::{
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest},
};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::domain::transfer::PlannedTransaction;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Signer address mismatch: expected {expected:?}, got {actual:?}")]
    SenderMismatch { expected: Address, actual: Address },

    #[error("Failed to sign transaction: {0}")]
    Signature(String),
}

#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    /// 返回 RLP 编码的已签名交易
    async fn sign(&self, tx: &PlannedTransaction) -> Result<Bytes, SigningError>;
}

/// 本地私钥签名器（legacy EIP-155）
pub struct LocalKeySigner {
    wallet: LocalWallet,
}

impl LocalKeySigner {
    /// 接受 `0x` 前缀的 32 字节十六进制私钥
    pub fn from_private_key(key: &str) -> Result<Self, SigningError> {
        let hex_part = Zeroizing::new(key.trim().trim_start_matches("0x").to_string());
        let wallet = hex_part
            .parse::<LocalWallet>()
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self { wallet })
    }
}

impl fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.wallet.address())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TransactionSigner for LocalKeySigner {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn sign(&self, tx: &PlannedTransaction) -> Result<Bytes, SigningError> {
        if tx.from != self.wallet.address() {
            return Err(SigningError::SenderMismatch {
                expected: self.wallet.address(),
                actual: tx.from,
            });
        }

        let typed: TypedTransaction = TransactionRequest::new()
            .from(tx.from)
            .to(tx.to)
            .value(tx.value)
            .gas(tx.gas_limit)
            .gas_price(tx.gas_price)
            .nonce(tx.nonce)
            .chain_id(tx.chain_id)
            .into();

        let signature = self
            .wallet
            .clone()
            .with_chain_id(tx.chain_id)
            .sign_transaction(&typed)
            .await
            .map_err(|e| SigningError::Signature(e.to_string()))?;

        Ok(typed.rlp_signed(&signature))
    }
}
