//! 中继转账领域模型
//!
//! 一个批次 = N 个收款人 + 至少 N 个一次性钱包。
//! 钱包 i 先向收款人 i 付款（payout），再把剩余余额扣除 gas 后转给钱包 i+1（relay）。

use std::fmt;

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{batch_error::BatchError, chain_directory::ChainProfile, ValidationError},
    service::signer::TransactionSigner,
};

/// 单跳内的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopPhase {
    Payout,
    Relay,
}

impl fmt::Display for HopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HopPhase::Payout => write!(f, "payout"),
            HopPhase::Relay => write!(f, "relay"),
        }
    }
}

/// 一次性钱包：地址 + 签名能力。私钥不出签名器。
pub struct WalletHandle {
    address: Address,
    signer: Box<dyn TransactionSigner>,
}

impl WalletHandle {
    pub fn new(signer: Box<dyn TransactionSigner>) -> Self {
        Self {
            address: signer.address(),
            signer,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &dyn TransactionSigner {
        self.signer.as_ref()
    }
}

impl fmt::Debug for WalletHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletHandle")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// 已通过校验的转账请求
#[derive(Debug)]
pub struct TransferRequest {
    pub chain_id: u64,
    /// 每个收款人收到的金额（wei）
    pub payout_amount: U256,
    pub receivers: Vec<Address>,
    pub wallets: Vec<WalletHandle>,
}

impl TransferRequest {
    /// 参与中继链的跳数（多余的钱包不参与）
    pub fn hop_count(&self) -> usize {
        self.receivers.len()
    }

    /// 结构性约束：非空、钱包数足够、金额为正、链一致
    pub fn check_invariants(&self, chain: &ChainProfile) -> Result<(), BatchError> {
        if self.receivers.is_empty() {
            return Err(ValidationError::MissingField("receivers").into());
        }
        if self.wallets.len() < self.receivers.len() {
            return Err(ValidationError::InsufficientWallets {
                wallets: self.wallets.len(),
                receivers: self.receivers.len(),
            }
            .into());
        }
        if self.payout_amount.is_zero() {
            return Err(ValidationError::InvalidAmount("amount must be positive".into()).into());
        }
        if self.chain_id != chain.chain_id {
            return Err(ValidationError::UnknownChain(self.chain_id).into());
        }
        Ok(())
    }
}

/// 单笔待签名交易（legacy gas 定价）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTransaction {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub gas_limit: U256,
    pub gas_price: U256,
    pub nonce: U256,
    pub chain_id: u64,
}

/// 一笔已上链且 receipt 成功的转账
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    pub wallet_index: usize,
    pub phase: HopPhase,
    /// payout 时为收款人，relay 时为下一个钱包
    pub receiver: Address,
    pub sender: Address,
    pub tx_hash: H256,
}

/// 批次结果
#[derive(Debug)]
pub enum BatchOutcome {
    Success {
        results: Vec<TransferResult>,
    },
    Failure {
        partial_results: Vec<TransferResult>,
        reason: BatchError,
    },
}

impl BatchOutcome {
    pub fn rejected(reason: impl Into<BatchError>) -> Self {
        BatchOutcome::Failure {
            partial_results: Vec::new(),
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Success { .. })
    }

    /// 已确认的交易（成功时为全部，失败时为中止前的部分）
    pub fn results(&self) -> &[TransferResult] {
        match self {
            BatchOutcome::Success { results } => results,
            BatchOutcome::Failure {
                partial_results, ..
            } => partial_results,
        }
    }

    pub fn reason(&self) -> Option<&BatchError> {
        match self {
            BatchOutcome::Success { .. } => None,
            BatchOutcome::Failure { reason, .. } => Some(reason),
        }
    }
}

/// 批次状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Validating,
    PerHop { index: usize, phase: HopPhase },
    Completed,
    Aborted,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Completed | BatchState::Aborted)
    }

    /// 合法迁移：
    /// Idle → Validating → PerHop(0, payout) → [PerHop(i, relay) → PerHop(i+1, payout)]* → Completed
    /// 任意非终态 → Aborted
    pub fn can_transition_to(&self, next: &BatchState) -> bool {
        use BatchState::*;
        use HopPhase::*;

        match (self, next) {
            (s, Aborted) => !s.is_terminal(),
            (Idle, Validating) => true,
            (Validating, PerHop { index: 0, phase: Payout }) => true,
            (
                PerHop {
                    index: i,
                    phase: Payout,
                },
                PerHop {
                    index: j,
                    phase: Relay,
                },
            ) => i == j,
            (
                PerHop {
                    index: i,
                    phase: Relay,
                },
                PerHop {
                    index: j,
                    phase: Payout,
                },
            ) => *j == i + 1,
            // 直发模式：跳过 relay
            (
                PerHop {
                    index: i,
                    phase: Payout,
                },
                PerHop {
                    index: j,
                    phase: Payout,
                },
            ) => *j == i + 1,
            (PerHop { phase: Payout, .. }, Completed) => true,
            _ => false,
        }
    }
}
