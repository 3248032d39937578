//! 中继编排器
//!
//! 按钱包序号严格串行执行：钱包 i 付款给收款人 i，确认后把剩余余额（扣除 gas）
//! 转给钱包 i+1，再进入下一跳。任何一步失败立即中止，已确认的交易作为部分结果返回。
//!
//! 取消只在跳与跳之间生效（包括跳间暂停期间），不会打断已广播的交易。

use std::{sync::Arc, time::Duration};

use ethers::types::{Address, U256};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    config::{DispatchPolicy, RelayConfig},
    domain::{
        batch_error::BatchError,
        chain_directory::ChainProfile,
        transfer::{
            BatchOutcome, BatchState, HopPhase, PlannedTransaction, TransferRequest,
            TransferResult, WalletHandle,
        },
    },
    infrastructure::rpc_selector::EndpointResolver,
    service::{
        gas_calculator,
        ledger_client::{LedgerClient, LedgerError},
    },
};

/// 编排参数
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    pub hop_delay: Duration,
    pub confirmations: usize,
    pub policy: DispatchPolicy,
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            hop_delay: config.hop_delay(),
            confirmations: config.confirmations.max(1),
            policy: config.dispatch_policy,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            hop_delay: Duration::from_millis(1000),
            confirmations: 1,
            policy: DispatchPolicy::Relay,
        }
    }
}

fn advance(state: &mut BatchState, next: BatchState) {
    debug_assert!(
        state.can_transition_to(&next),
        "illegal transition {:?} -> {:?}",
        state,
        next
    );
    tracing::debug!(from = ?state, to = ?next, "relay_state_transition");
    *state = next;
}

/// 单个批次的运行上下文
struct Batch<'a> {
    ledger: &'a dyn LedgerClient,
    request: &'a TransferRequest,
    state: BatchState,
    results: Vec<TransferResult>,
}

impl Batch<'_> {
    fn enter(&mut self, next: BatchState) {
        advance(&mut self.state, next);
    }

    /// 并发读取余额、gas 价格和 gas 估算
    async fn quote(
        &self,
        index: usize,
        phase: HopPhase,
        wallet: Address,
        estimate_from: Option<Address>,
        to: Address,
        value: U256,
    ) -> Result<(U256, U256, U256), BatchError> {
        tokio::try_join!(
            self.ledger.balance_of(wallet),
            self.ledger.gas_price(),
            self.ledger.estimate_gas(estimate_from, to, value),
        )
        .map_err(|e| BatchError::from_ledger(index, phase, e))
    }
}

pub struct RelayOrchestrator {
    resolver: Arc<dyn EndpointResolver>,
    settings: RelaySettings,
}

impl RelayOrchestrator {
    pub fn new(resolver: Arc<dyn EndpointResolver>, settings: RelaySettings) -> Self {
        Self { resolver, settings }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// 执行一个批次。每个批次有独立的 batch_id 日志 span。
    pub async fn run(
        &self,
        chain: &ChainProfile,
        request: TransferRequest,
        cancel: CancellationToken,
    ) -> BatchOutcome {
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "relay_batch",
            %batch_id,
            chain_id = chain.chain_id,
            receivers = request.receivers.len(),
        );

        self.run_batch(chain, request, cancel).instrument(span).await
    }

    async fn run_batch(
        &self,
        chain: &ChainProfile,
        request: TransferRequest,
        cancel: CancellationToken,
    ) -> BatchOutcome {
        let mut state = BatchState::Idle;
        advance(&mut state, BatchState::Validating);

        if let Err(reason) = request.check_invariants(chain) {
            advance(&mut state, BatchState::Aborted);
            tracing::warn!(error = %reason, "Batch rejected");
            return BatchOutcome::rejected(reason);
        }

        let ledger = match self.resolver.resolve(chain).await {
            Ok(ledger) => ledger,
            Err(e) => {
                advance(&mut state, BatchState::Aborted);
                tracing::error!(error = %e, "Failed to connect to network");
                return BatchOutcome::rejected(BatchError::Connectivity(e));
            }
        };

        tracing::info!(
            endpoint = ledger.endpoint(),
            policy = ?self.settings.policy,
            wallets = request.wallets.len(),
            "🚀 Starting relay batch"
        );

        let mut batch = Batch {
            ledger: ledger.as_ref(),
            request: &request,
            state,
            results: Vec::with_capacity(request.hop_count() * 2),
        };

        match self.drive(&mut batch, &cancel).await {
            Ok(()) => {
                batch.enter(BatchState::Completed);
                tracing::info!(transactions = batch.results.len(), "✅ Relay batch completed");
                BatchOutcome::Success {
                    results: batch.results,
                }
            }
            Err(reason) => {
                batch.enter(BatchState::Aborted);
                tracing::error!(
                    error = %reason,
                    code = reason.code(),
                    confirmed = batch.results.len(),
                    "Relay batch aborted"
                );
                BatchOutcome::Failure {
                    partial_results: batch.results,
                    reason,
                }
            }
        }
    }

    async fn drive(&self, batch: &mut Batch<'_>, cancel: &CancellationToken) -> Result<(), BatchError> {
        let hops = batch.request.hop_count();

        for index in 0..hops {
            if index > 0 {
                self.pause_between_hops(index, cancel).await?;
            } else if cancel.is_cancelled() {
                return Err(BatchError::Cancelled { next_index: 0 });
            }

            batch.enter(BatchState::PerHop {
                index,
                phase: HopPhase::Payout,
            });
            let result = self.payout(batch, index).await?;
            batch.results.push(result);

            // 最后一跳没有 relay
            if self.settings.policy == DispatchPolicy::Relay && index + 1 < hops {
                batch.enter(BatchState::PerHop {
                    index,
                    phase: HopPhase::Relay,
                });
                let result = self.relay(batch, index).await?;
                batch.results.push(result);
            }
        }

        Ok(())
    }

    async fn pause_between_hops(
        &self,
        next_index: usize,
        cancel: &CancellationToken,
    ) -> Result<(), BatchError> {
        if cancel.is_cancelled() {
            return Err(BatchError::Cancelled { next_index });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BatchError::Cancelled { next_index }),
            _ = tokio::time::sleep(self.settings.hop_delay) => Ok(()),
        }
    }

    /// 钱包 i → 收款人 i，金额 payout_amount
    async fn payout(&self, batch: &Batch<'_>, index: usize) -> Result<TransferResult, BatchError> {
        let phase = HopPhase::Payout;
        let wallet = &batch.request.wallets[index];
        let receiver = batch.request.receivers[index];
        let amount = batch.request.payout_amount;

        // 估算不带 from：余额不足由下面的 affordability 判定，而不是节点的估算错误
        let (balance, gas_price, gas_limit) = batch
            .quote(index, phase, wallet.address(), None, receiver, amount)
            .await?;

        let check = gas_calculator::affordability(balance, gas_price, gas_limit, amount);
        if !check.ok {
            tracing::warn!(
                wallet_index = index,
                balance = %balance,
                required = %check.total_cost,
                "Insufficient balance for payout"
            );
            return Err(BatchError::InsufficientBalance {
                wallet_index: index,
                phase,
                required: check.total_cost,
                available: balance,
            });
        }

        self.send(batch, index, phase, wallet, receiver, amount, gas_limit, gas_price)
            .await
    }

    /// 钱包 i → 钱包 i+1，金额为剩余余额减去 gas
    async fn relay(&self, batch: &Batch<'_>, index: usize) -> Result<TransferResult, BatchError> {
        let phase = HopPhase::Relay;
        let wallet = &batch.request.wallets[index];
        let next_wallet = batch.request.wallets[index + 1].address();

        // 估算时 value 取 0：转账 gas 与金额无关，且此时还不知道最终金额
        let (balance, gas_price, gas_limit) = batch
            .quote(
                index,
                phase,
                wallet.address(),
                Some(wallet.address()),
                next_wallet,
                U256::zero(),
            )
            .await?;

        let amount = gas_calculator::relay_amount(balance, gas_price, gas_limit).ok_or_else(|| {
            tracing::warn!(wallet_index = index, balance = %balance, "No relayable balance after payout");
            BatchError::NoRelayableBalance {
                wallet_index: index,
            }
        })?;

        self.send(batch, index, phase, wallet, next_wallet, amount, gas_limit, gas_price)
            .await
    }

    /// nonce → 签名 → 广播 → 等待确认 → 检查 receipt
    #[allow(clippy::too_many_arguments)]
    async fn send(
        &self,
        batch: &Batch<'_>,
        index: usize,
        phase: HopPhase,
        wallet: &WalletHandle,
        to: Address,
        value: U256,
        gas_limit: U256,
        gas_price: U256,
    ) -> Result<TransferResult, BatchError> {
        let ledger_err = |e: LedgerError| BatchError::from_ledger(index, phase, e);

        let nonce = batch
            .ledger
            .pending_nonce(wallet.address())
            .await
            .map_err(ledger_err)?;

        let planned = PlannedTransaction {
            from: wallet.address(),
            to,
            value,
            gas_limit,
            gas_price,
            nonce,
            chain_id: batch.request.chain_id,
        };

        let signed = wallet
            .signer()
            .sign(&planned)
            .await
            .map_err(|source| BatchError::Signing {
                wallet_index: index,
                source,
            })?;

        let tx_hash = batch.ledger.submit(signed).await.map_err(ledger_err)?;
        tracing::info!(
            wallet_index = index,
            %phase,
            from = ?planned.from,
            to = ?planned.to,
            value = %planned.value,
            nonce = %planned.nonce,
            tx_hash = ?tx_hash,
            "Transaction submitted, awaiting confirmation"
        );

        let confirmation = batch
            .ledger
            .await_confirmation(tx_hash, self.settings.confirmations)
            .await
            .map_err(ledger_err)?;

        if !confirmation.succeeded() {
            tracing::error!(wallet_index = index, %phase, tx_hash = ?tx_hash, "Transaction reverted");
            return Err(BatchError::TransactionFailed {
                wallet_index: index,
                phase,
                tx_hash,
            });
        }

        tracing::info!(
            wallet_index = index,
            %phase,
            tx_hash = ?tx_hash,
            block = ?confirmation.block_number,
            "✅ Transaction confirmed"
        );

        Ok(TransferResult {
            wallet_index: index,
            phase,
            receiver: to,
            sender: planned.from,
            tx_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::signer::LocalKeySigner;

    struct UnreachableResolver;

    #[async_trait::async_trait]
    impl EndpointResolver for UnreachableResolver {
        async fn resolve(
            &self,
            chain: &ChainProfile,
        ) -> Result<Arc<dyn LedgerClient>, LedgerError> {
            Err(LedgerError::AllEndpointsUnreachable {
                chain_id: chain.chain_id,
                attempted: chain.endpoints.len(),
            })
        }
    }

    fn chain() -> ChainProfile {
        ChainProfile {
            chain_id: 31337,
            name: "Local".into(),
            endpoints: vec!["http://127.0.0.1:1".into()],
        }
    }

    fn orchestrator() -> RelayOrchestrator {
        RelayOrchestrator::new(Arc::new(UnreachableResolver), RelaySettings::default())
    }

    #[test]
    fn test_validating_precedes_rejection() {
        let mut state = BatchState::Idle;
        advance(&mut state, BatchState::Validating);
        advance(&mut state, BatchState::Aborted);
        assert_eq!(state, BatchState::Aborted);
    }

    #[tokio::test]
    async fn test_invariant_rejection_path() {
        let request = TransferRequest {
            chain_id: 31337,
            payout_amount: U256::from(1u64),
            receivers: vec![Address::from_low_u64_be(1)],
            wallets: vec![],
        };
        let outcome = orchestrator()
            .run(&chain(), request, CancellationToken::new())
            .await;
        assert!(matches!(outcome.reason(), Some(BatchError::Validation(_))));
    }

    #[tokio::test]
    async fn test_connectivity_rejection_path() {
        let signer = LocalKeySigner::from_private_key(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        let request = TransferRequest {
            chain_id: 31337,
            payout_amount: U256::from(1u64),
            receivers: vec![Address::from_low_u64_be(1)],
            wallets: vec![WalletHandle::new(Box::new(signer))],
        };
        let outcome = orchestrator()
            .run(&chain(), request, CancellationToken::new())
            .await;
        assert!(matches!(outcome.reason(), Some(BatchError::Connectivity(_))));
        assert!(outcome.results().is_empty());
    }

    #[test]
    fn test_settings_from_config() {
        let config = RelayConfig {
            hop_delay_ms: 250,
            confirmations: 0,
            dispatch_policy: DispatchPolicy::Direct,
            ..RelayConfig::default()
        };
        let settings = RelaySettings::from(&config);
        assert_eq!(settings.hop_delay, Duration::from_millis(250));
        // 至少一个确认
        assert_eq!(settings.confirmations, 1);
        assert_eq!(settings.policy, DispatchPolicy::Direct);
    }
}
