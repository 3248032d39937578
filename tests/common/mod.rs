//! 测试辅助模块
//! 内存账本：模拟余额、nonce、gas 与 receipt，供编排器和 API 测试使用

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use ethers::{
    types::{Address, Bytes, Transaction, H256, U256},
    utils::rlp,
};
use relaycore::{
    config::DispatchPolicy,
    domain::{
        chain_directory::ChainProfile,
        transfer::{PlannedTransaction, TransferRequest, WalletHandle},
    },
    infrastructure::rpc_selector::EndpointResolver,
    service::{
        ledger_client::{Confirmation, LedgerClient, LedgerError, ReceiptStatus},
        relay_orchestrator::{RelayOrchestrator, RelaySettings},
        signer::{SigningError, TransactionSigner},
    },
};

pub const CHAIN_ID: u64 = 31337;
pub const GAS_PRICE: u64 = 1_000_000_000; // 1 gwei
pub const GAS_LIMIT: u64 = 21_000;

/// 0.001 ether
pub fn payout() -> U256 {
    U256::exp10(15)
}

pub fn gas_cost() -> U256 {
    U256::from(GAS_PRICE) * U256::from(GAS_LIMIT)
}

/// 让 N 跳中继恰好跑完所需的初始资金（最后一个钱包剩余 `extra`）
pub fn exact_funding(hops: usize, extra: U256) -> U256 {
    payout() * U256::from(hops) + gas_cost() * U256::from(2 * hops - 1) + extra
}

pub fn local_chain() -> ChainProfile {
    ChainProfile {
        chain_id: CHAIN_ID,
        name: "Local Devnet".into(),
        endpoints: vec!["http://mock-ledger".into()],
    }
}

pub fn receiver(i: usize) -> Address {
    Address::from_low_u64_be(0xdead_0000 + i as u64)
}

pub fn mock_wallet_address(i: usize) -> Address {
    Address::from_low_u64_be(0x1000 + i as u64)
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, U256>,
    receipts: HashMap<H256, ReceiptStatus>,
    submitted: Vec<PlannedTransaction>,
    reverts: HashSet<(Address, U256)>,
    fail_estimation: bool,
    confirmation_error: Option<LedgerError>,
}

/// 内存账本
pub struct MockLedger {
    state: Mutex<LedgerState>,
    gas_price: U256,
    gas_limit: U256,
    calls: AtomicUsize,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            gas_price: U256::from(GAS_PRICE),
            gas_limit: U256::from(GAS_LIMIT),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fund(&self, address: Address, amount: U256) {
        let mut state = self.state.lock().unwrap();
        *state.balances.entry(address).or_default() += amount;
    }

    pub fn balance(&self, address: Address) -> U256 {
        let state = self.state.lock().unwrap();
        state.balances.get(&address).copied().unwrap_or_default()
    }

    pub fn submitted(&self) -> Vec<PlannedTransaction> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn submitted_count(&self) -> usize {
        self.state.lock().unwrap().submitted.len()
    }

    /// 指定 (发送方, nonce) 的交易上链但 receipt 失败
    pub fn revert_tx(&self, sender: Address, nonce: u64) {
        self.state
            .lock()
            .unwrap()
            .reverts
            .insert((sender, U256::from(nonce)));
    }

    pub fn fail_estimation(&self) {
        self.state.lock().unwrap().fail_estimation = true;
    }

    pub fn fail_confirmation(&self, err: LedgerError) {
        self.state.lock().unwrap().confirmation_error = Some(err);
    }

    /// 账本方法被调用的总次数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    /// MockSigner 输出 JSON；LocalKeySigner 输出 RLP
    fn decode(&self, raw: &[u8]) -> Result<PlannedTransaction, LedgerError> {
        if let Ok(planned) = serde_json::from_slice::<PlannedTransaction>(raw) {
            return Ok(planned);
        }

        let tx: Transaction =
            rlp::decode(raw).map_err(|e| LedgerError::Rpc(format!("invalid rlp: {}", e)))?;
        let from = tx
            .recover_from()
            .map_err(|e| LedgerError::Rpc(format!("invalid signature: {}", e)))?;

        Ok(PlannedTransaction {
            from,
            to: tx.to.unwrap_or_default(),
            value: tx.value,
            gas_limit: tx.gas,
            gas_price: tx.gas_price.unwrap_or_default(),
            nonce: tx.nonce,
            chain_id: tx.chain_id.map(|c| c.as_u64()).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn endpoint(&self) -> &str {
        "http://mock-ledger"
    }

    async fn balance_of(&self, address: Address) -> Result<U256, LedgerError> {
        self.touch();
        Ok(self.balance(address))
    }

    async fn gas_price(&self) -> Result<U256, LedgerError> {
        self.touch();
        Ok(self.gas_price)
    }

    async fn estimate_gas(
        &self,
        from: Option<Address>,
        _to: Address,
        value: U256,
    ) -> Result<U256, LedgerError> {
        self.touch();
        let state = self.state.lock().unwrap();
        if state.fail_estimation {
            return Err(LedgerError::EstimationFailed("execution reverted".into()));
        }
        // 与 geth/anvil 一致：带发送方估算时，余额低于 value 直接报错
        if let Some(from) = from {
            let balance = state.balances.get(&from).copied().unwrap_or_default();
            if balance < value {
                return Err(LedgerError::EstimationFailed(
                    "insufficient funds for transfer".into(),
                ));
            }
        }
        Ok(self.gas_limit)
    }

    async fn pending_nonce(&self, address: Address) -> Result<U256, LedgerError> {
        self.touch();
        let state = self.state.lock().unwrap();
        Ok(state.nonces.get(&address).copied().unwrap_or_default())
    }

    async fn submit(&self, signed: Bytes) -> Result<H256, LedgerError> {
        self.touch();
        let tx = self.decode(&signed)?;
        let mut state = self.state.lock().unwrap();

        if tx.chain_id != CHAIN_ID {
            return Err(LedgerError::Rpc("invalid chain id".into()));
        }
        let expected_nonce = state.nonces.get(&tx.from).copied().unwrap_or_default();
        if tx.nonce != expected_nonce {
            return Err(LedgerError::Rpc(format!(
                "nonce mismatch: expected {}, got {}",
                expected_nonce, tx.nonce
            )));
        }

        let fee = tx.gas_price * tx.gas_limit;
        let balance = state.balances.get(&tx.from).copied().unwrap_or_default();
        if balance < fee + tx.value {
            return Err(LedgerError::Rpc(
                "insufficient funds for gas * price + value".into(),
            ));
        }

        let reverted = state.reverts.contains(&(tx.from, tx.nonce));
        // 失败的交易同样消耗 gas，但不转移金额
        let debit = if reverted { fee } else { fee + tx.value };
        state.balances.insert(tx.from, balance - debit);
        if !reverted {
            *state.balances.entry(tx.to).or_default() += tx.value;
        }
        state.nonces.insert(tx.from, expected_nonce + 1);

        state.submitted.push(tx);
        let tx_hash = H256::from_low_u64_be(state.submitted.len() as u64);
        let status = if reverted {
            ReceiptStatus::Failure
        } else {
            ReceiptStatus::Success
        };
        state.receipts.insert(tx_hash, status);

        Ok(tx_hash)
    }

    async fn await_confirmation(
        &self,
        tx_hash: H256,
        _confirmations: usize,
    ) -> Result<Confirmation, LedgerError> {
        self.touch();
        let state = self.state.lock().unwrap();
        if let Some(err) = &state.confirmation_error {
            return Err(err.clone());
        }

        let status = *state
            .receipts
            .get(&tx_hash)
            .ok_or(LedgerError::Dropped { tx_hash })?;
        Ok(Confirmation {
            tx_hash,
            status,
            block_number: Some(state.submitted.len() as u64),
            gas_used: Some(self.gas_limit),
        })
    }
}

/// 测试签名器：把交易序列化为 JSON 作为“签名”结果
pub struct MockSigner {
    address: Address,
}

impl MockSigner {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign(&self, tx: &PlannedTransaction) -> Result<Bytes, SigningError> {
        if tx.from != self.address {
            return Err(SigningError::SenderMismatch {
                expected: self.address,
                actual: tx.from,
            });
        }
        serde_json::to_vec(tx)
            .map(Bytes::from)
            .map_err(|e| SigningError::Signature(e.to_string()))
    }
}

pub fn mock_wallet(i: usize) -> WalletHandle {
    WalletHandle::new(Box::new(MockSigner::new(mock_wallet_address(i))))
}

/// N 个收款人 + M 个钱包的请求
pub fn request(receivers: usize, wallets: usize) -> TransferRequest {
    request_with_offset(receivers, wallets, 0)
}

/// 钱包地址从 `offset` 开始编号，便于同一账本上并发多个批次
pub fn request_with_offset(receivers: usize, wallets: usize, offset: usize) -> TransferRequest {
    TransferRequest {
        chain_id: CHAIN_ID,
        payout_amount: payout(),
        receivers: (0..receivers).map(|i| receiver(offset + i)).collect(),
        wallets: (0..wallets).map(|i| mock_wallet(offset + i)).collect(),
    }
}

/// 固定返回同一个内存账本（或模拟所有端点不可达）
pub struct MockResolver {
    ledger: Option<Arc<MockLedger>>,
    resolves: AtomicUsize,
}

impl MockResolver {
    pub fn new(ledger: Arc<MockLedger>) -> Self {
        Self {
            ledger: Some(ledger),
            resolves: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            ledger: None,
            resolves: AtomicUsize::new(0),
        }
    }

    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EndpointResolver for MockResolver {
    async fn resolve(&self, chain: &ChainProfile) -> Result<Arc<dyn LedgerClient>, LedgerError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        match &self.ledger {
            Some(ledger) => Ok(ledger.clone() as Arc<dyn LedgerClient>),
            None => Err(LedgerError::AllEndpointsUnreachable {
                chain_id: chain.chain_id,
                attempted: chain.endpoints.len(),
            }),
        }
    }
}

pub fn fast_settings(policy: DispatchPolicy) -> RelaySettings {
    RelaySettings {
        hop_delay: Duration::ZERO,
        confirmations: 1,
        policy,
    }
}

pub fn orchestrator(resolver: Arc<MockResolver>, settings: RelaySettings) -> RelayOrchestrator {
    RelayOrchestrator::new(resolver, settings)
}
