//! 转账请求校验
//!
//! 在任何链上操作之前完成全部检查；校验是纯函数，对同一输入重复调用结果一致。
//! 检查顺序：必填字段 → chainId 格式 → chainId 是否在目录中 → 钱包数量 → 地址/私钥格式 → 金额。

use std::{fmt, sync::Arc};

use ethers::{types::Address, utils::parse_ether};
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{
    domain::{
        batch_error::ValidationError,
        chain_directory::{ChainDirectory, ChainProfile},
        transfer::{TransferRequest, WalletHandle},
    },
    service::signer::LocalKeySigner,
    utils::address_validator::AddressValidator,
};

/// POST /transfer 请求体
///
/// 数值字段同时接受 JSON 数字和十进制字符串
#[derive(Default, Deserialize, ToSchema, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct TransferPayload {
    /// 链 ID（数字或字符串，支持 0x 十六进制）
    #[zeroize(skip)]
    #[schema(value_type = Option<Object>, example = json!(56))]
    pub chain_id: Option<Value>,

    /// 每个收款人收到的金额（wei）
    #[zeroize(skip)]
    #[schema(value_type = Option<Object>, example = json!("1000000000000000"))]
    pub payout_amount: Option<Value>,

    /// 每个收款人收到的金额（ether 十进制），payoutAmount 优先
    #[zeroize(skip)]
    #[schema(value_type = Option<Object>, example = json!("0.001"))]
    pub amount_per_wallet: Option<Value>,

    #[zeroize(skip)]
    pub receivers: Option<Vec<String>>,

    /// 一次性钱包私钥（0x + 64 hex），按顺序组成中继链
    pub wallets: Option<Vec<String>>,
}

impl fmt::Debug for TransferPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferPayload")
            .field("chain_id", &self.chain_id)
            .field("payout_amount", &self.payout_amount)
            .field("amount_per_wallet", &self.amount_per_wallet)
            .field("receivers", &self.receivers)
            .field("wallets", &self.wallets.as_ref().map(|w| w.len()))
            .finish()
    }
}

/// 校验通过的请求（私钥尚未转换为签名器）
pub struct ValidatedTransfer {
    chain: ChainProfile,
    payout_amount: ethers::types::U256,
    receivers: Vec<Address>,
    wallet_keys: Vec<Zeroizing<String>>,
}

impl fmt::Debug for ValidatedTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedTransfer")
            .field("chain_id", &self.chain.chain_id)
            .field("payout_amount", &self.payout_amount)
            .field("receivers", &self.receivers)
            .field("wallets", &self.wallet_keys.len())
            .finish()
    }
}

impl ValidatedTransfer {
    pub fn chain(&self) -> &ChainProfile {
        &self.chain
    }

    pub fn payout_amount(&self) -> ethers::types::U256 {
        self.payout_amount
    }

    pub fn receivers(&self) -> &[Address] {
        &self.receivers
    }

    pub fn wallet_count(&self) -> usize {
        self.wallet_keys.len()
    }

    /// 构建本地签名器；私钥随 `self` 一起被清零
    ///
    /// 格式正确但不是合法 secp256k1 标量的私钥（如全零）在这里被拒绝
    pub fn into_request(self) -> Result<TransferRequest, ValidationError> {
        let mut wallets = Vec::with_capacity(self.wallet_keys.len());
        for (index, key) in self.wallet_keys.iter().enumerate() {
            let signer = LocalKeySigner::from_private_key(key).map_err(|e| {
                tracing::warn!(wallet_index = index, error = %e, "Unusable wallet key");
                ValidationError::InvalidWalletKey { index }
            })?;
            wallets.push(WalletHandle::new(Box::new(signer)));
        }

        Ok(TransferRequest {
            chain_id: self.chain.chain_id,
            payout_amount: self.payout_amount,
            receivers: self.receivers.clone(),
            wallets,
        })
    }
}

/// 请求校验器
pub struct RequestValidator {
    directory: Arc<ChainDirectory>,
}

impl RequestValidator {
    pub fn new(directory: Arc<ChainDirectory>) -> Self {
        Self { directory }
    }

    pub fn validate(&self, payload: &TransferPayload) -> Result<ValidatedTransfer, ValidationError> {
        // 1. 必填字段
        let raw_chain_id = payload
            .chain_id
            .as_ref()
            .filter(|v| !is_blank(v))
            .ok_or(ValidationError::MissingField("chainId"))?;
        let raw_amount = payload
            .payout_amount
            .as_ref()
            .filter(|v| !is_blank(v))
            .map(|v| (v, AmountUnit::Wei))
            .or_else(|| {
                payload
                    .amount_per_wallet
                    .as_ref()
                    .filter(|v| !is_blank(v))
                    .map(|v| (v, AmountUnit::Ether))
            })
            .ok_or(ValidationError::MissingField("payoutAmount"))?;
        let receivers = payload
            .receivers
            .as_ref()
            .filter(|r| !r.is_empty())
            .ok_or(ValidationError::MissingField("receivers"))?;
        let wallets = payload
            .wallets
            .as_ref()
            .filter(|w| !w.is_empty())
            .ok_or(ValidationError::MissingField("wallets"))?;

        // 2. chainId 格式
        let chain_id = parse_chain_id(raw_chain_id)?;

        // 3. 链目录
        let chain = self
            .directory
            .get(chain_id)
            .ok_or(ValidationError::UnknownChain(chain_id))?;

        // 4. 钱包数量
        if wallets.len() < receivers.len() {
            return Err(ValidationError::InsufficientWallets {
                wallets: wallets.len(),
                receivers: receivers.len(),
            });
        }

        // 5. 地址与私钥格式
        let receivers = receivers
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                AddressValidator::parse_evm_address(raw.trim()).ok_or_else(|| {
                    ValidationError::InvalidReceiver {
                        index,
                        address: raw.clone(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let wallet_keys = wallets
            .iter()
            .enumerate()
            .map(|(index, key)| {
                let key = key.trim();
                if AddressValidator::is_private_key_format(key) {
                    Ok(Zeroizing::new(key.to_string()))
                } else {
                    Err(ValidationError::InvalidWalletKey { index })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        // 6. 金额
        let payout_amount = parse_amount(raw_amount.0, raw_amount.1)?;

        Ok(ValidatedTransfer {
            chain: chain.clone(),
            payout_amount,
            receivers,
            wallet_keys,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum AmountUnit {
    Wei,
    Ether,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn parse_chain_id(value: &Value) -> Result<u64, ValidationError> {
    let malformed = || ValidationError::MalformedChainId(value.to_string());

    match value {
        Value::Number(n) => n.as_u64().ok_or_else(malformed),
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                u64::from_str_radix(hex, 16).map_err(|_| malformed())
            } else {
                s.parse::<u64>().map_err(|_| malformed())
            }
        }
        _ => Err(malformed()),
    }
}

fn parse_amount(value: &Value, unit: AmountUnit) -> Result<ethers::types::U256, ValidationError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(ValidationError::InvalidAmount(other.to_string())),
    };

    if text.starts_with('-') {
        return Err(ValidationError::InvalidAmount(format!(
            "amount must be positive: {}",
            text
        )));
    }

    let amount = match unit {
        AmountUnit::Wei => ethers::types::U256::from_dec_str(&text)
            .map_err(|_| ValidationError::InvalidAmount(format!("not a wei integer: {}", text)))?,
        AmountUnit::Ether => parse_ether(&text)
            .map_err(|e| ValidationError::InvalidAmount(format!("{}: {}", text, e)))?,
    };

    if amount.is_zero() {
        return Err(ValidationError::InvalidAmount(
            "amount must be positive".into(),
        ));
    }

    Ok(amount)
}
