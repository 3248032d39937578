//! 日志脱敏
//! 转账请求进入日志前统一经过这里：私钥只记录数量，地址只保留首尾

use serde::Serialize;
use serde_json::Value;

use crate::service::request_validator::TransferPayload;

/// 可脱敏trait
pub trait SensitiveRedact {
    fn redact(&self) -> String;
}

/// 脱敏地址（显示前6位和后4位）
///
/// 在校验之前调用，输入可能是任意字符串，按字符而非字节截取
pub fn redact_address(address: &str) -> String {
    let len = address.chars().count();
    if len < 10 {
        return "*".repeat(len);
    }

    let prefix: String = address.chars().take(6).collect();
    let suffix: String = address.chars().skip(len - 4).collect();
    format!("{}...{}", prefix, suffix)
}

/// 转账请求脱敏
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedTransferPayload<'a> {
    pub chain_id: Option<&'a Value>,
    pub payout_amount: Option<&'a Value>,
    pub amount_per_wallet: Option<&'a Value>,
    pub receivers: Vec<String>,
    pub wallet_count: usize,
    // ❌ 不包含：wallets（私钥）
}

impl SensitiveRedact for TransferPayload {
    fn redact(&self) -> String {
        serde_json::to_string(&RedactedTransferPayload {
            chain_id: self.chain_id.as_ref(),
            payout_amount: self.payout_amount.as_ref(),
            amount_per_wallet: self.amount_per_wallet.as_ref(),
            receivers: self
                .receivers
                .iter()
                .flatten()
                .map(|r| redact_address(r))
                .collect(),
            wallet_count: self.wallets.as_ref().map_or(0, Vec::len),
        })
        .unwrap_or_else(|_| "{ redacted }".to_string())
    }
}
