//! Gas 成本计算
//!
//! 纯函数，所有运算使用 U256 精确整数（wei），溢出视为不可负担。

use ethers::types::U256;

/// 余额是否足以支付 value + gas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordability {
    pub ok: bool,
    /// value + gas_price * gas_limit；溢出时为 U256::MAX
    pub total_cost: U256,
}

/// gas_price * gas_limit，溢出返回 None
pub fn gas_cost(gas_price: U256, gas_limit: U256) -> Option<U256> {
    gas_price.checked_mul(gas_limit)
}

/// 检查 balance >= value + gas_price * gas_limit
pub fn affordability(
    balance: U256,
    gas_price: U256,
    gas_limit: U256,
    value: U256,
) -> Affordability {
    match gas_cost(gas_price, gas_limit).and_then(|gas| gas.checked_add(value)) {
        Some(total_cost) => Affordability {
            ok: balance >= total_cost,
            total_cost,
        },
        None => Affordability {
            ok: false,
            total_cost: U256::MAX,
        },
    }
}

/// 可转出的剩余余额：balance - gas_price * gas_limit，必须严格为正
pub fn relay_amount(balance: U256, gas_price: U256, gas_limit: U256) -> Option<U256> {
    gas_cost(gas_price, gas_limit)
        .and_then(|gas| balance.checked_sub(gas))
        .filter(|amount| !amount.is_zero())
}
