//! 地址验证模块
//!
//! EVM 地址格式校验（支持 EIP-55 Checksum）

use ethers::types::Address;
use once_cell::sync::Lazy;
use regex::Regex;

static PRIVATE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("private key pattern"));

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证EVM地址（支持EIP-55 Checksum）
    ///
    /// 全小写/全大写地址不做checksum校验；大小写混合时必须满足EIP-55
    pub fn validate_evm_address(address: &str) -> bool {
        // 1. 基本格式检查
        if !address.starts_with("0x") || address.len() != 42 {
            return false;
        }

        // 2. 验证hex字符
        let hex_part = &address[2..];
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }

        // 3. EIP-55 Checksum验证（大小写混合时）
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower {
            return Self::verify_eip55_checksum(address);
        }

        true
    }

    /// 校验并解析为 `Address`
    pub fn parse_evm_address(address: &str) -> Option<Address> {
        if !Self::validate_evm_address(address) {
            return None;
        }
        address.parse::<Address>().ok()
    }

    /// 私钥格式：`0x` + 64 位十六进制
    pub fn is_private_key_format(key: &str) -> bool {
        PRIVATE_KEY_RE.is_match(key)
    }

    /// 验证EIP-55 Checksum
    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(address: &str) -> bool {
        use sha3::{Digest, Keccak256};

        let addr_lower = address[2..].to_lowercase();
        let mut hasher = Keccak256::new();
        hasher.update(addr_lower.as_bytes());
        let hash = hasher.finalize();

        let hex_chars = &address[2..];
        for (i, ch) in hex_chars.chars().enumerate() {
            if ch.is_alphabetic() {
                let hash_byte = hash[i / 2];
                let hash_nibble = if i % 2 == 0 {
                    hash_byte >> 4
                } else {
                    hash_byte & 0x0f
                };

                let should_be_uppercase = hash_nibble >= 8;
                if ch.is_uppercase() != should_be_uppercase {
                    return false;
                }
            }
        }

        true
    }
}
