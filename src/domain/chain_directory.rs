//! 链目录模块
//!
//! 启动时从 chains.json 加载一次，之后只读（并发读取无需加锁）

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// chains.json 中的 rpc 字段：单个URL或URL列表
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RpcField {
    Single(String),
    Many(Vec<String>),
}

impl RpcField {
    fn into_urls(self) -> Vec<String> {
        match self {
            RpcField::Single(url) => vec![url],
            RpcField::Many(urls) => urls,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainRecord {
    chain_id: u64,
    name: String,
    rpc: RpcField,
}

#[derive(Debug, Deserialize)]
struct ChainFile {
    chains: Vec<ChainRecord>,
}

/// 链配置（不可变）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainProfile {
    /// EIP-155 链 ID
    pub chain_id: u64,
    /// 链名称
    pub name: String,
    /// RPC 候选端点（按优先级排序）
    pub endpoints: Vec<String>,
}

/// 链目录
#[derive(Debug, Default)]
pub struct ChainDirectory {
    profiles: Vec<ChainProfile>,
    index: HashMap<u64, usize>,
}

impl ChainDirectory {
    /// 从链配置列表构建目录，chain_id 必须唯一
    pub fn from_profiles(profiles: impl IntoIterator<Item = ChainProfile>) -> Result<Self> {
        let mut directory = Self::default();
        for profile in profiles {
            if directory.index.contains_key(&profile.chain_id) {
                anyhow::bail!("Duplicate chainId in chain directory: {}", profile.chain_id);
            }
            let endpoints: Vec<String> = profile
                .endpoints
                .iter()
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .collect();
            if endpoints.is_empty() {
                anyhow::bail!("Chain {} ({}) has no RPC endpoints", profile.chain_id, profile.name);
            }
            directory
                .index
                .insert(profile.chain_id, directory.profiles.len());
            directory.profiles.push(ChainProfile {
                endpoints,
                ..profile
            });
        }
        Ok(directory)
    }

    /// 解析 `{"chains": [{chainId, name, rpc}]}` 格式
    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: ChainFile =
            serde_json::from_str(content).context("Failed to parse chain directory JSON")?;
        Self::from_profiles(file.chains.into_iter().map(|record| ChainProfile {
            chain_id: record.chain_id,
            name: record.name,
            endpoints: record.rpc.into_urls(),
        }))
    }

    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("chains.json not found at: {:?}", path.as_ref()))?;
        Self::from_json_str(&content)
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainProfile> {
        self.index.get(&chain_id).map(|&i| &self.profiles[i])
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.index.contains_key(&chain_id)
    }

    /// 按加载顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &ChainProfile> {
        self.profiles.iter()
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.profiles.iter().map(|p| p.chain_id).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const SAMPLE: &str = r#"{
        "chains": [
            { "chainId": 56, "name": "BNB Smart Chain", "rpc": "https://bsc-dataseed.binance.org" },
            { "chainId": 137, "name": "Polygon", "rpc": ["https://polygon-rpc.com", " ", "https://rpc.ankr.com/polygon"] }
        ]
    }"#;

    #[test]
    fn test_parse_single_and_list_rpc() {
        let directory = ChainDirectory::from_json_str(SAMPLE).unwrap();
        assert_eq!(directory.len(), 2);

        let bsc = directory.get(56).unwrap();
        assert_eq!(bsc.endpoints, vec!["https://bsc-dataseed.binance.org"]);

        // 空白端点被过滤，顺序保留
        let polygon = directory.get(137).unwrap();
        assert_eq!(
            polygon.endpoints,
            vec!["https://polygon-rpc.com", "https://rpc.ankr.com/polygon"]
        );
        assert_eq!(directory.chain_ids(), vec![56, 137]);
    }

    #[test]
    fn test_unknown_chain() {
        let directory = ChainDirectory::from_json_str(SAMPLE).unwrap();
        assert!(directory.get(1).is_none());
        assert!(!directory.contains(1));
    }

    #[test]
    fn test_duplicate_chain_id_rejected() {
        let json = r#"{"chains": [
            {"chainId": 1, "name": "a", "rpc": "https://a"},
            {"chainId": 1, "name": "b", "rpc": "https://b"}
        ]}"#;
        let err = ChainDirectory::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("Duplicate chainId"));
    }

    #[test]
    fn test_chain_without_endpoints_rejected() {
        let json = r#"{"chains": [{"chainId": 1, "name": "a", "rpc": []}]}"#;
        assert!(ChainDirectory::from_json_str(json).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();

        let directory = ChainDirectory::load(file.path()).unwrap();
        assert!(directory.contains(137));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ChainDirectory::load("/nonexistent/chains.json").unwrap_err();
        assert!(err.to_string().contains("chains.json not found"));
    }
}
