//! RPC 端点选择
//!
//! 按链目录中的顺序探测端点（eth_chainId + 超时），第一个可用且 chainId 一致的端点生成账本客户端。

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::U256,
};

use crate::{
    config::RelayConfig,
    domain::chain_directory::ChainProfile,
    service::ledger_client::{EthersLedgerClient, LedgerClient, LedgerError},
};

/// 为一条链挑选可用的 RPC 端点并返回账本客户端
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn resolve(&self, chain: &ChainProfile) -> Result<Arc<dyn LedgerClient>, LedgerError>;
}

/// 按配置顺序逐个探测端点，第一个响应且 chainId 匹配的端点胜出
pub struct RpcSelector {
    http_client: reqwest::Client,
    probe_timeout: Duration,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl RpcSelector {
    pub fn new(config: &RelayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.probe_timeout().max(Duration::from_secs(30)))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http_client: client,
            probe_timeout: config.probe_timeout(),
            poll_interval: config.poll_interval(),
            confirmation_timeout: config.confirmation_timeout(),
        }
    }

    fn build_provider(&self, url: &str) -> Result<Provider<Http>, String> {
        let parsed = reqwest::Url::parse(url).map_err(|e| format!("invalid url: {}", e))?;
        let http = Http::new_with_client(parsed, self.http_client.clone());
        Ok(Provider::new(http).interval(self.poll_interval))
    }

    /// 轻量探测：eth_chainId，必须在超时内返回且与目录中的 chainId 一致
    async fn probe(&self, url: &str, chain_id: u64) -> Result<Provider<Http>, String> {
        let provider = self.build_provider(url)?;

        let reported = tokio::time::timeout(self.probe_timeout, provider.get_chainid())
            .await
            .map_err(|_| format!("probe timed out after {:?}", self.probe_timeout))?
            .map_err(|e| e.to_string())?;

        if reported != U256::from(chain_id) {
            return Err(format!("chainId mismatch: endpoint reports {}", reported));
        }

        Ok(provider)
    }
}

/// 去除空白与重复端点，保持原顺序
pub fn ordered_candidates(chain: &ChainProfile) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::with_capacity(chain.endpoints.len());
    for url in chain.endpoints.iter().map(|u| u.trim()) {
        if !url.is_empty() && !seen.contains(&url) {
            seen.push(url);
        }
    }
    seen
}

#[async_trait]
impl EndpointResolver for RpcSelector {
    async fn resolve(&self, chain: &ChainProfile) -> Result<Arc<dyn LedgerClient>, LedgerError> {
        let candidates = ordered_candidates(chain);

        for url in &candidates {
            let start = Instant::now();
            match self.probe(url, chain.chain_id).await {
                Ok(provider) => {
                    tracing::info!(
                        chain_id = chain.chain_id,
                        endpoint = %url,
                        latency_ms = start.elapsed().as_millis() as u64,
                        "✅ Connected to RPC"
                    );
                    return Ok(Arc::new(EthersLedgerClient::new(
                        provider,
                        url.to_string(),
                        self.confirmation_timeout,
                    )));
                }
                Err(e) => {
                    tracing::warn!(
                        chain_id = chain.chain_id,
                        endpoint = %url,
                        error = %e,
                        "RPC failed, trying next"
                    );
                }
            }
        }

        tracing::error!(
            chain_id = chain.chain_id,
            attempted = candidates.len(),
            "All RPCs failed"
        );
        Err(LedgerError::AllEndpointsUnreachable {
            chain_id: chain.chain_id,
            attempted: candidates.len(),
        })
    }
}
