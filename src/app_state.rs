use std::sync::Arc;

use crate::{
    config::Config,
    domain::chain_directory::ChainDirectory,
    infrastructure::rpc_selector::{EndpointResolver, RpcSelector},
    service::{
        relay_orchestrator::{RelayOrchestrator, RelaySettings},
        request_validator::RequestValidator,
    },
};

/// 应用状态
/// 包含所有共享资源（启动后只读）
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chains: Arc<ChainDirectory>,
    pub validator: Arc<RequestValidator>,
    pub orchestrator: Arc<RelayOrchestrator>,
}

impl AppState {
    /// 创建新的应用状态（生产：RPC 端点探测）
    pub fn new(config: Arc<Config>, chains: Arc<ChainDirectory>) -> Self {
        let resolver: Arc<dyn EndpointResolver> = Arc::new(RpcSelector::new(&config.relay));
        Self::with_resolver(config, chains, resolver)
    }

    /// 使用自定义端点解析器（测试注入内存账本）
    pub fn with_resolver(
        config: Arc<Config>,
        chains: Arc<ChainDirectory>,
        resolver: Arc<dyn EndpointResolver>,
    ) -> Self {
        let validator = Arc::new(RequestValidator::new(chains.clone()));
        let orchestrator = Arc::new(RelayOrchestrator::new(
            resolver,
            RelaySettings::from(&config.relay),
        ));

        Self {
            config,
            chains,
            validator,
            orchestrator,
        }
    }
}
