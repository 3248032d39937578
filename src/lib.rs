//! RelayCore - 中继转账编排服务
//!
//! 通过一串一次性钱包向多个收款人分发原生币：每个钱包付款后把剩余余额转给下一个钱包

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        config::{Config, DispatchPolicy},
        domain::{BatchError, BatchOutcome, ChainDirectory, ChainProfile, TransferResult},
        error::{AppError, AppErrorCode},
        service::relay_orchestrator::{RelayOrchestrator, RelaySettings},
    };
}
