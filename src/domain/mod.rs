//! Domain 模块
//!
//! 链目录、转账领域模型与错误分类

pub mod batch_error;
pub mod chain_directory;
pub mod transfer;

// 重新导出常用类型
pub use batch_error::{BatchError, ValidationError};
pub use chain_directory::{ChainDirectory, ChainProfile};
pub use transfer::{
    BatchOutcome, BatchState, HopPhase, PlannedTransaction, TransferRequest, TransferResult,
    WalletHandle,
};
