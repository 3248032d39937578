pub mod batch_reporter;
pub mod gas_calculator; // 纯函数：gas 成本与可中继金额
pub mod ledger_client;
pub mod relay_orchestrator;
pub mod request_validator;
pub mod signer;
