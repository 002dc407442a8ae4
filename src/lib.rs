//! Wallet ledger and payout eligibility engine.
//!
//! Money collected electronically and in cash is reconciled into one wallet
//! per owner. Withdrawals are gated on outstanding cash debt, connect-account
//! onboarding and bank-account validation before anything is debited.
//!
//! - [`ledger`] - balances, derived availability and reconciliation
//! - [`transaction_log`] - append-only history of money movements
//! - [`connect`] - processor sub-account onboarding state
//! - [`bank_accounts`] - CLABE-validated transfer destinations
//! - [`withdrawal`] - request orchestration, payout dispatch and reversal
//! - [`engine`] / [`ingestion`] - settlement feed plumbing

pub mod bank_accounts;
pub mod config;
pub mod connect;
pub mod dlq;
pub mod domain;
pub mod engine;
pub mod ingestion;
pub mod ledger;
pub mod output_repository;
pub mod sandbox;
pub mod transaction_log;
pub mod withdrawal;

pub use bank_accounts::BankAccountBook;
pub use config::EngineConfig;
pub use connect::ConnectAccounts;
pub use engine::SettlementEngine;
pub use ledger::{Ledger, ReconciliationReport};
pub use transaction_log::TransactionLog;
pub use withdrawal::WithdrawalProcessor;
