pub mod bank;
pub mod connect;
pub mod credential;
pub mod error;
pub mod ids;
pub mod money;
pub mod traits;
pub mod transaction;
pub mod wallet;
pub mod withdrawal;

pub use bank::{BankAccount, BankAccountDraft, BankAccountError, BankAccountType, Clabe};
pub use connect::{
    ConnectAccount, ConnectAccountType, ConnectStatus, ConnectStatusView, OnboardingLink,
};
pub use credential::{Credential, Principal};
pub use error::{Error, ErrorClass};
pub use ids::{EntryId, ExternalAccountId, OwnerId, RequestId};
pub use money::{Currency, Money};
pub use traits::{DeadLetterQueue, PaymentProcessor, SettlementStream, SnapshotSink};
pub use transaction::{
    EntryStatus, ListQuery, NewEntry, SettlementEvent, SettlementKind, TransactionKind,
    TransactionLogEntry,
};
pub use wallet::{Wallet, WalletState};
pub use withdrawal::{
    PayoutDestination, PayoutInstruction, PayoutOutcome, Rail, SettlementWindow,
    WithdrawalInput, WithdrawalReceipt, WithdrawalRequest, WithdrawalStatus,
};
