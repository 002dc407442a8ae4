use crate::domain::{
    BankAccountError, Currency, EntryId, Money, OwnerId, RequestId, TransactionKind,
    WithdrawalStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error("Ingestion failed with: {0}")]
    Ingestion(String),

    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Money, reason: String },

    #[error("Invalid bank account: {0}")]
    InvalidBankAccount(#[from] BankAccountError),

    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    #[error("Amount overflow")]
    Overflow,

    #[error("{0:?} entries cannot be applied here")]
    InvalidEntryKind(TransactionKind),

    #[error("Owner {owner} owes {owed} in collected cash; settle it before withdrawing")]
    CashDebtOutstanding { owner: OwnerId, owed: Money },

    #[error("Connect account for {0} cannot receive payments yet")]
    AccountNotEligible(OwnerId),

    #[error("No connect account exists for {0}")]
    ConnectAccountMissing(OwnerId),

    #[error("Insufficient funds for {owner}: requested {requested}, available {available}")]
    InsufficientFunds {
        owner: OwnerId,
        requested: Money,
        available: Money,
    },

    #[error("Credential is not authorized for {0}")]
    Unauthorized(OwnerId),

    #[error("Withdrawal request {0} not found")]
    RequestNotFound(RequestId),

    #[error("Withdrawal request {id} is already {status}")]
    RequestAlreadySettled {
        id: RequestId,
        status: WithdrawalStatus,
    },

    #[error("Transaction log entry {0} not found")]
    EntryNotFound(EntryId),

    #[error("Payment processor failed with: {0}")]
    ExternalService(String),

    #[error("Ledger for {owner} diverges from the transaction log: {detail}")]
    Reconciliation { owner: OwnerId, detail: String },
}

/// How a caller is expected to react to an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input. Surfaced verbatim, never retried automatically.
    Validation,
    /// The owner must resolve an underlying condition before retrying.
    State,
    /// The processor failed after acceptance; the local debit is reversed.
    ExternalService,
    /// Ledger and log disagree. Needs an operator.
    Reconciliation,
    Io,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::IO(_) => ErrorClass::Io,
            Error::Ingestion(_)
            | Error::InvalidAmount { .. }
            | Error::InvalidBankAccount(_)
            | Error::CurrencyMismatch { .. }
            | Error::Overflow
            | Error::InvalidEntryKind(_) => ErrorClass::Validation,
            Error::CashDebtOutstanding { .. }
            | Error::AccountNotEligible(_)
            | Error::ConnectAccountMissing(_)
            | Error::InsufficientFunds { .. }
            | Error::Unauthorized(_)
            | Error::RequestNotFound(_)
            | Error::RequestAlreadySettled { .. }
            | Error::EntryNotFound(_) => ErrorClass::State,
            Error::ExternalService(_) => ErrorClass::ExternalService,
            Error::Reconciliation { .. } => ErrorClass::Reconciliation,
        }
    }

    /// Text safe to show an end user.
    pub fn user_message(&self) -> String {
        match self.class() {
            ErrorClass::ExternalService => {
                "The payout could not be completed. Your balance was restored, please try again later."
                    .to_string()
            }
            ErrorClass::Reconciliation | ErrorClass::Io => {
                "Something went wrong on our side. Support has been notified.".to_string()
            }
            ErrorClass::Validation | ErrorClass::State => self.to_string(),
        }
    }
}
