use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::{
    BankAccountDraft, Clabe, EntryId, ExternalAccountId, Money, OwnerId, RequestId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rail {
    /// Processor payout to the owner's connect account.
    Instant,
    /// SPEI transfer to a CLABE.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Failed,
}

impl core::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettlementWindow {
    pub min_business_days: u8,
    pub max_business_days: u8,
}

impl SettlementWindow {
    pub const INSTANT: Self = Self::new(1, 2);
    pub const MANUAL: Self = Self::new(3, 5);

    pub const fn new(min_business_days: u8, max_business_days: u8) -> Self {
        Self {
            min_business_days,
            max_business_days,
        }
    }

    /// Earliest and latest expected arrival dates, skipping weekends.
    pub fn expected_between(&self, from: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
        let start = from.date_naive();
        (
            add_business_days(start, self.min_business_days),
            add_business_days(start, self.max_business_days),
        )
    }
}

fn add_business_days(mut date: NaiveDate, days: u8) -> NaiveDate {
    let mut remaining = days;
    while remaining > 0 {
        date = date + Days::new(1);
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            remaining -= 1;
        }
    }
    date
}

impl core::fmt::Display for SettlementWindow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}-{} business days",
            self.min_business_days, self.max_business_days
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "account", rename_all = "snake_case")]
pub enum PayoutDestination {
    ConnectAccount(ExternalAccountId),
    Spei(Clabe),
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalRequest {
    pub id: RequestId,
    pub owner_id: OwnerId,
    pub amount: Money,
    pub rail: Rail,
    pub status: WithdrawalStatus,
    pub destination: PayoutDestination,
    pub entry_id: EntryId, // the withdrawal entry in the transaction log
    pub dispatched: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST withdrawal`.
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalInput {
    pub amount_cents: i64,
    pub rail: Rail,
    pub bank_account: Option<BankAccountDraft>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalReceipt {
    pub request_id: RequestId,
    pub status: WithdrawalStatus,
    pub settlement_window: SettlementWindow,
}

/// What the processor is asked to pay out, keyed by `request_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutInstruction {
    pub request_id: RequestId,
    pub owner_id: OwnerId,
    pub amount: Money,
    pub destination: PayoutDestination,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PayoutOutcome {
    Paid,
    Rejected { reason: String },
}
