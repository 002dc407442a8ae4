use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EntryId, Money, OwnerId, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    OrderPayment,
    Tip,
    PendingIncome,
    PendingRelease,
    CashCollected,
    CashSettlement,
    Withdrawal,
    WithdrawalReversal,
}

impl TransactionKind {
    /// Credits that count towards `total_earned`.
    pub fn is_earning(&self) -> bool {
        matches!(
            self,
            TransactionKind::Income | TransactionKind::OrderPayment | TransactionKind::Tip
        )
    }

    /// Kinds whose amount moves the spendable balance.
    pub fn moves_balance(&self) -> bool {
        self.is_earning()
            || matches!(
                self,
                TransactionKind::Withdrawal | TransactionKind::WithdrawalReversal
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionLogEntry {
    pub id: EntryId,
    pub owner_id: OwnerId,
    pub kind: TransactionKind,
    pub amount: Money, // signed: debits are negative
    pub status: EntryStatus,
    pub reference: Option<RequestId>,
    pub created_at: DateTime<Utc>,
}

/// An entry before the log assigns its id and timestamp.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub owner_id: OwnerId,
    pub kind: TransactionKind,
    pub amount: Money,
    pub status: EntryStatus,
    pub reference: Option<RequestId>,
}

#[derive(Debug, Clone, Copy)]
pub struct ListQuery {
    pub limit: usize,
    pub before: Option<EntryId>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            before: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementKind {
    Credit(TransactionKind),
    Pending,
    Release,
    CashCollected,
    CashSettlement,
}

/// One row of the order/delivery settlement feed.
#[derive(Debug, Clone)]
pub struct SettlementEvent {
    pub kind: SettlementKind,
    pub owner_id: OwnerId,
    pub amount: Money,
}

impl core::fmt::Display for SettlementEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:?},owner={},amount={}",
            self.kind, self.owner_id, self.amount
        )
    }
}
