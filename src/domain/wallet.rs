use serde::Serialize;

use crate::domain::{Currency, Money, OwnerId};

/// Mutable wallet balances, owned by the ledger behind a per-owner lock.
#[derive(Debug, Clone)]
pub struct WalletState {
    pub balance: Money,
    pub pending_balance: Money, // earnings not yet settled
    pub total_earned: Money,
    pub total_withdrawn: Money,
    pub cash_owed: Money, // cash collected on the platform's behalf
    pub version: u64,     // bumped by every mutation
}

impl WalletState {
    pub fn new(currency: Currency) -> Self {
        Self {
            balance: Money::zero(currency),
            pending_balance: Money::zero(currency),
            total_earned: Money::zero(currency),
            total_withdrawn: Money::zero(currency),
            cash_owed: Money::zero(currency),
            version: 0,
        }
    }

    pub fn currency(&self) -> Currency {
        self.balance.currency
    }

    pub fn available_for_withdrawal(&self) -> Money {
        Money::new(
            self.balance.cents.saturating_sub(self.cash_owed.cents),
            self.currency(),
        )
        .floor_zero()
    }

    pub fn snapshot(&self, owner_id: &OwnerId) -> Wallet {
        Wallet {
            owner_id: owner_id.clone(),
            currency: self.currency(),
            balance: self.balance,
            pending_balance: self.pending_balance,
            total_earned: self.total_earned,
            total_withdrawn: self.total_withdrawn,
            cash_owed: self.cash_owed,
            available_for_withdrawal: self.available_for_withdrawal(),
            version: self.version,
        }
    }
}

/// Read contract for every calling layer. Amounts serialize as integer cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wallet {
    pub owner_id: OwnerId,
    pub currency: Currency,
    pub balance: Money,
    pub pending_balance: Money,
    pub total_earned: Money,
    pub total_withdrawn: Money,
    pub cash_owed: Money,
    pub available_for_withdrawal: Money,
    pub version: u64,
}
