use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{error, info};

use crate::domain::{
    Credential, Currency, EntryStatus, Error, ListQuery, Money, NewEntry, OwnerId, RequestId,
    TransactionKind, TransactionLogEntry, Wallet, WalletState,
};
use crate::transaction_log::TransactionLog;

/// Current balances for every owner, backed by the transaction log.
///
/// Each wallet sits behind its own mutex, so owners never contend with each
/// other while all mutations for one owner run one at a time. Log appends
/// happen under that mutex, which keeps a wallet and its entries in step.
#[derive(Debug)]
pub struct Ledger {
    currency: Currency,
    wallets: RwLock<HashMap<OwnerId, Arc<Mutex<WalletState>>>>,
    log: Arc<TransactionLog>,
}

impl Ledger {
    pub fn new(currency: Currency, log: Arc<TransactionLog>) -> Self {
        Self {
            currency,
            wallets: RwLock::new(HashMap::new()),
            log,
        }
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn log(&self) -> &Arc<TransactionLog> {
        &self.log
    }

    async fn cell(&self, owner_id: &OwnerId) -> Arc<Mutex<WalletState>> {
        if let Some(cell) = self.wallets.read().await.get(owner_id) {
            return cell.clone();
        }
        let mut wallets = self.wallets.write().await;
        wallets
            .entry(owner_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(WalletState::new(self.currency))))
            .clone()
    }

    /// Takes the owner's wallet lock. Every mutation goes through the guard.
    pub async fn lock(&self, owner_id: &OwnerId) -> WalletGuard<'_> {
        let state = self.cell(owner_id).await.lock_owned().await;
        WalletGuard {
            owner_id: owner_id.clone(),
            state,
            log: &self.log,
        }
    }

    pub async fn snapshot(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
    ) -> Result<Wallet, Error> {
        credential.authorize(owner_id)?;
        let cell = self.wallets.read().await.get(owner_id).cloned();
        let wallet = match cell {
            Some(cell) => cell.lock().await.snapshot(owner_id),
            None => WalletState::new(self.currency).snapshot(owner_id),
        };
        Ok(wallet)
    }

    /// Snapshots of every known wallet, ordered by owner.
    pub async fn snapshots(&self, credential: &Credential) -> Result<Vec<Wallet>, Error> {
        let mut wallets = Vec::new();
        for owner_id in self.owners().await {
            wallets.push(self.snapshot(credential, &owner_id).await?);
        }
        Ok(wallets)
    }

    pub async fn owners(&self) -> Vec<OwnerId> {
        let mut owners: Vec<OwnerId> = self.wallets.read().await.keys().cloned().collect();
        owners.sort();
        owners
    }

    pub async fn apply_credit(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
        amount: Money,
        kind: TransactionKind,
    ) -> Result<TransactionLogEntry, Error> {
        credential.require_system(owner_id)?;
        let entry = self.lock(owner_id).await.credit(amount, kind, None).await?;
        info!(owner = %owner_id, amount = %amount, kind = ?kind, "credit applied");
        Ok(entry)
    }

    /// Raw debit for system use. Owners withdraw through `WithdrawalProcessor`.
    pub async fn apply_debit(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
        amount: Money,
        kind: TransactionKind,
    ) -> Result<TransactionLogEntry, Error> {
        credential.require_system(owner_id)?;
        let entry = self
            .lock(owner_id)
            .await
            .debit(amount, kind, None, EntryStatus::Completed)
            .await?;
        info!(owner = %owner_id, amount = %amount, kind = ?kind, "debit applied");
        Ok(entry)
    }

    /// Returns the part of `amount` that actually reduced the cash debt.
    pub async fn settle_cash(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
        amount: Money,
    ) -> Result<Money, Error> {
        credential.require_system(owner_id)?;
        let applied = self.lock(owner_id).await.settle_cash(amount).await?;
        info!(owner = %owner_id, remitted = %amount, applied = %applied, "cash settled");
        Ok(applied)
    }

    pub async fn record_cash_collected(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
        amount: Money,
    ) -> Result<TransactionLogEntry, Error> {
        credential.require_system(owner_id)?;
        let entry = self.lock(owner_id).await.record_cash_collected(amount).await?;
        info!(owner = %owner_id, amount = %amount, "cash collected");
        Ok(entry)
    }

    pub async fn record_pending(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
        amount: Money,
    ) -> Result<TransactionLogEntry, Error> {
        credential.require_system(owner_id)?;
        self.lock(owner_id).await.record_pending(amount).await
    }

    pub async fn release_pending(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
        amount: Money,
    ) -> Result<Money, Error> {
        credential.require_system(owner_id)?;
        let released = self.lock(owner_id).await.release_pending(amount).await?;
        info!(owner = %owner_id, released = %released, "pending earnings released");
        Ok(released)
    }

    pub async fn history(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
        query: ListQuery,
    ) -> Result<Vec<TransactionLogEntry>, Error> {
        credential.authorize(owner_id)?;
        Ok(self.log.list_for(owner_id, query).await)
    }

    /// Rebuilds the owner's totals from the log and compares them with the
    /// stored wallet. A divergence is reported, never corrected.
    pub async fn reconcile(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
    ) -> Result<ReconciliationReport, Error> {
        credential.authorize(owner_id)?;
        let guard = self.lock(owner_id).await;
        let entries = self.log.entries_for(owner_id).await;

        let report = ReconciliationReport {
            owner_id: owner_id.clone(),
            wallet: LedgerTotals::from_wallet(guard.wallet()),
            log: LedgerTotals::from_entries(&entries),
            entries: entries.len(),
        };
        drop(guard);

        let differences = report.wallet.differences(&report.log);
        if !differences.is_empty() {
            let detail = differences.join(", ");
            error!(owner = %owner_id, %detail, "ledger diverges from transaction log");
            return Err(Error::Reconciliation {
                owner: owner_id.clone(),
                detail,
            });
        }
        Ok(report)
    }
}

/// Exclusive access to one owner's wallet.
pub struct WalletGuard<'a> {
    owner_id: OwnerId,
    state: OwnedMutexGuard<WalletState>,
    log: &'a TransactionLog,
}

impl WalletGuard<'_> {
    pub fn wallet(&self) -> &WalletState {
        &self.state
    }

    fn ensure_positive(&self, amount: Money) -> Result<(), Error> {
        if amount.currency != self.state.currency() {
            return Err(Error::CurrencyMismatch {
                expected: self.state.currency(),
                actual: amount.currency,
            });
        }
        if !amount.is_positive() {
            return Err(Error::InvalidAmount {
                amount,
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub async fn credit(
        &mut self,
        amount: Money,
        kind: TransactionKind,
        reference: Option<RequestId>,
    ) -> Result<TransactionLogEntry, Error> {
        self.ensure_positive(amount)?;
        let mut next = self.state.clone();
        next.balance = next.balance.checked_add(amount)?;
        match kind {
            k if k.is_earning() => next.total_earned = next.total_earned.checked_add(amount)?,
            // the reversed withdrawal never left the wallet
            TransactionKind::WithdrawalReversal => {
                next.total_withdrawn = next.total_withdrawn.checked_sub(amount)?
            }
            other => return Err(Error::InvalidEntryKind(other)),
        }
        self.commit(next, vec![(kind, amount, EntryStatus::Completed)], reference)
            .await
            .map(first)
    }

    pub async fn debit(
        &mut self,
        amount: Money,
        kind: TransactionKind,
        reference: Option<RequestId>,
        status: EntryStatus,
    ) -> Result<TransactionLogEntry, Error> {
        self.ensure_positive(amount)?;
        if kind != TransactionKind::Withdrawal {
            return Err(Error::InvalidEntryKind(kind));
        }
        if self.state.cash_owed.is_positive() {
            return Err(Error::CashDebtOutstanding {
                owner: self.owner_id.clone(),
                owed: self.state.cash_owed,
            });
        }
        let available = self.state.available_for_withdrawal();
        if amount > available {
            return Err(Error::InsufficientFunds {
                owner: self.owner_id.clone(),
                requested: amount,
                available,
            });
        }

        let mut next = self.state.clone();
        next.balance = next.balance.checked_sub(amount)?;
        next.total_withdrawn = next.total_withdrawn.checked_add(amount)?;
        self.commit(next, vec![(kind, amount.negated(), status)], reference)
            .await
            .map(first)
    }

    pub async fn settle_cash(&mut self, amount: Money) -> Result<Money, Error> {
        self.ensure_positive(amount)?;
        let applied = Money::new(amount.cents.min(self.state.cash_owed.cents), amount.currency);
        if applied.is_zero() {
            return Ok(applied);
        }

        let mut next = self.state.clone();
        next.cash_owed = next.cash_owed.checked_sub(applied)?;
        self.commit(
            next,
            vec![(TransactionKind::CashSettlement, applied.negated(), EntryStatus::Completed)],
            None,
        )
        .await?;
        Ok(applied)
    }

    pub async fn record_cash_collected(
        &mut self,
        amount: Money,
    ) -> Result<TransactionLogEntry, Error> {
        self.ensure_positive(amount)?;
        let mut next = self.state.clone();
        next.cash_owed = next.cash_owed.checked_add(amount)?;
        self.commit(
            next,
            vec![(TransactionKind::CashCollected, amount, EntryStatus::Completed)],
            None,
        )
        .await
        .map(first)
    }

    pub async fn record_pending(&mut self, amount: Money) -> Result<TransactionLogEntry, Error> {
        self.ensure_positive(amount)?;
        let mut next = self.state.clone();
        next.pending_balance = next.pending_balance.checked_add(amount)?;
        self.commit(
            next,
            vec![(TransactionKind::PendingIncome, amount, EntryStatus::Pending)],
            None,
        )
        .await
        .map(first)
    }

    /// Moves up to `amount` of pending earnings into the balance.
    pub async fn release_pending(&mut self, amount: Money) -> Result<Money, Error> {
        self.ensure_positive(amount)?;
        let released = Money::new(
            amount.cents.min(self.state.pending_balance.cents),
            amount.currency,
        );
        if released.is_zero() {
            return Ok(released);
        }

        let mut next = self.state.clone();
        next.pending_balance = next.pending_balance.checked_sub(released)?;
        next.balance = next.balance.checked_add(released)?;
        next.total_earned = next.total_earned.checked_add(released)?;
        self.commit(
            next,
            vec![
                (TransactionKind::PendingRelease, released.negated(), EntryStatus::Completed),
                (TransactionKind::Income, released, EntryStatus::Completed),
            ],
            None,
        )
        .await?;
        Ok(released)
    }

    async fn commit(
        &mut self,
        mut next: WalletState,
        entries: Vec<(TransactionKind, Money, EntryStatus)>,
        reference: Option<RequestId>,
    ) -> Result<Vec<TransactionLogEntry>, Error> {
        next.version += 1;
        let mut appended = Vec::with_capacity(entries.len());
        for (kind, amount, status) in entries {
            appended.push(
                self.log
                    .append(NewEntry {
                        owner_id: self.owner_id.clone(),
                        kind,
                        amount,
                        status,
                        reference,
                    })
                    .await,
            );
        }
        *self.state = next;
        Ok(appended)
    }
}

fn first(mut entries: Vec<TransactionLogEntry>) -> TransactionLogEntry {
    entries.swap_remove(0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerTotals {
    pub balance: i64,
    pub pending_balance: i64,
    pub total_earned: i64,
    pub total_withdrawn: i64,
    pub cash_owed: i64,
}

impl LedgerTotals {
    fn from_wallet(wallet: &WalletState) -> Self {
        Self {
            balance: wallet.balance.cents,
            pending_balance: wallet.pending_balance.cents,
            total_earned: wallet.total_earned.cents,
            total_withdrawn: wallet.total_withdrawn.cents,
            cash_owed: wallet.cash_owed.cents,
        }
    }

    fn from_entries(entries: &[TransactionLogEntry]) -> Self {
        let mut totals = Self::default();
        for entry in entries {
            let cents = entry.amount.cents;
            if entry.kind.moves_balance() {
                totals.balance += cents;
            }
            match entry.kind {
                TransactionKind::Income | TransactionKind::OrderPayment | TransactionKind::Tip => {
                    totals.total_earned += cents
                }
                // withdrawals are logged negative, reversals positive
                TransactionKind::Withdrawal | TransactionKind::WithdrawalReversal => {
                    totals.total_withdrawn -= cents
                }
                TransactionKind::CashCollected | TransactionKind::CashSettlement => {
                    totals.cash_owed += cents
                }
                TransactionKind::PendingIncome | TransactionKind::PendingRelease => {
                    totals.pending_balance += cents
                }
            }
        }
        totals
    }

    fn differences(&self, log: &LedgerTotals) -> Vec<String> {
        [
            ("balance", self.balance, log.balance),
            ("pending_balance", self.pending_balance, log.pending_balance),
            ("total_earned", self.total_earned, log.total_earned),
            ("total_withdrawn", self.total_withdrawn, log.total_withdrawn),
            ("cash_owed", self.cash_owed, log.cash_owed),
        ]
        .into_iter()
        .filter(|(_, wallet, log)| wallet != log)
        .map(|(field, wallet, log)| format!("{field}: wallet={wallet} log={log}"))
        .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub owner_id: OwnerId,
    pub wallet: LedgerTotals,
    pub log: LedgerTotals,
    pub entries: usize,
}
