use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::bank_accounts::BankAccountBook;
use crate::config::EngineConfig;
use crate::connect::ConnectAccounts;
use crate::domain::{
    BankAccountError, Credential, EntryStatus, Error, Money, OwnerId, PaymentProcessor,
    PayoutDestination, PayoutInstruction, PayoutOutcome, Rail, RequestId, TransactionKind,
    WithdrawalInput, WithdrawalReceipt, WithdrawalRequest, WithdrawalStatus,
};
use crate::ledger::Ledger;

/// Accepts withdrawal requests, debits the ledger and hands payouts to the
/// processor.
///
/// A request is accepted only when every precondition holds; a rejected
/// request leaves no trace. Once accepted, the only way out of `pending` is
/// a processor outcome, and a failed payout always gives the money back.
pub struct WithdrawalProcessor<P: PaymentProcessor> {
    ledger: Arc<Ledger>,
    connect: Arc<ConnectAccounts<P>>,
    banks: Arc<BankAccountBook>,
    processor: Arc<P>,
    config: Arc<EngineConfig>,
    requests: Arc<RwLock<HashMap<RequestId, WithdrawalRequest>>>,
    dispatches: Arc<Mutex<JoinSet<()>>>,
}

impl<P: PaymentProcessor> Clone for WithdrawalProcessor<P> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            connect: self.connect.clone(),
            banks: self.banks.clone(),
            processor: self.processor.clone(),
            config: self.config.clone(),
            requests: self.requests.clone(),
            dispatches: self.dispatches.clone(),
        }
    }
}

impl<P: PaymentProcessor> WithdrawalProcessor<P> {
    pub fn new(
        ledger: Arc<Ledger>,
        connect: Arc<ConnectAccounts<P>>,
        banks: Arc<BankAccountBook>,
        processor: Arc<P>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger,
            connect,
            banks,
            processor,
            config: Arc::new(config),
            requests: Arc::new(RwLock::new(HashMap::new())),
            dispatches: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Validates, debits and records a withdrawal, then dispatches the payout
    /// in the background.
    ///
    /// Checks run in a fixed order and the first failure is returned:
    /// minimum amount, outstanding cash debt, available funds, then the
    /// rail's destination.
    pub async fn request_withdrawal(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
        input: WithdrawalInput,
    ) -> Result<WithdrawalReceipt, Error> {
        credential.authorize(owner_id)?;
        let amount = Money::new(input.amount_cents, self.ledger.currency());
        let minimum = self.config.min_withdrawal();
        if amount.cents < minimum.cents {
            warn!(owner = %owner_id, amount = %amount, "withdrawal below minimum");
            return Err(Error::InvalidAmount {
                amount,
                reason: format!("minimum withdrawal is {}", minimum),
            });
        }

        let mut wallet = self.ledger.lock(owner_id).await;
        let state = wallet.wallet();
        if state.cash_owed.is_positive() {
            warn!(owner = %owner_id, owed = %state.cash_owed, "withdrawal blocked by cash debt");
            return Err(Error::CashDebtOutstanding {
                owner: owner_id.clone(),
                owed: state.cash_owed,
            });
        }
        let available = state.available_for_withdrawal();
        if amount.cents > available.cents {
            warn!(
                owner = %owner_id,
                amount = %amount,
                available = %available,
                "insufficient funds"
            );
            return Err(Error::InsufficientFunds {
                owner: owner_id.clone(),
                requested: amount,
                available,
            });
        }

        let (destination, bank_account) = match input.rail {
            Rail::Instant => {
                let account = self
                    .connect
                    .account(owner_id)
                    .await
                    .filter(|account| account.can_receive_payments())
                    .ok_or_else(|| Error::AccountNotEligible(owner_id.clone()))?;
                (PayoutDestination::ConnectAccount(account.external_account_id), None)
            }
            Rail::Manual => {
                let account = match &input.bank_account {
                    Some(draft) => draft.validate(owner_id)?,
                    None => self
                        .banks
                        .get(credential, owner_id)
                        .await?
                        .ok_or(BankAccountError::Missing)?,
                };
                (PayoutDestination::Spei(account.clabe.clone()), Some(account))
            }
        };

        let request_id = RequestId::new();
        let entry = wallet
            .debit(
                amount,
                TransactionKind::Withdrawal,
                Some(request_id),
                EntryStatus::Pending,
            )
            .await?;
        if let Some(account) = bank_account {
            self.banks.upsert(account).await;
        }

        let now = Utc::now();
        let request = WithdrawalRequest {
            id: request_id,
            owner_id: owner_id.clone(),
            amount,
            rail: input.rail,
            status: WithdrawalStatus::Pending,
            destination,
            entry_id: entry.id,
            dispatched: false,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.requests.write().await.insert(request_id, request);
        drop(wallet);

        info!(
            owner = %owner_id,
            request_id = %request_id,
            amount = %amount,
            rail = ?input.rail,
            "withdrawal accepted"
        );

        let this = self.clone();
        let mut dispatches = self.dispatches.lock().await;
        while let Some(finished) = dispatches.try_join_next() {
            log_join(finished);
        }
        dispatches.spawn(async move {
            if let Err(e) = this.dispatch_payout(request_id).await {
                warn!(request_id = %request_id, error = %e, "payout dispatch failed");
            }
        });
        drop(dispatches);

        Ok(WithdrawalReceipt {
            request_id,
            status: WithdrawalStatus::Pending,
            settlement_window: self.config.window_for(input.rail),
        })
    }

    /// Hands a pending request to the processor. Safe to call more than once:
    /// a request is submitted at most once from here, and the processor
    /// deduplicates by request id as well.
    pub async fn dispatch_payout(&self, request_id: RequestId) -> Result<(), Error> {
        let instruction = {
            let mut requests = self.requests.write().await;
            let request = requests
                .get_mut(&request_id)
                .ok_or(Error::RequestNotFound(request_id))?;
            if request.status != WithdrawalStatus::Pending || request.dispatched {
                return Ok(());
            }
            request.dispatched = true;
            PayoutInstruction {
                request_id,
                owner_id: request.owner_id.clone(),
                amount: request.amount,
                destination: request.destination.clone(),
            }
        };

        match self.processor.submit_payout(&instruction).await {
            Ok(()) => {
                info!(request_id = %request_id, "payout submitted");
                Ok(())
            }
            Err(e) => {
                error!(request_id = %request_id, error = %e, "payout submission failed");
                self.fail_request(request_id, e.to_string()).await?;
                Err(e)
            }
        }
    }

    /// Processor callback. The only path from `pending` to a final status.
    ///
    /// Repeating an outcome is a no-op. A different outcome for an already
    /// settled request is refused.
    pub async fn complete_payout(
        &self,
        credential: &Credential,
        request_id: RequestId,
        outcome: PayoutOutcome,
    ) -> Result<WithdrawalRequest, Error> {
        let owner_id = self.request_owner(request_id).await?;
        credential.require_system(&owner_id)?;

        match outcome {
            PayoutOutcome::Paid => self.mark_completed(request_id).await,
            PayoutOutcome::Rejected { reason } => self.fail_request(request_id, reason).await,
        }
    }

    async fn request_owner(&self, request_id: RequestId) -> Result<OwnerId, Error> {
        self.requests
            .read()
            .await
            .get(&request_id)
            .map(|request| request.owner_id.clone())
            .ok_or(Error::RequestNotFound(request_id))
    }

    async fn mark_completed(&self, request_id: RequestId) -> Result<WithdrawalRequest, Error> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&request_id)
            .ok_or(Error::RequestNotFound(request_id))?;
        match request.status {
            WithdrawalStatus::Completed => return Ok(request.clone()),
            WithdrawalStatus::Failed => {
                warn!(request_id = %request_id, "paid outcome for a failed withdrawal");
                return Err(Error::RequestAlreadySettled {
                    id: request_id,
                    status: request.status,
                });
            }
            WithdrawalStatus::Pending => {}
        }

        self.ledger
            .log()
            .amend_status(request.entry_id, EntryStatus::Completed)
            .await?;
        request.status = WithdrawalStatus::Completed;
        request.updated_at = Utc::now();
        info!(request_id = %request_id, owner = %request.owner_id, "withdrawal completed");
        Ok(request.clone())
    }

    /// Fails a pending request and credits the amount back.
    async fn fail_request(
        &self,
        request_id: RequestId,
        reason: String,
    ) -> Result<WithdrawalRequest, Error> {
        let owner_id = self.request_owner(request_id).await?;
        // wallet before requests, same order as request_withdrawal
        let mut wallet = self.ledger.lock(&owner_id).await;
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&request_id)
            .ok_or(Error::RequestNotFound(request_id))?;
        match request.status {
            WithdrawalStatus::Failed => return Ok(request.clone()),
            WithdrawalStatus::Completed => {
                // TODO: define the re-debit path for reversals after completion (chargebacks)
                warn!(request_id = %request_id, %reason, "rejection for a completed withdrawal");
                return Err(Error::RequestAlreadySettled {
                    id: request_id,
                    status: request.status,
                });
            }
            WithdrawalStatus::Pending => {}
        }

        wallet
            .credit(
                request.amount,
                TransactionKind::WithdrawalReversal,
                Some(request_id),
            )
            .await?;
        self.ledger
            .log()
            .amend_status(request.entry_id, EntryStatus::Failed)
            .await?;
        error!(
            request_id = %request_id,
            owner = %owner_id,
            amount = %request.amount,
            %reason,
            "withdrawal failed, amount credited back"
        );
        request.status = WithdrawalStatus::Failed;
        request.failure_reason = Some(reason);
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    pub async fn get_request(
        &self,
        credential: &Credential,
        request_id: RequestId,
    ) -> Result<WithdrawalRequest, Error> {
        let request = self
            .requests
            .read()
            .await
            .get(&request_id)
            .cloned()
            .ok_or(Error::RequestNotFound(request_id))?;
        credential.authorize(&request.owner_id)?;
        Ok(request)
    }

    /// Newest first.
    pub async fn list_requests(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
    ) -> Result<Vec<WithdrawalRequest>, Error> {
        credential.authorize(owner_id)?;
        let mut requests: Vec<WithdrawalRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|request| &request.owner_id == owner_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.entry_id.cmp(&a.entry_id))
        });
        Ok(requests)
    }

    /// Dispatch tasks still tracked, finished or not.
    pub async fn tracked_dispatches(&self) -> usize {
        self.dispatches.lock().await.len()
    }

    /// Waits for every dispatch started so far.
    pub async fn drain(&self) {
        let mut dispatches = std::mem::take(&mut *self.dispatches.lock().await);
        while let Some(finished) = dispatches.join_next().await {
            log_join(finished);
        }
    }
}

fn log_join(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        error!(error = %e, "payout dispatch task panicked");
    }
}
