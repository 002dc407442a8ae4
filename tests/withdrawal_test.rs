use std::sync::Arc;

use wallet_engine::domain::{
    BankAccountDraft, BankAccountError, BankAccountType, ConnectAccountType, ConnectStatus,
    Credential, Currency, EntryStatus, Error, ListQuery, Money, OwnerId, PayoutDestination,
    PayoutOutcome, Rail, SettlementWindow, TransactionKind, WithdrawalInput, WithdrawalStatus,
};
use wallet_engine::sandbox::SandboxProcessor;
use wallet_engine::{
    BankAccountBook, ConnectAccounts, EngineConfig, Ledger, TransactionLog, WithdrawalProcessor,
};

const GOOD_CLABE: &str = "002010077777777771";

struct Harness {
    processor: Arc<SandboxProcessor>,
    ledger: Arc<Ledger>,
    connect: Arc<ConnectAccounts<SandboxProcessor>>,
    banks: Arc<BankAccountBook>,
    withdrawals: WithdrawalProcessor<SandboxProcessor>,
}

fn harness() -> Harness {
    let processor = Arc::new(SandboxProcessor::new());
    let ledger = Arc::new(Ledger::new(Currency::Mxn, Arc::new(TransactionLog::new())));
    let connect = Arc::new(ConnectAccounts::new(processor.clone()));
    let banks = Arc::new(BankAccountBook::new());
    let withdrawals = WithdrawalProcessor::new(
        ledger.clone(),
        connect.clone(),
        banks.clone(),
        processor.clone(),
        EngineConfig::default(),
    );
    Harness {
        processor,
        ledger,
        connect,
        banks,
        withdrawals,
    }
}

fn mxn(cents: i64) -> Money {
    Money::new(cents, Currency::Mxn)
}

impl Harness {
    async fn fund(&self, owner: &OwnerId, balance: i64, cash_owed: i64) {
        let system = Credential::system();
        self.ledger
            .apply_credit(&system, owner, mxn(balance), TransactionKind::OrderPayment)
            .await
            .unwrap();
        if cash_owed > 0 {
            self.ledger
                .record_cash_collected(&system, owner, mxn(cash_owed))
                .await
                .unwrap();
        }
    }

    async fn onboard(&self, owner: &OwnerId, status: ConnectStatus) {
        self.connect
            .start_onboarding(
                &Credential::owner(owner.clone()),
                owner,
                ConnectAccountType::Driver,
            )
            .await
            .unwrap();
        self.connect
            .record_status(&Credential::system(), owner, status)
            .await
            .unwrap();
    }

    async fn wallet(&self, owner: &OwnerId) -> wallet_engine::domain::Wallet {
        self.ledger
            .snapshot(&Credential::owner(owner.clone()), owner)
            .await
            .unwrap()
    }
}

fn eligible() -> ConnectStatus {
    ConnectStatus {
        details_submitted: true,
        charges_enabled: true,
        payouts_enabled: true,
    }
}

fn instant(amount_cents: i64) -> WithdrawalInput {
    WithdrawalInput {
        amount_cents,
        rail: Rail::Instant,
        bank_account: None,
    }
}

fn manual(amount_cents: i64, clabe: &str) -> WithdrawalInput {
    WithdrawalInput {
        amount_cents,
        rail: Rail::Manual,
        bank_account: Some(BankAccountDraft {
            clabe: clabe.to_string(),
            bank_name: "Banamex".to_string(),
            account_holder_name: "Cocina Dona Lupe".to_string(),
            account_type: BankAccountType::Checking,
        }),
    }
}

#[tokio::test]
async fn instant_withdrawal_debits_the_wallet() {
    let h = harness();
    let owner = OwnerId::new("rest-1");
    let credential = Credential::owner(owner.clone());
    h.fund(&owner, 12_500, 0).await;
    h.onboard(&owner, eligible()).await;

    let receipt = h
        .withdrawals
        .request_withdrawal(&credential, &owner, instant(6_000))
        .await
        .unwrap();
    assert_eq!(receipt.status, WithdrawalStatus::Pending);
    assert_eq!(receipt.settlement_window, SettlementWindow::new(1, 2));

    let wallet = h.wallet(&owner).await;
    assert_eq!(wallet.balance, mxn(6_500));
    assert_eq!(wallet.total_withdrawn, mxn(6_000));

    h.withdrawals.drain().await;
    let payout = h.processor.payout(&receipt.request_id).unwrap();
    assert_eq!(payout.amount, mxn(6_000));
    assert!(matches!(payout.destination, PayoutDestination::ConnectAccount(_)));

    let history = h
        .ledger
        .history(&credential, &owner, ListQuery::default())
        .await
        .unwrap();
    assert_eq!(history[0].kind, TransactionKind::Withdrawal);
    assert_eq!(history[0].amount, mxn(-6_000));
    assert_eq!(history[0].status, EntryStatus::Pending);
    assert_eq!(history[0].reference, Some(receipt.request_id));
}

#[tokio::test]
async fn cash_debt_blocks_every_withdrawal() {
    let h = harness();
    let owner = OwnerId::new("driver-2");
    let credential = Credential::owner(owner.clone());
    h.fund(&owner, 12_500, 3_000).await;
    h.onboard(&owner, eligible()).await;

    for input in [
        instant(5_000),
        instant(6_000),
        instant(12_500),
        instant(1_000_000),
        manual(5_000, GOOD_CLABE),
        manual(9_500, GOOD_CLABE),
    ] {
        let err = h
            .withdrawals
            .request_withdrawal(&credential, &owner, input)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::CashDebtOutstanding { owed, .. } if owed == mxn(3_000)),
            "{err}"
        );
    }

    let wallet = h.wallet(&owner).await;
    assert_eq!(wallet.balance, mxn(12_500));
    assert_eq!(wallet.available_for_withdrawal, mxn(9_500));
    assert_eq!(wallet.total_withdrawn, mxn(0));
    assert!(h.banks.get(&credential, &owner).await.unwrap().is_none());
}

#[tokio::test]
async fn remitting_cash_unblocks_withdrawals() {
    let h = harness();
    let owner = OwnerId::new("driver-2");
    let credential = Credential::owner(owner.clone());
    h.fund(&owner, 12_500, 3_000).await;
    h.onboard(&owner, eligible()).await;

    h.ledger
        .settle_cash(&Credential::system(), &owner, mxn(3_000))
        .await
        .unwrap();
    h.withdrawals
        .request_withdrawal(&credential, &owner, instant(12_500))
        .await
        .unwrap();
    assert_eq!(h.wallet(&owner).await.balance, mxn(0));
}

#[tokio::test]
async fn rejected_payout_restores_the_balance() {
    let h = harness();
    let owner = OwnerId::new("rest-1");
    let credential = Credential::owner(owner.clone());
    let system = Credential::system();
    h.fund(&owner, 12_500, 0).await;
    h.onboard(&owner, eligible()).await;

    let receipt = h
        .withdrawals
        .request_withdrawal(&credential, &owner, instant(6_000))
        .await
        .unwrap();
    h.withdrawals.drain().await;
    assert_eq!(h.wallet(&owner).await.balance, mxn(6_500));

    let rejected = PayoutOutcome::Rejected {
        reason: "account_closed".to_string(),
    };
    let request = h
        .withdrawals
        .complete_payout(&system, receipt.request_id, rejected.clone())
        .await
        .unwrap();
    assert_eq!(request.status, WithdrawalStatus::Failed);
    assert_eq!(request.failure_reason.as_deref(), Some("account_closed"));

    let wallet = h.wallet(&owner).await;
    assert_eq!(wallet.balance, mxn(12_500));
    assert_eq!(wallet.total_withdrawn, mxn(0));
    assert_eq!(wallet.total_earned, mxn(12_500));

    // redelivered callback
    h.withdrawals
        .complete_payout(&system, receipt.request_id, rejected)
        .await
        .unwrap();
    assert_eq!(h.wallet(&owner).await.balance, mxn(12_500));

    let err = h
        .withdrawals
        .complete_payout(&system, receipt.request_id, PayoutOutcome::Paid)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::RequestAlreadySettled {
            status: WithdrawalStatus::Failed,
            ..
        }
    ));

    let history = h
        .ledger
        .history(&credential, &owner, ListQuery::default())
        .await
        .unwrap();
    assert_eq!(history[0].kind, TransactionKind::WithdrawalReversal);
    assert_eq!(history[0].amount, mxn(6_000));
    assert_eq!(history[1].kind, TransactionKind::Withdrawal);
    assert_eq!(history[1].status, EntryStatus::Failed);

    h.ledger.reconcile(&credential, &owner).await.unwrap();
}

#[tokio::test]
async fn unreachable_processor_fails_the_request_and_credits_back() {
    let h = harness();
    let owner = OwnerId::new("rest-1");
    let credential = Credential::owner(owner.clone());
    h.fund(&owner, 12_500, 0).await;
    h.onboard(&owner, eligible()).await;
    h.processor.set_unreachable(true);

    let receipt = h
        .withdrawals
        .request_withdrawal(&credential, &owner, instant(6_000))
        .await
        .unwrap();
    h.withdrawals.drain().await;

    let request = h
        .withdrawals
        .get_request(&credential, receipt.request_id)
        .await
        .unwrap();
    assert_eq!(request.status, WithdrawalStatus::Failed);
    assert_eq!(h.wallet(&owner).await.balance, mxn(12_500));
    assert_eq!(h.processor.payout_count(), 0);
}

#[tokio::test]
async fn paid_payout_completes_once() {
    let h = harness();
    let owner = OwnerId::new("rest-1");
    let credential = Credential::owner(owner.clone());
    let system = Credential::system();
    h.fund(&owner, 20_000, 0).await;
    h.onboard(&owner, eligible()).await;

    let receipt = h
        .withdrawals
        .request_withdrawal(&credential, &owner, instant(8_000))
        .await
        .unwrap();
    h.withdrawals.drain().await;
    // a second dispatch of the same request never reaches the processor again
    h.withdrawals
        .dispatch_payout(receipt.request_id)
        .await
        .unwrap();
    assert_eq!(h.processor.submission_count(), 1);

    for _ in 0..2 {
        let request = h
            .withdrawals
            .complete_payout(&system, receipt.request_id, PayoutOutcome::Paid)
            .await
            .unwrap();
        assert_eq!(request.status, WithdrawalStatus::Completed);
    }

    let err = h
        .withdrawals
        .complete_payout(
            &system,
            receipt.request_id,
            PayoutOutcome::Rejected {
                reason: "chargeback".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RequestAlreadySettled { .. }));
    assert_eq!(h.wallet(&owner).await.balance, mxn(12_000));

    let history = h
        .ledger
        .history(&credential, &owner, ListQuery::default())
        .await
        .unwrap();
    assert_eq!(history[0].status, EntryStatus::Completed);
}

#[tokio::test]
async fn finished_dispatches_are_released() {
    let h = harness();
    let owner = OwnerId::new("driver-4");
    let credential = Credential::owner(owner.clone());
    h.fund(&owner, 50_000, 0).await;
    h.onboard(&owner, eligible()).await;

    for submitted in 1..=5 {
        h.withdrawals
            .request_withdrawal(&credential, &owner, instant(5_000))
            .await
            .unwrap();
        // only the dispatch just started is still tracked
        assert_eq!(h.withdrawals.tracked_dispatches().await, 1);
        while h.processor.payout_count() < submitted {
            tokio::task::yield_now().await;
        }
    }

    h.withdrawals.drain().await;
    assert_eq!(h.withdrawals.tracked_dispatches().await, 0);
    assert_eq!(h.processor.payout_count(), 5);
}

#[tokio::test]
async fn below_minimum_is_always_invalid() {
    let h = harness();
    let owner = OwnerId::new("rest-1");
    let credential = Credential::owner(owner.clone());
    h.fund(&owner, 1_000_000, 0).await;
    h.onboard(&owner, eligible()).await;

    for amount in [-100, 0, 1, 4_999] {
        let err = h
            .withdrawals
            .request_withdrawal(&credential, &owner, instant(amount))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount { .. }), "{amount}: {err}");
    }

    // even with cash debt and an empty wallet, the amount check comes first
    let broke = OwnerId::new("driver-5");
    h.ledger
        .record_cash_collected(&Credential::system(), &broke, mxn(9_000))
        .await
        .unwrap();
    let err = h
        .withdrawals
        .request_withdrawal(&Credential::owner(broke.clone()), &broke, instant(4_999))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAmount { .. }));
}

#[tokio::test]
async fn insufficient_funds_leave_no_trace() {
    let h = harness();
    let owner = OwnerId::new("rest-1");
    let credential = Credential::owner(owner.clone());
    h.fund(&owner, 7_000, 0).await;
    h.onboard(&owner, eligible()).await;
    let entries_before = h.ledger.log().len().await;

    let err = h
        .withdrawals
        .request_withdrawal(&credential, &owner, instant(7_001))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientFunds { .. }));
    assert_eq!(h.ledger.log().len().await, entries_before);
    assert!(
        h.withdrawals
            .list_requests(&credential, &owner)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn instant_rail_needs_a_fully_enabled_account() {
    let h = harness();
    let owner = OwnerId::new("driver-8");
    let credential = Credential::owner(owner.clone());
    h.fund(&owner, 12_500, 0).await;

    let err = h
        .withdrawals
        .request_withdrawal(&credential, &owner, instant(6_000))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AccountNotEligible(_)));

    h.onboard(
        &owner,
        ConnectStatus {
            details_submitted: true,
            charges_enabled: true,
            payouts_enabled: false,
        },
    )
    .await;
    let err = h
        .withdrawals
        .request_withdrawal(&credential, &owner, instant(6_000))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AccountNotEligible(_)));
    assert_eq!(h.wallet(&owner).await.balance, mxn(12_500));

    // the manual rail does not care about onboarding
    h.withdrawals
        .request_withdrawal(&credential, &owner, manual(6_000, GOOD_CLABE))
        .await
        .unwrap();
}

#[tokio::test]
async fn manual_rail_validates_and_saves_the_bank_account() {
    let h = harness();
    let owner = OwnerId::new("rest-3");
    let credential = Credential::owner(owner.clone());
    h.fund(&owner, 30_000, 0).await;

    let err = h
        .withdrawals
        .request_withdrawal(&credential, &owner, manual(10_000, "002010077777777772"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidBankAccount(BankAccountError::InvalidChecksum { .. })
    ));
    assert!(h.banks.get(&credential, &owner).await.unwrap().is_none());
    assert_eq!(h.wallet(&owner).await.balance, mxn(30_000));

    let receipt = h
        .withdrawals
        .request_withdrawal(&credential, &owner, manual(10_000, GOOD_CLABE))
        .await
        .unwrap();
    assert_eq!(receipt.settlement_window, SettlementWindow::new(3, 5));
    let saved = h.banks.get(&credential, &owner).await.unwrap().unwrap();
    assert_eq!(saved.clabe.as_str(), GOOD_CLABE);

    // later requests may reuse the account on file
    let again = h
        .withdrawals
        .request_withdrawal(
            &credential,
            &owner,
            WithdrawalInput {
                amount_cents: 5_000,
                rail: Rail::Manual,
                bank_account: None,
            },
        )
        .await
        .unwrap();
    h.withdrawals.drain().await;
    let payout = h.processor.payout(&again.request_id).unwrap();
    assert!(matches!(
        payout.destination,
        PayoutDestination::Spei(ref c) if c.as_str() == GOOD_CLABE
    ));

    let requests = h.withdrawals.list_requests(&credential, &owner).await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].id, again.request_id);
    assert_eq!(h.wallet(&owner).await.balance, mxn(15_000));
}

#[tokio::test]
async fn manual_rail_without_any_account_is_rejected() {
    let h = harness();
    let owner = OwnerId::new("rest-4");
    h.fund(&owner, 30_000, 0).await;

    let err = h
        .withdrawals
        .request_withdrawal(
            &Credential::owner(owner.clone()),
            &owner,
            WithdrawalInput {
                amount_cents: 10_000,
                rail: Rail::Manual,
                bank_account: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidBankAccount(BankAccountError::Missing)
    ));
}

#[tokio::test]
async fn credentials_are_checked_on_every_call() {
    let h = harness();
    let owner = OwnerId::new("rest-1");
    let intruder = Credential::owner(OwnerId::new("rest-666"));
    h.fund(&owner, 12_500, 0).await;
    h.onboard(&owner, eligible()).await;

    assert!(matches!(
        h.withdrawals
            .request_withdrawal(&intruder, &owner, instant(6_000))
            .await,
        Err(Error::Unauthorized(_))
    ));

    let receipt = h
        .withdrawals
        .request_withdrawal(&Credential::owner(owner.clone()), &owner, instant(6_000))
        .await
        .unwrap();
    assert!(matches!(
        h.withdrawals
            .complete_payout(
                &Credential::owner(owner.clone()),
                receipt.request_id,
                PayoutOutcome::Paid
            )
            .await,
        Err(Error::Unauthorized(_))
    ));
    assert!(matches!(
        h.withdrawals.get_request(&intruder, receipt.request_id).await,
        Err(Error::Unauthorized(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_withdrawals_never_double_spend() {
    let h = Arc::new(harness());
    let owner = OwnerId::new("rest-1");
    h.fund(&owner, 10_000, 0).await;
    h.onboard(&owner, eligible()).await;

    let attempt = |h: Arc<Harness>, owner: OwnerId| async move {
        h.withdrawals
            .request_withdrawal(&Credential::owner(owner.clone()), &owner, instant(6_000))
            .await
    };
    let (first, second) = tokio::join!(
        tokio::spawn(attempt(h.clone(), owner.clone())),
        tokio::spawn(attempt(h.clone(), owner.clone())),
    );
    let results = [first.unwrap(), second.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(Error::InsufficientFunds { .. })))
    );
    let wallet = h.wallet(&owner).await;
    assert_eq!(wallet.balance, mxn(4_000));
    assert_eq!(wallet.total_withdrawn, mxn(6_000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_withdrawals_stop_at_the_balance() {
    let h = Arc::new(harness());
    let owner = OwnerId::new("rest-1");
    h.fund(&owner, 52_000, 0).await;
    h.onboard(&owner, eligible()).await;

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let h = h.clone();
        let owner = owner.clone();
        tasks.push(tokio::spawn(async move {
            h.withdrawals
                .request_withdrawal(&Credential::owner(owner.clone()), &owner, instant(5_000))
                .await
        }));
    }
    let mut accepted = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 10);
    let wallet = h.wallet(&owner).await;
    assert_eq!(wallet.balance, mxn(2_000));
    assert!(wallet.balance.cents >= 0);
    h.withdrawals.drain().await;
    assert_eq!(h.processor.payout_count(), 10);
    h.ledger.reconcile(&Credential::system(), &owner).await.unwrap();
}

#[tokio::test]
async fn totals_reconcile_with_the_log() {
    let h = harness();
    let owner = OwnerId::new("driver-4");
    let system = Credential::system();
    h.onboard(&owner, eligible()).await;

    let credits = [12_500, 3_000, 700, 9_900];
    for cents in credits {
        h.ledger
            .apply_credit(&system, &owner, mxn(cents), TransactionKind::Income)
            .await
            .unwrap();
    }
    let mut completed = 0;
    for cents in [5_000, 7_500] {
        let receipt = h
            .withdrawals
            .request_withdrawal(&Credential::owner(owner.clone()), &owner, instant(cents))
            .await
            .unwrap();
        h.withdrawals.drain().await;
        h.withdrawals
            .complete_payout(&system, receipt.request_id, PayoutOutcome::Paid)
            .await
            .unwrap();
        completed += cents;
    }

    let report = h.ledger.reconcile(&system, &owner).await.unwrap();
    assert_eq!(report.wallet, report.log);
    assert_eq!(report.log.total_earned, credits.iter().sum::<i64>());
    assert_eq!(report.log.total_withdrawn, completed);
}

#[tokio::test]
async fn wallet_read_contract_uses_integer_cents() {
    let h = harness();
    let owner = OwnerId::new("rest-1");
    h.fund(&owner, 12_500, 3_000).await;

    let json = serde_json::to_value(h.wallet(&owner).await).unwrap();
    assert_eq!(json["owner_id"], "rest-1");
    assert_eq!(json["currency"], "MXN");
    assert_eq!(json["balance"], 12_500);
    assert_eq!(json["cash_owed"], 3_000);
    assert_eq!(json["available_for_withdrawal"], 9_500);

    let status = h
        .connect
        .status(&Credential::owner(owner.clone()), &owner)
        .await
        .unwrap();
    let json = serde_json::to_value(status).unwrap();
    assert_eq!(json["has_account"], false);
    assert_eq!(json["can_receive_payments"], false);
}
