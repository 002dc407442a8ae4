use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, Utc};
use tracing::debug;

use crate::domain::{
    ConnectAccountType, ConnectStatus, Error, ExternalAccountId, OnboardingLink, OwnerId,
    PaymentProcessor, PayoutInstruction, RequestId,
};

/// In-process stand-in for the payment processor, for local runs and tests.
///
/// Payouts are keyed by request id, so resubmitting a request is a no-op.
#[derive(Debug, Default)]
pub struct SandboxProcessor {
    state: Mutex<SandboxState>,
}

#[derive(Debug, Default)]
struct SandboxState {
    accounts: HashMap<ExternalAccountId, (OwnerId, ConnectAccountType)>,
    statuses: HashMap<ExternalAccountId, ConnectStatus>,
    payouts: HashMap<RequestId, PayoutInstruction>,
    links_issued: u64,
    submissions: u64,
    unreachable: bool,
}

impl SandboxProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SandboxState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_status(&self, account_id: &ExternalAccountId, status: ConnectStatus) {
        self.state().statuses.insert(account_id.clone(), status);
    }

    /// Makes every following call fail as if the processor were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    pub fn account_count(&self) -> usize {
        self.state().accounts.len()
    }

    pub fn payout(&self, request_id: &RequestId) -> Option<PayoutInstruction> {
        self.state().payouts.get(request_id).cloned()
    }

    pub fn payout_count(&self) -> usize {
        self.state().payouts.len()
    }

    pub fn submission_count(&self) -> u64 {
        self.state().submissions
    }

    fn reachable(state: &SandboxState) -> Result<(), Error> {
        if state.unreachable {
            return Err(Error::ExternalService("processor unreachable".to_string()));
        }
        Ok(())
    }
}

impl PaymentProcessor for SandboxProcessor {
    async fn create_account(
        &self,
        owner_id: &OwnerId,
        account_type: ConnectAccountType,
    ) -> Result<ExternalAccountId, Error> {
        let mut state = self.state();
        Self::reachable(&state)?;
        let id = ExternalAccountId::new(format!("acct_sandbox_{}", state.accounts.len() + 1));
        state
            .accounts
            .insert(id.clone(), (owner_id.clone(), account_type));
        Ok(id)
    }

    async fn fetch_status(&self, account_id: &ExternalAccountId) -> Result<ConnectStatus, Error> {
        let state = self.state();
        Self::reachable(&state)?;
        if !state.accounts.contains_key(account_id) {
            return Err(Error::ExternalService(format!("unknown account {}", account_id)));
        }
        Ok(state.statuses.get(account_id).copied().unwrap_or_default())
    }

    async fn create_onboarding_link(
        &self,
        account_id: &ExternalAccountId,
    ) -> Result<OnboardingLink, Error> {
        let mut state = self.state();
        Self::reachable(&state)?;
        state.links_issued += 1;
        Ok(OnboardingLink {
            url: format!(
                "https://connect.sandbox.invalid/onboarding/{}?link={}",
                account_id, state.links_issued
            ),
            expires_at: Utc::now() + Duration::minutes(30),
        })
    }

    async fn submit_payout(&self, payout: &PayoutInstruction) -> Result<(), Error> {
        let mut state = self.state();
        state.submissions += 1;
        Self::reachable(&state)?;
        if state.payouts.contains_key(&payout.request_id) {
            debug!(request_id = %payout.request_id, "duplicate payout submission ignored");
            return Ok(());
        }
        state.payouts.insert(payout.request_id, payout.clone());
        Ok(())
    }
}
