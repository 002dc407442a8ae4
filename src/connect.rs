use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::domain::{
    ConnectAccount, ConnectAccountType, ConnectStatus, ConnectStatusView, Credential, Error,
    ExternalAccountId, OnboardingLink, OwnerId, PaymentProcessor,
};

/// Onboarding progress of each owner's processor sub-account.
///
/// Only the three status flags are stored; whether an account can receive
/// payments is always derived from them on read.
#[derive(Debug)]
pub struct ConnectAccounts<P> {
    processor: Arc<P>,
    accounts: RwLock<HashMap<OwnerId, ConnectAccount>>,
    onboarding: Mutex<HashMap<OwnerId, Arc<Mutex<()>>>>,
}

impl<P: PaymentProcessor> ConnectAccounts<P> {
    pub fn new(processor: Arc<P>) -> Self {
        Self {
            processor,
            accounts: RwLock::new(HashMap::new()),
            onboarding: Mutex::new(HashMap::new()),
        }
    }

    /// Creates the sub-account on first call, then hands back a fresh link.
    pub async fn start_onboarding(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
        account_type: ConnectAccountType,
    ) -> Result<OnboardingLink, Error> {
        credential.authorize(owner_id)?;

        let external_account_id = match self.account(owner_id).await {
            Some(account) => account.external_account_id,
            None => self.create_account(owner_id, account_type).await?,
        };

        self.processor
            .create_onboarding_link(&external_account_id)
            .await
    }

    /// Serializes account creation per owner. The processor is called
    /// without holding the account map lock.
    async fn create_account(
        &self,
        owner_id: &OwnerId,
        account_type: ConnectAccountType,
    ) -> Result<ExternalAccountId, Error> {
        let gate = self
            .onboarding
            .lock()
            .await
            .entry(owner_id.clone())
            .or_default()
            .clone();
        let _creating = gate.lock().await;

        if let Some(account) = self.account(owner_id).await {
            return Ok(account.external_account_id);
        }
        let external_account_id = self.processor.create_account(owner_id, account_type).await?;

        let now = Utc::now();
        self.accounts.write().await.insert(
            owner_id.clone(),
            ConnectAccount {
                owner_id: owner_id.clone(),
                external_account_id: external_account_id.clone(),
                account_type,
                status: ConnectStatus::default(),
                created_at: now,
                updated_at: now,
            },
        );
        info!(owner = %owner_id, account = %external_account_id, "connect account created");
        Ok(external_account_id)
    }

    /// Applies a status callback from the processor. Repeating it is harmless.
    pub async fn record_status(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
        status: ConnectStatus,
    ) -> Result<ConnectStatusView, Error> {
        credential.require_system(owner_id)?;
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(owner_id)
            .ok_or_else(|| Error::ConnectAccountMissing(owner_id.clone()))?;
        if account.status != status {
            info!(owner = %owner_id, ?status, "connect status changed");
            account.status = status;
            account.updated_at = Utc::now();
        }
        Ok(ConnectStatusView::from(&*account))
    }

    /// Pulls the latest flags from the processor. Returns a new onboarding
    /// link while onboarding is incomplete, `None` once it is done.
    pub async fn refresh(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
    ) -> Result<Option<OnboardingLink>, Error> {
        credential.authorize(owner_id)?;
        let external_account_id = self
            .account(owner_id)
            .await
            .map(|account| account.external_account_id)
            .ok_or_else(|| Error::ConnectAccountMissing(owner_id.clone()))?;

        let status = self.processor.fetch_status(&external_account_id).await?;
        let view = self
            .record_status(&Credential::system(), owner_id, status)
            .await?;
        if view.can_receive_payments {
            return Ok(None);
        }

        self.processor
            .create_onboarding_link(&external_account_id)
            .await
            .map(Some)
    }

    pub async fn status(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
    ) -> Result<ConnectStatusView, Error> {
        credential.authorize(owner_id)?;
        Ok(self
            .accounts
            .read()
            .await
            .get(owner_id)
            .map(ConnectStatusView::from)
            .unwrap_or_else(ConnectStatusView::none))
    }

    pub async fn account(&self, owner_id: &OwnerId) -> Option<ConnectAccount> {
        self.accounts.read().await.get(owner_id).cloned()
    }
}
