use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::{BankAccount, BankAccountDraft, Credential, Error, OwnerId};

/// Manual-rail payout destinations. Only validated accounts are stored.
#[derive(Debug, Default)]
pub struct BankAccountBook {
    accounts: RwLock<HashMap<OwnerId, BankAccount>>,
}

impl BankAccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
        draft: &BankAccountDraft,
    ) -> Result<BankAccount, Error> {
        credential.authorize(owner_id)?;
        let account = draft.validate(owner_id).inspect_err(|e| {
            warn!(owner = %owner_id, error = %e, "bank account rejected");
        })?;
        self.upsert(account.clone()).await;
        Ok(account)
    }

    pub async fn get(
        &self,
        credential: &Credential,
        owner_id: &OwnerId,
    ) -> Result<Option<BankAccount>, Error> {
        credential.authorize(owner_id)?;
        Ok(self.accounts.read().await.get(owner_id).cloned())
    }

    pub(crate) async fn upsert(&self, account: BankAccount) {
        info!(
            owner = %account.owner_id,
            clabe = %account.clabe,
            bank = %account.bank_name,
            "bank account saved"
        );
        self.accounts
            .write()
            .await
            .insert(account.owner_id.clone(), account);
    }
}
