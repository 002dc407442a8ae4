use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ExternalAccountId, OwnerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectAccountType {
    Business,
    Driver,
}

/// The three flags the processor reports for a sub-account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectStatus {
    pub details_submitted: bool,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
}

impl ConnectStatus {
    pub fn can_receive_payments(&self) -> bool {
        self.details_submitted && self.charges_enabled && self.payouts_enabled
    }
}

#[derive(Debug, Clone)]
pub struct ConnectAccount {
    pub owner_id: OwnerId,
    pub external_account_id: ExternalAccountId,
    pub account_type: ConnectAccountType,
    pub status: ConnectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectAccount {
    pub fn can_receive_payments(&self) -> bool {
        self.status.can_receive_payments()
    }
}

/// Opaque handle the UI opens to continue onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnboardingLink {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectStatusView {
    pub has_account: bool,
    pub details_submitted: bool,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub can_receive_payments: bool,
}

impl ConnectStatusView {
    pub fn none() -> Self {
        Self {
            has_account: false,
            details_submitted: false,
            charges_enabled: false,
            payouts_enabled: false,
            can_receive_payments: false,
        }
    }
}

impl From<&ConnectAccount> for ConnectStatusView {
    fn from(account: &ConnectAccount) -> Self {
        Self {
            has_account: true,
            details_submitted: account.status.details_submitted,
            charges_enabled: account.status.charges_enabled,
            payouts_enabled: account.status.payouts_enabled,
            can_receive_payments: account.can_receive_payments(),
        }
    }
}
