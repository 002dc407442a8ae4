use chrono::{DateTime, Utc};

use crate::domain::{Error, OwnerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// A wallet owner acting on their own data.
    Owner(OwnerId),
    /// Settlement feeds and processor callbacks.
    System,
}

/// Explicit auth context passed into every ledger and processor call.
#[derive(Debug, Clone)]
pub struct Credential {
    principal: Principal,
    issued_at: DateTime<Utc>,
}

impl Credential {
    pub fn owner(owner_id: OwnerId) -> Self {
        Self {
            principal: Principal::Owner(owner_id),
            issued_at: Utc::now(),
        }
    }

    pub fn system() -> Self {
        Self {
            principal: Principal::System,
            issued_at: Utc::now(),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn is_system(&self) -> bool {
        self.principal == Principal::System
    }

    pub fn authorize(&self, owner_id: &OwnerId) -> Result<(), Error> {
        match &self.principal {
            Principal::System => Ok(()),
            Principal::Owner(id) if id == owner_id => Ok(()),
            Principal::Owner(_) => Err(Error::Unauthorized(owner_id.clone())),
        }
    }

    pub fn require_system(&self, owner_id: &OwnerId) -> Result<(), Error> {
        if self.is_system() {
            Ok(())
        } else {
            Err(Error::Unauthorized(owner_id.clone()))
        }
    }
}
