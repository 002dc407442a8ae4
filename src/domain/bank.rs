use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::OwnerId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BankAccountError {
    #[error("CLABE must be {expected} digits, got {0}", expected = Clabe::LENGTH)]
    InvalidLength(usize),

    #[error("CLABE must contain digits only")]
    InvalidFormat,

    #[error("CLABE check digit should be {expected}, got {actual}")]
    InvalidChecksum { expected: u8, actual: u8 },

    #[error("bank name is required")]
    MissingBankName,

    #[error("account holder name is required")]
    MissingHolderName,

    #[error("no bank account on file")]
    Missing,
}

/// An 18-digit Mexican interbank account number with a verified check digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Clabe(String);

impl Clabe {
    pub const LENGTH: usize = 18;
    const WEIGHTS: [u32; 3] = [3, 7, 1];

    pub fn parse(input: &str) -> Result<Self, BankAccountError> {
        let len = input.chars().count();
        if len != Self::LENGTH {
            return Err(BankAccountError::InvalidLength(len));
        }
        if !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BankAccountError::InvalidFormat);
        }

        let digits: Vec<u8> = input.bytes().map(|b| b - b'0').collect();
        let expected = Self::check_digit_for(&digits[..Self::LENGTH - 1]);
        let actual = digits[Self::LENGTH - 1];
        if expected != actual {
            return Err(BankAccountError::InvalidChecksum { expected, actual });
        }

        Ok(Self(input.to_string()))
    }

    /// Weighted mod-10 check digit over the first 17 digits.
    pub fn check_digit_for(digits: &[u8]) -> u8 {
        let sum: u32 = digits
            .iter()
            .zip(Self::WEIGHTS.iter().cycle())
            .map(|(d, w)| u32::from(*d) * w)
            .sum();
        ((10 - sum % 10) % 10) as u8
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bank_code(&self) -> &str {
        &self.0[..3]
    }

    pub fn branch_code(&self) -> &str {
        &self.0[3..6]
    }

    pub fn account_number(&self) -> &str {
        &self.0[6..17]
    }

    pub fn check_digit(&self) -> u8 {
        self.0.as_bytes()[17] - b'0'
    }
}

impl core::fmt::Display for Clabe {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}{}", "*".repeat(Self::LENGTH - 4), &self.0[Self::LENGTH - 4..])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankAccountType {
    Checking,
    Savings,
}

/// Unvalidated input from `POST bank-account` or a manual withdrawal.
#[derive(Debug, Clone, Deserialize)]
pub struct BankAccountDraft {
    pub clabe: String,
    pub bank_name: String,
    pub account_holder_name: String,
    pub account_type: BankAccountType,
}

impl BankAccountDraft {
    pub fn validate(&self, owner_id: &OwnerId) -> Result<BankAccount, BankAccountError> {
        let clabe = Clabe::parse(&self.clabe)?;
        let bank_name = self.bank_name.trim();
        if bank_name.is_empty() {
            return Err(BankAccountError::MissingBankName);
        }
        let account_holder_name = self.account_holder_name.trim();
        if account_holder_name.is_empty() {
            return Err(BankAccountError::MissingHolderName);
        }

        Ok(BankAccount {
            owner_id: owner_id.clone(),
            clabe,
            bank_name: bank_name.to_string(),
            account_holder_name: account_holder_name.to_string(),
            account_type: self.account_type,
            updated_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankAccount {
    pub owner_id: OwnerId,
    pub clabe: Clabe,
    pub bank_name: String,
    pub account_holder_name: String,
    pub account_type: BankAccountType,
    pub updated_at: DateTime<Utc>,
}
