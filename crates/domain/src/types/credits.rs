use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Non-negative count of consumable credits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreditBalance(u32);

impl CreditBalance {
    pub const ZERO: Self = Self(0);

    pub const fn new(credits: u32) -> Self {
        Self(credits)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `None` when the balance is already zero.
    pub fn checked_decrement(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    pub fn checked_add(self, credits: u32) -> Option<Self> {
        self.0.checked_add(credits).map(Self)
    }

    pub fn saturating_add(self, credits: u32) -> Self {
        Self(self.0.saturating_add(credits))
    }

    /// Lossy conversion for values read back from untrusted storage.
    /// Negative values clamp to zero.
    pub fn from_stored(value: i64) -> Self {
        Self(u32::try_from(value.max(0)).unwrap_or(u32::MAX))
    }
}

impl TryFrom<i64> for CreditBalance {
    type Error = std::num::TryFromIntError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value).map(Self)
    }
}

impl From<CreditBalance> for i64 {
    fn from(balance: CreditBalance) -> Self {
        i64::from(balance.0)
    }
}

impl fmt::Display for CreditBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signed-in user as reported by the session collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    /// Account exceptions are keyed by email; an identity without one never
    /// holds an exception.
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: Uuid, email: Option<String>) -> Self {
        Self { user_id, email }
    }
}

/// What observers of the reconciler see after every change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub credits: CreditBalance,
    pub has_account_exception: bool,
}

impl BalanceSnapshot {
    /// An exception holder can always spend; everyone else needs a credit.
    pub fn has_credits(&self) -> bool {
        self.has_account_exception || !self.credits.is_zero()
    }
}

/// Where a loaded balance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceSource {
    Remote,
    Cache,
}

/// Result of `load_credits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub balance: CreditBalance,
    pub has_exception: bool,
    pub source: BalanceSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrement_stops_at_zero() {
        assert_eq!(CreditBalance::new(1).checked_decrement(), Some(CreditBalance::ZERO));
        assert_eq!(CreditBalance::ZERO.checked_decrement(), None);
    }

    #[test]
    fn stored_values_clamp() {
        assert_eq!(CreditBalance::from_stored(-4), CreditBalance::ZERO);
        assert_eq!(CreditBalance::from_stored(25).get(), 25);
        assert_eq!(CreditBalance::from_stored(i64::MAX).get(), u32::MAX);
    }

    #[test]
    fn negative_remote_balance_is_rejected() {
        assert!(CreditBalance::try_from(-1_i64).is_err());
        assert_eq!(CreditBalance::try_from(60_i64).unwrap(), CreditBalance::new(60));
    }

    #[test]
    fn exception_counts_as_credit() {
        let snapshot = BalanceSnapshot { credits: CreditBalance::ZERO, has_account_exception: true };
        assert!(snapshot.has_credits());
        assert!(!BalanceSnapshot::default().has_credits());
    }
}
