use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standing entitlement that bypasses credit checks (staff, reviewers, comps).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountException {
    pub id: Uuid,
    pub user_email: String,
    pub exception_type: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl AccountException {
    /// Active and either open-ended or not yet expired.
    pub fn is_in_effect(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |expires| expires > now)
    }
}

/// Outcome of an exception lookup, tagged with where the answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "active", rename_all = "lowercase")]
pub enum ExceptionResolution {
    /// Answered by the ledger just now
    Remote(bool),
    /// Ledger unreachable; last cached answer (false if never cached)
    Cached(bool),
}

impl ExceptionResolution {
    pub fn is_active(self) -> bool {
        match self {
            Self::Remote(active) | Self::Cached(active) => active,
        }
    }

    pub fn is_remote(self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn exception(is_active: bool, expires_at: Option<DateTime<Utc>>) -> AccountException {
        AccountException {
            id: Uuid::new_v4(),
            user_email: "reviewer@example.com".into(),
            exception_type: "unlimited".into(),
            reason: Some("app review".into()),
            created_at: Utc::now() - Duration::days(30),
            expires_at,
            is_active,
        }
    }

    #[test]
    fn open_ended_active_exception_applies() {
        assert!(exception(true, None).is_in_effect(Utc::now()));
    }

    #[test]
    fn expired_or_inactive_exceptions_do_not_apply() {
        let now = Utc::now();
        assert!(!exception(true, Some(now - Duration::minutes(1))).is_in_effect(now));
        assert!(!exception(true, Some(now)).is_in_effect(now));
        assert!(!exception(false, None).is_in_effect(now));
        assert!(exception(true, Some(now + Duration::days(1))).is_in_effect(now));
    }

    #[test]
    fn resolution_accessors() {
        assert!(ExceptionResolution::Cached(true).is_active());
        assert!(!ExceptionResolution::Cached(true).is_remote());
        assert!(ExceptionResolution::Remote(false).is_remote());
    }
}
