//! Multi-factor sub-protocol of login.
//!
//! `FactorsFetched -> ChallengeStarted -> { Completed | Pending | Rejected }`.
//! The poll loop itself lives on [`super::ArloClient`]; this module holds the
//! factor selection and the mapping of finishAuth answers onto outcomes.

use super::models::{FinishAuthData, Meta};
use serde::Deserialize;

/// finishAuth meta error: user has not confirmed yet
pub const MFA_PENDING: u32 = 9233;
/// finishAuth meta error: challenge rejected or expired
pub const MFA_REJECTED: u32 = 9238;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactorRole {
    Primary,
    Secondary,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MfaFactor {
    #[serde(rename = "factorId")]
    pub factor_id: String,
    #[serde(rename = "factorRole")]
    pub factor_role: FactorRole,
    #[serde(rename = "factorType", default)]
    pub factor_type: Option<String>,
}

/// First PRIMARY factor, in the order the cloud listed them
pub fn select_primary(factors: &[MfaFactor]) -> Option<&MfaFactor> {
    factors.iter().find(|f| f.factor_role == FactorRole::Primary)
}

/// Result of one finishAuth poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishAuthOutcome {
    /// Confirmed; carries the replacement session token
    Completed(String),
    /// Not confirmed yet, resubmit the same code after a delay
    Pending,
    /// Terminal failure
    Rejected(String),
}

pub fn classify(meta: &Meta, data: Option<&FinishAuthData>) -> FinishAuthOutcome {
    match (meta.code, meta.error) {
        (400, Some(MFA_PENDING)) => FinishAuthOutcome::Pending,
        (400, Some(MFA_REJECTED)) => FinishAuthOutcome::Rejected(
            meta.message
                .clone()
                .unwrap_or_else(|| "challenge rejected or expired".to_string()),
        ),
        (200, _) => match data {
            Some(FinishAuthData {
                auth_completed: true,
                token: Some(token),
            }) => FinishAuthOutcome::Completed(token.clone()),
            Some(FinishAuthData {
                auth_completed: true,
                token: None,
            }) => FinishAuthOutcome::Rejected("completed without a token".to_string()),
            // 200 but not completed: still waiting on the user
            _ => FinishAuthOutcome::Pending,
        },
        (code, error) => FinishAuthOutcome::Rejected(format!(
            "unexpected finishAuth answer: code {} error {:?}",
            code, error
        )),
    }
}
