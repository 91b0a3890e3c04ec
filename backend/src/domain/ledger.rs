//! Contribution and adjustment history plus the effective balance derived
//! from them.
//!
//! Both collections are append-only at the remote store. Nothing caches the
//! balance; it is recomputed from the rows on every read.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{AdjustmentKind, Amount, PrincipalId};

/// Settlement state of a contribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    #[default]
    Completed,
    Pending,
    Failed,
}

/// A single contribution row (`contributions`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Contribution {
    pub id: Uuid,
    pub user_id: PrincipalId,
    pub amount: Amount,
    pub contribution_date: NaiveDate,
    #[serde(default)]
    pub status: ContributionStatus,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A balance adjustment row (`balance_adjustments`). `amount` is signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BalanceAdjustment {
    pub id: Uuid,
    pub user_id: PrincipalId,
    pub admin_id: PrincipalId,
    pub amount: Amount,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl BalanceAdjustment {
    #[must_use]
    pub fn kind(&self) -> AdjustmentKind {
        AdjustmentKind::of(self.amount)
    }
}

/// Sum of contribution amounts plus signed adjustment amounts.
///
/// Total and pure: empty inputs give zero and the result does not depend on
/// ordering or on how the rows are split into batches.
///
/// # Examples
/// ```
/// use chama::domain::{effective_balance, Amount};
///
/// assert_eq!(effective_balance(&[], &[]), Amount::ZERO);
/// ```
#[must_use]
pub fn effective_balance(
    contributions: &[Contribution],
    adjustments: &[BalanceAdjustment],
) -> Amount {
    contributions
        .iter()
        .map(|row| row.amount)
        .chain(adjustments.iter().map(|row| row.amount))
        .sum()
}

/// True when `contributions` already holds a row dated `day`.
#[must_use]
pub fn has_contribution_on(contributions: &[Contribution], day: NaiveDate) -> bool {
    contributions
        .iter()
        .any(|row| row.contribution_date == day)
}
