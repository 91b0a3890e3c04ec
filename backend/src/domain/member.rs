//! Member profile rows (`profiles`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Amount, PrincipalId};

/// One profile per principal.
///
/// `balance_adjustment` is the running total of administrative adjustments;
/// the authoritative balance is still derived from the history rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MemberProfile {
    pub id: Uuid,
    pub user_id: PrincipalId,
    pub full_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub balance_visible: bool,
    #[serde(default)]
    pub daily_contribution_amount: Amount,
    #[serde(default)]
    pub balance_adjustment: Amount,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MemberProfile {
    /// Fresh profile for a newly registered principal.
    #[must_use]
    pub fn new(
        user_id: PrincipalId,
        full_name: impl Into<String>,
        phone_number: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            full_name: full_name.into(),
            phone_number: phone_number.into(),
            balance_visible: false,
            daily_contribution_amount: Amount::ZERO,
            balance_adjustment: Amount::ZERO,
            is_online: false,
            last_seen: None,
            created_at: now,
        }
    }
}

/// Partial update applied by administrators to a member profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemberSettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_contribution_amount: Option<Amount>,
}

impl MemberSettingsPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.balance_visible.is_none() && self.daily_contribution_amount.is_none()
    }
}
