//! Administrator actions over members, balances, messages and SMS.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use mockable::Clock;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use super::ports::{DataService, Order, Query, Row, RowFilter, Table, encode_row};
use super::service_support::{fetch, insert_one, map_query_error, profile_of};
use super::{
    Adjustment, AdminMessage, Amount, BalanceAdjustment, Contribution, ContributionStatus, Error,
    MemberProfile, MemberSettingsPatch, OutgoingMessage, PrincipalId, RecordedContribution, Role,
    RoleAssignment, SmsLog, SmsNotifier, effective_balance,
};

/// Default number of SMS log rows returned.
pub const SMS_LOG_PAGE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub profile: MemberProfile,
    pub balance: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberDetail {
    pub profile: MemberProfile,
    pub contributions: Vec<Contribution>,
    pub adjustments: Vec<BalanceAdjustment>,
    pub balance: Amount,
}

/// A recorded message and whether its SMS copy went out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageDelivery {
    pub message: AdminMessage,
    pub sms_sent: bool,
}

/// Counts from a reminder broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderReport {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct AdminService {
    data: Arc<dyn DataService>,
    sms: SmsNotifier,
    clock: Arc<dyn Clock>,
}

impl AdminService {
    pub fn new(data: Arc<dyn DataService>, sms: SmsNotifier, clock: Arc<dyn Clock>) -> Self {
        Self { data, sms, clock }
    }

    /// Non-admin members with their effective balances, by name.
    pub async fn list_members(&self) -> Result<Vec<MemberSummary>, Error> {
        let profiles = self.member_profiles().await?;
        let contributions: Vec<Contribution> =
            fetch(&*self.data, Query::from(Table::Contributions)).await?;
        let adjustments: Vec<BalanceAdjustment> =
            fetch(&*self.data, Query::from(Table::BalanceAdjustments)).await?;

        let mut by_member: BTreeMap<PrincipalId, (Vec<Contribution>, Vec<BalanceAdjustment>)> =
            BTreeMap::new();
        for row in contributions {
            by_member.entry(row.user_id).or_default().0.push(row);
        }
        for row in adjustments {
            by_member.entry(row.user_id).or_default().1.push(row);
        }

        let mut summaries: Vec<_> = profiles
            .into_iter()
            .map(|profile| {
                let balance = by_member
                    .get(&profile.user_id)
                    .map_or(Amount::ZERO, |(c, a)| effective_balance(c, a));
                MemberSummary { profile, balance }
            })
            .collect();
        summaries.sort_by(|a, b| a.profile.full_name.cmp(&b.profile.full_name));
        Ok(summaries)
    }

    pub async fn member_detail(&self, user_id: PrincipalId) -> Result<MemberDetail, Error> {
        let profile = profile_of(&*self.data, user_id).await?;
        let contributions: Vec<Contribution> = fetch(
            &*self.data,
            Query::from(Table::Contributions)
                .filter(RowFilter::eq("user_id", user_id))
                .order_by("contribution_date", Order::Descending),
        )
        .await?;
        let adjustments: Vec<BalanceAdjustment> = fetch(
            &*self.data,
            Query::from(Table::BalanceAdjustments)
                .filter(RowFilter::eq("user_id", user_id))
                .order_by("created_at", Order::Descending),
        )
        .await?;
        let balance = effective_balance(&contributions, &adjustments);
        Ok(MemberDetail {
            profile,
            contributions,
            adjustments,
            balance,
        })
    }

    /// Append an adjustment row, then bump the profile's running total.
    pub async fn adjust_balance(
        &self,
        admin_id: PrincipalId,
        user_id: PrincipalId,
        adjustment: &Adjustment,
    ) -> Result<BalanceAdjustment, Error> {
        let profile = profile_of(&*self.data, user_id).await?;
        let row = BalanceAdjustment {
            id: Uuid::new_v4(),
            user_id,
            admin_id,
            amount: adjustment.signed_amount(),
            reason: adjustment.reason.clone(),
            created_at: self.clock.utc(),
        };
        let stored = insert_one(&*self.data, Table::BalanceAdjustments, &row)
            .await?
            .unwrap_or(row);

        let mut patch = Row::new();
        patch.insert(
            "balance_adjustment".to_owned(),
            json!(profile.balance_adjustment.saturating_add(stored.amount)),
        );
        self.update_profile(user_id, patch).await?;
        info!(
            admin_id = %admin_id,
            user_id = %user_id,
            amount = %stored.amount,
            kind = ?stored.kind(),
            "balance adjusted"
        );
        Ok(stored)
    }

    /// Record a contribution for an arbitrary date. No same-day check applies.
    pub async fn add_contribution(
        &self,
        user_id: PrincipalId,
        input: &RecordedContribution,
    ) -> Result<Contribution, Error> {
        profile_of(&*self.data, user_id).await?;
        let row = Contribution {
            id: Uuid::new_v4(),
            user_id,
            amount: input.amount,
            contribution_date: input.date,
            status: ContributionStatus::Completed,
            notes: input.notes.clone(),
            created_at: self.clock.utc(),
        };
        let stored = insert_one(&*self.data, Table::Contributions, &row).await?;
        info!(user_id = %user_id, date = %input.date, amount = %input.amount, "contribution added");
        Ok(stored.unwrap_or(row))
    }

    pub async fn delete_contribution(&self, contribution_id: Uuid) -> Result<(), Error> {
        let removed = self
            .data
            .delete(Table::Contributions, &[RowFilter::eq("id", contribution_id)])
            .await
            .map_err(map_query_error)?;
        if removed == 0 {
            return Err(Error::not_found(format!(
                "contribution {contribution_id} not found"
            )));
        }
        info!(%contribution_id, "contribution deleted");
        Ok(())
    }

    pub async fn update_settings(
        &self,
        user_id: PrincipalId,
        patch: &MemberSettingsPatch,
    ) -> Result<MemberProfile, Error> {
        if patch.is_empty() {
            return Err(Error::invalid_request("no settings to update"));
        }
        if patch
            .daily_contribution_amount
            .is_some_and(|amount| amount < Amount::ZERO)
        {
            return Err(Error::invalid_request(
                "daily contribution amount must not be negative",
            )
            .with_details(json!({ "fields": [{
                "field": "dailyContributionAmount",
                "code": "negative",
                "message": "daily contribution amount must not be negative",
            }] })));
        }
        let row = encode_row(patch).map_err(map_query_error)?;
        let updated = self.update_profile(user_id, row).await?;
        info!(user_id = %user_id, "member settings updated");
        Ok(updated)
    }

    /// Record the message, then try to text it. SMS failure leaves the
    /// message in place.
    pub async fn send_message(
        &self,
        admin_id: PrincipalId,
        user_id: PrincipalId,
        message: &OutgoingMessage,
    ) -> Result<MessageDelivery, Error> {
        let profile = profile_of(&*self.data, user_id).await?;
        let row = AdminMessage {
            id: Uuid::new_v4(),
            user_id,
            admin_id,
            message: message.body.clone(),
            message_type: message.category,
            is_read: false,
            created_at: self.clock.utc(),
        };
        let stored = insert_one(&*self.data, Table::AdminMessages, &row)
            .await?
            .unwrap_or(row);
        let sms_sent = self
            .sms
            .notify_member(user_id, &profile.phone_number, &stored.message, stored.message_type)
            .await;
        info!(admin_id = %admin_id, user_id = %user_id, sms_sent, "message sent");
        Ok(MessageDelivery {
            message: stored,
            sms_sent,
        })
    }

    /// Text every member a reminder of their daily amount. Members without a
    /// phone number are skipped.
    pub async fn broadcast_reminder(&self) -> Result<ReminderReport, Error> {
        let mut report = ReminderReport::default();
        for profile in self.member_profiles().await? {
            if profile.phone_number.trim().is_empty() {
                report.skipped += 1;
                continue;
            }
            let text = reminder_text(&profile);
            if self.sms.send_text(&profile.phone_number, &text).await {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }
        info!(
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "reminder broadcast finished"
        );
        Ok(report)
    }

    /// Most recent SMS log rows.
    pub async fn sms_logs(&self, limit: usize) -> Result<Vec<SmsLog>, Error> {
        fetch(
            &*self.data,
            Query::from(Table::SmsLogs)
                .order_by("created_at", Order::Descending)
                .limit(limit),
        )
        .await
    }

    async fn member_profiles(&self) -> Result<Vec<MemberProfile>, Error> {
        let admins: HashSet<PrincipalId> = fetch::<RoleAssignment>(
            &*self.data,
            Query::from(Table::UserRoles).filter(RowFilter::eq("role", Role::Admin.as_str())),
        )
        .await?
        .into_iter()
        .map(|role| role.user_id)
        .collect();
        let profiles: Vec<MemberProfile> = fetch(&*self.data, Query::from(Table::Profiles)).await?;
        Ok(profiles
            .into_iter()
            .filter(|profile| !admins.contains(&profile.user_id))
            .collect())
    }

    async fn update_profile(&self, user_id: PrincipalId, patch: Row) -> Result<MemberProfile, Error> {
        let rows = self
            .data
            .update(Table::Profiles, &[RowFilter::eq("user_id", user_id)], patch)
            .await
            .map_err(map_query_error)?;
        let Some(row) = rows.into_iter().next() else {
            return Err(Error::not_found(format!("member {user_id} has no profile")));
        };
        serde_json::from_value(Value::Object(row))
            .map_err(|err| Error::internal(format!("profile row malformed: {err}")))
    }
}

fn reminder_text(profile: &MemberProfile) -> String {
    let first_name = profile
        .full_name
        .split_whitespace()
        .next()
        .unwrap_or(profile.full_name.as_str());
    if profile.daily_contribution_amount.is_positive() {
        format!(
            "Hello {first_name}, this is a reminder to make today's contribution of {}.",
            profile.daily_contribution_amount
        )
    } else {
        format!("Hello {first_name}, this is a reminder to make today's contribution.")
    }
}
