//! Member self-service: dashboard, daily contribution, messages, payments.

use std::sync::Arc;

use mockable::Clock;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use super::ports::{DataService, Order, Query, Row, RowFilter, Table};
use super::service_support::{fetch, insert_one, map_query_error, profile_of};
use super::{
    AdminMessage, Amount, BalanceAdjustment, Contribution, ContributionStatus, Error,
    MemberProfile, PaymentReceipt, PaymentRequest, PaymentService, PaymentTransaction,
    PrincipalId, SelfContribution, effective_balance, has_contribution_on,
};

/// Everything the member home shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberDashboard {
    pub profile: MemberProfile,
    /// Newest first.
    pub contributions: Vec<Contribution>,
    /// Present only when the administrator made the balance visible.
    pub balance: Option<Amount>,
    pub unread_messages: usize,
}

#[derive(Clone)]
pub struct MemberService {
    data: Arc<dyn DataService>,
    payments: PaymentService,
    clock: Arc<dyn Clock>,
}

impl MemberService {
    pub fn new(data: Arc<dyn DataService>, payments: PaymentService, clock: Arc<dyn Clock>) -> Self {
        Self {
            data,
            payments,
            clock,
        }
    }

    pub async fn dashboard(&self, user_id: PrincipalId) -> Result<MemberDashboard, Error> {
        let profile = self.profile(user_id).await?;
        let contributions = self.contributions(user_id).await?;
        let balance = if profile.balance_visible {
            let adjustments: Vec<BalanceAdjustment> = fetch(
                &*self.data,
                Query::from(Table::BalanceAdjustments).filter(RowFilter::eq("user_id", user_id)),
            )
            .await?;
            Some(effective_balance(&contributions, &adjustments))
        } else {
            None
        };
        let unread_messages = self
            .data
            .select(
                &Query::from(Table::AdminMessages)
                    .filter(RowFilter::eq("user_id", user_id))
                    .filter(RowFilter::eq("is_read", false)),
            )
            .await
            .map_err(map_query_error)?
            .len();
        Ok(MemberDashboard {
            profile,
            contributions,
            balance,
            unread_messages,
        })
    }

    /// Record today's contribution. The one-per-day rule is checked against
    /// the fetched history only; the store does not enforce it.
    pub async fn record_today(
        &self,
        user_id: PrincipalId,
        input: &SelfContribution,
    ) -> Result<Contribution, Error> {
        let profile = self.profile(user_id).await?;
        let now = self.clock.utc();
        let today = now.date_naive();
        let history = self.contributions(user_id).await?;
        if has_contribution_on(&history, today) {
            return Err(Error::conflict("a contribution is already recorded for today")
                .with_details(serde_json::json!({ "date": today })));
        }
        let amount = input.amount.unwrap_or(profile.daily_contribution_amount);
        if !amount.is_positive() {
            return Err(Error::invalid_request(
                "no daily contribution amount is configured; enter an amount",
            ));
        }
        let contribution = Contribution {
            id: Uuid::new_v4(),
            user_id,
            amount,
            contribution_date: today,
            status: ContributionStatus::Completed,
            notes: input.notes.clone(),
            created_at: now,
        };
        let stored = insert_one(&*self.data, Table::Contributions, &contribution).await?;
        info!(user_id = %user_id, amount = %amount, "contribution recorded");
        Ok(stored.unwrap_or(contribution))
    }

    /// Messages addressed to `user_id`, newest first.
    pub async fn messages(&self, user_id: PrincipalId) -> Result<Vec<AdminMessage>, Error> {
        fetch(
            &*self.data,
            Query::from(Table::AdminMessages)
                .filter(RowFilter::eq("user_id", user_id))
                .order_by("created_at", Order::Descending),
        )
        .await
    }

    pub async fn mark_read(&self, user_id: PrincipalId, message_id: Uuid) -> Result<(), Error> {
        let mut patch = Row::new();
        patch.insert("is_read".to_owned(), Value::Bool(true));
        let updated = self
            .data
            .update(
                Table::AdminMessages,
                &[
                    RowFilter::eq("id", message_id),
                    RowFilter::eq("user_id", user_id),
                ],
                patch,
            )
            .await
            .map_err(map_query_error)?;
        if updated.is_empty() {
            return Err(Error::not_found(format!("message {message_id} not found")));
        }
        Ok(())
    }

    pub async fn initiate_payment(
        &self,
        user_id: PrincipalId,
        request: &PaymentRequest,
    ) -> Result<PaymentReceipt, Error> {
        let profile = self.profile(user_id).await?;
        self.payments.initiate(&profile, request).await
    }

    pub async fn transactions(&self, user_id: PrincipalId) -> Result<Vec<PaymentTransaction>, Error> {
        self.payments.transactions(user_id).await
    }

    async fn profile(&self, user_id: PrincipalId) -> Result<MemberProfile, Error> {
        profile_of(&*self.data, user_id).await
    }

    async fn contributions(&self, user_id: PrincipalId) -> Result<Vec<Contribution>, Error> {
        fetch(
            &*self.data,
            Query::from(Table::Contributions)
                .filter(RowFilter::eq("user_id", user_id))
                .order_by("contribution_date", Order::Descending),
        )
        .await
    }
}
