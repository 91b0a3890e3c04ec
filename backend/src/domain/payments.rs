//! Payment initiation through `initiate-pesapal-payment` and the member's
//! transaction history.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use super::ports::{
    DataService, FunctionInvoker, FunctionName, Order, Query, RowFilter, Table, decode_rows,
};
use super::service_support::{map_invoke_error, map_query_error};
use super::{
    Error, MemberProfile, PaymentFunctionReply, PaymentReceipt, PaymentRequest,
    PaymentTransaction, PrincipalId,
};

#[derive(Clone)]
pub struct PaymentService {
    data: Arc<dyn DataService>,
    functions: Arc<dyn FunctionInvoker>,
}

impl PaymentService {
    pub fn new(data: Arc<dyn DataService>, functions: Arc<dyn FunctionInvoker>) -> Self {
        Self { data, functions }
    }

    /// Ask the payment function to start a checkout for `profile`. The phone
    /// number defaults to the profile's.
    pub async fn initiate(
        &self,
        profile: &MemberProfile,
        request: &PaymentRequest,
    ) -> Result<PaymentReceipt, Error> {
        let phone = request
            .phone
            .as_ref()
            .map_or(profile.phone_number.as_str(), |phone| phone.as_str());
        let body = json!({
            "userId": profile.user_id,
            "amount": request.amount,
            "phoneNumber": phone,
            "userName": profile.full_name,
        });
        let reply = self
            .functions
            .invoke(FunctionName::InitiatePayment, body)
            .await
            .map_err(map_invoke_error)?;
        let reply: PaymentFunctionReply = serde_json::from_value(reply)
            .map_err(|err| Error::internal(format!("payment reply malformed: {err}")))?;
        if !reply.success {
            let reason = reply.error.unwrap_or_else(|| "payment was not accepted".to_owned());
            warn!(user_id = %profile.user_id, %reason, "payment initiation refused");
            return Err(Error::service_unavailable(reason));
        }
        info!(
            user_id = %profile.user_id,
            amount = %request.amount,
            reference = reply.reference.as_deref().unwrap_or("-"),
            "payment initiated"
        );
        Ok(PaymentReceipt {
            reference: reply.reference,
            redirect_url: reply.redirect_url,
        })
    }

    /// Transactions recorded for `user_id`, newest first.
    pub async fn transactions(&self, user_id: PrincipalId) -> Result<Vec<PaymentTransaction>, Error> {
        let query = Query::from(Table::PaymentTransactions)
            .filter(RowFilter::eq("user_id", user_id))
            .order_by("created_at", Order::Descending);
        let rows = self.data.select(&query).await.map_err(map_query_error)?;
        decode_rows(rows).map_err(map_query_error)
    }
}
