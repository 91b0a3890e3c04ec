//! Payment initiation results and the `payment_transactions` rows the
//! payment function records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Amount, PrincipalId};

/// Row of `payment_transactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub user_id: PrincipalId,
    pub amount: Amount,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body returned by the `initiate-pesapal-payment` function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentFunctionReply {
    pub success: bool,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Hosted checkout page, when the gateway returns one.
    #[serde(default, alias = "redirectUrl")]
    pub redirect_url: Option<String>,
}

/// Accepted payment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub reference: Option<String>,
    pub redirect_url: Option<String>,
}
