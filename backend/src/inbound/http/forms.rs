//! Request bodies.
//!
//! Bodies are deserialised loosely (amounts may arrive as numbers or
//! strings) and then handed to the domain form validators, which report every
//! failing field at once.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    Adjustment, AdjustmentForm, AdjustmentKind, Amount, ContributionForm, Error, MemberSettingsPatch,
    MessageCategory, MessageForm, OutgoingMessage, PaymentForm, PaymentRequest,
    RecordedContribution, Registration, RegistrationForm, SelfContribution,
};

/// Amount as typed by a person or sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(serde_json::Number),
    Text(String),
}

impl AmountInput {
    fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Number(number) => Cow::Owned(number.to_string()),
            Self::Text(text) => Cow::Borrowed(text),
        }
    }
}

fn text_of(amount: Option<&AmountInput>) -> Option<Cow<'_, str>> {
    amount.map(AmountInput::as_text)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[schema(example = "Achieng Odhiambo")]
    pub full_name: String,
    #[schema(example = "+254712345678")]
    pub phone: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl TryFrom<&RegisterRequest> for Registration {
    type Error = Error;

    fn try_from(body: &RegisterRequest) -> Result<Self, Self::Error> {
        RegistrationForm {
            full_name: &body.full_name,
            phone: &body.phone,
            password: &body.password,
            email: body.email.as_deref(),
        }
        .validate()
        .map_err(Error::from)
    }
}

/// `identifier` is an email address or a phone number.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[schema(example = "0712345678")]
    pub identifier: String,
    pub password: String,
}

/// Self-service contribution; the amount defaults to the daily amount.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContributeRequest {
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "50")]
    pub amount: Option<AmountInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TryFrom<&ContributeRequest> for SelfContribution {
    type Error = Error;

    fn try_from(body: &ContributeRequest) -> Result<Self, Self::Error> {
        let amount = text_of(body.amount.as_ref());
        ContributionForm {
            amount: amount.as_deref(),
            date: None,
            notes: body.notes.as_deref(),
        }
        .validate_self_service()
        .map_err(Error::from)
    }
}

/// Contribution recorded by an administrator for any date.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordContributionRequest {
    #[schema(value_type = String, example = "50")]
    pub amount: Option<AmountInput>,
    #[schema(example = "2024-05-01")]
    pub date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TryFrom<&RecordContributionRequest> for RecordedContribution {
    type Error = Error;

    fn try_from(body: &RecordContributionRequest) -> Result<Self, Self::Error> {
        let amount = text_of(body.amount.as_ref());
        ContributionForm {
            amount: amount.as_deref(),
            date: body.date.as_deref(),
            notes: body.notes.as_deref(),
        }
        .validate_recorded()
        .map_err(Error::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRequest {
    pub kind: AdjustmentKind,
    #[schema(value_type = String, example = "100")]
    pub amount: Option<AmountInput>,
    #[schema(example = "Late fee waived")]
    pub reason: String,
}

impl TryFrom<&AdjustmentRequest> for Adjustment {
    type Error = Error;

    fn try_from(body: &AdjustmentRequest) -> Result<Self, Self::Error> {
        let amount = text_of(body.amount.as_ref());
        AdjustmentForm {
            kind: body.kind,
            amount: amount.as_deref(),
            reason: &body.reason,
        }
        .validate()
        .map_err(Error::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub message: String,
    #[serde(default)]
    pub category: MessageCategory,
}

impl TryFrom<&MessageRequest> for OutgoingMessage {
    type Error = Error;

    fn try_from(body: &MessageRequest) -> Result<Self, Self::Error> {
        MessageForm {
            body: &body.message,
            category: body.category,
        }
        .validate()
        .map_err(Error::from)
    }
}

/// Payment initiation; `phone` defaults to the member's profile number.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestBody {
    #[schema(value_type = String, example = "50")]
    pub amount: Option<AmountInput>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl TryFrom<&PaymentRequestBody> for PaymentRequest {
    type Error = Error;

    fn try_from(body: &PaymentRequestBody) -> Result<Self, Self::Error> {
        let amount = text_of(body.amount.as_ref());
        PaymentForm {
            amount: amount.as_deref(),
            phone: body.phone.as_deref(),
        }
        .validate()
        .map_err(Error::from)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    #[serde(default)]
    pub balance_visible: Option<bool>,
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub daily_contribution_amount: Option<Amount>,
}

impl From<&SettingsRequest> for MemberSettingsPatch {
    fn from(body: &SettingsRequest) -> Self {
        Self {
            balance_visible: body.balance_visible,
            daily_contribution_amount: body.daily_contribution_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogsQuery {
    /// Rows to return; capped server side.
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({ "amount": 75 }), "75")]
    #[case(json!({ "amount": "75" }), "75")]
    #[case(json!({ "amount": 75.5 }), "75.5")]
    #[case(json!({ "amount": "75.50" }), "75.5")]
    fn amounts_accept_numbers_and_text(#[case] body: serde_json::Value, #[case] expected: &str) {
        let body: ContributeRequest = serde_json::from_value(body).expect("body");
        let parsed = SelfContribution::try_from(&body).expect("valid");
        assert_eq!(parsed.amount, Some(expected.parse::<Amount>().expect("decimal")));
    }

    #[test]
    fn registration_errors_list_each_field() {
        let body = RegisterRequest {
            full_name: String::new(),
            phone: "12".to_owned(),
            password: "x".to_owned(),
            email: None,
        };
        let error = Registration::try_from(&body).expect_err("invalid");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
        let fields = error
            .details()
            .and_then(|d| d.get("fields"))
            .and_then(|f| f.as_array())
            .map(Vec::len);
        assert_eq!(fields, Some(3));
    }

    #[test]
    fn missing_recorded_date_is_rejected() {
        let body = RecordContributionRequest {
            amount: Some(AmountInput::Number(10.into())),
            date: None,
            notes: None,
        };
        let error = RecordedContribution::try_from(&body).expect_err("no date");
        let field = error
            .details()
            .and_then(|d| d.pointer("/fields/0/field"))
            .and_then(|f| f.as_str());
        assert_eq!(field, Some("date"));
    }
}
