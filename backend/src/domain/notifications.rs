//! Best-effort SMS delivery through the `send-sms` function.
//!
//! Delivery is at most once. Failures are logged and reported as `false`;
//! they never undo the action that triggered the notification.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use super::ports::{FunctionInvoker, FunctionName};
use super::{MessageCategory, PrincipalId};

#[derive(Clone)]
pub struct SmsNotifier {
    functions: Arc<dyn FunctionInvoker>,
}

impl SmsNotifier {
    pub fn new(functions: Arc<dyn FunctionInvoker>) -> Self {
        Self { functions }
    }

    /// Notify a member about an administrator message. The function logs the
    /// delivery against `user_id`.
    pub async fn notify_member(
        &self,
        user_id: PrincipalId,
        phone_number: &str,
        message: &str,
        category: MessageCategory,
    ) -> bool {
        self.dispatch(json!({
            "phoneNumber": phone_number,
            "message": message,
            "userId": user_id,
            "messageType": category.as_str(),
        }))
        .await
    }

    /// Send a plain text to a phone number.
    pub async fn send_text(&self, to: &str, message: &str) -> bool {
        self.dispatch(json!({ "to": to, "message": message })).await
    }

    async fn dispatch(&self, body: Value) -> bool {
        match self.functions.invoke(FunctionName::SendSms, body).await {
            Ok(reply) if reply.get("success").and_then(Value::as_bool) == Some(false) => {
                let reason = reply.get("error").and_then(Value::as_str).unwrap_or("unspecified");
                warn!(%reason, "sms gateway reported failure");
                false
            }
            Ok(_) => {
                debug!("sms dispatched");
                true
            }
            Err(error) => {
                warn!(%error, "sms dispatch failed");
                false
            }
        }
    }
}
