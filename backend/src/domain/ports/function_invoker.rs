//! Driven port for the hosted serverless functions.

use async_trait::async_trait;
use serde_json::Value;

use super::define_port_error;

/// Functions deployed next to the data service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionName {
    SendSms,
    InitiatePayment,
}

impl FunctionName {
    /// Deployed function slug.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendSms => "send-sms",
            Self::InitiatePayment => "initiate-pesapal-payment",
        }
    }
}

define_port_error! {
    /// Failures raised while invoking a function.
    pub enum InvokeError {
        /// Function host unreachable or timing out.
        Unavailable { message: String } => "function host unavailable: {message}",
        /// Function ran and reported failure.
        Failed { status: u16, message: String } => "function failed with status {status}: {message}",
        /// Response body was not the expected JSON.
        Decode { message: String } => "function response could not be decoded: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// Invoke `name` with a JSON body and return its JSON reply.
    async fn invoke(&self, name: FunctionName, body: Value) -> Result<Value, InvokeError>;
}
