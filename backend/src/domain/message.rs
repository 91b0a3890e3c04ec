//! Administrator messages and the SMS log rows written by the `send-sms`
//! function.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::PrincipalId;

/// Category shown next to a message and forwarded as the SMS `messageType`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    #[default]
    General,
    Reminder,
    Alert,
}

impl MessageCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Reminder => "reminder",
            Self::Alert => "alert",
        }
    }
}

/// Row of `admin_messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AdminMessage {
    pub id: Uuid,
    pub user_id: PrincipalId,
    pub admin_id: PrincipalId,
    pub message: String,
    #[serde(default)]
    pub message_type: MessageCategory,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Row of `sms_logs`. Written remotely; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SmsLog {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<PrincipalId>,
    pub phone_number: String,
    pub message: String,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unread_is_the_default() {
        let row = serde_json::json!({
            "id": Uuid::nil(),
            "user_id": Uuid::nil(),
            "admin_id": Uuid::nil(),
            "message": "Meeting on Friday",
            "created_at": "2024-05-01T09:00:00Z"
        });
        let message: AdminMessage = serde_json::from_value(row).expect("decode");
        assert!(!message.is_read);
        assert_eq!(message.message_type, MessageCategory::General);
    }
}
