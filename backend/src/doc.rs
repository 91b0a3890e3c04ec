//! OpenAPI document for the REST API.
//!
//! Served by Swagger UI in debug builds and printed by the `openapi-dump`
//! binary for client generation.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::{
    AdjustmentKind, AdminMessage, BalanceAdjustment, Contribution, ContributionStatus, Error,
    ErrorCode, MemberDashboard, MemberDetail, MemberProfile, MemberSummary, MessageCategory,
    MessageDelivery, PaymentReceipt, PaymentTransaction, Principal, ReminderReport,
    ResolvedSession, SmsLog,
};
use crate::inbound::http::forms::{
    AdjustmentRequest, ContributeRequest, LoginRequest, MessageRequest, PaymentRequestBody,
    RecordContributionRequest, RegisterRequest, SettingsRequest,
};
use crate::inbound::http::gate::SessionView;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);
        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Encrypted session cookie issued by POST /api/v1/auth/login.",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Chama backend API",
        description = "Member accounts, contributions, balances and administration for a savings group."
    ),
    servers((url = "/", description = "Relative to the deployment base URL")),
    security(("SessionCookie" = [])),
    paths(
        crate::inbound::http::accounts::register,
        crate::inbound::http::accounts::login,
        crate::inbound::http::accounts::logout,
        crate::inbound::http::accounts::current_session,
        crate::inbound::http::member::dashboard,
        crate::inbound::http::member::contribute,
        crate::inbound::http::member::messages,
        crate::inbound::http::member::mark_read,
        crate::inbound::http::member::initiate_payment,
        crate::inbound::http::member::transactions,
        crate::inbound::http::admin::list_members,
        crate::inbound::http::admin::member_detail,
        crate::inbound::http::admin::adjust_balance,
        crate::inbound::http::admin::add_contribution,
        crate::inbound::http::admin::delete_contribution,
        crate::inbound::http::admin::update_settings,
        crate::inbound::http::admin::send_message,
        crate::inbound::http::admin::broadcast_reminder,
        crate::inbound::http::admin::sms_logs,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        Error,
        ErrorCode,
        Principal,
        ResolvedSession,
        SessionView,
        MemberProfile,
        MemberDashboard,
        MemberSummary,
        MemberDetail,
        Contribution,
        ContributionStatus,
        BalanceAdjustment,
        AdjustmentKind,
        AdminMessage,
        MessageCategory,
        MessageDelivery,
        ReminderReport,
        SmsLog,
        PaymentReceipt,
        PaymentTransaction,
        RegisterRequest,
        LoginRequest,
        ContributeRequest,
        RecordContributionRequest,
        AdjustmentRequest,
        MessageRequest,
        PaymentRequestBody,
        SettingsRequest,
    )),
    tags(
        (name = "accounts", description = "Registration and sign-in"),
        (name = "member", description = "Member self-service"),
        (name = "admin", description = "Group administration"),
        (name = "health", description = "Probes")
    )
)]
pub struct ApiDoc;
