//! Administrator handlers. Every route sits behind [`AdminAccess`].
//!
//! ```text
//! GET    /api/v1/admin/members
//! GET    /api/v1/admin/members/{user_id}
//! POST   /api/v1/admin/members/{user_id}/adjustments   {"kind":"add","amount":100,"reason":"…"}
//! POST   /api/v1/admin/members/{user_id}/contributions {"amount":50,"date":"2024-05-01"}
//! PATCH  /api/v1/admin/members/{user_id}/settings      {"balanceVisible":true}
//! POST   /api/v1/admin/members/{user_id}/messages      {"message":"…","category":"reminder"}
//! DELETE /api/v1/admin/contributions/{id}
//! POST   /api/v1/admin/reminders
//! GET    /api/v1/admin/sms-logs?limit=50
//! ```

use actix_web::{HttpResponse, delete, get, patch, post, web};
use uuid::Uuid;

use super::ApiResult;
use super::cache_control::private_no_store;
use super::forms::{
    AdjustmentRequest, LogsQuery, MessageRequest, RecordContributionRequest, SettingsRequest,
};
use super::gate::AdminAccess;
use super::state::HttpState;
use crate::domain::{
    Adjustment, BalanceAdjustment, Contribution, Error, MemberDetail, MemberProfile,
    MemberSettingsPatch, MemberSummary, MessageDelivery, OutgoingMessage, PrincipalId,
    RecordedContribution, ReminderReport, SmsLog,
};

#[utoipa::path(
    get,
    path = "/api/v1/admin/members",
    responses(
        (status = 200, description = "Members with balances, by name", body = [MemberSummary]),
        (status = 401, description = "Not signed in", body = Error),
        (status = 403, description = "Not an administrator", body = Error)
    ),
    tags = ["admin"],
    operation_id = "listMembers"
)]
#[get("/admin/members")]
pub async fn list_members(
    state: web::Data<HttpState>,
    _access: AdminAccess,
) -> ApiResult<HttpResponse> {
    let members = state.admin.list_members().await?;
    Ok(HttpResponse::Ok().insert_header(private_no_store()).json(members))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/members/{user_id}",
    params(("user_id" = Uuid, Path, description = "Member principal id")),
    responses(
        (status = 200, description = "Member history and balance", body = MemberDetail),
        (status = 404, description = "Unknown member", body = Error)
    ),
    tags = ["admin"],
    operation_id = "memberDetail"
)]
#[get("/admin/members/{user_id}")]
pub async fn member_detail(
    state: web::Data<HttpState>,
    _access: AdminAccess,
    path: web::Path<PrincipalId>,
) -> ApiResult<HttpResponse> {
    let detail = state.admin.member_detail(path.into_inner()).await?;
    Ok(HttpResponse::Ok().insert_header(private_no_store()).json(detail))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/members/{user_id}/adjustments",
    params(("user_id" = Uuid, Path, description = "Member principal id")),
    request_body = AdjustmentRequest,
    responses(
        (status = 201, description = "Adjustment recorded", body = BalanceAdjustment),
        (status = 400, description = "Invalid amount or reason", body = Error),
        (status = 404, description = "Unknown member", body = Error)
    ),
    tags = ["admin"],
    operation_id = "adjustBalance"
)]
#[post("/admin/members/{user_id}/adjustments")]
pub async fn adjust_balance(
    state: web::Data<HttpState>,
    access: AdminAccess,
    path: web::Path<PrincipalId>,
    payload: web::Json<AdjustmentRequest>,
) -> ApiResult<HttpResponse> {
    let adjustment = Adjustment::try_from(&payload.into_inner())?;
    let row = state
        .admin
        .adjust_balance(access.user_id(), path.into_inner(), &adjustment)
        .await?;
    Ok(HttpResponse::Created().json(row))
}

/// Record a contribution on any date.
#[utoipa::path(
    post,
    path = "/api/v1/admin/members/{user_id}/contributions",
    params(("user_id" = Uuid, Path, description = "Member principal id")),
    request_body = RecordContributionRequest,
    responses(
        (status = 201, description = "Contribution recorded", body = Contribution),
        (status = 400, description = "Invalid amount or date", body = Error),
        (status = 404, description = "Unknown member", body = Error)
    ),
    tags = ["admin"],
    operation_id = "addContribution"
)]
#[post("/admin/members/{user_id}/contributions")]
pub async fn add_contribution(
    state: web::Data<HttpState>,
    _access: AdminAccess,
    path: web::Path<PrincipalId>,
    payload: web::Json<RecordContributionRequest>,
) -> ApiResult<HttpResponse> {
    let input = RecordedContribution::try_from(&payload.into_inner())?;
    let row = state.admin.add_contribution(path.into_inner(), &input).await?;
    Ok(HttpResponse::Created().json(row))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/contributions/{contribution_id}",
    params(("contribution_id" = Uuid, Path, description = "Contribution id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such contribution", body = Error)
    ),
    tags = ["admin"],
    operation_id = "deleteContribution"
)]
#[delete("/admin/contributions/{contribution_id}")]
pub async fn delete_contribution(
    state: web::Data<HttpState>,
    _access: AdminAccess,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    state.admin.delete_contribution(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/members/{user_id}/settings",
    params(("user_id" = Uuid, Path, description = "Member principal id")),
    request_body = SettingsRequest,
    responses(
        (status = 200, description = "Updated profile", body = MemberProfile),
        (status = 400, description = "Empty or invalid patch", body = Error),
        (status = 404, description = "Unknown member", body = Error)
    ),
    tags = ["admin"],
    operation_id = "updateMemberSettings"
)]
#[patch("/admin/members/{user_id}/settings")]
pub async fn update_settings(
    state: web::Data<HttpState>,
    _access: AdminAccess,
    path: web::Path<PrincipalId>,
    payload: web::Json<SettingsRequest>,
) -> ApiResult<HttpResponse> {
    let patch = MemberSettingsPatch::from(&payload.into_inner());
    let profile = state.admin.update_settings(path.into_inner(), &patch).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Store a message for the member and text a copy. A failed SMS is reported
/// in `smsSent` rather than as an error.
#[utoipa::path(
    post,
    path = "/api/v1/admin/members/{user_id}/messages",
    params(("user_id" = Uuid, Path, description = "Member principal id")),
    request_body = MessageRequest,
    responses(
        (status = 201, description = "Message stored", body = MessageDelivery),
        (status = 400, description = "Empty message", body = Error),
        (status = 404, description = "Unknown member", body = Error)
    ),
    tags = ["admin"],
    operation_id = "sendMessage"
)]
#[post("/admin/members/{user_id}/messages")]
pub async fn send_message(
    state: web::Data<HttpState>,
    access: AdminAccess,
    path: web::Path<PrincipalId>,
    payload: web::Json<MessageRequest>,
) -> ApiResult<HttpResponse> {
    let message = OutgoingMessage::try_from(&payload.into_inner())?;
    let delivery = state
        .admin
        .send_message(access.user_id(), path.into_inner(), &message)
        .await?;
    Ok(HttpResponse::Created().json(delivery))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/reminders",
    responses((status = 200, description = "Broadcast counts", body = ReminderReport)),
    tags = ["admin"],
    operation_id = "broadcastReminder"
)]
#[post("/admin/reminders")]
pub async fn broadcast_reminder(
    state: web::Data<HttpState>,
    _access: AdminAccess,
) -> ApiResult<HttpResponse> {
    let report = state.admin.broadcast_reminder().await?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/sms-logs",
    params(LogsQuery),
    responses((status = 200, description = "Most recent SMS log rows", body = [SmsLog])),
    tags = ["admin"],
    operation_id = "smsLogs"
)]
#[get("/admin/sms-logs")]
pub async fn sms_logs(
    state: web::Data<HttpState>,
    _access: AdminAccess,
    query: web::Query<LogsQuery>,
) -> ApiResult<HttpResponse> {
    let limit = query
        .limit
        .map_or(state.sms_log_page, |limit| limit.clamp(1, state.sms_log_page));
    let logs = state.admin.sms_logs(limit).await?;
    Ok(HttpResponse::Ok().insert_header(private_no_store()).json(logs))
}

/// Register every admin route on `cfg`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_members)
        .service(member_detail)
        .service(adjust_balance)
        .service(add_contribution)
        .service(delete_contribution)
        .service(update_settings)
        .service(send_message)
        .service(broadcast_reminder)
        .service(sms_logs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{AuthGateway, DataService, FunctionName, Table, encode_row};
    use crate::domain::{Credentials, RawSession, RoleAssignment};
    use crate::inbound::http::error::json_config;
    use crate::inbound::http::session::SessionCookie;
    use crate::inbound::http::test_utils::{memory_state, session_cookie, test_session_middleware};
    use crate::outbound::remote::MemoryRemote;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use chrono::Utc;
    use serde_json::{Value, json};

    async fn account(remote: &MemoryRemote, email: &str) -> (PrincipalId, RawSession) {
        let creds = Credentials::try_from_parts(email, "secret1").expect("creds");
        let principal = remote.sign_up(&creds).await.expect("sign up");
        (principal.id, remote.sign_in(&creds).await.expect("sign in"))
    }

    async fn admin_and_member(remote: &MemoryRemote) -> (RawSession, PrincipalId) {
        let (admin_id, admin) = account(remote, "admin@example.org").await;
        remote
            .insert(
                Table::UserRoles,
                vec![encode_row(&RoleAssignment::admin(admin_id)).expect("row")],
            )
            .await
            .expect("role");
        let (member_id, _) = account(remote, "member@example.org").await;
        let profile = MemberProfile::new(member_id, "Otieno", "+254711111111", Utc::now());
        remote
            .insert(Table::Profiles, vec![encode_row(&profile).expect("row")])
            .await
            .expect("profile");
        (admin, member_id)
    }

    macro_rules! admin_app {
        ($state:expr, $raw:expr) => {{
            let raw = $raw;
            let app = test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .app_data(json_config())
                    .wrap(test_session_middleware())
                    .route(
                        "/seed",
                        web::post().to(move |cookie: SessionCookie| {
                            let raw = raw.clone();
                            async move {
                                cookie.persist(&raw)?;
                                Ok::<_, Error>(HttpResponse::Ok())
                            }
                        }),
                    )
                    .service(web::scope("/api/v1").configure(configure)),
            )
            .await;
            let res =
                test::call_service(&app, test::TestRequest::post().uri("/seed").to_request()).await;
            (app, session_cookie(&res))
        }};
    }

    #[actix_web::test]
    async fn adjustments_and_contributions_sum_into_the_balance() {
        let (state, remote) = memory_state();
        let (admin, member_id) = admin_and_member(&remote).await;
        let (app, cookie) = admin_app!(state, admin);
        let base = format!("/api/v1/admin/members/{member_id}");

        for (kind, amount) in [("add", 100), ("deduct", 30)] {
            let res = test::call_service(
                &app,
                test::TestRequest::post()
                    .uri(&format!("{base}/adjustments"))
                    .cookie(cookie.clone())
                    .set_json(json!({ "kind": kind, "amount": amount, "reason": "ledger fix" }))
                    .to_request(),
            )
            .await;
            assert_eq!(res.status(), StatusCode::CREATED, "{kind}");
        }
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("{base}/contributions"))
                .cookie(cookie.clone())
                .set_json(json!({ "amount": 50, "date": "2024-05-01" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let res = test::call_service(
            &app,
            test::TestRequest::get().uri(&base).cookie(cookie.clone()).to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body.get("balance"), Some(&json!(120)));

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/v1/admin/members")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(res).await;
        let listed = body.as_array().map(Vec::len);
        assert_eq!(listed, Some(1), "the administrator is not listed");
        assert_eq!(body.pointer("/0/balance"), Some(&json!(120)));
    }

    #[actix_web::test]
    async fn message_is_kept_when_sms_fails() {
        let (state, remote) = memory_state();
        let (admin, member_id) = admin_and_member(&remote).await;
        remote.fail_function(FunctionName::SendSms);
        let (app, cookie) = admin_app!(state, admin);
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/v1/admin/members/{member_id}/messages"))
                .cookie(cookie)
                .set_json(json!({ "message": "Meeting on Friday" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body.get("smsSent"), Some(&json!(false)));
        assert_eq!(remote.rows(Table::AdminMessages).len(), 1);
    }

    #[actix_web::test]
    async fn empty_settings_patch_is_rejected() {
        let (state, remote) = memory_state();
        let (admin, member_id) = admin_and_member(&remote).await;
        let (app, cookie) = admin_app!(state, admin);
        let res = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri(&format!("/api/v1/admin/members/{member_id}/settings"))
                .cookie(cookie)
                .set_json(json!({}))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn deleting_an_unknown_contribution_is_not_found() {
        let (state, remote) = memory_state();
        let (admin, _) = admin_and_member(&remote).await;
        let (app, cookie) = admin_app!(state, admin);
        let res = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/api/v1/admin/contributions/{}", Uuid::new_v4()))
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn members_cannot_reach_admin_routes() {
        let (state, remote) = memory_state();
        let (_, member) = account(&remote, "plain@example.org").await;
        let (app, cookie) = admin_app!(state, member);
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/admin/reminders")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body.pointer("/details/redirect"), Some(&json!("/dashboard")));
        assert!(remote.calls().is_empty());
    }
}
