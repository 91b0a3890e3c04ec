//! Member self-service handlers. Every route sits behind [`MemberAccess`].

use actix_web::{HttpResponse, get, post, web};
use uuid::Uuid;

use super::ApiResult;
use super::cache_control::private_no_store;
use super::forms::{ContributeRequest, PaymentRequestBody};
use super::gate::MemberAccess;
use super::state::HttpState;
use crate::domain::{
    AdminMessage, Contribution, Error, MemberDashboard, PaymentReceipt, PaymentRequest,
    PaymentTransaction, SelfContribution,
};

#[utoipa::path(
    get,
    path = "/api/v1/member/dashboard",
    responses(
        (status = 200, description = "Profile, history and visible balance", body = MemberDashboard),
        (status = 401, description = "Not signed in", body = Error),
        (status = 403, description = "Administrators use the admin area", body = Error)
    ),
    tags = ["member"],
    operation_id = "memberDashboard"
)]
#[get("/member/dashboard")]
pub async fn dashboard(state: web::Data<HttpState>, access: MemberAccess) -> ApiResult<HttpResponse> {
    let overview = state.members.dashboard(access.user_id()).await?;
    Ok(HttpResponse::Ok().insert_header(private_no_store()).json(overview))
}

/// Record today's contribution.
#[utoipa::path(
    post,
    path = "/api/v1/member/contributions",
    request_body = ContributeRequest,
    responses(
        (status = 201, description = "Recorded", body = Contribution),
        (status = 400, description = "Invalid amount", body = Error),
        (status = 409, description = "Already contributed today", body = Error)
    ),
    tags = ["member"],
    operation_id = "contribute"
)]
#[post("/member/contributions")]
pub async fn contribute(
    state: web::Data<HttpState>,
    access: MemberAccess,
    payload: web::Json<ContributeRequest>,
) -> ApiResult<HttpResponse> {
    let input = SelfContribution::try_from(&payload.into_inner())?;
    let contribution = state.members.record_today(access.user_id(), &input).await?;
    Ok(HttpResponse::Created().json(contribution))
}

#[utoipa::path(
    get,
    path = "/api/v1/member/messages",
    responses((status = 200, description = "Messages, newest first", body = [AdminMessage])),
    tags = ["member"],
    operation_id = "memberMessages"
)]
#[get("/member/messages")]
pub async fn messages(state: web::Data<HttpState>, access: MemberAccess) -> ApiResult<HttpResponse> {
    let inbox = state.members.messages(access.user_id()).await?;
    Ok(HttpResponse::Ok().insert_header(private_no_store()).json(inbox))
}

#[utoipa::path(
    post,
    path = "/api/v1/member/messages/{message_id}/read",
    params(("message_id" = Uuid, Path, description = "Message identifier")),
    responses(
        (status = 204, description = "Marked read"),
        (status = 404, description = "No such message for this member", body = Error)
    ),
    tags = ["member"],
    operation_id = "markMessageRead"
)]
#[post("/member/messages/{message_id}/read")]
pub async fn mark_read(
    state: web::Data<HttpState>,
    access: MemberAccess,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    state.members.mark_read(access.user_id(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Start a mobile-money payment.
#[utoipa::path(
    post,
    path = "/api/v1/member/payments",
    request_body = PaymentRequestBody,
    responses(
        (status = 200, description = "Payment initiated", body = PaymentReceipt),
        (status = 400, description = "Invalid amount or phone", body = Error),
        (status = 503, description = "Payment provider unavailable", body = Error)
    ),
    tags = ["member"],
    operation_id = "initiatePayment"
)]
#[post("/member/payments")]
pub async fn initiate_payment(
    state: web::Data<HttpState>,
    access: MemberAccess,
    payload: web::Json<PaymentRequestBody>,
) -> ApiResult<HttpResponse> {
    let request = PaymentRequest::try_from(&payload.into_inner())?;
    let receipt = state
        .members
        .initiate_payment(access.user_id(), &request)
        .await?;
    Ok(HttpResponse::Ok().json(receipt))
}

#[utoipa::path(
    get,
    path = "/api/v1/member/payments",
    responses((status = 200, description = "Payment transactions", body = [PaymentTransaction])),
    tags = ["member"],
    operation_id = "memberPayments"
)]
#[get("/member/payments")]
pub async fn transactions(
    state: web::Data<HttpState>,
    access: MemberAccess,
) -> ApiResult<HttpResponse> {
    let rows = state.members.transactions(access.user_id()).await?;
    Ok(HttpResponse::Ok().insert_header(private_no_store()).json(rows))
}

/// Register every member route on `cfg`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(dashboard)
        .service(contribute)
        .service(messages)
        .service(mark_read)
        .service(initiate_payment)
        .service(transactions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{AuthGateway, DataService, FunctionName, Table, encode_row};
    use crate::domain::{Credentials, MemberProfile, PrincipalId};
    use crate::inbound::http::error::json_config;
    use crate::inbound::http::session::SessionCookie;
    use crate::inbound::http::test_utils::{memory_state, session_cookie, test_session_middleware};
    use crate::outbound::remote::MemoryRemote;
    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test};
    use chrono::Utc;
    use serde_json::{Value, json};

    async fn member(remote: &MemoryRemote, daily: i64) -> (PrincipalId, crate::domain::RawSession) {
        let creds = Credentials::try_from_parts("m@example.org", "secret1").expect("creds");
        let principal = remote.sign_up(&creds).await.expect("sign up");
        let mut profile = MemberProfile::new(principal.id, "Mary Atieno", "+254700000002", Utc::now());
        profile.daily_contribution_amount = crate::domain::Amount::new(daily);
        profile.balance_visible = true;
        remote
            .insert(Table::Profiles, vec![encode_row(&profile).expect("row")])
            .await
            .expect("profile");
        (principal.id, remote.sign_in(&creds).await.expect("sign in"))
    }

    macro_rules! member_app {
        ($state:expr, $raw:expr) => {{
            let raw = $raw;
            actix_test::init_service(
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
            .await
        }};
    }

    macro_rules! seed {
        ($app:expr) => {{
            let res = actix_test::call_service(
                &$app,
                actix_test::TestRequest::post().uri("/seed").to_request(),
            )
            .await;
            session_cookie(&res)
        }};
    }

    #[actix_web::test]
    async fn second_contribution_today_conflicts() {
        let (state, remote) = memory_state();
        let (_, raw) = member(&remote, 50).await;
        let app = member_app!(state, raw);
        let cookie = seed!(app);

        let first = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/member/contributions")
                .cookie(cookie.clone())
                .set_json(json!({}))
                .to_request(),
        )
        .await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let body: Value = actix_test::read_body_json(first).await;
        assert_eq!(body.get("amount"), Some(&json!(50)));

        let second = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/member/contributions")
                .cookie(cookie.clone())
                .set_json(json!({ "amount": 20 }))
                .to_request(),
        )
        .await;
        assert_eq!(second.status(), StatusCode::CONFLICT);

        let overview = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/member/dashboard")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(overview.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(overview).await;
        assert_eq!(body.get("balance"), Some(&json!(50)));
    }

    #[actix_web::test]
    async fn payment_goes_through_the_function() {
        let (state, remote) = memory_state();
        let (user_id, raw) = member(&remote, 0).await;
        let app = member_app!(state, raw);
        let cookie = seed!(app);
        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/api/v1/member/payments")
                .cookie(cookie)
                .set_json(json!({ "amount": "120" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let calls = remote.calls();
        let (name, body) = calls.first().expect("one call");
        assert_eq!(*name, FunctionName::InitiatePayment);
        assert_eq!(body.get("userId"), Some(&json!(user_id)));
        assert_eq!(body.get("phoneNumber"), Some(&json!("+254700000002")));
    }

    #[actix_web::test]
    async fn anonymous_callers_are_sent_to_login() {
        let (state, _remote) = memory_state();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .wrap(test_session_middleware())
                .service(web::scope("/api/v1").configure(configure)),
        )
        .await;
        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/api/v1/member/messages")
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = actix_test::read_body_json(res).await;
        assert_eq!(body.pointer("/details/redirect"), Some(&json!("/login")));
    }
}
