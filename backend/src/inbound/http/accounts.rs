//! Account handlers.
//!
//! ```text
//! POST /api/v1/auth/register {"fullName":"…","phone":"0712345678","password":"…"}
//! POST /api/v1/auth/login    {"identifier":"0712345678","password":"…"}
//! POST /api/v1/auth/logout
//! GET  /api/v1/auth/session
//! ```

use actix_web::{HttpResponse, get, post, web};

use super::ApiResult;
use super::cache_control::private_no_store;
use super::forms::{LoginRequest, RegisterRequest};
use super::gate::{SessionView, resolve_request};
use super::session::SessionCookie;
use super::state::HttpState;
use crate::domain::{Error, MemberProfile, Registration};

/// Create a member account and profile.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = MemberProfile),
        (status = 400, description = "Invalid fields", body = Error),
        (status = 409, description = "Identifier already registered", body = Error),
        (status = 503, description = "Auth service unavailable", body = Error)
    ),
    tags = ["accounts"],
    operation_id = "register",
    security([])
)]
#[post("/auth/register")]
pub async fn register(
    state: web::Data<HttpState>,
    payload: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let registration = Registration::try_from(&payload.into_inner())?;
    let profile = state.accounts.register(&registration).await?;
    Ok(HttpResponse::Created()
        .insert_header(private_no_store())
        .json(profile))
}

/// Sign in with an email address or phone number.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionView,
            headers(("Set-Cookie" = String, description = "Session cookie"))),
        (status = 400, description = "Malformed identifier", body = Error),
        (status = 401, description = "Invalid credentials", body = Error),
        (status = 503, description = "Auth service unavailable", body = Error)
    ),
    tags = ["accounts"],
    operation_id = "login",
    security([])
)]
#[post("/auth/login")]
pub async fn login(
    state: web::Data<HttpState>,
    cookie: SessionCookie,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let LoginRequest {
        identifier,
        password,
    } = payload.into_inner();
    let (raw, resolved) = state.accounts.login(&identifier, &password).await?;
    cookie.persist(&raw)?;
    Ok(HttpResponse::Ok()
        .insert_header(private_no_store())
        .json(SessionView::from(resolved)))
}

/// Sign out. The cookie is cleared even if remote revocation fails.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses((status = 204, description = "Signed out")),
    tags = ["accounts"],
    operation_id = "logout"
)]
#[post("/auth/logout")]
pub async fn logout(state: web::Data<HttpState>, cookie: SessionCookie) -> HttpResponse {
    if let Some(raw) = cookie.raw() {
        state.accounts.logout(&raw).await;
    }
    cookie.clear();
    HttpResponse::NoContent().finish()
}

/// The caller's resolved session; anonymous callers get `home = /login`.
#[utoipa::path(
    get,
    path = "/api/v1/auth/session",
    responses((status = 200, description = "Resolved session", body = SessionView)),
    tags = ["accounts"],
    operation_id = "currentSession"
)]
#[get("/auth/session")]
pub async fn current_session(state: web::Data<HttpState>, cookie: SessionCookie) -> HttpResponse {
    let resolved = resolve_request(&state, &cookie).await;
    HttpResponse::Ok()
        .insert_header(private_no_store())
        .json(SessionView::from(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{DataService, Table};
    use crate::inbound::http::error::json_config;
    use crate::inbound::http::test_utils::{memory_state, session_cookie, test_session_middleware};
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::{Value, json};

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .app_data(json_config())
                    .wrap(test_session_middleware())
                    .service(
                        web::scope("/api/v1")
                            .service(register)
                            .service(login)
                            .service(logout)
                            .service(current_session),
                    ),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn register_then_login_by_phone() {
        let (state, remote) = memory_state();
        let app = app!(state);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/auth/register")
                .set_json(json!({
                    "fullName": "Achieng Odhiambo",
                    "phone": "0712 345 678",
                    "password": "secret1"
                }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(remote.rows(Table::Profiles).len(), 1);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/auth/login")
                .set_json(json!({ "identifier": "0712345678", "password": "secret1" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = session_cookie(&res);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body.get("isAdmin"), Some(&Value::Bool(false)));
        assert_eq!(body.get("home").and_then(Value::as_str), Some("/dashboard"));

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/v1/auth/session")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(res).await;
        assert!(body.get("principal").is_some_and(|p| !p.is_null()));
    }

    #[actix_web::test]
    async fn wrong_password_is_unauthorized() {
        let (state, _remote) = memory_state();
        let app = app!(state);
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/auth/login")
                .set_json(json!({ "identifier": "nobody@example.org", "password": "secret1" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn invalid_registration_lists_fields() {
        let (state, remote) = memory_state();
        let app = app!(state);
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/auth/register")
                .set_json(json!({ "fullName": "", "phone": "abc", "password": "1" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        let fields = body
            .pointer("/details/fields")
            .and_then(Value::as_array)
            .map(Vec::len);
        assert_eq!(fields, Some(3));
        let stored = remote
            .select(&crate::domain::ports::Query::from(Table::Profiles))
            .await
            .expect("select");
        assert!(stored.is_empty());
    }

    #[actix_web::test]
    async fn logout_revokes_and_clears() {
        let (state, remote) = memory_state();
        let app = app!(state);
        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/auth/register")
                .set_json(json!({
                    "fullName": "Wanjiru",
                    "phone": "0700000001",
                    "password": "secret1",
                    "email": "wanjiru@example.org"
                }))
                .to_request(),
        )
        .await;
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/auth/login")
                .set_json(json!({ "identifier": "wanjiru@example.org", "password": "secret1" }))
                .to_request(),
        )
        .await;
        let cookie = session_cookie(&res);
        assert_eq!(remote.live_sessions(), 1);

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/auth/logout")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(remote.live_sessions(), 0);
    }
}
