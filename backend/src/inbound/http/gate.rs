//! Route gate extractors.
//!
//! [`MemberAccess`] and [`AdminAccess`] read the cookie session, refresh it
//! when expired, resolve the caller's role and run [`decide_for`]. Anything
//! other than [`Decision::Allow`] becomes an error response carrying the
//! path the client should navigate to.

use std::marker::PhantomData;

use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures_util::future::LocalBoxFuture;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use super::session::SessionCookie;
use super::state::HttpState;
use crate::domain::{
    Decision, Error, Principal, PrincipalId, ResolvedSession, RouteScope, decide_for, home_scope,
};

pub const LOGIN_PATH: &str = "/login";
pub const MEMBER_HOME_PATH: &str = "/dashboard";
pub const ADMIN_HOME_PATH: &str = "/admin";

/// Client-side path for a non-allowing decision.
#[must_use]
pub const fn redirect_path(decision: Decision) -> Option<&'static str> {
    match decision {
        Decision::Allow => None,
        Decision::RedirectToLogin => Some(LOGIN_PATH),
        Decision::RedirectToMemberHome => Some(MEMBER_HOME_PATH),
        Decision::RedirectToAdminHome => Some(ADMIN_HOME_PATH),
    }
}

/// Landing path for a resolved session.
#[must_use]
pub const fn home_path(session: &ResolvedSession) -> &'static str {
    match home_scope(session) {
        None => LOGIN_PATH,
        Some(RouteScope::Member) => MEMBER_HOME_PATH,
        Some(RouteScope::Admin) => ADMIN_HOME_PATH,
    }
}

/// Resolved session as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(flatten)]
    pub session: ResolvedSession,
    #[schema(example = "/dashboard")]
    pub home: &'static str,
}

impl From<ResolvedSession> for SessionView {
    fn from(session: ResolvedSession) -> Self {
        let home = home_path(&session);
        Self { session, home }
    }
}

fn refusal(decision: Decision) -> Error {
    let redirect = redirect_path(decision).unwrap_or(LOGIN_PATH);
    let details = json!({ "decision": decision, "redirect": redirect });
    match decision {
        Decision::RedirectToLogin | Decision::Allow => {
            Error::unauthorized("login required").with_details(details)
        }
        Decision::RedirectToMemberHome => {
            Error::forbidden("administrator access required").with_details(details)
        }
        Decision::RedirectToAdminHome => {
            Error::forbidden("member area is not available to administrators")
                .with_details(details)
        }
    }
}

/// Read, renew and resolve the cookie session. An expired session that
/// cannot be refreshed is removed from the cookie.
pub async fn resolve_request(state: &HttpState, cookie: &SessionCookie) -> ResolvedSession {
    let Some(raw) = cookie.raw() else {
        return ResolvedSession::anonymous();
    };
    let previous_token = raw.access_token.clone();
    match state.accounts.renew(raw).await {
        Some(fresh) => {
            if fresh.access_token != previous_token {
                if let Err(error) = cookie.persist(&fresh) {
                    tracing::warn!(%error, "failed to store refreshed session");
                }
            }
            state.accounts.resolve(Some(&fresh)).await
        }
        None => {
            cookie.clear();
            ResolvedSession::anonymous()
        }
    }
}

pub trait Scope {
    const SCOPE: RouteScope;
}

#[derive(Debug, Clone, Copy)]
pub struct MemberScope;

impl Scope for MemberScope {
    const SCOPE: RouteScope = RouteScope::Member;
}

#[derive(Debug, Clone, Copy)]
pub struct AdminScope;

impl Scope for AdminScope {
    const SCOPE: RouteScope = RouteScope::Admin;
}

/// Proof that the caller passed the gate for scope `S`.
#[derive(Debug, Clone)]
pub struct Gated<S> {
    principal: Principal,
    _scope: PhantomData<S>,
}

impl<S> Gated<S> {
    #[must_use]
    pub const fn principal(&self) -> &Principal {
        &self.principal
    }

    #[must_use]
    pub const fn user_id(&self) -> PrincipalId {
        self.principal.id
    }
}

pub type MemberAccess = Gated<MemberScope>;
pub type AdminAccess = Gated<AdminScope>;

impl<S: Scope + 'static> FromRequest for Gated<S> {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<HttpState>>().cloned();
        let cookie = SessionCookie::from_request(req, payload);
        Box::pin(async move {
            let state = state.ok_or_else(|| Error::internal("HTTP state is not configured"))?;
            let cookie = cookie.await?;
            let resolved = resolve_request(&state, &cookie).await;
            match (decide_for(&resolved, S::SCOPE), resolved.principal()) {
                (Decision::Allow, Some(principal)) => Ok(Self {
                    principal: principal.clone(),
                    _scope: PhantomData,
                }),
                (decision, _) => Err(refusal(decision).into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Credentials, ErrorCode, RoleAssignment};
    use crate::domain::ports::{AuthGateway, DataService, Table, encode_row};
    use crate::inbound::http::test_utils::{memory_state, session_cookie, test_session_middleware};
    use crate::outbound::remote::MemoryRemote;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test as actix_test};
    use rstest::rstest;

    async fn signed_in(remote: &MemoryRemote, admin: bool) -> crate::domain::RawSession {
        let creds = Credentials::try_from_parts("someone@example.org", "secret1").expect("creds");
        let principal = remote.sign_up(&creds).await.expect("sign up");
        if admin {
            let row = encode_row(&RoleAssignment::admin(principal.id)).expect("row");
            remote.insert(Table::UserRoles, vec![row]).await.expect("role");
        }
        remote.sign_in(&creds).await.expect("sign in")
    }

    #[rstest]
    #[case(None, StatusCode::UNAUTHORIZED, StatusCode::UNAUTHORIZED)]
    #[case(Some(false), StatusCode::OK, StatusCode::FORBIDDEN)]
    #[case(Some(true), StatusCode::FORBIDDEN, StatusCode::OK)]
    #[actix_web::test]
    async fn gate_follows_the_decision_table(
        #[case] who: Option<bool>,
        #[case] member_status: StatusCode,
        #[case] admin_status: StatusCode,
    ) {
        let (state, remote) = memory_state();
        let raw = match who {
            Some(admin) => Some(signed_in(&remote, admin).await),
            None => None,
        };
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .wrap(test_session_middleware())
                .route(
                    "/login",
                    web::post().to(move |cookie: SessionCookie| {
                        let raw = raw.clone();
                        async move {
                            if let Some(raw) = raw {
                                cookie.persist(&raw)?;
                            }
                            Ok::<_, Error>(HttpResponse::Ok())
                        }
                    }),
                )
                .route("/m", web::get().to(|_: MemberAccess| async { HttpResponse::Ok() }))
                .route("/a", web::get().to(|_: AdminAccess| async { HttpResponse::Ok() })),
        )
        .await;
        let login = actix_test::call_service(
            &app,
            actix_test::TestRequest::post().uri("/login").to_request(),
        )
        .await;
        let cookie = who.map(|_| session_cookie(&login));
        for (path, expected) in [("/m", member_status), ("/a", admin_status)] {
            let mut req = actix_test::TestRequest::get().uri(path);
            if let Some(cookie) = cookie.clone() {
                req = req.cookie(cookie);
            }
            let res = actix_test::call_service(&app, req.to_request()).await;
            assert_eq!(res.status(), expected, "{path}");
        }
    }

    #[test]
    fn refusals_carry_the_redirect() {
        let error = refusal(Decision::RedirectToAdminHome);
        assert_eq!(error.code(), ErrorCode::Forbidden);
        assert_eq!(
            error.details().and_then(|d| d.get("redirect")).and_then(|v| v.as_str()),
            Some(ADMIN_HOME_PATH)
        );
    }

    #[test]
    fn anonymous_home_is_login() {
        let view = SessionView::from(ResolvedSession::anonymous());
        assert_eq!(view.home, LOGIN_PATH);
    }
}
