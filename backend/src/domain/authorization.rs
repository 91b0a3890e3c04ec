//! Route gate deciding whether a resolved session may see a view.

use serde::Serialize;
use utoipa::ToSchema;

use super::{Principal, ResolvedSession};

/// Outcome of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Allow,
    RedirectToLogin,
    RedirectToMemberHome,
    RedirectToAdminHome,
}

/// Which audience a route is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteScope {
    Member,
    Admin,
}

impl RouteScope {
    #[must_use]
    pub const fn requires_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Apply the gate rules in order:
///
/// 1. no principal redirects to login;
/// 2. an admin route seen by a non-admin redirects to the member home;
/// 3. a member route seen by an admin redirects to the admin home;
/// 4. anything else is allowed.
///
/// # Examples
/// ```
/// use chama::domain::{decide, Decision};
///
/// assert_eq!(decide(None, true, true), Decision::RedirectToLogin);
/// ```
#[must_use]
pub const fn decide(principal: Option<&Principal>, is_admin: bool, route_requires_admin: bool) -> Decision {
    match (principal, is_admin, route_requires_admin) {
        (None, _, _) => Decision::RedirectToLogin,
        (Some(_), false, true) => Decision::RedirectToMemberHome,
        (Some(_), true, false) => Decision::RedirectToAdminHome,
        (Some(_), _, _) => Decision::Allow,
    }
}

/// [`decide`] for a resolved session and route scope.
#[must_use]
pub const fn decide_for(session: &ResolvedSession, scope: RouteScope) -> Decision {
    decide(session.principal(), session.is_admin(), scope.requires_admin())
}

/// Landing scope for a signed-in session; `None` when anonymous.
#[must_use]
pub const fn home_scope(session: &ResolvedSession) -> Option<RouteScope> {
    match (session.principal(), session.is_admin()) {
        (None, _) => None,
        (Some(_), true) => Some(RouteScope::Admin),
        (Some(_), false) => Some(RouteScope::Member),
    }
}
