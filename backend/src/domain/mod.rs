//! Domain types, services and ports.
//!
//! Purpose: keep the savings rules (who may see what, how balances are
//! derived, how the first administrator comes to exist) independent of HTTP
//! and of the hosted backend. Services talk to the outside world only through
//! the traits in [`ports`].
//!
//! Public surface:
//! - Values: [`Amount`], [`PrincipalId`], [`Credentials`], [`PhoneNumber`].
//! - Rows: [`MemberProfile`], [`Contribution`], [`BalanceAdjustment`],
//!   [`AdminMessage`], [`SmsLog`], [`PaymentTransaction`].
//! - Session core: [`SessionResolver`], [`SessionContext`], [`decide`],
//!   [`AdminBootstrap`].
//! - Services: [`AccountService`], [`MemberService`], [`AdminService`].

pub mod ports;

mod accounts;
mod admin_bootstrap;
mod admin_service;
mod authorization;
pub mod error;
mod ledger;
mod member;
mod member_service;
mod message;
mod money;
mod notifications;
mod payment;
mod payments;
mod principal;
mod service_support;
mod session;
mod session_context;
mod session_resolver;
mod session_tracker;
mod trace_id;
mod validation;

pub use self::accounts::{AccountService, DEFAULT_PSEUDO_EMAIL_DOMAIN};
pub use self::admin_bootstrap::{AdminBootstrap, BootstrapOutcome};
pub use self::admin_service::{
    AdminService, MemberDetail, MemberSummary, MessageDelivery, ReminderReport, SMS_LOG_PAGE,
};
pub use self::authorization::{Decision, RouteScope, decide, decide_for, home_scope};
pub use self::error::{Error, ErrorCode};
pub use self::ledger::{
    BalanceAdjustment, Contribution, ContributionStatus, effective_balance, has_contribution_on,
};
pub use self::member::{MemberProfile, MemberSettingsPatch};
pub use self::member_service::{MemberDashboard, MemberService};
pub use self::message::{AdminMessage, MessageCategory, SmsLog};
pub use self::money::{AdjustmentKind, Amount};
pub use self::notifications::SmsNotifier;
pub use self::payment::{PaymentFunctionReply, PaymentReceipt, PaymentTransaction};
pub use self::payments::PaymentService;
pub use self::principal::{
    Credentials, CredentialsError, Principal, PrincipalId, Role, RoleAssignment,
};
pub use self::session::{AuthEvent, AuthEventKind, RawSession, ResolvedSession, SessionPhase};
pub use self::session_context::{Admitted, DEFAULT_BOOT_TIMEOUT, SessionContext};
pub use self::session_resolver::SessionResolver;
pub use self::session_tracker::SessionTracker;
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::validation::{
    Adjustment, AdjustmentFieldError, AdjustmentForm, AmountError, ContributionFieldError,
    ContributionForm, DateError, EmailError, FieldError, FormErrors, MessageFieldError,
    MessageForm, OutgoingMessage, PasswordError, PaymentFieldError, PaymentForm, PaymentRequest,
    PhoneError, PhoneNumber, RecordedContribution, Registration, RegistrationFieldError,
    RegistrationForm, SelfContribution, TextError, parse_amount, parse_email,
};

/// Convenient result alias for service calls.
///
/// # Examples
/// ```
/// use chama::domain::{ApiResult, Error};
///
/// fn refuse() -> ApiResult<()> {
///     Err(Error::forbidden("admins only"))
/// }
/// assert!(refuse().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
