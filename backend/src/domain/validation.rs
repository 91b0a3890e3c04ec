//! Form validation with one tagged variant per failing field.
//!
//! Each form collects every failing field before returning, so a client can
//! highlight all problems at once. [`FormErrors`] converts into a domain
//! [`Error`] whose details list `{field, code, message}` per failure.

use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::json;
use zeroize::Zeroizing;

use super::{AdjustmentKind, Amount, Error, MessageCategory};

/// Minimum password length accepted at registration.
pub const PASSWORD_MIN: usize = 6;
/// Upper bound for free-text fields such as reasons and message bodies.
pub const TEXT_MAX: usize = 1_000;
/// Upper bound for display names.
pub const NAME_MAX: usize = 80;
const PHONE_DIGITS_MIN: usize = 9;
const PHONE_DIGITS_MAX: usize = 15;

/// A single field failure.
pub trait FieldError: fmt::Display {
    /// Form field name as sent by clients.
    fn field(&self) -> &'static str;
    /// Stable machine-readable reason.
    fn code(&self) -> &'static str;
}

/// Every failing field of one form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormErrors<E>(Vec<E>);

impl<E> FormErrors<E> {
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<E: FieldError> From<FormErrors<E>> for Error {
    fn from(errors: FormErrors<E>) -> Self {
        let fields: Vec<_> = errors
            .iter()
            .map(|error| {
                json!({
                    "field": error.field(),
                    "code": error.code(),
                    "message": error.to_string(),
                })
            })
            .collect();
        let message = errors
            .iter()
            .next()
            .map_or_else(|| "invalid form".to_owned(), ToString::to_string);
        Self::invalid_request(message).with_details(json!({ "fields": fields }))
    }
}

/// Accumulates field failures while a form is checked.
struct Collector<E>(Vec<E>);

impl<E> Collector<E> {
    const fn new() -> Self {
        Self(Vec::new())
    }

    fn check<T, F>(&mut self, result: Result<T, F>, wrap: impl FnOnce(F) -> E) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.0.push(wrap(error));
                None
            }
        }
    }

    fn finish<T>(self, build: impl FnOnce() -> Option<T>) -> Result<T, FormErrors<E>> {
        if self.0.is_empty() {
            build().ok_or(FormErrors(self.0))
        } else {
            Err(FormErrors(self.0))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is required")]
    Missing,
    #[error("amount must be a number")]
    NotNumeric,
    #[error("amount must be greater than zero")]
    NotPositive,
}

impl AmountError {
    const fn code(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::NotNumeric => "not_numeric",
            Self::NotPositive => "not_positive",
        }
    }
}

/// Parse a strictly positive decimal amount.
pub fn parse_amount(raw: Option<&str>) -> Result<Amount, AmountError> {
    let text = raw.map(str::trim).filter(|value| !value.is_empty());
    let amount: Amount = text
        .ok_or(AmountError::Missing)?
        .parse()
        .map_err(|_| AmountError::NotNumeric)?;
    if !amount.is_positive() {
        return Err(AmountError::NotPositive);
    }
    Ok(amount)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    #[error("value must not be empty")]
    Empty,
    #[error("value must be at most {max} characters")]
    TooLong { max: usize },
}

impl TextError {
    const fn code(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooLong { .. } => "too_long",
        }
    }
}

fn required_text(raw: &str, max: usize) -> Result<String, TextError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TextError::Empty);
    }
    if trimmed.chars().count() > max {
        return Err(TextError::TooLong { max });
    }
    Ok(trimmed.to_owned())
}

fn optional_text(raw: Option<&str>, max: usize) -> Result<Option<String>, TextError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(text) => required_text(text, max).map(Some),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("phone number is required")]
    Empty,
    #[error("phone number may only contain digits, spaces, dashes and a leading +")]
    InvalidCharacters,
    #[error("phone number must have between {min} and {max} digits")]
    WrongLength { min: usize, max: usize },
}

impl PhoneError {
    const fn code(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::InvalidCharacters => "invalid_characters",
            Self::WrongLength { .. } => "wrong_length",
        }
    }
}

/// Phone number normalised to an optional `+` followed by digits.
///
/// # Examples
/// ```
/// use chama::domain::PhoneNumber;
///
/// let phone = PhoneNumber::parse(" +254 712-345-678 ").unwrap();
/// assert_eq!(phone.as_str(), "+254712345678");
/// assert_eq!(phone.pseudo_email("members.example"), "254712345678@members.example");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, PhoneError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Empty);
        }
        let (plus, rest) = match trimmed.strip_prefix('+') {
            Some(rest) => ("+", rest),
            None => ("", trimmed),
        };
        let mut digits = String::with_capacity(rest.len());
        for ch in rest.chars() {
            match ch {
                '0'..='9' => digits.push(ch),
                ' ' | '-' => {}
                _ => return Err(PhoneError::InvalidCharacters),
            }
        }
        if !(PHONE_DIGITS_MIN..=PHONE_DIGITS_MAX).contains(&digits.len()) {
            return Err(PhoneError::WrongLength {
                min: PHONE_DIGITS_MIN,
                max: PHONE_DIGITS_MAX,
            });
        }
        Ok(Self(format!("{plus}{digits}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits only, without the leading `+`.
    pub fn digits(&self) -> &str {
        self.0.trim_start_matches('+')
    }

    /// Synthetic email used as the auth identifier for phone-only members.
    pub fn pseudo_email(&self, domain: &str) -> String {
        format!("{}@{domain}", self.digits())
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EmailError {
    #[error("email address is not valid")]
    Invalid,
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Lower-cased email address when it has a plausible shape.
pub fn parse_email(raw: &str) -> Result<String, EmailError> {
    let trimmed = raw.trim();
    if email_regex().is_match(trimmed) {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(EmailError::Invalid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PasswordError {
    #[error("password must be at least {min} characters")]
    TooShort { min: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DateError {
    #[error("date is required")]
    Missing,
    #[error("date must use the YYYY-MM-DD format")]
    Malformed,
}

fn parse_date(raw: Option<&str>) -> Result<NaiveDate, DateError> {
    let text = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(DateError::Missing)?;
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| DateError::Malformed)
}

// ---------------------------------------------------------------------------
// Registration

/// Raw registration input.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm<'a> {
    pub full_name: &'a str,
    pub phone: &'a str,
    pub password: &'a str,
    pub email: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationFieldError {
    #[error("full name: {0}")]
    FullName(TextError),
    #[error("{0}")]
    Phone(PhoneError),
    #[error("{0}")]
    Password(PasswordError),
    #[error("{0}")]
    Email(EmailError),
}

impl FieldError for RegistrationFieldError {
    fn field(&self) -> &'static str {
        match self {
            Self::FullName(_) => "fullName",
            Self::Phone(_) => "phone",
            Self::Password(_) => "password",
            Self::Email(_) => "email",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::FullName(error) => error.code(),
            Self::Phone(error) => error.code(),
            Self::Password(PasswordError::TooShort { .. }) => "too_short",
            Self::Email(EmailError::Invalid) => "invalid",
        }
    }
}

/// Validated registration.
#[derive(Clone)]
pub struct Registration {
    pub full_name: String,
    pub phone: PhoneNumber,
    pub password: Zeroizing<String>,
    pub email: Option<String>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("full_name", &self.full_name)
            .field("phone", &self.phone)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl RegistrationForm<'_> {
    pub fn validate(&self) -> Result<Registration, FormErrors<RegistrationFieldError>> {
        let mut errors = Collector::new();
        let full_name = errors.check(
            required_text(self.full_name, NAME_MAX),
            RegistrationFieldError::FullName,
        );
        let phone = errors.check(PhoneNumber::parse(self.phone), RegistrationFieldError::Phone);
        let password = errors.check(
            if self.password.chars().count() < PASSWORD_MIN {
                Err(PasswordError::TooShort { min: PASSWORD_MIN })
            } else {
                Ok(Zeroizing::new(self.password.to_owned()))
            },
            RegistrationFieldError::Password,
        );
        let email = errors.check(
            self.email
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(parse_email)
                .transpose(),
            RegistrationFieldError::Email,
        );
        errors.finish(|| {
            Some(Registration {
                full_name: full_name?,
                phone: phone?,
                password: password?,
                email: email?,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Contributions

/// Raw contribution input. Members may omit the amount and date; the
/// administrator form requires both.
#[derive(Debug, Clone, Default)]
pub struct ContributionForm<'a> {
    pub amount: Option<&'a str>,
    pub date: Option<&'a str>,
    pub notes: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContributionFieldError {
    #[error("{0}")]
    Amount(AmountError),
    #[error("{0}")]
    Date(DateError),
    #[error("notes: {0}")]
    Notes(TextError),
}

impl FieldError for ContributionFieldError {
    fn field(&self) -> &'static str {
        match self {
            Self::Amount(_) => "amount",
            Self::Date(_) => "date",
            Self::Notes(_) => "notes",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Amount(error) => error.code(),
            Self::Date(DateError::Missing) => "missing",
            Self::Date(DateError::Malformed) => "malformed",
            Self::Notes(error) => error.code(),
        }
    }
}

/// Member self-service contribution; `amount` falls back to the daily amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfContribution {
    pub amount: Option<Amount>,
    pub notes: Option<String>,
}

/// Administrator-entered contribution for an arbitrary date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedContribution {
    pub amount: Amount,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

impl ContributionForm<'_> {
    pub fn validate_self_service(
        &self,
    ) -> Result<SelfContribution, FormErrors<ContributionFieldError>> {
        let mut errors = Collector::new();
        let amount = errors.check(
            match self.amount.map(str::trim).filter(|value| !value.is_empty()) {
                Some(raw) => parse_amount(Some(raw)).map(Some),
                None => Ok(None),
            },
            ContributionFieldError::Amount,
        );
        let notes = errors.check(
            optional_text(self.notes, TEXT_MAX),
            ContributionFieldError::Notes,
        );
        errors.finish(|| {
            Some(SelfContribution {
                amount: amount?,
                notes: notes?,
            })
        })
    }

    pub fn validate_recorded(
        &self,
    ) -> Result<RecordedContribution, FormErrors<ContributionFieldError>> {
        let mut errors = Collector::new();
        let amount = errors.check(parse_amount(self.amount), ContributionFieldError::Amount);
        let date = errors.check(parse_date(self.date), ContributionFieldError::Date);
        let notes = errors.check(
            optional_text(self.notes, TEXT_MAX),
            ContributionFieldError::Notes,
        );
        errors.finish(|| {
            Some(RecordedContribution {
                amount: amount?,
                date: date?,
                notes: notes?,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Balance adjustments

#[derive(Debug, Clone)]
pub struct AdjustmentForm<'a> {
    pub kind: AdjustmentKind,
    pub amount: Option<&'a str>,
    pub reason: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdjustmentFieldError {
    #[error("{0}")]
    Amount(AmountError),
    #[error("reason: {0}")]
    Reason(TextError),
}

impl FieldError for AdjustmentFieldError {
    fn field(&self) -> &'static str {
        match self {
            Self::Amount(_) => "amount",
            Self::Reason(_) => "reason",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Amount(error) => error.code(),
            Self::Reason(error) => error.code(),
        }
    }
}

/// Validated adjustment; `magnitude` is always positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    pub kind: AdjustmentKind,
    pub magnitude: Amount,
    pub reason: String,
}

impl Adjustment {
    #[must_use]
    pub fn signed_amount(&self) -> Amount {
        self.kind.signed(self.magnitude)
    }
}

impl AdjustmentForm<'_> {
    pub fn validate(&self) -> Result<Adjustment, FormErrors<AdjustmentFieldError>> {
        let mut errors = Collector::new();
        let magnitude = errors.check(parse_amount(self.amount), AdjustmentFieldError::Amount);
        let reason = errors.check(
            required_text(self.reason, TEXT_MAX),
            AdjustmentFieldError::Reason,
        );
        errors.finish(|| {
            Some(Adjustment {
                kind: self.kind,
                magnitude: magnitude?,
                reason: reason?,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Messages

#[derive(Debug, Clone)]
pub struct MessageForm<'a> {
    pub body: &'a str,
    pub category: MessageCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageFieldError {
    #[error("message: {0}")]
    Body(TextError),
}

impl FieldError for MessageFieldError {
    fn field(&self) -> &'static str {
        match self {
            Self::Body(_) => "message",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Body(error) => error.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub body: String,
    pub category: MessageCategory,
}

impl MessageForm<'_> {
    pub fn validate(&self) -> Result<OutgoingMessage, FormErrors<MessageFieldError>> {
        let mut errors = Collector::new();
        let body = errors.check(required_text(self.body, TEXT_MAX), MessageFieldError::Body);
        errors.finish(|| {
            Some(OutgoingMessage {
                body: body?,
                category: self.category,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Payments

#[derive(Debug, Clone, Default)]
pub struct PaymentForm<'a> {
    pub amount: Option<&'a str>,
    pub phone: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentFieldError {
    #[error("{0}")]
    Amount(AmountError),
    #[error("{0}")]
    Phone(PhoneError),
}

impl FieldError for PaymentFieldError {
    fn field(&self) -> &'static str {
        match self {
            Self::Amount(_) => "amount",
            Self::Phone(_) => "phoneNumber",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Amount(error) => error.code(),
            Self::Phone(error) => error.code(),
        }
    }
}

/// Validated payment request; `phone` is `None` when the profile number
/// should be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub amount: Amount,
    pub phone: Option<PhoneNumber>,
}

impl PaymentForm<'_> {
    pub fn validate(&self) -> Result<PaymentRequest, FormErrors<PaymentFieldError>> {
        let mut errors = Collector::new();
        let amount = errors.check(parse_amount(self.amount), PaymentFieldError::Amount);
        let phone = errors.check(
            self.phone
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(PhoneNumber::parse)
                .transpose(),
            PaymentFieldError::Phone,
        );
        errors.finish(|| {
            Some(PaymentRequest {
                amount: amount?,
                phone: phone?,
            })
        })
    }
}
