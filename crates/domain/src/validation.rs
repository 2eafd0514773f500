//! Form validation performed before data is sent to the API.
//!
//! These checks mirror the server's constraints so that obviously malformed
//! input is rejected without a round trip. The server remains authoritative.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::auth::{Credentials, Currency, RegistrationData};
use crate::error::{DomainError, DomainResult};

#[allow(clippy::expect_used)]
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

#[allow(clippy::expect_used)]
static COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[a-fA-F0-9]{6}$").expect("valid regex"));

/// Minimum password length accepted at registration.
pub const PASSWORD_MIN_LEN: usize = 6;
/// Maximum password length accepted by the API.
pub const PASSWORD_MAX_LEN: usize = 256;
/// Maximum length of card and category titles.
pub const TITLE_MAX_LEN: usize = 50;
/// Exclusive upper bound of a category's costs limit.
pub const COSTS_LIMIT_MAX: i64 = 1_000_000;

/// Checks that an email address has a plausible shape.
///
/// # Errors
///
/// Returns an error if the email is empty or malformed.
pub fn validate_email(email: &str) -> DomainResult<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(DomainError::Required { field: "email" });
    }
    if !EMAIL_RE.is_match(email) {
        return Err(DomainError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

/// Checks login credentials. Only presence and email shape are enforced;
/// password strength is a registration concern.
///
/// # Errors
///
/// Returns an error on a malformed email or an empty password.
pub fn validate_login(credentials: &Credentials) -> DomainResult<()> {
    validate_email(&credentials.email)?;
    if credentials.password.is_empty() {
        return Err(DomainError::Required { field: "password" });
    }
    Ok(())
}

/// Checks registration data.
///
/// # Errors
///
/// Returns an error on a malformed email, a weak password, mismatching
/// passwords, or an unknown currency symbol.
pub fn validate_registration(data: &RegistrationData) -> DomainResult<()> {
    validate_email(&data.email)?;
    validate_password_strength(&data.password1)?;
    if data.password1 != data.password2 {
        return Err(DomainError::PasswordMismatch);
    }
    if let Some(currency) = &data.currency
        && Currency::from_symbol(currency).is_none()
    {
        return Err(DomainError::UnknownCurrency(currency.clone()));
    }
    Ok(())
}

/// Checks the registration password constraints: length bounds, mixed case
/// and at least one digit.
///
/// # Errors
///
/// Returns an error describing the first violated constraint.
pub fn validate_password_strength(password: &str) -> DomainResult<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(DomainError::InvalidPassword(format!(
            "must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"
        )));
    }
    if password.to_lowercase() == password || password.to_uppercase() == password {
        return Err(DomainError::InvalidPassword(
            "must contain different cases".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(DomainError::InvalidPassword(
            "must contain numbers".to_string(),
        ));
    }
    Ok(())
}

/// Checks a card or category title.
///
/// # Errors
///
/// Returns an error if the trimmed title is empty or too long.
pub fn validate_title(title: &str) -> DomainResult<()> {
    let len = title.trim().chars().count();
    if len == 0 || len > TITLE_MAX_LEN {
        return Err(DomainError::InvalidLength {
            field: "title",
            min: 1,
            max: TITLE_MAX_LEN,
        });
    }
    Ok(())
}

/// Checks that a color is a `#rrggbb` hex triplet.
///
/// # Errors
///
/// Returns an error if the color does not match.
pub fn validate_card_color(color: &str) -> DomainResult<()> {
    if COLOR_RE.is_match(color) {
        Ok(())
    } else {
        Err(DomainError::InvalidColor(color.to_string()))
    }
}

/// Checks that an amount is within `0.01..=9_999_999.99`.
///
/// # Errors
///
/// Returns an error if the amount is outside the range.
pub fn validate_amount(amount: Decimal) -> DomainResult<()> {
    let min = Decimal::new(1, 2);
    let max = Decimal::new(999_999_999, 2);
    if amount < min || amount > max {
        return Err(DomainError::AmountOutOfRange(amount.to_string()));
    }
    Ok(())
}

/// Parses and checks an amount typed by the user.
///
/// # Errors
///
/// Returns an error if the text is not a number or is out of range.
pub fn parse_amount(input: &str) -> DomainResult<Decimal> {
    let amount = Decimal::from_str(input.trim().replace(',', ".").as_str())
        .map_err(|_| DomainError::AmountOutOfRange(input.to_string()))?;
    validate_amount(amount)?;
    Ok(amount)
}

/// Checks a category's monthly limit, which must satisfy `0 < limit < 1_000_000`.
///
/// # Errors
///
/// Returns an error if the limit is out of range.
pub fn validate_costs_limit(limit: i64) -> DomainResult<()> {
    if limit <= 0 || limit >= COSTS_LIMIT_MAX {
        return Err(DomainError::AmountOutOfRange(limit.to_string()));
    }
    Ok(())
}
