//! Rules that the `validator` derive cannot express: password policy and
//! fields required by particular roles.

use axum_helpers::errors::{InvalidFields, merge};
use chrono::NaiveDate;

use crate::models::Role;

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 16;
pub const SPECIAL_CHARACTERS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

pub const PASSWORD_REQUIRED: &str = "Password must be provided";
pub const INVALID_BIRTH_DATE: &str = "Invalid birth date";
pub const INVALID_DOCTOR_TYPE: &str = "Invalid doctor type";

/// Checks `candidate` against the password policy, one message per broken rule.
///
/// `None` and blank input produce no violations; presence is enforced
/// separately by [`password_required`].
pub fn validate_password(candidate: Option<&str>) -> Vec<String> {
    let Some(password) = candidate.filter(|p| !p.trim().is_empty()) else {
        return Vec::new();
    };

    let mut violations = Vec::new();

    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        violations.push(format!(
            "Password must be {} to {} characters long",
            PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push("Password must contain at least 1 uppercase character".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push("Password must contain at least 1 lowercase character".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push("Password must contain at least 1 digit".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        violations.push("Password must contain at least 1 special character".to_string());
    }
    if password.chars().any(char::is_whitespace) {
        violations.push("Password must not contain whitespace".to_string());
    }

    violations
}

/// Presence rule paired with [`validate_password`].
pub fn password_required(candidate: Option<&str>) -> Option<&'static str> {
    match candidate {
        Some(p) if !p.trim().is_empty() => None,
        _ => Some(PASSWORD_REQUIRED),
    }
}

/// DOCTOR and PATIENT need a birth date; DOCTOR also needs a doctor type.
pub fn validate_role_fields(
    roles: &[Role],
    birth_date: Option<NaiveDate>,
    doctor_type_id: Option<i16>,
) -> InvalidFields {
    let mut fields = InvalidFields::new();

    let needs_birth_date = roles
        .iter()
        .any(|r| matches!(r, Role::Doctor | Role::Patient));
    if needs_birth_date && birth_date.is_none() {
        merge(&mut fields, "birthDate", INVALID_BIRTH_DATE);
    }

    if roles.contains(&Role::Doctor) && doctor_type_id.is_none() {
        merge(&mut fields, "doctorTypeId", INVALID_DOCTOR_TYPE);
    }

    fields
}
