//! Payload validation for account writes
//!
//! Turns loosely typed request payloads into validated values. Every failing
//! field is reported, not just the first one.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

use crate::auth::role::Role;
use crate::constants::{MIN_PASSWORD_LENGTH, MIN_PHONE_LENGTH};
use crate::error::{FieldError, RegistryError, Result};
use crate::storage::Profile;

/// Argon2 accepts longer input, but nothing legitimate needs it
pub const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_EMAIL_LENGTH: usize = 254;
const MAX_TEXT_LENGTH: usize = 512;
const MAX_AGE: u64 = 150;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
        )
        .expect("email pattern is a valid regex")
    })
}

/// Account creation payload as it arrives on the wire
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub name: Option<String>,
    pub number: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub address: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    /// Number in JSON bodies, text in multipart forms
    pub age: Option<Value>,
    pub birthdate: Option<String>,
    pub gender: Option<String>,
}

/// Administrative update payload. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentUpdateRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub number: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub address: Option<String>,
    pub password: Option<String>,
}

/// How the role of a new account is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRule {
    /// Caller must supply `admin` or `student`
    Required,
    /// The endpoint fixes the role and ignores the payload
    Forced(Role),
}

/// A registration payload that passed validation. The password is still
/// plaintext and must go through the hasher before it is stored.
#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub profile: Profile,
}

/// A validated update. `password` is plaintext until hashed.
#[derive(Debug, Clone, Default)]
pub struct ValidUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub class_name: Option<String>,
    pub address: Option<String>,
}

/// Lower-cases and trims an email so lookups and uniqueness agree
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LENGTH && email_pattern().is_match(email)
}

/// Trims optional text. Blank values count as absent, which is what
/// HTML forms send for untouched inputs. JSON bodies get the same rule, so
/// `"number": ""` is accepted and stored as no number.
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_email(raw: Option<String>, errors: &mut Vec<FieldError>) -> Option<String> {
    match clean(raw) {
        Some(email) => {
            let email = normalize_email(&email);
            if is_valid_email(&email) {
                Some(email)
            } else {
                errors.push(FieldError::new("email", "Invalid email address"));
                None
            }
        }
        None => {
            errors.push(FieldError::new("email", "Email is required"));
            None
        }
    }
}

fn check_password(password: &str, errors: &mut Vec<FieldError>) {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    } else if length > MAX_PASSWORD_LENGTH {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at most {} characters", MAX_PASSWORD_LENGTH),
        ));
    }
}

fn check_phone(number: Option<String>, errors: &mut Vec<FieldError>) -> Option<String> {
    let number = clean(number)?;
    if number.chars().count() < MIN_PHONE_LENGTH {
        errors.push(FieldError::new(
            "number",
            format!("Phone number must be at least {} characters", MIN_PHONE_LENGTH),
        ));
    }
    Some(number)
}

fn check_text(field: &str, value: Option<String>, errors: &mut Vec<FieldError>) -> Option<String> {
    let value = clean(value)?;
    if value.chars().count() > MAX_TEXT_LENGTH {
        errors.push(FieldError::new(field, "Value is too long"));
    }
    Some(value)
}

fn check_age(age: Option<Value>, errors: &mut Vec<FieldError>) -> Option<u32> {
    let parsed = match age? {
        Value::Null => return None,
        Value::Number(n) => n.as_u64(),
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match parsed {
        Some(age) if age <= MAX_AGE => Some(age as u32),
        _ => {
            errors.push(FieldError::new("age", "Age must be a whole number"));
            None
        }
    }
}

/// Validates a registration payload
pub fn validate_registration(
    request: RegistrationRequest,
    rule: RoleRule,
) -> Result<ValidRegistration> {
    let mut errors = Vec::new();

    let email = check_email(request.email, &mut errors);

    let password = request.password.unwrap_or_default();
    check_password(&password, &mut errors);

    let role = match rule {
        RoleRule::Forced(role) => Some(role),
        RoleRule::Required => match request.role.as_deref().map(str::trim) {
            Some(raw) => match raw.parse::<Role>() {
                Ok(role) => Some(role),
                Err(message) => {
                    errors.push(FieldError::new("role", message));
                    None
                }
            },
            None => {
                errors.push(FieldError::new("role", "Role is required"));
                None
            }
        },
    };

    let profile = Profile {
        name: check_text("name", request.name, &mut errors),
        phone_number: check_phone(request.number, &mut errors),
        class_name: check_text("class", request.class_name, &mut errors),
        address: check_text("address", request.address, &mut errors),
        father_name: check_text("fatherName", request.father_name, &mut errors),
        mother_name: check_text("motherName", request.mother_name, &mut errors),
        age: check_age(request.age, &mut errors),
        birthdate: check_text("birthdate", request.birthdate, &mut errors),
        gender: check_text("gender", request.gender, &mut errors),
        passport_image: None,
    };

    match (email, role) {
        (Some(email), Some(role)) if errors.is_empty() => Ok(ValidRegistration {
            email,
            password,
            role,
            profile,
        }),
        _ => Err(RegistryError::ValidationFailed(errors)),
    }
}

/// Validates an administrative update. Only supplied fields are checked.
pub fn validate_update(request: StudentUpdateRequest) -> Result<ValidUpdate> {
    let mut errors = Vec::new();

    let email = match clean(request.email) {
        Some(raw) => check_email(Some(raw), &mut errors),
        None => None,
    };

    let password = request.password.filter(|p| !p.is_empty());
    if let Some(ref password) = password {
        check_password(password, &mut errors);
    }

    let update = ValidUpdate {
        email,
        password,
        name: check_text("name", request.name, &mut errors),
        phone_number: check_phone(request.number, &mut errors),
        class_name: check_text("class", request.class_name, &mut errors),
        address: check_text("address", request.address, &mut errors),
    };

    if errors.is_empty() {
        Ok(update)
    } else {
        Err(RegistryError::ValidationFailed(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, role: Option<&str>) -> RegistrationRequest {
        RegistrationRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            role: role.map(str::to_string),
            ..RegistrationRequest::default()
        }
    }

    fn failed_fields(result: Result<ValidRegistration>) -> Vec<String> {
        match result {
            Err(RegistryError::ValidationFailed(fields)) => {
                fields.into_iter().map(|f| f.field).collect()
            }
            other => panic!("expected validation failure, got {:?}", other.map(|r| r.email)),
        }
    }

    #[test]
    fn test_minimal_student_registration() {
        let valid =
            validate_registration(request("A@X.com ", "secret1", Some("student")), RoleRule::Required)
                .unwrap();
        assert_eq!(valid.email, "a@x.com");
        assert_eq!(valid.role, Role::Student);
        assert_eq!(valid.password, "secret1");
        assert_eq!(valid.profile, Profile::default());
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@school.co.in"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("two@@x.com"));
        assert!(!is_valid_email("spaces in@x.com"));
        assert!(!is_valid_email("@x.com"));
    }

    #[test]
    fn test_short_password_rejected() {
        let fields = failed_fields(validate_registration(
            request("a@x.com", "12345", Some("student")),
            RoleRule::Required,
        ));
        assert_eq!(fields, vec!["password"]);
    }

    #[test]
    fn test_password_length_counts_characters() {
        // Six characters, more than six bytes
        let result = validate_registration(
            request("a@x.com", "ééééé1", Some("student")),
            RoleRule::Required,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_password_and_role() {
        let request = RegistrationRequest {
            email: Some("a@x.com".to_string()),
            ..RegistrationRequest::default()
        };
        let fields = failed_fields(validate_registration(request, RoleRule::Required));
        assert_eq!(fields, vec!["password", "role"]);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let fields = failed_fields(validate_registration(
            request("a@x.com", "secret1", Some("teacher")),
            RoleRule::Required,
        ));
        assert_eq!(fields, vec!["role"]);
    }

    #[test]
    fn test_forced_role_ignores_payload() {
        let valid = validate_registration(
            request("a@x.com", "secret1", Some("student")),
            RoleRule::Forced(Role::Admin),
        )
        .unwrap();
        assert_eq!(valid.role, Role::Admin);
    }

    #[test]
    fn test_reports_every_bad_field() {
        let mut req = request("not-an-email", "123", Some("student"));
        req.number = Some("12345".to_string());
        req.age = Some(Value::String("ten".to_string()));

        let fields = failed_fields(validate_registration(req, RoleRule::Required));
        assert_eq!(fields, vec!["email", "password", "number", "age"]);
    }

    #[test]
    fn test_profile_fields_cleaned() {
        let mut req = request("a@x.com", "secret1", Some("student"));
        req.name = Some("  Asha Verma ".to_string());
        req.class_name = Some("10A".to_string());
        req.address = Some("   ".to_string());
        req.number = Some("9876543210".to_string());
        req.age = Some(Value::String("14".to_string()));

        let valid = validate_registration(req, RoleRule::Required).unwrap();
        assert_eq!(valid.profile.name.as_deref(), Some("Asha Verma"));
        assert_eq!(valid.profile.class_name.as_deref(), Some("10A"));
        assert_eq!(valid.profile.address, None);
        assert_eq!(valid.profile.phone_number.as_deref(), Some("9876543210"));
        assert_eq!(valid.profile.age, Some(14));
    }

    #[test]
    fn test_blank_json_number_is_absent() {
        let req: RegistrationRequest = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "password": "secret1",
            "role": "student",
            "number": "",
        }))
        .unwrap();

        let valid = validate_registration(req, RoleRule::Required).unwrap();
        assert_eq!(valid.profile.phone_number, None);

        let req: RegistrationRequest = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "password": "secret1",
            "role": "student",
            "number": "12345",
        }))
        .unwrap();
        assert_eq!(failed_fields(validate_registration(req, RoleRule::Required)), vec!["number"]);
    }

    #[test]
    fn test_numeric_age_from_json() {
        let req: RegistrationRequest = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "password": "secret1",
            "role": "student",
            "age": 12,
            "fatherName": "Ravi",
        }))
        .unwrap();

        let valid = validate_registration(req, RoleRule::Required).unwrap();
        assert_eq!(valid.profile.age, Some(12));
        assert_eq!(valid.profile.father_name.as_deref(), Some("Ravi"));
    }

    #[test]
    fn test_update_checks_only_supplied_fields() {
        let update = validate_update(StudentUpdateRequest {
            address: Some("4 Lake View".to_string()),
            ..StudentUpdateRequest::default()
        })
        .unwrap();
        assert_eq!(update.address.as_deref(), Some("4 Lake View"));
        assert!(update.password.is_none());
        assert!(update.email.is_none());
    }

    #[test]
    fn test_update_rejects_bad_values() {
        let result = validate_update(StudentUpdateRequest {
            email: Some("broken".to_string()),
            password: Some("123".to_string()),
            ..StudentUpdateRequest::default()
        });
        match result {
            Err(RegistryError::ValidationFailed(fields)) => assert_eq!(fields.len(), 2),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }
}
