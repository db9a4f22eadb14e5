//! Credential and registration form checks run before any auth call

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, ValidationErrors};
use crate::profile::UserRole;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;
pub const PHONE_DIGITS: usize = 10;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
}

/// Email and password as typed on the login screen
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        errors.into_result()
    }
}

/// The registration form
#[derive(Debug, Clone)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: String,
    pub role: UserRole,
}

impl Registration {
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();

        check_full_name(&mut errors, "full_name", &self.full_name);
        check_email(&mut errors, self.email.trim());
        check_password(&mut errors, &self.password);

        if self.confirm_password.is_empty() {
            errors.add("confirm_password", "Please confirm your password");
        } else if self.confirm_password != self.password {
            errors.add("confirm_password", "Passwords must match");
        }

        check_phone(&mut errors, "phone", &self.phone);
        errors.into_result()
    }
}

pub(crate) fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.is_empty() {
        errors.add("email", "Email is required");
    } else if !email_pattern().is_match(email) {
        errors.add("email", "Please enter a valid email");
    }
}

pub(crate) fn check_password(errors: &mut ValidationErrors, password: &str) {
    if password.is_empty() {
        errors.add("password", "Password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        );
    }
}

pub(crate) fn check_full_name(errors: &mut ValidationErrors, field: &'static str, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        errors.add(field, "Full name is required");
    } else if name.chars().count() < MIN_NAME_LEN {
        errors.add(field, format!("Name must be at least {} characters", MIN_NAME_LEN));
    }
}

pub(crate) fn check_phone(errors: &mut ValidationErrors, field: &'static str, phone: &str) {
    let phone = phone.trim();
    if phone.is_empty() {
        errors.add(field, "Phone number is required");
    } else if !phone.chars().all(|c| c.is_ascii_digit()) {
        errors.add(field, "Must be only digits");
    } else if phone.len() != PHONE_DIGITS {
        errors.add(field, format!("Must be exactly {} digits", PHONE_DIGITS));
    }
}
