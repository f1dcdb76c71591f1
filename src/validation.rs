//! Request body checks. Each validator collects every failing field and
//! returns a single `ValidationError` listing them.

use std::collections::HashMap;

use crate::auth::permissions::is_known_permission;
use crate::database::models::{
    MemoryInput, NewMessage, NewRole, NewUser, PasswordChange, ProfileUpdate, RoleUpdate, UserUpdate,
};
use crate::error::ApiError;

pub const MAX_STATS_DAYS: i32 = 365;

#[derive(Debug, Default)]
struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    fn finish(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_error("Validation failed", Some(self.0)))
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub fn is_valid_username(username: &str) -> bool {
    (3..=30).contains(&char_len(username)) && username.chars().all(|c| c.is_ascii_alphanumeric())
}

/// `local@domain.tld` shape; no whitespace, one `@`, a dot in the domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 255 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

fn check_credentials(errors: &mut FieldErrors, username: &str, email: &str, password: &str) {
    errors.check(
        is_valid_username(username),
        "username",
        "Username must be 3-30 letters or digits",
    );
    errors.check(is_valid_email(email), "email", "Email must be a valid address");
    errors.check(char_len(password) >= 6, "password", "Password must be at least 6 characters");
}

pub fn validate_register(username: &str, email: &str, password: &str) -> Result<(), ApiError> {
    let mut errors = FieldErrors::default();
    check_credentials(&mut errors, username, email, password);
    errors.finish()
}

pub fn validate_login(username: &str, password: &str) -> Result<(), ApiError> {
    let mut errors = FieldErrors::default();
    errors.check(!username.is_empty(), "username", "Username is required");
    errors.check(!password.is_empty(), "password", "Password is required");
    errors.finish()
}

pub fn validate_new_user(input: &NewUser) -> Result<(), ApiError> {
    let mut errors = FieldErrors::default();
    check_credentials(&mut errors, &input.username, &input.email, &input.password);
    errors.finish()
}

pub fn validate_user_update(input: &UserUpdate) -> Result<(), ApiError> {
    let mut errors = FieldErrors::default();
    errors.check(
        is_valid_username(&input.username),
        "username",
        "Username must be 3-30 letters or digits",
    );
    errors.check(is_valid_email(&input.email), "email", "Email must be a valid address");
    errors.check(!input.role.is_empty(), "role", "Role is required");
    errors.finish()
}

pub fn validate_profile(input: &ProfileUpdate) -> Result<(), ApiError> {
    let mut errors = FieldErrors::default();
    if let Some(username) = &input.username {
        errors.check(is_valid_username(username), "username", "Username must be 3-30 letters or digits");
    }
    if let Some(email) = &input.email {
        errors.check(is_valid_email(email), "email", "Email must be a valid address");
    }
    errors.finish()
}

pub fn validate_password_change(input: &PasswordChange) -> Result<(), ApiError> {
    let mut errors = FieldErrors::default();
    errors.check(!input.old_password.is_empty(), "oldPassword", "Current password is required");
    errors.check(
        char_len(&input.new_password) >= 6,
        "newPassword",
        "Password must be at least 6 characters",
    );
    errors.finish()
}

pub fn validate_message(input: &NewMessage) -> Result<(), ApiError> {
    let mut errors = FieldErrors::default();
    errors.check((1..=100).contains(&char_len(input.name.trim())), "name", "Name must be 1-100 characters");
    if let Some(email) = input.email.as_deref().filter(|e| !e.is_empty()) {
        errors.check(is_valid_email(email), "email", "Email must be a valid address");
    }
    errors.check(
        (1..=2000).contains(&char_len(input.message.trim())),
        "message",
        "Message must be 1-2000 characters",
    );
    errors.finish()
}

pub fn validate_memory(input: &MemoryInput) -> Result<(), ApiError> {
    let mut errors = FieldErrors::default();
    errors.check((1..=255).contains(&char_len(input.title.trim())), "title", "Title must be 1-255 characters");
    if let Some(description) = &input.description {
        errors.check(char_len(description) <= 500, "description", "Description must be at most 500 characters");
    }
    errors.check(!input.memory_content.trim().is_empty(), "memory_content", "Content is required");
    if let Some(comment) = &input.comment {
        errors.check(char_len(comment) <= 500, "comment", "Comment must be at most 500 characters");
    }
    errors.finish()
}

fn check_permissions(errors: &mut FieldErrors, permissions: &[String]) {
    if let Some(unknown) = permissions.iter().find(|p| !is_known_permission(p)) {
        errors.add("permissions", format!("Unknown permission '{}'", unknown));
    }
}

pub fn validate_new_role(input: &NewRole) -> Result<(), ApiError> {
    let mut errors = FieldErrors::default();
    errors.check((2..=50).contains(&char_len(&input.name)), "name", "Role name must be 2-50 characters");
    errors.check(char_len(&input.description) <= 200, "description", "Description must be at most 200 characters");
    check_permissions(&mut errors, &input.permissions);
    errors.finish()
}

pub fn validate_role_update(input: &RoleUpdate) -> Result<(), ApiError> {
    let mut errors = FieldErrors::default();
    if let Some(name) = &input.name {
        errors.check((2..=50).contains(&char_len(name)), "name", "Role name must be 2-50 characters");
    }
    if let Some(description) = &input.description {
        errors.check(char_len(description) <= 200, "description", "Description must be at most 200 characters");
    }
    if let Some(permissions) = &input.permissions {
        check_permissions(&mut errors, permissions);
    }
    errors.finish()
}

pub fn validate_stats_days(days: i32) -> Result<(), ApiError> {
    if (1..=MAX_STATS_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(ApiError::field_error("days", format!("days must be between 1 and {}", MAX_STATS_DAYS)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn field_errors(err: ApiError) -> HashMap<String, String> {
        match err {
            ApiError::ValidationError { field_errors: Some(f), .. } => f,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn usernames() {
        assert!(is_valid_username("ann"));
        assert!(is_valid_username("Admin2024"));
        assert!(!is_valid_username("an"));
        assert!(!is_valid_username("ann_smith"));
        assert!(!is_valid_username(&"a".repeat(31)));
    }

    #[test]
    fn emails() {
        assert!(is_valid_email("ann@example.com"));
        assert!(!is_valid_email("ann@example"));
        assert!(!is_valid_email("ann example@x.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@b@c.com"));
    }

    #[test]
    fn register_reports_every_bad_field() {
        let errors = field_errors(validate_register("a!", "nope", "123").unwrap_err());
        assert!(errors.contains_key("username"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
        assert!(validate_register("ann", "ann@example.com", "secret").is_ok());
    }

    #[test]
    fn message_limits() {
        let ok = NewMessage { name: "Ann".into(), email: None, message: "Happy birthday!".into() };
        assert!(validate_message(&ok).is_ok());

        let long = NewMessage { name: "Ann".into(), email: Some(String::new()), message: "x".repeat(2001) };
        assert!(field_errors(validate_message(&long).unwrap_err()).contains_key("message"));
    }

    #[test]
    fn memory_limits() {
        let input = MemoryInput {
            title: String::new(),
            description: Some("d".repeat(501)),
            memory_content: "content".into(),
            date: NaiveDate::from_ymd_opt(2020, 5, 17).unwrap(),
            images: vec![],
            comment: None,
        };
        let errors = field_errors(validate_memory(&input).unwrap_err());
        assert!(errors.contains_key("title"));
        assert!(errors.contains_key("description"));
        assert!(!errors.contains_key("comment"));
    }

    #[test]
    fn role_permissions_must_be_in_catalog() {
        let role = NewRole {
            name: "auditor".into(),
            description: "Reads things".into(),
            permissions: vec!["users:view".into(), "users:manage".into()],
        };
        let errors = field_errors(validate_new_role(&role).unwrap_err());
        assert_eq!(errors["permissions"], "Unknown permission 'users:manage'");
    }

    #[test]
    fn stats_window() {
        assert!(validate_stats_days(30).is_ok());
        assert!(validate_stats_days(0).is_err());
        assert!(validate_stats_days(366).is_err());
    }
}
