//! crates/chapterhouse_core/src/validation.rs
//!
//! Field-level validation errors and the shared field rules.

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

pub const TITLE_MAX_CHARS: usize = 200;
pub const COMMENT_MAX_CHARS: usize = 1000;

/// Error messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single failing field.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    /// Messages prefixed with a humanized field name, e.g. "Title can't be blank".
    pub fn full_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .flat_map(|(field, messages)| {
                let label = humanize(field);
                messages
                    .iter()
                    .map(move |message| format!("{} {}", label, message))
            })
            .collect()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_messages().join(", "))
    }
}

fn humanize(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

//=========================================================================================
// Shared Rules
//=========================================================================================

/// Presence plus a 1..=max character bound.
pub fn check_length(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    let chars = value.chars().count();
    if value.trim().is_empty() {
        errors.add(field, "can't be blank");
    } else if chars > max {
        errors.add(field, format!("is too long (maximum is {} characters)", max));
    }
}

pub fn check_present(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "can't be blank");
    }
}

/// Lowercases and trims an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("email pattern is a valid regex")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Default display name for a new account: the email's local part.
pub fn default_name_for(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_email("  Reader@Example.COM \n"), "reader@example.com");
    }

    #[test]
    fn accepts_and_rejects_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn default_name_is_local_part() {
        assert_eq!(default_name_for("writer@example.com"), "writer");
    }

    #[test]
    fn title_length_bounds() {
        let mut errors = FieldErrors::new();
        check_length(&mut errors, "title", "A", TITLE_MAX_CHARS);
        check_length(&mut errors, "title", &"a".repeat(200), TITLE_MAX_CHARS);
        assert!(errors.is_empty());

        check_length(&mut errors, "title", "", TITLE_MAX_CHARS);
        check_length(&mut errors, "title", &"a".repeat(201), TITLE_MAX_CHARS);
        assert_eq!(
            errors.get("title").unwrap(),
            ["can't be blank", "is too long (maximum is 200 characters)"]
        );
    }

    #[test]
    fn full_messages_are_humanized() {
        let mut errors = FieldErrors::new();
        errors.add("order", "has already been taken");
        errors.add("cover_image_url", "is invalid");
        assert_eq!(
            errors.full_messages(),
            vec!["Cover image url is invalid", "Order has already been taken"]
        );
    }
}
