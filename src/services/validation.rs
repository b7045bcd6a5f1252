//! Field validation helpers
//!
//! Each check appends to a [`FieldErrors`] so a service can report every
//! problem of a request in one response.

use super::FieldErrors;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("valid email regex")
});

pub const REQUIRED: &str = "This field may not be blank.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const INVALID_URL: &str = "Enter a valid URL.";

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

pub fn is_valid_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or("");
            !host.is_empty() && !url.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

pub fn require_text(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
    }
}

pub fn check_email(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
    } else if !is_valid_email(value.trim()) {
        errors.add(field, INVALID_EMAIL);
    }
}

/// Empty values are allowed; they clear the field
pub fn check_optional_url(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    if let Some(url) = value.filter(|u| !u.is_empty()) {
        if !is_valid_url(url) {
            errors.add(field, INVALID_URL);
        }
    }
}

/// Record an error on `later_field` when it falls before `earlier`
pub fn check_date_order(
    errors: &mut FieldErrors,
    earlier_field: &str,
    earlier: NaiveDate,
    later_field: &str,
    later: NaiveDate,
) {
    if later < earlier {
        errors.add(
            later_field,
            format!("Must not be earlier than {}.", earlier_field),
        );
    }
}

/// Trim text and turn empty strings into `None`
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("u@ex.edu"));
        assert!(is_valid_email("first.last+tag@uni.example.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@ex.edu"));
        assert!(!is_valid_email("@ex.edu"));
    }

    #[test]
    fn test_url_format() {
        assert!(is_valid_url("https://doi.org/10.1000/182"));
        assert!(is_valid_url("http://uni.example.org"));
        assert!(!is_valid_url("ftp://files.example.org"));
        assert!(!is_valid_url("https://"));
        assert!(!is_valid_url("javascript:alert(1)"));
    }

    #[test]
    fn test_collects_errors() {
        let mut errors = FieldErrors::new();
        require_text(&mut errors, "name", "   ");
        check_email(&mut errors, "contact_email", "nope");
        check_optional_url(&mut errors, "website", Some(""));
        check_optional_url(&mut errors, "url", Some("www.example.org"));

        assert_eq!(errors.messages("name"), [REQUIRED]);
        assert_eq!(errors.messages("contact_email"), [INVALID_EMAIL]);
        assert!(!errors.contains("website"));
        assert_eq!(errors.messages("url"), [INVALID_URL]);
    }

    #[test]
    fn test_date_order() {
        let start = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();

        let mut errors = FieldErrors::new();
        check_date_order(&mut errors, "start_date", start, "end_date", start);
        assert!(errors.is_empty());

        check_date_order(&mut errors, "start_date", start, "end_date", end);
        assert_eq!(errors.messages("end_date"), ["Must not be earlier than start_date."]);
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(Some("  ".to_string())), None);
        assert_eq!(optional_text(Some(" 555-0100 ".to_string())), Some("555-0100".to_string()));
        assert_eq!(optional_text(None), None);
    }
}
