//! crates/muneccim_core/src/credentials.rs
//!
//! Sign-up form validation. Every failing rule is reported, grouped by field.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::i18n::Translations;

pub const MIN_PASSWORD_LEN: usize = 8;
const SPECIAL_CHARACTERS: &str = "!@#$%^&*";

#[derive(Debug, Clone, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignupErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub password: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_password: Option<&'static str>,
}

impl SignupErrors {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_empty() && self.confirm_password.is_none()
    }
}

fn looks_like_email(email: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\S+@\S+\.\S+").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(email))
}

/// Each unmet password rule, in the order they are shown.
pub fn password_problems(t: &Translations, password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push(t.password_too_short);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push(t.password_needs_uppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push(t.password_needs_lowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push(t.password_needs_digit);
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        problems.push(t.password_needs_special);
    }
    problems
}

pub fn validate_signup(t: &Translations, form: &SignupForm) -> Result<(), SignupErrors> {
    let email = form.email.trim();
    let errors = SignupErrors {
        email: if email.is_empty() {
            Some(t.email_required)
        } else if !looks_like_email(email) {
            Some(t.email_invalid)
        } else {
            None
        },
        password: password_problems(t, &form.password),
        confirm_password: (form.password != form.confirm_password).then_some(t.passwords_mismatch),
    };

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{translations, Language};

    fn form(email: &str, password: &str, confirm: &str) -> SignupForm {
        SignupForm {
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn strong_password_and_valid_email_pass() {
        let t = translations(Language::En);
        assert_eq!(validate_signup(t, &form("ada@example.com", "Str0ng!pw", "Str0ng!pw")), Ok(()));
    }

    #[test]
    fn every_failing_rule_is_reported() {
        let t = translations(Language::En);
        let errors = validate_signup(t, &form("", "abc", "abd")).unwrap_err();
        assert_eq!(errors.email, Some(t.email_required));
        assert_eq!(
            errors.password,
            vec![
                t.password_too_short,
                t.password_needs_uppercase,
                t.password_needs_digit,
                t.password_needs_special,
            ]
        );
        assert_eq!(errors.confirm_password, Some(t.passwords_mismatch));
    }

    #[test]
    fn malformed_email_is_rejected_in_the_chosen_language() {
        let t = translations(Language::Tr);
        let errors = validate_signup(t, &form("ada@example", "Str0ng!pw", "Str0ng!pw")).unwrap_err();
        assert_eq!(errors.email, Some(t.email_invalid));
        assert!(errors.password.is_empty());
        assert_eq!(errors.confirm_password, None);
    }
}
