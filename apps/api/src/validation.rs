//! Turns `validator` results and hand-written checks into the joined message list
//! returned with `VALIDATION_ERROR`.

use std::sync::LazyLock;

use regex::Regex;
use validator::{Validate, ValidationErrors};

use crate::errors::AppError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").expect("valid email regex")
});

/// Flattens field errors into their messages, sorted so responses are stable.
pub fn messages(errors: &ValidationErrors) -> Vec<String> {
    let mut out: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid"))
            })
        })
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Accumulates problems from derive rules and manual checks, then fails once with all of them.
#[derive(Debug, Default)]
pub struct Problems(Vec<String>);

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check<T: Validate>(&mut self, value: &T) {
        if let Err(errors) = value.validate() {
            self.0.extend(messages(&errors));
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn require<T>(&mut self, value: &Option<T>, message: &str) {
        if value.is_none() {
            self.push(message);
        }
    }

    pub fn require_text(&mut self, value: &Option<String>, message: &str) {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            self.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(self.0))
        }
    }
}

/// Same address rule the account and application forms have always used.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}
