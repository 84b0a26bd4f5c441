//! Pagination, list filters and search helpers shared by the list endpoints.

use std::str::FromStr;

use serde::Serialize;

use crate::errors::AppError;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
/// Highest page whose offset still fits in an `i64` at any limit.
pub const MAX_PAGE: i64 = i64::MAX / MAX_LIMIT;

/// `?page=&limit=` after defaulting and clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

impl PageParams {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub current: i64,
    pub pages: i64,
    pub total: i64,
}

impl Pagination {
    pub fn new(params: PageParams, total: i64) -> Self {
        Self {
            current: params.page,
            pages: (total + params.limit - 1) / params.limit,
            total,
        }
    }
}

/// Treats `""` and `"all"` as "no filter", the way the dashboard sends them.
pub fn filter_value(raw: &Option<String>) -> Option<&str> {
    raw.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

/// Parses an optional enum filter, rejecting values outside the enumerated set.
pub fn parse_filter<T>(raw: &Option<String>, field: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
{
    filter_value(raw)
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| AppError::Validation(format!("Invalid {field} filter '{v}'")))
        })
        .transpose()
}

/// Parses `?remote=true|false`; anything empty means no filter.
pub fn parse_bool_filter(raw: &Option<String>, field: &str) -> Result<Option<bool>, AppError> {
    match filter_value(raw) {
        None => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(other) => Err(AppError::Validation(format!(
            "Invalid {field} filter '{other}'"
        ))),
    }
}

/// Builds an `ILIKE` pattern for a case-insensitive substring match, escaping wildcards
/// so user input is matched literally.
pub fn search_pattern(raw: &Option<String>) -> Option<String> {
    let term = raw.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}
