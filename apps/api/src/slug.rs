//! URL slugs for jobs and posts.
//!
//! A slug is derived once, at creation: the slugified title followed by the creation
//! time in epoch milliseconds. Title edits never touch it.

use chrono::{DateTime, Utc};

/// Lowercases, drops everything but ASCII word characters, whitespace and dashes,
/// turns whitespace runs into a single dash and collapses repeated dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    slug
}

/// Slug stored at creation time. The millisecond suffix keeps two equal titles apart.
pub fn creation_slug(title: &str, created_at: DateTime<Utc>) -> String {
    let base = slugify(title);
    let stamp = created_at.timestamp_millis();
    if base.is_empty() {
        stamp.to_string()
    } else {
        format!("{base}-{stamp}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_basic_title() {
        assert_eq!(slugify("Senior Rust Engineer"), "senior-rust-engineer");
    }

    #[test]
    fn test_punctuation_is_dropped() {
        assert_eq!(slugify("What's new in Q3?"), "whats-new-in-q3");
        assert_eq!(slugify("UI/UX Designer"), "uiux-designer");
    }

    #[test]
    fn test_dash_runs_collapse() {
        assert_eq!(slugify("Front -- end   role"), "front-end-role");
        assert_eq!(slugify("  - leading and trailing -  "), "leading-and-trailing");
    }

    #[test]
    fn test_non_ascii_letters_are_dropped() {
        assert_eq!(slugify("Café Menü"), "caf-men");
    }

    #[test]
    fn test_creation_slug_has_timestamp_suffix() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            creation_slug("Hello World", at),
            "hello-world-1700000000123"
        );
    }

    #[test]
    fn test_creation_slug_for_symbol_only_title() {
        let at = Utc.timestamp_millis_opt(42).unwrap();
        assert_eq!(creation_slug("!!!", at), "42");
    }
}
