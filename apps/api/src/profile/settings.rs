//! Partial updates of the profile and preferences documents.
//!
//! Changes arrive as loose JSON and are merged over the stored documents, then read
//! back into the typed shapes so unknown values are rejected before anything is saved.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::user::{Preferences, Profile};
use crate::validation::Problems;

/// Profile keys whose objects are merged key-wise instead of replaced.
const NESTED_PROFILE_KEYS: &[&str] = &["socialLinks"];

/// Writes `key` into `target`. A `null` drops the key so the field falls back to its default.
fn put(target: &mut Map<String, Value>, key: &str, value: Value) {
    if value.is_null() {
        target.remove(key);
    } else {
        target.insert(key.to_string(), value);
    }
}

fn merge_shallow(target: &mut Map<String, Value>, changes: &Map<String, Value>) {
    for (key, value) in changes {
        put(target, key, value.clone());
    }
}

/// Merges `changes` into `target`; keys accepted by `nested` merge their objects one level down.
fn merge_with(target: &mut Map<String, Value>, changes: &Map<String, Value>, nested: impl Fn(&str) -> bool) {
    for (key, value) in changes {
        match (value, target.get_mut(key)) {
            (Value::Object(inner), Some(Value::Object(existing))) if nested(key) => {
                merge_shallow(existing, inner);
            }
            _ => put(target, key, value.clone()),
        }
    }
}

fn to_object<T: Serialize>(doc: &T) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(doc).map_err(|e| AppError::Internal(e.into()))? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn from_object<T: DeserializeOwned>(map: Map<String, Value>, what: &str) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(map))
        .map_err(|e| AppError::Validation(format!("Invalid {what}: {e}")))
}

fn expect_object<'a>(changes: &'a Value, what: &str) -> Result<&'a Map<String, Value>, AppError> {
    changes
        .as_object()
        .ok_or_else(|| AppError::Validation(format!("{what} must be an object")))
}

pub fn merge_profile(current: &Profile, changes: &Value) -> Result<Profile, AppError> {
    let changes = expect_object(changes, "profile")?;
    let mut doc = to_object(current)?;
    merge_with(&mut doc, changes, |key| NESTED_PROFILE_KEYS.contains(&key));
    let profile: Profile = from_object(doc, "profile")?;

    let mut problems = Problems::new();
    problems.check(&profile);
    problems.into_result()?;
    Ok(profile)
}

/// Every preference section is merged key-wise.
pub fn merge_preferences(current: &Preferences, changes: &Value) -> Result<Preferences, AppError> {
    let changes = expect_object(changes, "preferences")?;
    let mut doc = to_object(current)?;
    merge_with(&mut doc, changes, |_| true);
    from_object(doc, "preferences")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::user::{ProfileVisibility, Theme};

    #[test]
    fn test_profile_merge_keeps_untouched_fields() {
        let mut current = Profile::default();
        current.first_name = "Ada".into();
        current.social_links.github = "https://github.com/ada".into();

        let merged = merge_profile(
            &current,
            &json!({ "bio": "Engineer", "socialLinks": { "twitter": "@ada" } }),
        )
        .unwrap();

        assert_eq!(merged.first_name, "Ada");
        assert_eq!(merged.bio, "Engineer");
        assert_eq!(merged.social_links.github, "https://github.com/ada");
        assert_eq!(merged.social_links.twitter, "@ada");
    }

    #[test]
    fn test_profile_null_resets_field() {
        let mut current = Profile::default();
        current.location = "Lisbon".into();
        current.profile_image = Some("/uploads/profiles/a.png".into());

        let merged = merge_profile(&current, &json!({ "location": null, "profileImage": null })).unwrap();
        assert_eq!(merged.location, "");
        assert_eq!(merged.profile_image, None);
    }

    #[test]
    fn test_profile_bio_limit() {
        let err = merge_profile(&Profile::default(), &json!({ "bio": "b".repeat(501) })).unwrap_err();
        let AppError::Validation(msg) = err else {
            panic!("expected validation error");
        };
        assert_eq!(msg, "Bio cannot exceed 500 characters");
    }

    #[test]
    fn test_profile_rejects_non_object() {
        assert!(merge_profile(&Profile::default(), &json!("nope")).is_err());
    }

    #[test]
    fn test_preferences_merge_section_wise() {
        let merged = merge_preferences(
            &Preferences::default(),
            &json!({
                "privacy": { "profileVisibility": "friends" },
                "appearance": { "theme": "dark" }
            }),
        )
        .unwrap();

        assert_eq!(merged.privacy.profile_visibility, ProfileVisibility::Friends);
        assert!(merged.privacy.allow_messaging);
        assert_eq!(merged.appearance.theme, Theme::Dark);
        assert_eq!(merged.appearance.language, "en");
        assert!(merged.email_notifications.new_posts);
    }

    #[test]
    fn test_preferences_reject_unknown_enum_value() {
        let err = merge_preferences(&Preferences::default(), &json!({ "appearance": { "theme": "neon" } }));
        assert!(matches!(err, Err(AppError::Validation(_))));
    }
}
