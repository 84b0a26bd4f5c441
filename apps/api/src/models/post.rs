use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{text_enum, UserRef};

text_enum! {
    pub enum PostStatus {
        Draft => "draft",
        Published => "published",
        Archived => "archived",
    }
}

text_enum! {
    pub enum PostCategory {
        News => "news",
        Blog => "blog",
        Announcement => "announcement",
        Tutorial => "tutorial",
        CaseStudy => "case-study",
    }
}

impl Default for PostStatus {
    fn default() -> Self {
        PostStatus::Draft
    }
}

impl Default for PostCategory {
    fn default() -> Self {
        PostCategory::Blog
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    #[sqlx(try_from = "String")]
    pub category: PostCategory,
    pub tags: Vec<String>,
    pub featured_image: Option<String>,
    pub author: Option<Json<UserRef>>,
    #[sqlx(try_from = "String")]
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub views: i32,
    pub likes: i32,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `publishedAt` after a write that leaves the post in `status`.
///
/// Stamped the first time a post is published and never moved afterwards, including
/// when it is archived and published again.
pub fn resolve_published_at(
    current: Option<DateTime<Utc>>,
    status: PostStatus,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match current {
        Some(at) => Some(at),
        None if status == PostStatus::Published => Some(now),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_draft_has_no_published_at() {
        assert_eq!(resolve_published_at(None, PostStatus::Draft, Utc::now()), None);
    }

    #[test]
    fn test_first_publish_stamps_now() {
        let now = Utc::now();
        assert_eq!(
            resolve_published_at(None, PostStatus::Published, now),
            Some(now)
        );
    }

    #[test]
    fn test_later_edits_keep_original_stamp() {
        let first = Utc::now() - Duration::days(10);
        let now = Utc::now();
        for status in PostStatus::ALL {
            assert_eq!(resolve_published_at(Some(first), *status, now), Some(first));
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(PostStatus::default(), PostStatus::Draft);
        assert_eq!(PostCategory::default().as_str(), "blog");
        assert_eq!(
            "case-study".parse::<PostCategory>().unwrap(),
            PostCategory::CaseStudy
        );
    }
}
