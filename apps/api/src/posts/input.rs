use serde::Deserialize;

use crate::errors::AppError;
use crate::models::de::{nullable, opt_one_or_many};
use crate::models::post::{Post, PostCategory, PostStatus};
use crate::validation::Problems;

const MAX_TITLE_CHARS: usize = 200;
const MAX_EXCERPT_CHARS: usize = 300;

/// Create/update payload. Absent keys leave the stored value alone;
/// `featuredImage: null` clears the image.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<PostCategory>,
    #[serde(default, deserialize_with = "opt_one_or_many")]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub featured_image: Option<Option<String>>,
    pub status: Option<PostStatus>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFields {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: PostCategory,
    pub tags: Vec<String>,
    pub featured_image: Option<String>,
    pub status: PostStatus,
}

impl From<&Post> for PostFields {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            content: post.content.clone(),
            excerpt: post.excerpt.clone(),
            category: post.category,
            tags: post.tags.clone(),
            featured_image: post.featured_image.clone(),
            status: post.status,
        }
    }
}

impl PostInput {
    pub fn apply(self, fields: &mut PostFields) {
        if let Some(title) = self.title {
            fields.title = title.trim().to_string();
        }
        if let Some(content) = self.content {
            fields.content = content;
        }
        if let Some(excerpt) = self.excerpt {
            fields.excerpt = excerpt.trim().to_string();
        }
        if let Some(category) = self.category {
            fields.category = category;
        }
        if let Some(tags) = self.tags {
            fields.tags = tags;
        }
        if let Some(image) = self.featured_image {
            fields.featured_image = image.map(|i| i.trim().to_string()).filter(|i| !i.is_empty());
        }
        if let Some(status) = self.status {
            fields.status = status;
        }
    }
}

impl PostFields {
    pub fn validate(self) -> Result<Self, AppError> {
        let mut problems = Problems::new();
        if self.title.is_empty() {
            problems.push("Post title is required");
        } else if self.title.chars().count() > MAX_TITLE_CHARS {
            problems.push("Title cannot exceed 200 characters");
        }
        if self.content.trim().is_empty() {
            problems.push("Post content is required");
        }
        if self.excerpt.is_empty() {
            problems.push("Post excerpt is required");
        } else if self.excerpt.chars().count() > MAX_EXCERPT_CHARS {
            problems.push("Excerpt cannot exceed 300 characters");
        }
        problems.into_result()?;
        Ok(self)
    }
}
