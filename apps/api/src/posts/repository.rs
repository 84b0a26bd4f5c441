use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::post::{Post, PostCategory, PostStatus};
use crate::posts::input::PostFields;
use crate::query::PageParams;

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.excerpt, p.category, p.tags, p.featured_image, \
     CASE WHEN u.id IS NULL THEN NULL \
          ELSE json_build_object('id', u.id, 'username', u.username, 'email', u.email) END AS author, \
     p.status, p.published_at, p.views, p.likes, p.slug, p.created_at, p.updated_at";

fn select_from(source: &str) -> String {
    format!("SELECT {POST_COLUMNS} FROM {source} p LEFT JOIN users u ON u.id = p.author_id")
}

#[derive(Debug, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub category: Option<PostCategory>,
    /// Escaped `ILIKE` pattern matched against title, content and tags.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOrder {
    /// Public blog: most recently published first.
    Published,
    /// Dashboard: most recently created first.
    Created,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStats {
    pub total: i64,
    pub published: i64,
    pub draft: i64,
    pub archived: i64,
    pub total_views: i64,
    pub categories: BTreeMap<String, i64>,
}

#[derive(sqlx::FromRow)]
struct PostTotals {
    total: i64,
    published: i64,
    draft: i64,
    archived: i64,
    total_views: i64,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
    qb.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        qb.push(" AND p.status = ").push_bind(status.as_str());
    }
    if let Some(category) = filter.category {
        qb.push(" AND p.category = ").push_bind(category.as_str());
    }
    if let Some(pattern) = &filter.search {
        qb.push(" AND (p.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.content ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM unnest(p.tags) AS t(tag) WHERE t.tag ILIKE ")
            .push_bind(pattern.clone())
            .push("))");
    }
}

pub async fn list(
    pool: &PgPool,
    filter: &PostFilter,
    order: PostOrder,
    page: PageParams,
) -> Result<(Vec<Post>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM posts p");
    push_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::new(select_from("posts"));
    push_filters(&mut select, filter);
    select.push(match order {
        PostOrder::Published => " ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC",
        PostOrder::Created => " ORDER BY p.created_at DESC",
    });
    select
        .push(" LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let posts = select.build_query_as::<Post>().fetch_all(pool).await?;

    Ok((posts, total))
}

pub async fn stats(pool: &PgPool) -> Result<PostStats, sqlx::Error> {
    let totals: PostTotals = sqlx::query_as(
        "SELECT COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE status = 'published') AS published, \
                COUNT(*) FILTER (WHERE status = 'draft') AS draft, \
                COUNT(*) FILTER (WHERE status = 'archived') AS archived, \
                COALESCE(SUM(views), 0)::bigint AS total_views \
         FROM posts",
    )
    .fetch_one(pool)
    .await?;

    let categories: Vec<(String, i64)> =
        sqlx::query_as("SELECT category, COUNT(*) FROM posts GROUP BY category")
            .fetch_all(pool)
            .await?;

    Ok(PostStats {
        total: totals.total,
        published: totals.published,
        draft: totals.draft,
        archived: totals.archived,
        total_views: totals.total_views,
        categories: categories.into_iter().collect(),
    })
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as(&format!("{} WHERE p.id = $1", select_from("posts")))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Returns a published post and counts the view in the same statement.
pub async fn view_published_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Post>, sqlx::Error> {
    let sql = format!(
        "WITH viewed AS (UPDATE posts SET views = views + 1 \
                         WHERE slug = $1 AND status = 'published' RETURNING *) {}",
        select_from("viewed")
    );
    sqlx::query_as(&sql).bind(slug).fetch_optional(pool).await
}

pub async fn create(
    pool: &PgPool,
    post: &PostFields,
    slug: &str,
    published_at: Option<DateTime<Utc>>,
    author_id: Uuid,
) -> Result<Post, sqlx::Error> {
    let sql = format!(
        "WITH inserted AS (\
            INSERT INTO posts (title, content, excerpt, category, tags, featured_image, status, \
                published_at, slug, author_id) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *) {}",
        select_from("inserted")
    );
    sqlx::query_as(&sql)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(post.category.as_str())
        .bind(&post.tags)
        .bind(&post.featured_image)
        .bind(post.status.as_str())
        .bind(published_at)
        .bind(slug)
        .bind(author_id)
        .fetch_one(pool)
        .await
}

/// Rewrites the editable columns. Slug and author are left alone.
/// A stored `published_at` is never replaced, so concurrent publishes keep the first stamp.
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    post: &PostFields,
    published_at: Option<DateTime<Utc>>,
) -> Result<Option<Post>, sqlx::Error> {
    let sql = format!(
        "WITH updated AS (\
            UPDATE posts SET title = $2, content = $3, excerpt = $4, category = $5, tags = $6, \
                featured_image = $7, status = $8, published_at = COALESCE(published_at, $9), \
                updated_at = now() \
            WHERE id = $1 RETURNING *) {}",
        select_from("updated")
    );
    sqlx::query_as(&sql)
        .bind(id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(post.category.as_str())
        .bind(&post.tags)
        .bind(&post.featured_image)
        .bind(post.status.as_str())
        .bind(published_at)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::resolve_published_at;
    use crate::models::user::{Profile, Role};
    use crate::users::repository::{self as users, NewUser};

    async fn author(pool: &PgPool) -> Uuid {
        users::create(
            pool,
            NewUser {
                username: "writer",
                email: "writer@example.com",
                password_hash: "x",
                role: Role::Admin,
                profile: Profile::default(),
            },
        )
        .await
        .unwrap()
        .id
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_published_at_survives_later_edits(pool: PgPool) {
        let author_id = author(&pool).await;
        let mut fields = PostFields {
            title: "Launch".into(),
            content: "We launched".into(),
            excerpt: "Launch notes".into(),
            ..PostFields::default()
        };
        let draft = create(&pool, &fields, "launch-1", None, author_id).await.unwrap();
        assert!(draft.published_at.is_none());
        assert_eq!(draft.author.as_ref().map(|a| a.username.as_str()), Some("writer"));
        assert!(view_published_by_slug(&pool, "launch-1").await.unwrap().is_none());

        fields.status = PostStatus::Published;
        let stamp = resolve_published_at(draft.published_at, fields.status, Utc::now());
        let published = update(&pool, draft.id, &fields, stamp).await.unwrap().unwrap();
        let first = published.published_at.unwrap();

        fields.title = "Launch (updated)".into();
        let again = resolve_published_at(published.published_at, fields.status, Utc::now());
        let edited = update(&pool, draft.id, &fields, again).await.unwrap().unwrap();
        assert_eq!(edited.published_at, Some(first));
        assert_eq!(edited.slug, "launch-1");

        let viewed = view_published_by_slug(&pool, "launch-1").await.unwrap().unwrap();
        assert_eq!(viewed.views, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_concurrent_publish_keeps_first_stamp(pool: PgPool) {
        let author_id = author(&pool).await;
        let mut fields = PostFields {
            title: "Race".into(),
            content: "Two editors".into(),
            excerpt: "Two editors publish".into(),
            ..PostFields::default()
        };
        let draft = create(&pool, &fields, "race-1", None, author_id).await.unwrap();

        // Both editors read the draft before either save lands.
        fields.status = PostStatus::Published;
        let first = Utc::now() - chrono::Duration::minutes(5);
        let second = Utc::now();
        let stamp_a = resolve_published_at(draft.published_at, fields.status, first);
        let stamp_b = resolve_published_at(draft.published_at, fields.status, second);
        assert_eq!(stamp_a, Some(first));
        assert_eq!(stamp_b, Some(second));

        update(&pool, draft.id, &fields, stamp_a).await.unwrap().unwrap();
        let last = update(&pool, draft.id, &fields, stamp_b).await.unwrap().unwrap();
        let stored = last.published_at.unwrap();
        assert_eq!(stored.timestamp_micros(), first.timestamp_micros());
    }
}
