//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the storage ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folktale_core::domain::{
    slugify, AuthSession, NewStory, Story, StoryFilter, StoryId, StoryOrder, User,
    UserCredentials,
};
use folktale_core::ports::{AccountStore, FavoritesStore, PortError, PortResult, StoryStore};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;
use uuid::Uuid;

/// Story columns of the `stories s` alias, with the tag names aggregated.
const STORY_COLUMNS: &str = "s.id, s.title, s.text, s.region, s.category, s.slug, \
     s.cover_image, s.author, s.language, s.source, s.source_url, s.created_at, \
     ARRAY(SELECT t.name FROM story_tag st JOIN tags t ON t.id = st.tag_id \
           WHERE st.story_id = s.id ORDER BY lower(t.name)) AS tags";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the story, favorites and account ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Escapes LIKE wildcards and wraps the value for substring matching.
pub fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn order_clause(order: StoryOrder) -> &'static str {
    match order {
        StoryOrder::Newest => " ORDER BY s.created_at DESC, s.id DESC",
        StoryOrder::Oldest => " ORDER BY s.created_at ASC, s.id ASC",
        StoryOrder::Title => " ORDER BY lower(s.title) ASC, s.id ASC",
    }
}

fn unavailable(e: sqlx::Error) -> PortError {
    PortError::Unavailable(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct StoryRecord {
    id: i64,
    title: String,
    text: String,
    region: Option<String>,
    category: Option<String>,
    slug: Option<String>,
    cover_image: Option<String>,
    author: Option<String>,
    language: Option<String>,
    source: Option<String>,
    source_url: Option<String>,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
}
impl StoryRecord {
    fn to_domain(self) -> Story {
        Story {
            id: self.id,
            title: self.title,
            text: self.text,
            region: self.region,
            category: self.category,
            slug: self.slug,
            cover_image: self.cover_image,
            author: self.author,
            language: self.language,
            source: self.source,
            source_url: self.source_url,
            tags: self.tags,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

//=========================================================================================
// `StoryStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl StoryStore for DbAdapter {
    async fn query(
        &self,
        filter: &StoryFilter,
        order: StoryOrder,
        offset: usize,
        limit: usize,
    ) -> PortResult<Vec<Story>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM stories s WHERE TRUE", STORY_COLUMNS));

        if let Some(region) = &filter.region {
            builder.push(" AND s.region ILIKE ").push_bind(like_pattern(region));
        }
        if let Some(category) = &filter.category {
            builder.push(" AND s.category ILIKE ").push_bind(like_pattern(category));
        }
        if let Some(search) = &filter.search {
            let pattern = like_pattern(search);
            builder
                .push(" AND (s.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR s.text ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(tag) = &filter.tag {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM story_tag st JOIN tags t ON t.id = st.tag_id \
                     WHERE st.story_id = s.id AND lower(t.name) = lower(",
                )
                .push_bind(tag.clone())
                .push("))");
        }
        builder.push(order_clause(order));
        builder.push(" LIMIT ").push_bind(limit as i64);
        builder.push(" OFFSET ").push_bind(offset as i64);

        let records = builder
            .build_query_as::<StoryRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_by_id(&self, id: StoryId) -> PortResult<Story> {
        let record = sqlx::query_as::<_, StoryRecord>(&format!(
            "SELECT {} FROM stories s WHERE s.id = $1",
            STORY_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Story {} not found", id)),
            _ => unavailable(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_by_slug(&self, slug: &str) -> PortResult<Story> {
        let record = sqlx::query_as::<_, StoryRecord>(&format!(
            "SELECT {} FROM stories s WHERE s.slug = $1",
            STORY_COLUMNS
        ))
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Story '{}' not found", slug)),
            _ => unavailable(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_many(&self, ids: &[StoryId]) -> PortResult<Vec<Story>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = sqlx::query_as::<_, StoryRecord>(&format!(
            "SELECT {} FROM stories s WHERE s.id = ANY($1) ORDER BY s.created_at DESC, s.id DESC",
            STORY_COLUMNS
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert(&self, story: NewStory) -> PortResult<Story> {
        let story = story.normalized().map_err(PortError::Invalid)?;
        let suffix = Uuid::new_v4().simple().to_string();
        let slug = format!("{}-{}", slugify(&story.title), &suffix[..8]);

        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO stories (title, text, region, category, slug, cover_image, author, \
             language, source, source_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
        )
        .bind(&story.title)
        .bind(&story.text)
        .bind(&story.region)
        .bind(&story.category)
        .bind(&slug)
        .bind(&story.cover_image)
        .bind(&story.author)
        .bind(&story.language)
        .bind(&story.source)
        .bind(&story.source_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(unavailable)?;

        for tag in &story.tags {
            let tag_id = sqlx::query_scalar::<_, i64>(
                "INSERT INTO tags (name) VALUES ($1) \
                 ON CONFLICT ((lower(name))) DO UPDATE SET name = tags.name RETURNING id",
            )
            .bind(tag)
            .fetch_one(&mut *tx)
            .await
            .map_err(unavailable)?;
            sqlx::query(
                "INSERT INTO story_tag (story_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        }

        let record = sqlx::query_as::<_, StoryRecord>(&format!(
            "SELECT {} FROM stories s WHERE s.id = $1",
            STORY_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unavailable)?;
        tx.commit().await.map_err(unavailable)?;
        Ok(record.to_domain())
    }

    async fn random(&self) -> PortResult<Option<Story>> {
        let record = sqlx::query_as::<_, StoryRecord>(&format!(
            "SELECT {} FROM get_random_story() s",
            STORY_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn list_regions(&self) -> PortResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT region FROM stories \
             WHERE region IS NOT NULL AND btrim(region) <> '' ORDER BY region",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)
    }
}

//=========================================================================================
// `FavoritesStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl FavoritesStore for DbAdapter {
    async fn list_by_user(&self, user_id: Uuid) -> PortResult<HashSet<StoryId>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT story_id FROM favorites WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(ids.into_iter().collect())
    }

    async fn add(&self, user_id: Uuid, story_id: StoryId) -> PortResult<()> {
        sqlx::query("INSERT INTO favorites (user_id, story_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(story_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    PortError::Conflict(format!("Story {} is already a favorite", story_id))
                }
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    PortError::NotFound(format!("Story {} not found", story_id))
                }
                _ => unavailable(e),
            })?;
        Ok(())
    }

    async fn remove(&self, user_id: Uuid, story_id: StoryId) -> PortResult<()> {
        sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND story_id = $2")
            .bind(user_id)
            .bind(story_id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

//=========================================================================================
// `AccountStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountStore for DbAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let email = email.trim().to_lowercase();
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, hashed_password) VALUES ($1, $2) RETURNING user_id, email",
        )
        .bind(&email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Conflict(format!("Email {} is already registered", email))
            }
            _ => unavailable(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let email = email.trim().to_lowercase();
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(&email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unavailable(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(&self, session: &AuthSession) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT u.user_id, u.email FROM auth_sessions s \
             JOIN users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        record
            .map(|r| r.to_domain())
            .ok_or(PortError::Unauthenticated)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Africa"), "%Africa%");
        assert_eq!(like_pattern("100%_sure"), "%100\\%\\_sure%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn newest_order_breaks_ties_by_id() {
        assert_eq!(
            order_clause(StoryOrder::Newest),
            " ORDER BY s.created_at DESC, s.id DESC"
        );
    }
}
