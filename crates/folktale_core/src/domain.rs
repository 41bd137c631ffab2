//! crates/folktale_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use uuid::Uuid;

pub type StoryId = i64;

/// A single folktale as stored by the story store.
#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    pub text: String,
    pub region: Option<String>,
    pub category: Option<String>,
    pub slug: Option<String>,
    /// Absent means the presentation layer substitutes a fallback chosen by `id`.
    pub cover_image: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
    /// Tag names, sorted.
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// The fields of a story submission. The store assigns `id`, `slug` and `created_at`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewStory {
    pub title: String,
    pub text: String,
    pub region: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub cover_image: Option<String>,
    pub language: Option<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub tags: Vec<String>,
}

impl NewStory {
    /// Trims every field, drops empty optionals and duplicate tags, and
    /// rejects a blank title or text.
    pub fn normalized(self) -> Result<Self, String> {
        let title = self.title.trim().to_string();
        let text = self.text.trim().to_string();
        if title.is_empty() {
            return Err("title must not be empty".to_string());
        }
        if text.is_empty() {
            return Err("text must not be empty".to_string());
        }
        Ok(Self {
            title,
            text,
            region: non_blank(self.region),
            category: non_blank(self.category),
            author: non_blank(self.author),
            cover_image: non_blank(self.cover_image),
            language: non_blank(self.language),
            source: non_blank(self.source),
            source_url: non_blank(self.source_url),
            tags: normalize_tags(self.tags),
        })
    }
}

/// Trimmed, non-blank tags, sorted, without case-insensitive duplicates.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || normalized.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            continue;
        }
        normalized.push(tag.to_string());
    }
    normalized.sort_by_key(|t| t.to_lowercase());
    normalized
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Builds a URL-friendly slug from a title: lowercase ascii alphanumerics
/// separated by single hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("story");
    }
    slug
}

//=========================================================================================
// Filtering and Ordering
//=========================================================================================

/// The active feed filters. Every present field must match (logical AND).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryFilter {
    pub region: Option<String>,
    pub category: Option<String>,
    /// Matches when contained in the title OR the text.
    pub search: Option<String>,
    /// Matches a story carrying this tag, ignoring case.
    pub tag: Option<String>,
}

impl StoryFilter {
    pub fn is_empty(&self) -> bool {
        self.region.is_none()
            && self.category.is_none()
            && self.search.is_none()
            && self.tag.is_none()
    }

    /// Merges a partial update. Blank values clear the field.
    pub fn apply(&mut self, update: FilterUpdate) {
        if let Some(region) = update.region {
            self.region = non_blank(region);
        }
        if let Some(category) = update.category {
            self.category = non_blank(category);
        }
        if let Some(search) = update.search {
            self.search = non_blank(search);
        }
        if let Some(tag) = update.tag {
            self.tag = non_blank(tag);
        }
    }

    /// Case-insensitive substring matching of every active predicate.
    pub fn matches(&self, story: &Story) -> bool {
        let field_matches = |needle: &Option<String>, haystack: &Option<String>| match needle {
            None => true,
            Some(needle) => haystack
                .as_deref()
                .map(|h| contains_ignore_case(h, needle))
                .unwrap_or(false),
        };

        if !field_matches(&self.region, &story.region) {
            return false;
        }
        if !field_matches(&self.category, &story.category) {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !story.tags.iter().any(|t| t.to_lowercase() == tag.to_lowercase()) {
                return false;
            }
        }
        match &self.search {
            None => true,
            Some(search) => {
                contains_ignore_case(&story.title, search) || contains_ignore_case(&story.text, search)
            }
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// A partial filter change. `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterUpdate {
    pub region: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub search: Option<Option<String>>,
    pub tag: Option<Option<String>>,
}

impl FilterUpdate {
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(Some(region.into()));
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(Some(category.into()));
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(Some(search.into()));
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(Some(tag.into()));
        self
    }

    /// An update that clears every field.
    pub fn clear_all() -> Self {
        Self {
            region: Some(None),
            category: Some(None),
            search: Some(None),
            tag: Some(None),
        }
    }
}

/// Result ordering for story queries. `Newest` is the feed default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoryOrder {
    #[default]
    Newest,
    Oldest,
    Title,
}

impl StoryOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "newest" | "" => Some(Self::Newest),
            "oldest" => Some(Self::Oldest),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    /// Total order used by in-memory stores. Ties on the sort key fall back to
    /// `id` so pages never overlap.
    pub fn compare(&self, a: &Story, b: &Story) -> Ordering {
        match self {
            Self::Newest => b
                .created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id)),
            Self::Oldest => a
                .created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id)),
            Self::Title => a
                .title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.id.cmp(&b.id)),
        }
    }
}

//=========================================================================================
// Accounts
//=========================================================================================

/// Represents a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
