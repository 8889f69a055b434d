//! In-memory blog post storage.
//!
//! # Design Decisions
//! - Slugs are unique across all posts, published or not
//! - Public reads (`published`, `by_slug`, `tags`) only see published posts
//! - Newest first: ordered by publish date, then by id

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

/// A stored blog post.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub featured_image: String,
    pub published: bool,
    pub published_date: DateTime<Utc>,
    pub updated_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

/// Fields for a new post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub content: String,
    pub featured_image: String,
    pub tags: Vec<String>,
    pub published: bool,
}

/// Fields to change on an existing post. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub featured_image: Option<String>,
    pub tags: Option<Vec<String>>,
    pub published: Option<bool>,
}

#[derive(Debug, Error)]
pub enum PostStoreError {
    #[error("Duplicate entry '{0}' for key 'slug'")]
    DuplicateSlug(String),
}

/// One page of published posts.
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<Post>,
    /// Published posts across all pages.
    pub total: usize,
}

/// Thread-safe post table.
#[derive(Debug)]
pub struct PostStore {
    posts: DashMap<u64, Post>,
    slugs: DashMap<String, u64>,
    next_id: AtomicU64,
}

impl Default for PostStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PostStore {
    pub fn new() -> Self {
        Self {
            posts: DashMap::new(),
            slugs: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Published posts, newest first. `page` is 1-based.
    pub fn published(&self, page: usize, limit: usize) -> PostPage {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|r| r.published)
            .map(|r| r.value().clone())
            .collect();
        posts.sort_by(|a, b| {
            b.published_date
                .cmp(&a.published_date)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = posts.len();
        let offset = page.saturating_sub(1).saturating_mul(limit);
        let posts = posts.into_iter().skip(offset).take(limit).collect();
        PostPage { posts, total }
    }

    /// A published post by slug.
    pub fn by_slug(&self, slug: &str) -> Option<Post> {
        let id = *self.slugs.get(slug)?;
        self.posts
            .get(&id)
            .filter(|post| post.published)
            .map(|post| post.value().clone())
    }

    /// Distinct tags of published posts, sorted.
    pub fn tags(&self) -> Vec<String> {
        let tags: BTreeSet<String> = self
            .posts
            .iter()
            .filter(|r| r.published)
            .flat_map(|r| r.tags.clone())
            .collect();
        tags.into_iter().collect()
    }

    pub fn get(&self, id: u64) -> Option<Post> {
        self.posts.get(&id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: u64) -> bool {
        self.posts.contains_key(&id)
    }

    pub fn create(&self, new: NewPost) -> Result<Post, PostStoreError> {
        let id = match self.slugs.entry(new.slug.clone()) {
            Entry::Occupied(_) => return Err(PostStoreError::DuplicateSlug(new.slug)),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                slot.insert(id);
                id
            }
        };

        let post = Post {
            id,
            title: new.title,
            slug: new.slug,
            excerpt: new.excerpt,
            content: new.content,
            featured_image: new.featured_image,
            published: new.published,
            published_date: Utc::now(),
            updated_date: None,
            tags: new.tags,
        };
        self.posts.insert(id, post.clone());
        tracing::debug!(post_id = id, slug = %post.slug, "Post created");
        Ok(post)
    }

    /// Apply `changes` to post `id` and stamp its update date.
    /// Returns `Ok(None)` when the post does not exist.
    pub fn update(&self, id: u64, changes: PostUpdate) -> Result<Option<Post>, PostStoreError> {
        let Some(mut post) = self.posts.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(slug) = changes.slug {
            if slug != post.slug {
                match self.slugs.entry(slug.clone()) {
                    Entry::Occupied(_) => return Err(PostStoreError::DuplicateSlug(slug)),
                    Entry::Vacant(slot) => {
                        slot.insert(id);
                    }
                }
                self.slugs.remove(&post.slug);
                post.slug = slug;
            }
        }
        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(excerpt) = changes.excerpt {
            post.excerpt = excerpt;
        }
        if let Some(content) = changes.content {
            post.content = content;
        }
        if let Some(featured_image) = changes.featured_image {
            post.featured_image = featured_image;
        }
        if let Some(tags) = changes.tags {
            post.tags = tags;
        }
        if let Some(published) = changes.published {
            post.published = published;
        }
        post.updated_date = Some(Utc::now());

        Ok(Some(post.clone()))
    }

    /// Remove post `id`, returning it if it existed.
    pub fn delete(&self, id: u64) -> Option<Post> {
        let (_, post) = self.posts.remove(&id)?;
        self.slugs.remove(&post.slug);
        Some(post)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_post(title: &str, slug: &str, tags: &[&str], published: bool) -> NewPost {
        NewPost {
            title: title.to_string(),
            slug: slug.to_string(),
            excerpt: String::new(),
            content: format!("{title} body"),
            featured_image: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            published,
        }
    }

    #[test]
    fn test_published_pages_newest_first() {
        let store = PostStore::new();
        for n in 1..=5 {
            store.create(new_post(&format!("Post {n}"), &format!("post-{n}"), &[], true)).unwrap();
        }
        store.create(new_post("Draft", "draft", &[], false)).unwrap();

        let first = store.published(1, 2);
        assert_eq!(first.total, 5);
        let ids: Vec<_> = first.posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![5, 4]);

        let last = store.published(3, 2);
        let ids: Vec<_> = last.posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1]);

        assert!(store.published(9, 2).posts.is_empty());
    }

    #[test]
    fn test_drafts_hidden_from_public_reads() {
        let store = PostStore::new();
        store.create(new_post("Live", "live", &["rust"], true)).unwrap();
        store.create(new_post("Draft", "draft", &["secret"], false)).unwrap();

        assert!(store.by_slug("live").is_some());
        assert!(store.by_slug("draft").is_none());
        assert!(store.by_slug("missing").is_none());
        assert_eq!(store.tags(), vec!["rust"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_tags_are_distinct_and_sorted() {
        let store = PostStore::new();
        store.create(new_post("A", "a", &["web", "rust"], true)).unwrap();
        store.create(new_post("B", "b", &["rust", "axum"], true)).unwrap();

        assert_eq!(store.tags(), vec!["axum", "rust", "web"]);
    }

    #[test]
    fn test_duplicate_slug_rejected() {
        let store = PostStore::new();
        store.create(new_post("A", "same", &[], true)).unwrap();
        let err = store.create(new_post("B", "same", &[], true)).unwrap_err();

        assert!(err.to_string().contains("Duplicate entry"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_moves_slug_and_stamps_date() {
        let store = PostStore::new();
        let post = store.create(new_post("A", "old", &[], true)).unwrap();
        assert!(post.updated_date.is_none());

        let updated = store
            .update(
                post.id,
                PostUpdate {
                    slug: Some("new".into()),
                    published: Some(false),
                    ..PostUpdate::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.slug, "new");
        assert!(!updated.published);
        assert!(updated.updated_date.is_some());

        // The old slug is free again.
        store.create(new_post("B", "old", &[], true)).unwrap();
    }

    #[test]
    fn test_update_to_taken_slug() {
        let store = PostStore::new();
        let a = store.create(new_post("A", "a", &[], true)).unwrap();
        store.create(new_post("B", "b", &[], true)).unwrap();

        let err = store
            .update(a.id, PostUpdate { slug: Some("b".into()), ..PostUpdate::default() })
            .unwrap_err();
        assert!(matches!(err, PostStoreError::DuplicateSlug(_)));
        assert_eq!(store.get(a.id).unwrap().slug, "a");
    }

    #[test]
    fn test_update_and_delete_missing() {
        let store = PostStore::new();
        assert!(store.update(7, PostUpdate::default()).unwrap().is_none());
        assert!(store.delete(7).is_none());

        let post = store.create(new_post("A", "a", &[], true)).unwrap();
        assert!(store.delete(post.id).is_some());
        assert!(!store.contains(post.id));
        assert!(store.is_empty());
    }
}
