//! Blog posts resource handlers.
//!
//! Listing reads `page` and `limit` from the query string. Like the users
//! handlers, failures become JSON error responses rather than `Err`.

use std::sync::LazyLock;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::post_store::{NewPost, Post, PostStore, PostStoreError, PostUpdate};
use crate::api::{error, provided};
use crate::http::{Request, Response};
use crate::routing::{HandlerResult, Params};

const DEFAULT_PAGE: usize = 1;
const DEFAULT_LIMIT: usize = 10;

static SLUG_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9-]+").expect("slug regex is valid"));

/// Derive a slug from a title: runs of other characters become `-`.
pub fn slugify(title: &str) -> String {
    SLUG_SEPARATORS.replace_all(title, "-").trim().to_lowercase()
}

/// Public representation of a post, with display-ready dates.
#[derive(Debug, Serialize)]
struct PostView<'a> {
    id: u64,
    title: &'a str,
    slug: &'a str,
    excerpt: &'a str,
    content: &'a str,
    featured_image: &'a str,
    published_date: String,
    updated_date: Option<String>,
    tags: &'a [String],
    published_date_formatted: String,
    published_date_display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_date_formatted: Option<String>,
}

impl<'a> From<&'a Post> for PostView<'a> {
    fn from(post: &'a Post) -> Self {
        Self {
            id: post.id,
            title: &post.title,
            slug: &post.slug,
            excerpt: &post.excerpt,
            content: &post.content,
            featured_image: &post.featured_image,
            published_date: stored(&post.published_date),
            updated_date: post.updated_date.as_ref().map(stored),
            tags: &post.tags,
            published_date_formatted: iso(&post.published_date),
            published_date_display: post.published_date.format("%B %-d, %Y").to_string(),
            updated_date_formatted: post.updated_date.as_ref().map(iso),
        }
    }
}

fn stored(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn iso(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn not_found(response: Response) -> Response {
    error(response, StatusCode::NOT_FOUND, "Post not found")
}

fn store_error(response: Response, err: PostStoreError) -> Response {
    tracing::warn!(error = %err, "Duplicate slug detected");
    error(
        response,
        StatusCode::INTERNAL_SERVER_ERROR,
        "A post with this slug already exists",
    )
}

/// A positive integer query parameter, or `default`.
fn positive_query(request: &Request, name: &str, default: usize) -> usize {
    request
        .query_param(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(default)
}

/// A body field that is present and not null, as text.
fn present(request: &Request, field: &str) -> Option<String> {
    match request.body_field(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Tags given as a JSON array, or as a string holding one.
fn tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) => serde_json::from_str(s).unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Truthiness of a `published` flag from JSON or form input.
fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.trunc() != 0.0),
        Value::String(s) => s.trim().parse::<i64>().is_ok_and(|n| n != 0),
        _ => false,
    }
}

fn post_id(params: &Params) -> Option<u64> {
    params.get("id")?.parse().ok()
}

pub fn list_posts(store: &PostStore, request: &Request, response: Response) -> HandlerResult {
    let page = positive_query(request, "page", DEFAULT_PAGE);
    let limit = positive_query(request, "limit", DEFAULT_LIMIT);
    let result = store.published(page, limit);
    tracing::debug!(page, limit, total = result.total, "Listing posts");

    let posts: Vec<PostView<'_>> = result.posts.iter().map(PostView::from).collect();
    Ok(response.json(&json!({
        "posts": posts,
        "pagination": {
            "total": result.total,
            "page": page,
            "limit": limit,
            "pages": result.total.div_ceil(limit),
        },
        "status": "success",
    })))
}

pub fn get_post(store: &PostStore, response: Response, params: &Params) -> HandlerResult {
    let slug = params.get("slug").unwrap_or_default();
    let Some(post) = store.by_slug(slug) else {
        tracing::debug!(slug, "Post not found");
        return Ok(not_found(response));
    };
    Ok(response.json(&json!({ "post": PostView::from(&post), "status": "success" })))
}

pub fn list_tags(store: &PostStore, response: Response) -> HandlerResult {
    Ok(response.json(&json!({ "tags": store.tags(), "status": "success" })))
}

pub fn create_post(store: &PostStore, request: &Request, response: Response) -> HandlerResult {
    let (Some(title), Some(content)) = (provided(request, "title"), provided(request, "content"))
    else {
        return Ok(error(
            response,
            StatusCode::BAD_REQUEST,
            "Title and content are required",
        ));
    };

    let slug = provided(request, "slug").unwrap_or_else(|| slugify(&title));
    let new = NewPost {
        title,
        slug,
        excerpt: present(request, "excerpt").unwrap_or_default(),
        content,
        featured_image: present(request, "featured_image").unwrap_or_default(),
        tags: request.body_field("tags").map(tags).unwrap_or_default(),
        published: request.body_field("published").filter(|v| !v.is_null()).map_or(true, flag),
    };

    match store.create(new) {
        Ok(post) => {
            tracing::info!(post_id = post.id, slug = %post.slug, "Post created");
            Ok(response.with_status(StatusCode::CREATED).json(&json!({
                "status": "success",
                "message": "Post created successfully",
                "postId": post.id.to_string(),
                "slug": post.slug,
            })))
        }
        Err(e) => Ok(store_error(response, e)),
    }
}

pub fn update_post(
    store: &PostStore,
    request: &Request,
    response: Response,
    params: &Params,
) -> HandlerResult {
    let raw_id = params.get("id").unwrap_or_default();
    let Some(id) = post_id(params).filter(|&id| store.contains(id)) else {
        return Ok(not_found(response));
    };

    let title = provided(request, "title");
    let slug = provided(request, "slug").or_else(|| title.as_deref().map(slugify));
    let changes = PostUpdate {
        title,
        slug,
        excerpt: present(request, "excerpt"),
        content: present(request, "content"),
        featured_image: present(request, "featured_image"),
        tags: request.body_field("tags").filter(|v| !v.is_null()).map(tags),
        published: request.body_field("published").filter(|v| !v.is_null()).map(flag),
    };

    match store.update(id, changes) {
        Ok(Some(post)) => {
            tracing::info!(post_id = id, "Post updated");
            Ok(response.json(&json!({
                "status": "success",
                "message": format!("Post {raw_id} updated successfully"),
                "slug": post.slug,
            })))
        }
        Ok(None) => Ok(not_found(response)),
        Err(e) => Ok(store_error(response, e)),
    }
}

pub fn delete_post(store: &PostStore, response: Response, params: &Params) -> HandlerResult {
    let raw_id = params.get("id").unwrap_or_default();
    match post_id(params).and_then(|id| store.delete(id)) {
        Some(post) => {
            tracing::info!(post_id = post.id, "Post deleted");
            Ok(response.json(&json!({
                "status": "success",
                "message": format!("Post {raw_id} deleted successfully"),
            })))
        }
        None => Ok(not_found(response)),
    }
}
