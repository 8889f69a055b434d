//! Application routes.
//!
//! # Routes
//! - `GET /` welcome page
//! - `GET /hello/{name}` greeting
//! - `GET|POST /api/users`, `GET|PUT|DELETE /api/users/{id}` users resource
//! - `GET|POST /api/posts`, `GET /api/posts/{slug}`, `PUT|DELETE /api/posts/{id}`,
//!   `GET /api/tags` blog resource

pub mod post_store;
pub mod posts;
pub mod store;
pub mod users;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::http::{Request, Response};
use crate::routing::{HandlerResult, Params, RouteTable};

pub use post_store::{NewPost, Post, PostPage, PostStore, PostStoreError, PostUpdate};
pub use store::{StoreError, User, UserStore, UserUpdate};

pub const WELCOME: &str = "Welcome to the lightweight Rust routing framework! View the source \
    and documentation on <a href=\"https://github.com/ajerni/phpapi\" target=\"_blank\" \
    rel=\"noopener noreferrer\">GitHub</a>.";

/// Backing stores for the application routes.
#[derive(Debug, Clone, Default)]
pub struct Stores {
    pub users: Arc<UserStore>,
    pub posts: Arc<PostStore>,
}

/// JSON error body `{"status":"error","message":...}`.
pub(crate) fn error(response: Response, status: StatusCode, message: impl Into<String>) -> Response {
    response
        .with_status(status)
        .json(&json!({ "status": "error", "message": message.into() }))
}

/// A body field that counts as provided: a non-empty string other than `"0"`,
/// or a non-zero number.
pub(crate) fn provided(request: &Request, field: &str) -> Option<String> {
    match request.body_field(field)? {
        Value::String(s) if !s.is_empty() && s != "0" => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

fn welcome(_request: &mut Request, response: Response, _params: &Params) -> HandlerResult {
    Ok(response
        .with_header("Content-Type", "text/html; charset=utf-8")
        .write(WELCOME))
}

fn hello(_request: &mut Request, response: Response, params: &Params) -> HandlerResult {
    let name = params.get("name").unwrap_or_default();
    Ok(response.write(format!("Hello, {name}")))
}

/// Register every application route on `table`.
pub fn register_routes(table: &mut RouteTable, stores: &Stores) {
    table.get("/", welcome).get("/hello/{name}", hello);

    let s = stores.users.clone();
    table.get("/api/users", move |_req, res, _params| users::list_users(&s, res));

    let s = stores.users.clone();
    table.get("/api/users/{id}", move |_req, res, params| users::get_user(&s, res, params));

    let s = stores.users.clone();
    table.post("/api/users", move |req, res, _params| users::create_user(&s, req, res));

    let s = stores.users.clone();
    table.put("/api/users/{id}", move |req, res, params| {
        users::update_user(&s, req, res, params)
    });

    let s = stores.users.clone();
    table.delete("/api/users/{id}", move |_req, res, params| {
        users::delete_user(&s, res, params)
    });

    let s = stores.posts.clone();
    table.get("/api/posts", move |req, res, _params| posts::list_posts(&s, req, res));

    let s = stores.posts.clone();
    table.get("/api/posts/{slug}", move |_req, res, params| posts::get_post(&s, res, params));

    let s = stores.posts.clone();
    table.get("/api/tags", move |_req, res, _params| posts::list_tags(&s, res));

    let s = stores.posts.clone();
    table.post("/api/posts", move |req, res, _params| posts::create_post(&s, req, res));

    let s = stores.posts.clone();
    table.put("/api/posts/{id}", move |req, res, params| {
        posts::update_post(&s, req, res, params)
    });

    let s = stores.posts.clone();
    table.delete("/api/posts/{id}", move |_req, res, params| {
        posts::delete_post(&s, res, params)
    });
}

/// Route table with the application routes over `stores`.
pub fn routes(stores: &Stores) -> RouteTable {
    let mut table = RouteTable::new();
    register_routes(&mut table, stores);
    table
}
