//! Users resource handlers.
//!
//! Every handler turns its own failures into a JSON error response; none of
//! them return `Err` to the dispatcher.

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::api::store::{StoreError, UserStore, UserUpdate};
use crate::api::{error, provided};
use crate::http::{Request, Response};
use crate::routing::{HandlerResult, Params};

fn not_found(response: Response) -> Response {
    error(response, StatusCode::NOT_FOUND, "User not found")
}

fn store_error(response: Response, err: StoreError) -> Response {
    match err {
        StoreError::DuplicateEmail(_) => {
            tracing::warn!("Duplicate email detected");
            error(response, StatusCode::INTERNAL_SERVER_ERROR, "Email already exists")
        }
        StoreError::Hash(e) => {
            tracing::error!(error = %e, "Password hashing failed");
            error(
                response,
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("General error: {e}"),
            )
        }
    }
}

/// Id from the path. Ids that are not numbers match no user.
fn user_id(params: &Params) -> Option<u64> {
    params.get("id")?.parse().ok()
}

pub fn list_users(store: &UserStore, response: Response) -> HandlerResult {
    let users = store.list();
    tracing::debug!(count = users.len(), "Listing users");
    Ok(response.json(&json!({ "users": users, "status": "success" })))
}

pub fn get_user(store: &UserStore, response: Response, params: &Params) -> HandlerResult {
    let Some(user) = user_id(params).and_then(|id| store.get(id)) else {
        return Ok(not_found(response));
    };
    Ok(response.json(&json!({ "user": user, "status": "success" })))
}

pub fn create_user(store: &UserStore, request: &Request, response: Response) -> HandlerResult {
    let fields = (
        provided(request, "name"),
        provided(request, "email"),
        provided(request, "password"),
    );

    let (Some(name), Some(email), Some(password)) = fields else {
        tracing::debug!("User validation failed: missing required fields");
        let received = request.parsed_body().cloned().unwrap_or(Value::Null);
        return Ok(response.with_status(StatusCode::BAD_REQUEST).json(&json!({
            "status": "error",
            "message": "Name, email and password are required",
            "received_data": received,
        })));
    };

    match store.create(&name, &email, &password) {
        Ok(user) => {
            tracing::info!(user_id = user.id, "User created");
            Ok(response.with_status(StatusCode::CREATED).json(&json!({
                "status": "success",
                "message": "User created successfully",
                "userId": user.id.to_string(),
            })))
        }
        Err(e) => Ok(store_error(response, e)),
    }
}

pub fn update_user(
    store: &UserStore,
    request: &Request,
    response: Response,
    params: &Params,
) -> HandlerResult {
    let raw_id = params.get("id").unwrap_or_default();
    let Some(id) = user_id(params).filter(|&id| store.contains(id)) else {
        return Ok(not_found(response));
    };

    let changes = UserUpdate {
        name: provided(request, "name"),
        email: provided(request, "email"),
        password: provided(request, "password"),
    };
    if changes.is_empty() {
        return Ok(error(response, StatusCode::BAD_REQUEST, "No fields to update"));
    }

    match store.update(id, changes) {
        Ok(Some(_)) => Ok(response.json(&json!({
            "status": "success",
            "message": format!("User {raw_id} updated successfully"),
        }))),
        Ok(None) => Ok(not_found(response)),
        Err(e @ StoreError::DuplicateEmail(_)) => {
            tracing::warn!(error = %e, "User update rejected by store");
            Ok(error(
                response,
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {e}"),
            ))
        }
        Err(e) => Ok(store_error(response, e)),
    }
}

pub fn delete_user(store: &UserStore, response: Response, params: &Params) -> HandlerResult {
    let raw_id = params.get("id").unwrap_or_default();
    match user_id(params).and_then(|id| store.delete(id)) {
        Some(user) => {
            tracing::info!(user_id = user.id, "User deleted");
            Ok(response.json(&json!({
                "status": "success",
                "message": format!("User {raw_id} deleted successfully"),
            })))
        }
        None => Ok(not_found(response)),
    }
}
