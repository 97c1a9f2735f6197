use axum::{Json, Router, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use stockyard_infra::ServiceResult;

use crate::app::errors;

pub mod categories;
pub mod inventory;
pub mod products;
pub mod suppliers;
pub mod system;
pub mod warehouses;

/// Router for every resource endpoint, mounted under `/api`.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/categories", categories::router())
        .nest("/suppliers", suppliers::router())
        .nest("/warehouses", warehouses::router())
        .nest("/inventory", inventory::router())
}

/// Serialize a service result, mapping errors through the shared taxonomy.
pub(crate) fn respond<T: Serialize>(status: StatusCode, result: ServiceResult<T>) -> axum::response::Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub(crate) fn message(text: &str) -> serde_json::Value {
    serde_json::json!({ "message": text })
}
