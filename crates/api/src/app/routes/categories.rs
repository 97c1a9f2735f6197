use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, put},
};

use stockyard_core::CategoryId;

use super::{message, respond};
use crate::app::dto::{self, NameRequest, OneOrMany};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_categories))
        .route("/summaries", get(category_summaries))
        .route("/name/:name", get(category_by_name))
        .route("/:id", get(get_category).delete(delete_category))
        .route("/:id/name", put(rename_category))
        .route("/:id/products", get(products_in_category))
        .route("/:id/stock", get(category_stock))
}

/// Accepts `{"name": ..}` or an array of them; the response mirrors the shape.
pub async fn create_categories(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<OneOrMany<NameRequest>>, JsonRejection>,
) -> axum::response::Response {
    match dto::body(payload) {
        Ok(OneOrMany::One(req)) => respond(StatusCode::CREATED, services.catalog.create_category(&req.name).await),
        Ok(OneOrMany::Many(reqs)) => {
            let names: Vec<String> = reqs.into_iter().map(|r| r.name).collect();
            respond(StatusCode::CREATED, services.catalog.create_categories(&names).await)
        }
        Err(resp) => resp,
    }
}

pub async fn list_categories(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.list_categories().await)
}

pub async fn category_summaries(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.category_summaries().await)
}

pub async fn category_by_name(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.category_by_name(&name).await)
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<CategoryId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.get_category(id).await)
}

pub async fn products_in_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<CategoryId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.products_in_category(id).await)
}

pub async fn category_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<CategoryId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.category_stock(id).await)
}

pub async fn rename_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<NameRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match errors::parse_id::<CategoryId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let req = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.rename_category(id, &req.name).await)
}

pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::DeleteQuery>,
) -> axum::response::Response {
    let id = match errors::parse_id::<CategoryId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.catalog.delete_category(id, query.force).await;
    respond(StatusCode::OK, result.map(|()| message("Category deleted successfully")))
}
