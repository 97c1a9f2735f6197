use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json,
};

use stockyard_core::ProductId;
use stockyard_products::ProductDetails;

use super::respond;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/name/:name", get(search_products))
        .route("/sku/:sku", get(product_by_sku))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<ProductDetails>, JsonRejection>,
) -> axum::response::Response {
    let details = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::CREATED, services.catalog.create_product(details).await)
}

pub async fn list_products(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.list_products().await)
}

pub async fn search_products(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.search_products(&name).await)
}

pub async fn product_by_sku(
    Extension(services): Extension<Arc<AppServices>>,
    Path(sku): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.product_by_sku(&sku).await)
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<ProductId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.get_product(id).await)
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<ProductDetails>, JsonRejection>,
) -> axum::response::Response {
    let id = match errors::parse_id::<ProductId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let details = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.update_product(id, details).await)
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::DeleteQuery>,
) -> axum::response::Response {
    let id = match errors::parse_id::<ProductId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.catalog.delete_product(id, query.force).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
