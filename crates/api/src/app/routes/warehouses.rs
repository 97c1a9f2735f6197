use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};
use serde_json::json;

use stockyard_core::WarehouseId;
use stockyard_inventory::{NewWarehouse, WarehouseUpdate};

use super::respond;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_warehouses).post(create_warehouse))
        .route("/name/:name", get(warehouses_by_name))
        .route("/location/:location", get(warehouses_by_location))
        .route("/supplier/:name", get(warehouses_by_supplier))
        .route("/product/:name", get(warehouses_by_product))
        .route("/category/:name", get(warehouses_by_category))
        .route("/:id", get(get_warehouse).put(update_warehouse).delete(delete_warehouse))
        .route("/:id/utilization", get(warehouse_utilization))
}

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<NewWarehouse>, JsonRejection>,
) -> axum::response::Response {
    let new = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::CREATED, services.catalog.create_warehouse(new).await)
}

pub async fn list_warehouses(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.list_warehouses().await)
}

pub async fn warehouses_by_name(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.warehouses_by_name(&name).await)
}

pub async fn warehouses_by_location(
    Extension(services): Extension<Arc<AppServices>>,
    Path(location): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.warehouses_by_location(&location).await)
}

pub async fn warehouses_by_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.warehouses_by_supplier_name(&name).await)
}

pub async fn warehouses_by_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.warehouses_by_product_name(&name).await)
}

pub async fn warehouses_by_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.warehouses_by_category_name(&name).await)
}

pub async fn get_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<WarehouseId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.get_warehouse(id).await)
}

pub async fn warehouse_utilization(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<WarehouseId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.warehouse_utilization(id).await)
}

pub async fn update_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<WarehouseUpdate>, JsonRejection>,
) -> axum::response::Response {
    let id = match errors::parse_id::<WarehouseId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let update = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.update_warehouse(id, update).await)
}

/// `?force=true` removes the warehouse's inventory records along with it.
pub async fn delete_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::DeleteQuery>,
) -> axum::response::Response {
    let id = match errors::parse_id::<WarehouseId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.catalog.delete_warehouse(id, query.force).await.map(|removed| {
        json!({
            "message": "Warehouse deleted successfully",
            "inventory_removed": removed,
        })
    });
    respond(StatusCode::OK, result)
}
