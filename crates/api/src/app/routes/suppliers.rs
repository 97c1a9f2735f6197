use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::json;

use stockyard_core::{SupplierId, WarehouseId};
use stockyard_suppliers::{NewSupplier, SupplierUpdate};

use super::{message, respond};
use crate::app::dto::{self, DeliveryRequest, OneOrMany};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_suppliers).post(create_suppliers))
        .route("/name/:name", get(search_suppliers))
        .route("/product/:name", get(suppliers_by_product))
        .route("/warehouse/:warehouse_id", get(suppliers_by_warehouse))
        .route("/:id", get(get_supplier).put(update_supplier).delete(delete_supplier))
        .route("/:id/deliveries", post(record_delivery))
}

pub async fn create_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<OneOrMany<NewSupplier>>, JsonRejection>,
) -> axum::response::Response {
    match dto::body(payload) {
        Ok(OneOrMany::One(new)) => respond(StatusCode::CREATED, services.catalog.create_supplier(new).await),
        Ok(OneOrMany::Many(batch)) => respond(StatusCode::CREATED, services.catalog.create_suppliers(batch).await),
        Err(resp) => resp,
    }
}

pub async fn list_suppliers(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.list_suppliers().await)
}

pub async fn search_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.search_suppliers(&name).await)
}

/// Suppliers that delivered a product whose name matches.
pub async fn suppliers_by_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.suppliers_by_product_name(&name).await)
}

pub async fn suppliers_by_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Path(warehouse_id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<WarehouseId>(&warehouse_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.suppliers_by_warehouse(id).await)
}

pub async fn get_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<SupplierId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.get_supplier(id).await)
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<SupplierUpdate>, JsonRejection>,
) -> axum::response::Response {
    let id = match errors::parse_id::<SupplierId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let update = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.update_supplier(id, update).await)
}

pub async fn delete_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::DeleteQuery>,
) -> axum::response::Response {
    let id = match errors::parse_id::<SupplierId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.catalog.delete_supplier(id, query.force).await;
    respond(StatusCode::OK, result.map(|()| message("Supplier deleted successfully")))
}

pub async fn record_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<DeliveryRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match errors::parse_id::<SupplierId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let req = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .catalog
        .record_delivery(id, req.product_id, req.warehouse_id, req.quantity, req.unit_price, req.expiry_date)
        .await
        .map(|(supplier, receipt)| json!({ "supplier": supplier, "receipt": receipt }));
    respond(StatusCode::CREATED, result)
}
