use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::json;

use stockyard_core::{CategoryId, InventoryId, ProductId, SupplierId, WarehouseId};
use stockyard_inventory::AuditAction;
use stockyard_infra::stock::AddStock;

use super::{message, respond};
use crate::app::dto::{self, CreateInventoryRequest, OneOrMany};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_inventory).post(create_inventory))
        .route("/low-stock", get(low_stock))
        .route("/move", post(move_inventory))
        .route("/sku/:sku", get(by_sku))
        .route("/product/:product_id", get(by_product))
        .route("/warehouse/:warehouse_id", get(by_warehouse))
        .route("/expiry/:date", get(by_expiry))
        .route("/audit-log/:action", get(by_audit_action))
        .route("/product-name/:name", get(by_product_name))
        .route("/warehouse-name/:name", get(by_warehouse_name))
        .route("/product-category/:category_id", get(by_category))
        .route("/product-supplier/:supplier_id", get(by_supplier))
        .route("/:id", get(get_inventory).put(update_inventory).delete(delete_inventory))
        .route("/:id/diminish", post(diminish_inventory))
}

/// Add stock. A single object answers with one receipt, an array with a list;
/// a batch stops at its first failure.
pub async fn create_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<OneOrMany<CreateInventoryRequest>>, JsonRejection>,
) -> axum::response::Response {
    match dto::body(payload) {
        Ok(OneOrMany::One(req)) => respond(
            StatusCode::CREATED,
            services.catalog.create_inventory(AddStock::from(req)).await,
        ),
        Ok(OneOrMany::Many(reqs)) => {
            let batch = reqs.into_iter().map(AddStock::from).collect();
            respond(StatusCode::CREATED, services.catalog.create_inventory_batch(batch).await)
        }
        Err(resp) => resp,
    }
}

pub async fn list_inventory(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.list_inventory().await)
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::LowStockQuery>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.low_stock(query.threshold).await)
}

pub async fn by_sku(
    Extension(services): Extension<Arc<AppServices>>,
    Path(sku): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.inventory_by_sku(&sku).await)
}

pub async fn by_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<ProductId>(&product_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.inventory_by_product(id).await)
}

pub async fn by_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Path(warehouse_id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<WarehouseId>(&warehouse_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.inventory_by_warehouse(id).await)
}

pub async fn by_expiry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(date): Path<String>,
) -> axum::response::Response {
    let date = match dto::parse_date(&date) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.inventory_by_expiry(date).await)
}

pub async fn by_audit_action(
    Extension(services): Extension<Arc<AppServices>>,
    Path(action): Path<String>,
) -> axum::response::Response {
    let action = match action.parse::<AuditAction>() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    respond(StatusCode::OK, services.catalog.inventory_by_audit_action(action).await)
}

pub async fn by_product_name(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.inventory_by_product_name(&name).await)
}

pub async fn by_warehouse_name(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.catalog.inventory_by_warehouse_name(&name).await)
}

pub async fn by_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(category_id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<CategoryId>(&category_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.inventory_by_category(id).await)
}

pub async fn by_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(supplier_id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<SupplierId>(&supplier_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.inventory_by_supplier(id).await)
}

pub async fn get_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<InventoryId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.get_inventory(id).await)
}

pub async fn update_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<dto::UpdateInventoryRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match errors::parse_id::<InventoryId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let update = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.catalog.update_inventory(id, update.into()).await)
}

pub async fn delete_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id::<InventoryId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services.catalog.delete_inventory(id).await;
    respond(StatusCode::OK, result.map(|_| message("Inventory deleted successfully")))
}

pub async fn move_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::MoveInventoryRequest>, JsonRejection>,
) -> axum::response::Response {
    let req = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .catalog
        .move_inventory(req.product_id, req.from_warehouse_id, req.to_warehouse_id, req.amount)
        .await
        .map(|transfer| {
            json!({
                "message": "Inventory moved successfully",
                "from": transfer.from,
                "to": transfer.to,
            })
        });
    respond(StatusCode::OK, result)
}

pub async fn diminish_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<dto::DiminishRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match errors::parse_id::<InventoryId>(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let req = match dto::body(payload) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = services
        .catalog
        .diminish_inventory(id, req.quantity, req.reason)
        .await
        .map(|record| json!({ "message": "Inventory diminished successfully", "inventory": record }));
    respond(StatusCode::OK, result)
}
