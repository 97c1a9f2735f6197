//! Request bodies and query strings, plus the conversion into catalog inputs.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use stockyard_core::{ProductId, WarehouseId};
use stockyard_infra::stock::{AddStock, InventoryUpdate};

use crate::app::errors;

/// A body that may be a single object or an array of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Unwrap a JSON body, answering 400 `validation_error` when it is malformed.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateInventoryRequest {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    #[serde(alias = "quantity")]
    pub stock: i64,
    #[serde(default, alias = "unitPrice")]
    pub unit_price: Option<f64>,
    #[serde(default, alias = "expiryDate")]
    pub expiry_date: Option<NaiveDate>,
}

impl From<CreateInventoryRequest> for AddStock {
    fn from(req: CreateInventoryRequest) -> Self {
        AddStock {
            product_id: req.product_id,
            warehouse_id: req.warehouse_id,
            quantity: req.stock,
            unit_price: req.unit_price,
            expiry_date: req.expiry_date,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateInventoryRequest {
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default, alias = "unitPrice")]
    pub unit_price: Option<f64>,
    #[serde(default, alias = "expiryDate")]
    pub expiry_date: Option<NaiveDate>,
}

impl From<UpdateInventoryRequest> for InventoryUpdate {
    fn from(req: UpdateInventoryRequest) -> Self {
        InventoryUpdate {
            stock: req.stock,
            unit_price: req.unit_price,
            expiry_date: req.expiry_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MoveInventoryRequest {
    #[serde(alias = "productId")]
    pub product_id: ProductId,
    #[serde(alias = "fromWarehouseId")]
    pub from_warehouse_id: WarehouseId,
    #[serde(alias = "toWarehouseId")]
    pub to_warehouse_id: WarehouseId,
    #[serde(alias = "quantity")]
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct DiminishRequest {
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryRequest {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    #[serde(default, alias = "unitPrice")]
    pub unit_price: Option<f64>,
    #[serde(default, alias = "expiryDate")]
    pub expiry_date: Option<NaiveDate>,
}

/// Parse a `YYYY-MM-DD` path segment.
pub fn parse_date(raw: &str) -> Result<NaiveDate, axum::response::Response> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("'{raw}' is not a date in YYYY-MM-DD form"),
        )
    })
}
