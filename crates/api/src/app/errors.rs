use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use stockyard_core::DomainError;
use stockyard_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal server error")
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::CapacityExceeded {
            warehouse_id,
            current_usage,
            capacity,
            requested,
        } => json_error_with(
            StatusCode::CONFLICT,
            "capacity_exceeded",
            message,
            json!({
                "warehouse_id": warehouse_id,
                "current_usage": current_usage,
                "capacity": capacity,
                "requested": requested,
                "available": (capacity - current_usage).max(0),
            }),
        ),
        DomainError::InsufficientStock { available, requested } => json_error_with(
            StatusCode::CONFLICT,
            "insufficient_stock",
            message,
            json!({ "available": available, "requested": requested }),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    json_error_with(status, code, message, Value::Null)
}

/// Error body with extra top-level fields merged in from `details` (an object).
pub fn json_error_with(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: Value,
) -> axum::response::Response {
    let mut body = json!({
        "error": code,
        "message": message.into(),
    });
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), details) {
        body.extend(extra);
    }
    (status, axum::Json(body)).into_response()
}

/// Parse a path identifier, answering 400 `invalid_id` on failure.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(domain_error_to_response)
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use stockyard_core::{ProductId, WarehouseId};

    use super::*;

    async fn body_of(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn capacity_exceeded_is_conflict_with_details() {
        let resp = domain_error_to_response(DomainError::CapacityExceeded {
            warehouse_id: WarehouseId::new(),
            current_usage: 90,
            capacity: 100,
            requested: 20,
        });
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body = body_of(resp).await;
        assert_eq!(body["error"], "capacity_exceeded");
        assert_eq!(body["current_usage"], 90);
        assert_eq!(body["available"], 10);
    }

    #[tokio::test]
    async fn taxonomy_maps_to_status_codes() {
        let cases = [
            (DomainError::validation("x"), StatusCode::BAD_REQUEST),
            (DomainError::invalid_id("x"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("product"), StatusCode::NOT_FOUND),
            (DomainError::conflict("x"), StatusCode::CONFLICT),
            (DomainError::insufficient_stock(1, 5), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(domain_error_to_response(err).status(), status);
        }
    }

    #[tokio::test]
    async fn bad_id_is_rejected() {
        let resp = parse_id::<ProductId>("not-a-uuid").unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(resp).await["error"], "invalid_id");
    }
}
