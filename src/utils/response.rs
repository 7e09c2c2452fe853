//! JSON envelopes shared by every handler.
//!
//! Success: `{"success": true, "data": .., "message": ..}`.
//! Failure: `{"success": false, "error": {"code": .., "message": ..}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorBody<'a> {
    pub code: &'a str,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse<'a> {
    pub success: bool,
    pub error: ApiErrorBody<'a>,
}

fn envelope<T: Serialize>(status: StatusCode, data: Option<T>, message: String) -> Response {
    let body = ApiResponse {
        success: true,
        data,
        message,
    };
    (status, Json(body)).into_response()
}

pub fn success<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    envelope(StatusCode::OK, Some(data), message.into())
}

pub fn created<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    envelope(StatusCode::CREATED, Some(data), message.into())
}

/// For operations like logout that have nothing to return.
pub fn empty_success(message: impl Into<String>) -> Response {
    envelope::<()>(StatusCode::OK, None, message.into())
}

pub fn error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = ApiErrorResponse {
        success: false,
        error: ApiErrorBody {
            code,
            message: message.into(),
        },
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_empty_success_omits_data() {
        let body = json(empty_success("done")).await;
        assert_eq!(body["success"], true);
        assert!(body.get("data").is_none());
        assert_eq!(body["message"], "done");
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let response = error(StatusCode::CONFLICT, "CONFLICT", "taken");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "CONFLICT");
        assert_eq!(body["error"]["message"], "taken");
    }
}
