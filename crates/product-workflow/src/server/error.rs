use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde_json::json;
use tracing::{error, warn};

use crate::Error;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ConstraintViolation { .. } => StatusCode::CONFLICT,
            Error::Domain(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            Error::ConstraintViolation {
                constraint,
                field,
                message,
            } => json!({
                "error": message,
                "constraint": constraint,
                "field": field,
            }),
            _ if status.is_server_error() => {
                error!("Request failed: {}", self);
                json!({ "error": "Internal server error" })
            }
            other => {
                warn!("Request rejected: {}", other);
                json!({ "error": other.to_string() })
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_statuses() {
        assert_eq!(Error::not_found("Step", 1).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::constraint("unique_product_name", Some("name"), "taken").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Domain("cross workflow".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::Validation("blank".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let response = Error::Internal("connection string leaked".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
