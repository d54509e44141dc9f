//! Error responses.
//!
//! # Responsibilities
//! - Map device failures to appropriate HTTP status codes
//! - Render errors as a small JSON body
//!
//! # Design Decisions
//! - A missing device is 404; a device that answered badly is 502
//! - An unusable query tool is 503, the service itself is degraded

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::lookup::DeviceError;

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

pub fn status_for(error: &DeviceError) -> StatusCode {
    match error {
        DeviceError::NotFound { .. } => StatusCode::NOT_FOUND,
        DeviceError::Query { .. } | DeviceError::Malformed { .. } => StatusCode::BAD_GATEWAY,
        DeviceError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for DeviceError {
    fn into_response(self) -> Response {
        (status_for(&self), Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_map_to_statuses() {
        let not_found = DeviceError::NotFound { device: "wg0".into() };
        assert_eq!(status_for(&not_found), StatusCode::NOT_FOUND);

        let query = DeviceError::Query {
            device: "eth0".into(),
            message: "Operation not supported".into(),
        };
        assert_eq!(status_for(&query), StatusCode::BAD_GATEWAY);

        let unavailable = DeviceError::Unavailable {
            source: std::io::ErrorKind::NotFound.into(),
        };
        assert_eq!(status_for(&unavailable), StatusCode::SERVICE_UNAVAILABLE);
    }
}
