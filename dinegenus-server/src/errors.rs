use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dinegenus_collab::CollabError;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    Invalid(String),
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn room_not_found(room_id: &str) -> Self {
        CollabError::room_not_found(room_id).into()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<CollabError> for ServerError {
    fn from(value: CollabError) -> Self {
        match value {
            CollabError::Validation(message) => Self::Invalid(message),
            CollabError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            CollabError::Conflict(message) => Self::Conflict(message),
            CollabError::Transport(message) => Self::Unavailable(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collab_errors_map_to_statuses() {
        let cases = [
            (CollabError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CollabError::room_not_found("abc"), StatusCode::NOT_FOUND),
            (CollabError::Conflict("closed".into()), StatusCode::CONFLICT),
            (
                CollabError::Transport("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ServerError::from(error).into_response().status(), status);
        }
    }

    #[test]
    fn test_not_found_message() {
        let error = ServerError::room_not_found("abc");
        assert_eq!(error.to_string(), "room:abc not found");
    }
}
