use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{board::MoveRejection, game::GameError},
};

/// Machine-readable reason attached to refused game and queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// Symbol submitted out of turn.
    OutOfTurn,
    /// Target cell already occupied.
    CellOccupied,
    /// Coordinates outside the board.
    OutOfBounds,
    /// Game is over.
    GameAlreadyFinished,
    /// Caller holds no seat in the game.
    NotAPlayer,
    /// Caller submitted the other seat's symbol.
    WrongSymbol,
    /// Bot move requested on a game without a bot.
    NotAPracticeGame,
    /// Caller already plays another game.
    PlayerBusy,
    /// Caller named themselves as opponent.
    SelfChallenge,
    /// Lifecycle refused the change.
    InvalidTransition,
}

impl RejectionKind {
    fn status(self) -> StatusCode {
        match self {
            RejectionKind::OutOfBounds | RejectionKind::SelfChallenge => StatusCode::BAD_REQUEST,
            RejectionKind::NotAPlayer => StatusCode::FORBIDDEN,
            _ => StatusCode::CONFLICT,
        }
    }
}

impl From<&GameError> for RejectionKind {
    fn from(err: &GameError) -> Self {
        match err {
            GameError::Rejected(MoveRejection::OutOfTurn { .. }) => RejectionKind::OutOfTurn,
            GameError::Rejected(MoveRejection::CellOccupied { .. }) => RejectionKind::CellOccupied,
            GameError::Rejected(MoveRejection::OutOfBounds { .. }) => RejectionKind::OutOfBounds,
            GameError::GameAlreadyFinished => RejectionKind::GameAlreadyFinished,
            GameError::NotAPlayer => RejectionKind::NotAPlayer,
            GameError::WrongSymbol { .. } => RejectionKind::WrongSymbol,
            GameError::NotAPracticeGame => RejectionKind::NotAPracticeGame,
            GameError::InvalidTransition(_) => RejectionKind::InvalidTransition,
        }
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable or refused the commit.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Caller identity missing or invalid.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation refused after evaluation against current state.
    #[error("{message}")]
    Rejected {
        /// Reason category.
        kind: RejectionKind,
        /// Human-readable detail.
        message: String,
    },
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    /// Reason category when the error is a rejection.
    pub fn rejection_kind(&self) -> Option<RejectionKind> {
        match self {
            ServiceError::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<GameError> for ServiceError {
    fn from(err: GameError) -> Self {
        ServiceError::Rejected {
            kind: RejectionKind::from(&err),
            message: err.to_string(),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Game or queue operation refused.
    #[error("rejected: {message}")]
    Rejected {
        /// Reason category.
        kind: RejectionKind,
        /// Human-readable detail.
        message: String,
    },
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Rejected { kind, message } => AppError::Rejected { kind, message },
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize, ToSchema)]
/// Body returned with every error response.
pub struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<RejectionKind>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, kind) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            AppError::Rejected { kind, .. } => (kind.status(), Some(*kind)),
            AppError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
            kind,
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::board::Symbol;

    #[test]
    fn game_errors_keep_their_kind() {
        let err: ServiceError = GameError::Rejected(MoveRejection::CellOccupied { row: 0, col: 0 }).into();
        assert_eq!(err.rejection_kind(), Some(RejectionKind::CellOccupied));

        let err: ServiceError = GameError::WrongSymbol {
            assigned: Symbol::O,
            got: Symbol::X,
        }
        .into();
        assert_eq!(err.rejection_kind(), Some(RejectionKind::WrongSymbol));
    }

    #[test]
    fn rejections_map_to_client_errors() {
        let response = AppError::from(ServiceError::from(GameError::Rejected(
            MoveRejection::OutOfBounds {
                row: 5,
                col: 0,
                size: 3,
            },
        )))
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::from(ServiceError::from(GameError::GameAlreadyFinished))
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::from(ServiceError::Degraded).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
