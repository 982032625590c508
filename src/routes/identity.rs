use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::{error::AppError, state::game::PlayerId};

/// Header carrying the player id verified by the upstream identity layer.
pub const PLAYER_ID_HEADER: &str = "x-player-id";

/// Caller identity taken from [`PLAYER_ID_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerIdentity(pub PlayerId);

impl<S> FromRequestParts<S> for PlayerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        player_from_headers(&parts.headers)?
            .map(PlayerIdentity)
            .ok_or_else(|| AppError::Unauthorized(format!("missing `{PLAYER_ID_HEADER}` header")))
    }
}

impl<S> OptionalFromRequestParts<S> for PlayerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(player_from_headers(&parts.headers)?.map(PlayerIdentity))
    }
}

/// Player id from `headers`; absent header is `None`, a malformed one is unauthorized.
fn player_from_headers(headers: &HeaderMap) -> Result<Option<PlayerId>, AppError> {
    let Some(raw) = headers.get(PLAYER_ID_HEADER) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|value| value.trim().parse::<PlayerId>().ok())
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized(format!("invalid `{PLAYER_ID_HEADER}` header")))
}
