use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use std::sync::Arc;
use tracing::debug;

use super::{error::ApiError, AppState};
use crate::access::Actor;

/// The actor behind the request's bearer token. Rejects with 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedActor(pub Actor);

impl FromRequestParts<Arc<AppState>> for AuthenticatedActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let actor = state
            .authenticator
            .authenticate(header)
            .ok_or(ApiError::Unauthorized)?;
        debug!(actor = actor.name(), "Authenticated request");
        Ok(Self(actor))
    }
}
