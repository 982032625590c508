use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Where the Swagger UI fetches the generated document from.
pub const OPENAPI_JSON_PATH: &str = "/docs/openapi.json";

/// Swagger UI at `/docs`, reading the queue, game and socket contracts from [`ApiDoc`].
pub fn router() -> Router<SharedState> {
    SwaggerUi::new("/docs")
        .url(OPENAPI_JSON_PATH, ApiDoc::openapi())
        .into()
}
