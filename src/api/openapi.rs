//! OpenAPI document for the auth surface.

use utoipa::OpenApi;

use crate::api::handlers::{auth, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "gatehouse",
        description = "Token-based authentication core",
        license(name = "BSD-3-Clause")
    ),
    paths(
        health::health,
        auth::session::login,
        auth::session::api_token,
        auth::session::refresh,
        auth::session::logout,
    ),
    components(schemas(
        health::Health,
        auth::types::LoginRequest,
        auth::types::AuthResponse,
    )),
    tags(
        (name = "auth", description = "Login, refresh rotation and logout"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
