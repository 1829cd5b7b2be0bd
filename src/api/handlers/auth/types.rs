use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response for successful login, refresh and API token requests.
///
/// Browser flows receive the token via cookie only and `token` stays null;
/// programmatic flows receive it in the body.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub username: String,
    pub email: String,
    pub role: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}
