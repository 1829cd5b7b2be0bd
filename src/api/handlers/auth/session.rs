//! Session orchestration: login, API tokens, refresh rotation and logout.

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{
    fingerprint::{self, FingerprintPair, DEV_FINGERPRINT_COOKIE, SECURE_FINGERPRINT_COOKIE},
    middleware::{cookie_value, CurrentUser},
    state::{AuthConfig, AuthState},
    storage::{
        create_refresh_credential, lookup_login_principal, revoke_all_for_user,
        revoke_refresh_credential, validate_and_revoke_atomically, Principal,
    },
    token::TokenUse,
    types::{AuthResponse, LoginRequest},
};

pub const AUTH_COOKIE_NAME: &str = "auth_token";
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Refresh cookie scope covers every auth endpoint so logout can read it.
const REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Older releases scoped the refresh cookie to the refresh endpoint only.
/// Logout clears that path too so stale cookies cannot linger.
const LEGACY_REFRESH_COOKIE_PATH: &str = "/api/auth/refresh";

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session established", body = AuthResponse),
        (status = 400, description = "Missing or malformed payload"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Invalid request".to_string()).into_response();
    };

    let principal =
        match verify_credentials(&pool, &auth_state, &request.username, &request.password).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                return (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
                    .into_response();
            }
            Err(error) => {
                error!("Failed to verify credentials: {error}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Authentication failed".to_string(),
                )
                    .into_response();
            }
        };

    match establish_session(&pool, &auth_state, &principal).await {
        Ok((headers, body)) => {
            info!("session established for {}", principal.username);
            (StatusCode::OK, headers, Json(body)).into_response()
        }
        Err(error) => {
            error!("Failed to establish session: {error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication failed".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/api-token",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "API token issued", body = AuthResponse),
        (status = 400, description = "Missing or malformed payload"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn api_token(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Invalid request".to_string()).into_response();
    };

    let principal =
        match verify_credentials(&pool, &auth_state, &request.username, &request.password).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                return (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
                    .into_response();
            }
            Err(error) => {
                error!("Failed to verify credentials: {error}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Authentication failed".to_string(),
                )
                    .into_response();
            }
        };

    // API tokens are fingerprint-free and travel in the body, never cookies.
    let token = match auth_state
        .issuer()
        .issue(&principal.username, TokenUse::Api, None)
    {
        Ok(token) => token,
        Err(error) => {
            error!("Failed to issue api token: {error}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication failed".to_string(),
            )
                .into_response();
        }
    };

    info!("api token issued for {}", principal.username);
    let body = AuthResponse {
        token: Some(token),
        username: principal.username,
        email: principal.email,
        role: principal.role,
        expires_in: auth_state.config().access_token_ttl_seconds(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "Session rotated", body = AuthResponse),
        (status = 401, description = "Missing, invalid or expired refresh credential")
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let Some(token) = cookie_value(&headers, REFRESH_COOKIE_NAME) else {
        return (
            StatusCode::UNAUTHORIZED,
            "Not authenticated - please log in".to_string(),
        )
            .into_response();
    };

    let rotated = match validate_and_revoke_atomically(&pool, &token).await {
        Ok(Some(rotated)) => rotated,
        Ok(None) => {
            debug!("refresh rejected: credential unknown, revoked or expired");
            return (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired refresh token - please log in again".to_string(),
            )
                .into_response();
        }
        Err(error) => {
            error!("Failed to rotate refresh credential: {error}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication failed".to_string(),
            )
                .into_response();
        }
    };

    match establish_session(&pool, &auth_state, &rotated.principal).await {
        Ok((response_headers, body)) => {
            info!("session rotated for {}", rotated.principal.username);
            (StatusCode::OK, response_headers, Json(body)).into_response()
        }
        Err(error) => {
            error!("Failed to establish rotated session: {error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication failed".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Session ended; cookies cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    user: Option<Extension<CurrentUser>>,
) -> impl IntoResponse {
    if let Some(token) = cookie_value(&headers, REFRESH_COOKIE_NAME) {
        match revoke_refresh_credential(&pool, &token).await {
            Ok(revoked) => debug!("logout revoked credential by cookie: {revoked}"),
            Err(error) => error!("Failed to revoke refresh credential: {error}"),
        }
    } else if let Some(Extension(CurrentUser(principal))) = user {
        // No cookie but an authenticated caller: revoke everything they own.
        match revoke_all_for_user(&pool, principal.id).await {
            Ok(count) => debug!("logout revoked {count} credentials for {}", principal.username),
            Err(error) => error!("Failed to revoke refresh credentials: {error}"),
        }
    }

    // Always clear cookies, even when nothing was revoked.
    (
        StatusCode::NO_CONTENT,
        clear_session_cookies(auth_state.config()),
    )
        .into_response()
}

async fn verify_credentials(
    pool: &PgPool,
    auth_state: &AuthState,
    username: &str,
    password: &str,
) -> Result<Option<Principal>> {
    let Some(record) = lookup_login_principal(pool, username).await? else {
        debug!("login rejected: unknown username");
        return Ok(None);
    };

    if !auth_state
        .password_verifier()
        .verify(password, &record.password_hash)
    {
        debug!("login rejected: password mismatch");
        return Ok(None);
    }

    Ok(Some(record.principal))
}

/// Shared issuance path for login and refresh: new fingerprint pair, a
/// session token bound to its hash, a fresh refresh credential, and the
/// three cookies carrying them.
async fn establish_session(
    pool: &PgPool,
    auth_state: &AuthState,
    principal: &Principal,
) -> Result<(HeaderMap, AuthResponse)> {
    let config = auth_state.config();
    let pair = fingerprint::generate_pair();

    let token = auth_state
        .issuer()
        .issue(&principal.username, TokenUse::Session, Some(&pair.hashed))
        .context("failed to issue session token")?;

    let credential =
        create_refresh_credential(pool, principal.id, config.refresh_token_ttl_seconds())
            .await
            .context("failed to create refresh credential")?;

    let headers = session_cookies(config, &token, &credential.token, &pair)
        .context("failed to build session cookies")?;

    Ok((
        headers,
        AuthResponse {
            token: None,
            username: principal.username.clone(),
            email: principal.email.clone(),
            role: principal.role.clone(),
            expires_in: config.access_token_ttl_seconds(),
        },
    ))
}

fn session_cookies(
    config: &AuthConfig,
    session_token: &str,
    refresh_token: &str,
    pair: &FingerprintPair,
) -> Result<HeaderMap, InvalidHeaderValue> {
    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        build_cookie(
            config,
            AUTH_COOKIE_NAME,
            session_token,
            "/",
            config.access_token_ttl_seconds(),
        )?,
    );
    headers.append(
        SET_COOKIE,
        build_cookie(
            config,
            REFRESH_COOKIE_NAME,
            refresh_token,
            REFRESH_COOKIE_PATH,
            config.refresh_token_ttl_seconds(),
        )?,
    );
    headers.append(
        SET_COOKIE,
        build_cookie(
            config,
            fingerprint::cookie_name(config.secure_cookies()),
            &pair.raw,
            "/",
            config.access_token_ttl_seconds(),
        )?,
    );
    Ok(headers)
}

fn clear_session_cookies(config: &AuthConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let cleared = [
        (AUTH_COOKIE_NAME, "/"),
        (REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH),
        (REFRESH_COOKIE_NAME, LEGACY_REFRESH_COOKIE_PATH),
        (SECURE_FINGERPRINT_COOKIE, "/"),
        (DEV_FINGERPRINT_COOKIE, "/"),
    ];
    for (name, path) in cleared {
        if let Ok(cookie) = build_cookie(config, name, "", path, 0) {
            headers.append(SET_COOKIE, cookie);
        }
    }
    headers
}

fn build_cookie(
    config: &AuthConfig,
    name: &str,
    value: &str,
    path: &str,
    max_age: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={value}; Path={path}; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if config.secure_cookies() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::state::Environment;
    use secrecy::SecretString;

    fn config(secure: bool) -> AuthConfig {
        AuthConfig::new(
            SecretString::from("YW4tZXhhbXBsZS0yNTYtYml0LXNpZ25pbmcta2V5ISE="),
            Environment::Development,
        )
        .with_secure_cookies(secure)
    }

    fn cookie_strings(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn session_cookies_carry_expected_attributes() {
        let pair = fingerprint::generate_pair();
        let headers =
            session_cookies(&config(true), "session-jwt", "refresh-opaque", &pair).unwrap();
        let cookies = cookie_strings(&headers);
        assert_eq!(cookies.len(), 3);

        let auth = &cookies[0];
        assert!(auth.starts_with("auth_token=session-jwt; Path=/;"));
        assert!(auth.contains("HttpOnly"));
        assert!(auth.contains("SameSite=Lax"));
        assert!(auth.contains("Max-Age=1800"));
        assert!(auth.contains("Secure"));

        let refresh = &cookies[1];
        assert!(refresh.starts_with("refresh_token=refresh-opaque; Path=/api/auth;"));
        assert!(refresh.contains("Max-Age=604800"));

        let fgp = &cookies[2];
        assert!(fgp.starts_with("__Secure-Fgp="));
        assert!(fgp.contains("Max-Age=1800"));
    }

    #[test]
    fn dev_deployment_uses_plain_fingerprint_cookie() {
        let pair = fingerprint::generate_pair();
        let headers = session_cookies(&config(false), "t", "r", &pair).unwrap();
        let cookies = cookie_strings(&headers);
        assert!(cookies[2].starts_with("Fgp="));
        assert!(cookies.iter().all(|c| !c.contains("Secure")));
    }

    #[test]
    fn logout_clears_both_refresh_paths_and_both_fingerprints() {
        let cookies = cookie_strings(&clear_session_cookies(&config(true)));
        assert_eq!(cookies.len(), 5);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
        assert!(cookies
            .iter()
            .any(|c| c.starts_with("refresh_token=; Path=/api/auth;")));
        assert!(cookies
            .iter()
            .any(|c| c.starts_with("refresh_token=; Path=/api/auth/refresh;")));
        assert!(cookies.iter().any(|c| c.starts_with("__Secure-Fgp=")));
        assert!(cookies.iter().any(|c| c.starts_with("Fgp=")));
    }
}
