//! Request authenticator.
//!
//! Runs on every request, fails closed: any rejection leaves the request
//! anonymous instead of returning an error, and downstream handlers decide
//! what anonymous callers may do.

use axum::{
    extract::Request,
    http::{
        header::{AUTHORIZATION, COOKIE},
        HeaderMap,
    },
    middleware::Next,
    response::Response,
    Extension,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{
    fingerprint::{self, extract_fingerprint},
    session::AUTH_COOKIE_NAME,
    state::AuthState,
    storage::{lookup_principal, Principal},
    token::{Claims, TokenUse, Verification},
};

/// Authenticated principal, inserted into request extensions when the
/// presented token passes every check.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Principal);

pub async fn authenticate(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(principal) = resolve_principal(&pool, &auth_state, request.headers()).await {
        request.extensions_mut().insert(CurrentUser(principal));
    }
    next.run(request).await
}

async fn resolve_principal(
    pool: &PgPool,
    auth_state: &AuthState,
    headers: &HeaderMap,
) -> Option<Principal> {
    let token = extract_token(headers)?;

    let claims = match auth_state.issuer().verify(&token) {
        Verification::Valid(claims) => claims,
        Verification::Expired => {
            debug!("token rejected: expired");
            return None;
        }
        Verification::Forged => {
            debug!("token rejected: malformed or forged");
            return None;
        }
    };

    let fingerprint_cookie = extract_fingerprint(headers);
    if !fingerprint_allows(
        &claims,
        fingerprint_cookie.as_deref(),
        auth_state.config().allow_unfingerprinted_sessions(),
    ) {
        return None;
    }

    match lookup_principal(pool, &claims.sub).await {
        Ok(Some(principal)) => Some(principal),
        Ok(None) => {
            debug!("token rejected: subject has no matching account");
            None
        }
        Err(error) => {
            error!("Failed to lookup principal: {error}");
            None
        }
    }
}

/// Fingerprint policy by token kind.
///
/// Session tokens carry a fingerprint hash and the matching raw cookie must
/// be present. API tokens must not carry a fingerprint at all. Sessions
/// without a hash are only accepted when the deployment opted in.
pub(super) fn fingerprint_allows(
    claims: &Claims,
    fingerprint_cookie: Option<&str>,
    allow_unfingerprinted: bool,
) -> bool {
    match claims.token_use {
        TokenUse::Api => {
            if claims.fph.is_some() {
                warn!("token rejected: api token carries a fingerprint claim");
                false
            } else {
                true
            }
        }
        TokenUse::Session => match claims.fph.as_deref() {
            None => {
                if allow_unfingerprinted {
                    true
                } else {
                    warn!("token rejected: session token has no fingerprint claim");
                    false
                }
            }
            Some("") => {
                warn!("token rejected: session token has an empty fingerprint claim");
                false
            }
            Some(hash) => match fingerprint_cookie {
                None => {
                    warn!("token rejected: fingerprint cookie missing");
                    false
                }
                Some(raw) => {
                    let matched = fingerprint::verify(raw, hash);
                    if !matched {
                        warn!("token rejected: fingerprint mismatch");
                    }
                    matched
                }
            },
        },
    }
}

/// Extract a token, preferring the session cookie over the header so a
/// stale Authorization header cannot shadow a fresh browser session.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, AUTH_COOKIE_NAME).or_else(|| extract_bearer_token(headers))
}

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub(super) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let Some(key) = parts.next() else { continue };
        let Some(val) = parts.next() else { continue };
        if key.trim() == name {
            return Some(val.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::fingerprint::generate_pair;
    use crate::api::handlers::auth::token::{AUDIENCE, ISSUER};
    use chrono::Utc;

    fn claims(token_use: TokenUse, fph: Option<&str>) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: "alice".to_string(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            iat: now,
            exp: now + 1800,
            jti: "jti".to_string(),
            token_use,
            fph: fph.map(ToString::to_string),
        }
    }

    #[test]
    fn session_with_matching_fingerprint_passes() {
        let pair = generate_pair();
        let claims = claims(TokenUse::Session, Some(&pair.hashed));
        assert!(fingerprint_allows(&claims, Some(&pair.raw), false));
    }

    #[test]
    fn session_with_wrong_fingerprint_fails() {
        let pair = generate_pair();
        let other = generate_pair();
        let claims = claims(TokenUse::Session, Some(&pair.hashed));
        assert!(!fingerprint_allows(&claims, Some(&other.raw), false));
    }

    #[test]
    fn session_without_cookie_fails() {
        let pair = generate_pair();
        let claims = claims(TokenUse::Session, Some(&pair.hashed));
        assert!(!fingerprint_allows(&claims, None, false));
    }

    #[test]
    fn session_with_empty_claim_fails_even_when_permissive() {
        let claims = claims(TokenUse::Session, Some(""));
        assert!(!fingerprint_allows(&claims, None, true));
        assert!(!fingerprint_allows(&claims, Some("anything"), true));
    }

    #[test]
    fn unfingerprinted_session_needs_opt_in() {
        let claims = claims(TokenUse::Session, None);
        assert!(!fingerprint_allows(&claims, None, false));
        assert!(fingerprint_allows(&claims, None, true));
    }

    #[test]
    fn api_token_must_not_carry_fingerprint() {
        let clean = claims(TokenUse::Api, None);
        assert!(fingerprint_allows(&clean, None, false));

        let pair = generate_pair();
        let tainted = claims(TokenUse::Api, Some(&pair.hashed));
        assert!(!fingerprint_allows(&tainted, Some(&pair.raw), false));
    }

    #[test]
    fn cookie_beats_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "auth_token=from-cookie".parse().unwrap());
        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn bearer_fallback_when_cookie_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn empty_bearer_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());
        assert!(extract_token(&headers).is_none());
    }

    #[test]
    fn cookie_value_parses_multiple_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            "a=1; auth_token=tok; malformed; b=2".parse().unwrap(),
        );
        assert_eq!(
            cookie_value(&headers, AUTH_COOKIE_NAME).as_deref(),
            Some("tok")
        );
        assert_eq!(cookie_value(&headers, "b").as_deref(), Some("2"));
        assert!(cookie_value(&headers, "missing").is_none());
    }
}
