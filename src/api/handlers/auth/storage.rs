//! Database helpers for refresh credentials and principals.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use sqlx::{PgPool, Row};
use tracing::{debug, Instrument};
use uuid::Uuid;

const REFRESH_TOKEN_BYTES: usize = 32;

/// Account data attached to authenticated requests.
#[derive(Clone, Debug)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
}

/// Principal plus the stored password hash, only used by login flows.
pub(super) struct LoginPrincipal {
    pub(super) principal: Principal,
    pub(super) password_hash: String,
}

/// One refresh credential row. The opaque token is random, not derived from
/// any session token.
#[derive(Clone, Debug)]
pub struct RefreshCredential {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

impl RefreshCredential {
    /// Usable means not revoked and not yet expired.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }

    /// Factory for expiry tests. Expired rows cannot be created through
    /// [`create_refresh_credential`], which always sets a future expiry.
    #[cfg(test)]
    pub(crate) fn expired_for_tests(user_id: Uuid, token: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token: token.to_string(),
            expires_at: now - chrono::Duration::hours(1),
            revoked: false,
            created_at: now - chrono::Duration::hours(2),
            version: 0,
        }
    }
}

/// A rotated credential together with its owner.
pub struct RotatedCredential {
    pub credential: RefreshCredential,
    pub principal: Principal,
}

#[must_use]
pub(super) fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Create a fresh refresh credential for the user, revoking every other
/// active credential in the same transaction (single active session).
///
/// # Errors
/// Returns an error on database failure, a non-positive TTL, or if a unique
/// token could not be generated.
pub async fn create_refresh_credential(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<RefreshCredential> {
    if ttl_seconds <= 0 {
        return Err(anyhow!("refresh credential TTL must be positive"));
    }

    let mut tx = pool.begin().await.context("begin refresh credential transaction")?;

    let query = r"
        UPDATE refresh_tokens
        SET revoked = TRUE, version = version + 1
        WHERE user_id = $1 AND revoked = FALSE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let revoked = sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to revoke previous refresh credentials")?;

    if revoked.rows_affected() > 0 {
        debug!(
            "revoked {} previous refresh credentials for user {user_id}",
            revoked.rows_affected()
        );
    }

    let query = r"
        INSERT INTO refresh_tokens (user_id, token, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        RETURNING id, expires_at, created_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_refresh_token();
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(&token)
            .bind(ttl_seconds)
            .fetch_one(&mut *tx)
            .instrument(span.clone())
            .await;

        match result {
            Ok(row) => {
                tx.commit()
                    .await
                    .context("commit refresh credential transaction")?;
                return Ok(RefreshCredential {
                    id: row.get("id"),
                    user_id,
                    token,
                    expires_at: row.get("expires_at"),
                    revoked: false,
                    created_at: row.get("created_at"),
                    version: 0,
                });
            }
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert refresh credential"),
        }
    }

    Err(anyhow!("failed to generate unique refresh token"))
}

/// Atomically consume a refresh credential: the row is locked, checked, and
/// revoked inside one transaction so two concurrent requests with the same
/// token cannot both succeed.
///
/// Returns `None` for unknown, revoked, or expired tokens.
///
/// # Errors
/// Returns an error on database failure.
pub async fn validate_and_revoke_atomically(
    pool: &PgPool,
    token: &str,
) -> Result<Option<RotatedCredential>> {
    let mut tx = pool.begin().await.context("begin rotation transaction")?;

    let query = r"
        SELECT rt.id, rt.user_id, rt.expires_at, rt.revoked, rt.created_at, rt.version,
               u.username, u.email, u.role
        FROM refresh_tokens rt
        JOIN users u ON u.id = rt.user_id
        WHERE rt.token = $1
        FOR UPDATE OF rt
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lock refresh credential")?;

    let Some(row) = row else {
        tx.commit().await.context("commit rotation noop")?;
        return Ok(None);
    };

    let mut credential = RefreshCredential {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token: token.to_string(),
        expires_at: row.get("expires_at"),
        revoked: row.get("revoked"),
        created_at: row.get("created_at"),
        version: row.get("version"),
    };

    if !credential.is_valid_at(Utc::now()) {
        debug!("refresh credential rejected: revoked or expired");
        tx.commit().await.context("commit rotation noop")?;
        return Ok(None);
    }

    let query = r"
        UPDATE refresh_tokens
        SET revoked = TRUE, version = version + 1
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(credential.id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to revoke refresh credential")?;

    tx.commit().await.context("commit rotation transaction")?;

    // The caller sees the row as it stands after the update.
    credential.revoked = true;
    credential.version += 1;

    let principal = Principal {
        id: credential.user_id,
        username: row.get("username"),
        email: row.get("email"),
        role: row.get("role"),
    };

    Ok(Some(RotatedCredential {
        credential,
        principal,
    }))
}

/// Revoke a single credential by token. Idempotent; returns whether an
/// active row was revoked.
///
/// # Errors
/// Returns an error on database failure.
pub async fn revoke_refresh_credential(pool: &PgPool, token: &str) -> Result<bool> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked = TRUE, version = version + 1
        WHERE token = $1 AND revoked = FALSE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(token)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke refresh credential")?;
    Ok(result.rows_affected() > 0)
}

/// Revoke every active credential for a user.
///
/// # Errors
/// Returns an error on database failure.
pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked = TRUE, version = version + 1
        WHERE user_id = $1 AND revoked = FALSE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke refresh credentials for user")?;
    Ok(result.rows_affected())
}

/// Delete rows whose expiry is in the past. Revoked but unexpired rows are
/// kept for audit until they age out.
///
/// # Errors
/// Returns an error on database failure.
pub async fn delete_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64> {
    let query = "DELETE FROM refresh_tokens WHERE expires_at < $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(now)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete expired refresh credentials")?;
    Ok(result.rows_affected())
}

/// Look up a principal and password hash by username (login flows).
pub(super) async fn lookup_login_principal(
    pool: &PgPool,
    username: &str,
) -> Result<Option<LoginPrincipal>> {
    let query = r"
        SELECT id, username, email, role, password_hash
        FROM users
        WHERE username = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup login principal")?;

    Ok(row.map(|row| LoginPrincipal {
        principal: Principal {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            role: row.get("role"),
        },
        password_hash: row.get("password_hash"),
    }))
}

/// Look up a principal by username (token subjects).
pub async fn lookup_principal(pool: &PgPool, username: &str) -> Result<Option<Principal>> {
    let query = r"
        SELECT id, username, email, role
        FROM users
        WHERE username = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup principal")?;

    Ok(row.map(|row| Principal {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        role: row.get("role"),
    }))
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
