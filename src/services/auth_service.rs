use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::{OsRng, RngCore};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    dto::auth::{
        Claims, LoginResponse, OtpLoginRequest, OtpRequested, OtpResendRequest, OtpVerifyRequest,
    },
    error::{AppError, AppResult},
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

const INVALID_OTP: &str = "Invalid OTP";
/// Guesses allowed against one issued code before it is discarded.
pub const MAX_OTP_ATTEMPTS: i32 = 5;

/// Delivers one-time codes to users.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Writes the code to the log. Used until a mail transport is configured.
pub struct LogOtpSender;

#[async_trait]
impl OtpSender for LogOtpSender {
    async fn send(&self, email: &str, code: &str) -> anyhow::Result<()> {
        tracing::info!(email, code, "one-time code issued");
        Ok(())
    }
}

#[derive(FromRow)]
struct ClaimedAttempt {
    code_hash: String,
    attempts: i32,
}

pub fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && email.len() <= 255 =>
        {
            Ok(email)
        }
        _ => Err(AppError::validation("Enter a valid email address")),
    }
}

pub fn generate_code() -> String {
    format!("{:04}", OsRng.next_u32() % 10_000)
}

fn hash_code(code: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn code_matches(code: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(code.trim().as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    role: &str,
    ttl: chrono::Duration,
) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

async fn find_user_by_email(state: &AppState, email: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&state.pool)
        .await?;
    Ok(user)
}

async fn create_user(state: &AppState, email: &str, username: Option<&str>) -> AppResult<User> {
    let username = username.map(str::trim).unwrap_or_default();
    if username.is_empty() {
        return Err(AppError::validation("Username is required for new accounts"));
    }
    if username.chars().count() > 150 {
        return Err(AppError::validation("Username must be at most 150 characters"));
    }

    let taken: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(&state.pool)
        .await?;
    if taken.is_some() {
        return Err(AppError::validation("Username is already taken"));
    }

    let user: User = sqlx::query_as(
        "INSERT INTO users (id, email, username) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(username)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user_id = %user.id, "user registered");
    audit::record(
        &state.pool,
        user.id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(user)
}

/// Generate a fresh code, persist only its hash and hand the plain code to
/// the sender. A newer code replaces any pending one and resets its attempts.
async fn issue_otp(state: &AppState, email: &str) -> AppResult<OtpRequested> {
    let code = generate_code();
    let code_hash = hash_code(&code)?;
    let ttl = chrono::Duration::from_std(state.auth.otp_ttl)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    sqlx::query("DELETE FROM otp_codes WHERE expires_at <= now()")
        .execute(&state.pool)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO otp_codes (email, code_hash, attempts, expires_at)
        VALUES ($1, $2, 0, $3)
        ON CONFLICT (email) DO UPDATE
        SET code_hash = EXCLUDED.code_hash,
            attempts = 0,
            expires_at = EXCLUDED.expires_at,
            created_at = now()
        "#,
    )
    .bind(email)
    .bind(code_hash)
    .bind(Utc::now() + ttl)
    .execute(&state.pool)
    .await?;

    state
        .otp_sender
        .send(email, &code)
        .await
        .map_err(AppError::Internal)?;

    Ok(OtpRequested {
        email: email.to_string(),
        expires_in_secs: state.auth.otp_ttl.as_secs(),
    })
}

/// Count one guess against the live code for `email` before checking it.
/// Returns `None` once the code is gone, expired or out of attempts.
async fn claim_attempt(state: &AppState, email: &str) -> AppResult<Option<ClaimedAttempt>> {
    let claimed = sqlx::query_as::<_, ClaimedAttempt>(
        r#"
        UPDATE otp_codes
        SET attempts = attempts + 1
        WHERE email = $1 AND expires_at > now() AND attempts < $2
        RETURNING code_hash, attempts
        "#,
    )
    .bind(email)
    .bind(MAX_OTP_ATTEMPTS)
    .fetch_optional(&state.pool)
    .await?;
    Ok(claimed)
}

/// Delete the exact code that was checked. Only one caller can win this.
async fn consume_code(state: &AppState, email: &str, code_hash: &str) -> AppResult<bool> {
    let deleted = sqlx::query("DELETE FROM otp_codes WHERE email = $1 AND code_hash = $2")
        .bind(email)
        .bind(code_hash)
        .execute(&state.pool)
        .await?;
    Ok(deleted.rows_affected() == 1)
}

pub async fn request_otp(
    state: &AppState,
    payload: OtpLoginRequest,
) -> AppResult<ApiResponse<OtpRequested>> {
    let email = normalize_email(&payload.email)?;

    if find_user_by_email(state, &email).await?.is_none() {
        create_user(state, &email, payload.username.as_deref()).await?;
    }

    let requested = issue_otp(state, &email).await?;
    Ok(ApiResponse::success(
        "OTP sent to your email",
        requested,
        Some(Meta::empty()),
    ))
}

pub async fn resend_otp(
    state: &AppState,
    payload: OtpResendRequest,
) -> AppResult<ApiResponse<OtpRequested>> {
    let email = normalize_email(&payload.email)?;
    if find_user_by_email(state, &email).await?.is_none() {
        return Err(AppError::validation(
            "Unable to resend OTP. Please start the login again.",
        ));
    }

    let requested = issue_otp(state, &email).await?;
    Ok(ApiResponse::success(
        "A new OTP has been sent to your email",
        requested,
        Some(Meta::empty()),
    ))
}

/// Check the submitted code against the pending hash. Every guess is
/// counted before it is checked; a code dies after `MAX_OTP_ATTEMPTS`
/// guesses or its first successful use.
pub async fn verify_otp(
    state: &AppState,
    payload: OtpVerifyRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let email = normalize_email(&payload.email)?;

    let Some(claimed) = claim_attempt(state, &email).await? else {
        return Err(AppError::validation(INVALID_OTP));
    };
    if !code_matches(&payload.otp, &claimed.code_hash) {
        tracing::debug!(email = %email, attempts = claimed.attempts, "otp mismatch");
        if claimed.attempts >= MAX_OTP_ATTEMPTS {
            tracing::warn!(email = %email, "otp attempts exhausted, code discarded");
            consume_code(state, &email, &claimed.code_hash).await?;
        }
        return Err(AppError::validation(INVALID_OTP));
    }
    if !consume_code(state, &email, &claimed.code_hash).await? {
        return Err(AppError::validation(INVALID_OTP));
    }

    let user = find_user_by_email(state, &email)
        .await?
        .ok_or(AppError::NotFound)?;
    let token = issue_token(
        &state.auth.jwt_secret,
        user.id,
        &user.role,
        state.auth.token_ttl,
    )?;

    audit::record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse { token },
        Some(Meta::empty()),
    ))
}
