use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::jwt::JwtKeys;
use super::password::{hash_password, verify_password};
use crate::config::SeedUser;
use crate::error::{AppError, FieldErrors};
use crate::store::{StoreError, User, UserRepository};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();

    /// Verified against when the email is unknown so both login failures cost
    /// one Argon2 run.
    static ref DUMMY_HASH: String = hash_password("not-a-real-password").unwrap_or_default();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Argon2 is CPU bound; keep it off the async workers.
async fn hash_blocking(password: String) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("hash task panicked")??;
    Ok(hash)
}

/// `None` verifies against `DUMMY_HASH`, which is also first built here.
async fn verify_blocking(password: String, hash: Option<String>) -> Result<bool, AppError> {
    let ok = tokio::task::spawn_blocking(move || match &hash {
        Some(hash) => verify_password(&password, hash),
        None => verify_password(&password, &DUMMY_HASH),
    })
    .await
    .context("verify task panicked")?;
    Ok(ok)
}

/// Creates an account. The email is stored exactly as given.
pub async fn register<U>(users: &U, email: &str, password: &str) -> Result<User, AppError>
where
    U: UserRepository + ?Sized,
{
    let mut errors = FieldErrors::new();
    if !is_valid_email(email) {
        errors.add("email", "not a valid email address");
    }
    if password.is_empty() {
        errors.add("password", "must not be empty");
    }
    errors.into_result().map_err(AppError::Validation)?;

    let hash = hash_blocking(password.to_string()).await?;
    let user = users.create_user(email, &hash).await.map_err(|e| {
        if matches!(e, StoreError::Duplicate) {
            warn!(email = %email, "email already registered");
        }
        AppError::from(e)
    })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Checks credentials and issues an access token for the account.
pub async fn login<U>(
    users: &U,
    keys: &JwtKeys,
    email: &str,
    password: &str,
) -> Result<String, AppError>
where
    U: UserRepository + ?Sized,
{
    let user = users.find_user_by_email(email).await?;

    let stored = user.as_ref().map(|u| u.password_hash.clone());
    let ok = verify_blocking(password.to_string(), stored).await?;

    let user = match user {
        Some(u) if ok => u,
        Some(u) => {
            warn!(user_id = %u.id, "login invalid password");
            return Err(AppError::BadCredentials);
        }
        None => {
            warn!("login unknown email");
            return Err(AppError::BadCredentials);
        }
    };

    let token = keys.issue_access(&user.email)?;
    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

/// Makes sure the configured bootstrap account exists and accepts the
/// configured password.
pub async fn ensure_seed_user<U>(users: &U, seed: &SeedUser) -> anyhow::Result<()>
where
    U: UserRepository + ?Sized,
{
    match users.find_user_by_email(&seed.email).await? {
        Some(user) if verify_password(&seed.password, &user.password_hash) => {
            info!(email = %seed.email, "seed user present");
        }
        Some(user) => {
            let hash = hash_password(&seed.password)?;
            users.set_password_hash(user.id, &hash).await?;
            info!(email = %seed.email, "seed user password rotated");
        }
        None => {
            let hash = hash_password(&seed.password)?;
            users.create_user(&seed.email, &hash).await?;
            info!(email = %seed.email, "seed user created");
        }
    }
    Ok(())
}
