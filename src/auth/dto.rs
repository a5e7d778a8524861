use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, FieldErrors};
use crate::store::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// OAuth2 password-flow form. `username` carries the email.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[async_trait]
impl<S> FromRequest<S> for LoginForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if !is_multipart {
            let Form(form) = Form::<LoginForm>::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(FieldErrors::single("body", e.body_text())))?;
            return Ok(form);
        }

        let mut mp = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(FieldErrors::single("body", e.body_text())))?;

        let mut username = None;
        let mut password = None;
        loop {
            let field = match mp.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    return Err(AppError::Validation(FieldErrors::single("body", e.body_text())))
                }
            };
            let name = field.name().map(|s| s.to_string());
            let slot = match name.as_deref() {
                Some("username") => &mut username,
                Some("password") => &mut password,
                _ => continue,
            };
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(FieldErrors::single("body", e.body_text())))?;
            *slot = Some(text);
        }

        let mut errors = FieldErrors::new();
        if username.is_none() {
            errors.add("username", "field required");
        }
        if password.is_none() {
            errors.add("password", "field required");
        }
        errors.into_result().map_err(AppError::Validation)?;

        Ok(LoginForm {
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
        })
    }
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer",
        }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_active: true,
        }
    }
}
