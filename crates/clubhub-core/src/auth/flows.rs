//! Sign-in, sign-up and account recovery against the backend.
//!
//! Successful login, signup or OAuth callback stores the returned credential
//! in the token store; logout always clears it, whether or not the backend
//! call succeeds.

use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::api::{ApiError, Backend, Method};
use crate::cache::SessionCache;
use crate::cooldown::Cooldown;
use crate::models::User;
use crate::sync::fetcher::decode_object;

use super::TokenStore;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(alias = "access_token")]
    token: String,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetForm {
    pub token: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

pub struct AuthFlows {
    backend: Arc<dyn Backend>,
    tokens: Arc<TokenStore>,
    cache: Arc<SessionCache>,
    resend_cooldown: Cooldown,
    reset_cooldown: Cooldown,
    cooldown_secs: u32,
}

impl AuthFlows {
    pub fn new(
        backend: Arc<dyn Backend>,
        tokens: Arc<TokenStore>,
        cache: Arc<SessionCache>,
        cooldown_secs: u32,
    ) -> Self {
        Self {
            backend,
            tokens,
            cache,
            resend_cooldown: Cooldown::new(),
            reset_cooldown: Cooldown::new(),
            cooldown_secs,
        }
    }

    pub fn resend_cooldown(&self) -> &Cooldown {
        &self.resend_cooldown
    }

    pub fn reset_cooldown(&self) -> &Cooldown {
        &self.reset_cooldown
    }

    fn accept(&self, value: Value) -> Result<Option<User>, ApiError> {
        let auth: AuthResponse = decode_object(value, None)?;
        self.tokens.set(auth.token);
        // A new identity must not see the previous one's collections.
        self.cache.clear();
        Ok(auth.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Option<User>, ApiError> {
        let body = json!({ "email": email, "password": password });
        let value = self
            .backend
            .send_json(Method::Post, "login", None, Some(&body))
            .await?;
        let user = self.accept(value)?;
        info!(email = %email, "Signed in");
        Ok(user)
    }

    pub async fn signup(&self, form: &SignupForm) -> Result<Option<User>, ApiError> {
        let body = serde_json::to_value(form)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode signup form: {}", e)))?;
        let value = self
            .backend
            .send_json(Method::Post, "register", None, Some(&body))
            .await?;
        let user = self.accept(value)?;
        info!(email = %form.email, "Account created");
        Ok(user)
    }

    /// Finish an OAuth redirect: the provider callback lands on a URL whose
    /// query carries `token` (or `error` on refusal).
    pub fn complete_oauth(&self, callback_url: &str) -> Result<(), ApiError> {
        let token = parse_oauth_callback(callback_url)?;
        self.tokens.set(token);
        self.cache.clear();
        info!("Signed in via OAuth");
        Ok(())
    }

    /// Sign out. The backend call is best-effort; local state is always cleared.
    pub async fn logout(&self) {
        if let Some(credential) = self.tokens.get() {
            if let Err(e) = self
                .backend
                .send_json(Method::Post, "logout", Some(credential.as_str()), None)
                .await
            {
                debug!(error = %e, "Logout request failed, clearing local session anyway");
            }
        }
        self.tokens.clear();
        self.cache.clear();
        self.resend_cooldown.cancel();
        self.reset_cooldown.cancel();
        info!("Signed out");
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        let credential = self.tokens.get().ok_or(ApiError::MissingCredential)?;
        let value = self
            .backend
            .get_json("user", Some(credential.as_str()))
            .await
            .map_err(|e| {
                if matches!(e, ApiError::Unauthorized) {
                    self.tokens.clear();
                }
                e
            })?;
        decode_object(value, Some("user"))
    }

    /// The cooldown is claimed before the request and released if it fails,
    /// so overlapping calls send at most one request.
    async fn throttled_post(&self, cooldown: &Cooldown, path: &str, body: Value) -> Result<(), ApiError> {
        cooldown
            .try_start(self.cooldown_secs)
            .map_err(ApiError::CooldownActive)?;
        let token = self.tokens.get();
        let result = self
            .backend
            .send_json(Method::Post, path, token.as_ref().map(|c| c.as_str()), Some(&body))
            .await;
        if let Err(e) = result {
            cooldown.cancel();
            return Err(e);
        }
        Ok(())
    }

    pub async fn resend_verification(&self, email: &str) -> Result<(), ApiError> {
        self.throttled_post(&self.resend_cooldown, "email/resend", json!({ "email": email }))
            .await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        self.throttled_post(&self.reset_cooldown, "forgot-password", json!({ "email": email }))
            .await
    }

    pub async fn reset_password(&self, form: &ResetForm) -> Result<(), ApiError> {
        let body = serde_json::to_value(form)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode reset form: {}", e)))?;
        self.backend
            .send_json(Method::Post, "reset-password", None, Some(&body))
            .await?;
        Ok(())
    }
}

/// Extract the credential from an OAuth callback URL.
pub fn parse_oauth_callback(callback_url: &str) -> Result<String, ApiError> {
    let url = Url::parse(callback_url)
        .map_err(|e| ApiError::InvalidResponse(format!("Invalid callback URL: {}", e)))?;

    let mut token = None;
    let mut error = None;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "token" | "access_token" if !value.is_empty() => token = Some(value.into_owned()),
            "error_description" => error = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match (token, error) {
        (Some(token), _) => Ok(token),
        (None, Some(error)) => Err(ApiError::AccessDenied(error)),
        (None, None) => Err(ApiError::InvalidResponse(
            "OAuth callback carried no token".to_string(),
        )),
    }
}
