use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::auth::{hash_password, verify_password, Claims, Role, TokenService};
use crate::database::models::{NewUser, PasswordReset, User};
use crate::database::Store;
use crate::error::{ApiError, FieldErrors};
use crate::services::mailer::{reset_link, Mailer, ResetNotice};
use crate::validation::{rules, validate, RawInput};

const RESET_TOKEN_LEN: usize = 64;

const UNKNOWN_EMAIL: &str = "We can't find a user with that email address.";
const INVALID_RESET_TOKEN: &str = "This password reset token is invalid.";

/// A freshly signed bearer token for `user`.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub user: User,
    pub token: String,
    pub claims: Claims,
}

/// Registration, login/logout and the password reset flow.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    tokens: TokenService,
    mailer: Arc<dyn Mailer>,
    app_url: String,
    reset_expiry: Duration,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn Store>,
        tokens: TokenService,
        mailer: Arc<dyn Mailer>,
        app_url: impl Into<String>,
        reset_expiry_minutes: i64,
    ) -> Self {
        Self {
            store,
            tokens,
            mailer,
            app_url: app_url.into(),
            reset_expiry: Duration::minutes(reset_expiry_minutes),
        }
    }

    /// New accounts get the Reader role.
    pub async fn register(&self, input: RawInput) -> Result<IssuedToken, ApiError> {
        let validated = validate(rules::REGISTER, input, &*self.store).await?;
        let name = validated.string("name").unwrap_or_default();
        let email = validated.string("email").unwrap_or_default();
        let password = validated.string("password").unwrap_or_default();

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ApiError::validation(FieldErrors::from([(
                "email".to_string(),
                vec!["The email has already been taken.".to_string()],
            )])));
        }

        let user = self.create_user(&name, &email, &password, Role::Reader).await?;
        self.issue(user)
    }

    pub async fn create_user(&self, name: &str, email: &str, password: &str, role: Role) -> Result<User, ApiError> {
        let password_hash = hash_password(password)?;
        let user = self
            .store
            .insert_user(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await?;
        self.store.assign_role(user.id, role).await?;
        tracing::info!(user_id = user.id, role = role.as_str(), "user registered");
        Ok(user)
    }

    pub async fn login(&self, input: RawInput) -> Result<IssuedToken, ApiError> {
        let validated = validate(rules::LOGIN, input, &*self.store).await?;
        let email = validated.str("email").unwrap_or_default();
        let password = validated.str("password").unwrap_or_default();

        let user = match self.store.find_user_by_email(email).await? {
            Some(user) if verify_password(password, &user.password_hash)? => user,
            _ => {
                tracing::warn!(email, "login refused");
                return Err(ApiError::unauthenticated("Invalid credentials"));
            }
        };

        self.issue(user)
    }

    /// Revokes the token until it would have expired anyway.
    pub async fn logout(&self, claims: &Claims) -> Result<(), ApiError> {
        self.store.revoke_token(claims.jti, claims.expires_at()).await?;
        tracing::info!(user_id = claims.sub, jti = %claims.jti, "token revoked");
        Ok(())
    }

    pub async fn forgot_password(&self, input: RawInput) -> Result<(), ApiError> {
        let validated = validate(rules::FORGOT_PASSWORD, input, &*self.store).await?;
        let email = validated.str("email").unwrap_or_default();

        let Some(user) = self.store.find_user_by_email(email).await? else {
            return Err(ApiError::bad_request("email", UNKNOWN_EMAIL));
        };

        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RESET_TOKEN_LEN)
            .map(char::from)
            .collect();

        self.store
            .put_password_reset(PasswordReset {
                email: user.email.clone(),
                token_hash: digest(&token),
                created_at: Utc::now(),
            })
            .await?;

        let notice = ResetNotice {
            link: reset_link(&self.app_url, &token, &user.email),
            email: user.email,
            token,
        };
        self.mailer.send_password_reset(notice).await.map_err(|e| {
            tracing::error!("Failed to send password reset: {}", e);
            ApiError::internal_server_error("Failed to send password reset link")
        })?;

        Ok(())
    }

    pub async fn reset_password(&self, input: RawInput) -> Result<(), ApiError> {
        let validated = validate(rules::RESET_PASSWORD, input, &*self.store).await?;
        let email = validated.str("email").unwrap_or_default();
        let token = validated.str("token").unwrap_or_default();
        let password = validated.str("password").unwrap_or_default();

        let invalid = || ApiError::bad_request("email", INVALID_RESET_TOKEN);

        let user = self.store.find_user_by_email(email).await?.ok_or_else(invalid)?;
        let reset = self
            .store
            .find_password_reset(&user.email)
            .await?
            .ok_or_else(invalid)?;

        if reset.token_hash != digest(token) {
            tracing::warn!(user_id = user.id, "password reset with wrong token");
            return Err(invalid());
        }
        if reset.created_at + self.reset_expiry < Utc::now() {
            tracing::warn!(user_id = user.id, "password reset with expired token");
            return Err(invalid());
        }

        self.store.update_password(user.id, &hash_password(password)?).await?;
        self.store.delete_password_reset(&user.email).await?;
        tracing::info!(user_id = user.id, "password reset");
        Ok(())
    }

    fn issue(&self, user: User) -> Result<IssuedToken, ApiError> {
        let (token, claims) = self.tokens.issue(user.id)?;
        Ok(IssuedToken { user, token, claims })
    }
}

fn digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}
