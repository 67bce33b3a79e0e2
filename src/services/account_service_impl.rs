//! `SeaORM` implementation of the `AccountService` trait.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::repositories::user::{
    generate_token, hash_password_blocking, verify_password_blocking,
};
use crate::db::{NewUser, Store, User};
use crate::domain::email::{domain_is_blocked, email_domain, is_valid_email, normalize_email};
use crate::domain::forms::{FormErrors, REQUIRED};
use crate::mail::{EmailMessage, Mailer};
use crate::services::account_service::{
    AccountError, AccountService, MSG_BLOCKED_EMAIL, MSG_DUPLICATE_EMAIL, MSG_INVALID_EMAIL,
    MSG_PASSWORD_MISMATCH, RegistrationInput,
};
use crate::templates::Templates;

pub struct SeaOrmAccountService {
    store: Store,
    config: Arc<RwLock<Config>>,
    mailer: Arc<dyn Mailer>,
    templates: Arc<Templates>,
}

impl SeaOrmAccountService {
    #[must_use]
    pub fn new(
        store: Store,
        config: Arc<RwLock<Config>>,
        mailer: Arc<dyn Mailer>,
        templates: Arc<Templates>,
    ) -> Self {
        Self {
            store,
            config,
            mailer,
            templates,
        }
    }

    async fn validate_registration(
        &self,
        input: &RegistrationInput,
        config: &Config,
    ) -> Result<(), AccountError> {
        let mut errors = FormErrors::new();

        let email = errors.require("email", &input.email).to_lowercase();
        errors.require_line("first_name", &input.first_name);
        errors.require_line("last_name", &input.last_name);

        if input.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if input.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        if !input.agreed_to_tos {
            errors.add("agreed_to_tos", REQUIRED);
        }

        if !email.is_empty() {
            if is_valid_email(&email) {
                let blocked = self.store.list_blocked_domains().await?;
                let domain = email_domain(&email).unwrap_or_default();

                if domain_is_blocked(&domain, &blocked) {
                    errors.add("email", MSG_BLOCKED_EMAIL);
                } else if self
                    .store
                    .normalized_email_exists(&normalize_email(&email))
                    .await?
                {
                    errors.add("email", MSG_DUPLICATE_EMAIL);
                }
            } else {
                errors.add("email", MSG_INVALID_EMAIL);
            }
        }

        let min_length = config.accounts.min_password_length;
        if !input.password1.is_empty() && input.password1.chars().count() < min_length {
            errors.add(
                "password1",
                format!(
                    "This password is too short. It must contain at least {min_length} characters."
                ),
            );
        }
        if !input.password1.is_empty()
            && !input.password2.is_empty()
            && input.password1 != input.password2
        {
            errors.add("password2", MSG_PASSWORD_MISMATCH);
        }

        errors.into_result().map_err(AccountError::Validation)
    }

    async fn send_verification_email(
        &self,
        user: &User,
        nonce: &str,
        config: &Config,
    ) -> Result<(), AccountError> {
        let verify_url = format!(
            "{}/user/verify-user/{}/{}/",
            config.base_url(),
            user.id,
            nonce
        );
        let body = self.templates.render_email(
            "verify_address",
            &json!({
                "first_name": user.first_name,
                "verify_url": verify_url,
                "resend_url": format!("{}/user/resend-verification/", config.base_url()),
            }),
        )?;

        self.mailer
            .send(EmailMessage::new(
                &config.mail.from_address,
                vec![user.email.clone()],
                "Caselaw Access Project: Verify your email address",
                body,
            ))
            .await?;

        Ok(())
    }
}

#[async_trait]
impl AccountService for SeaOrmAccountService {
    async fn register(&self, input: RegistrationInput) -> Result<User, AccountError> {
        let config = self.config.read().await.clone();

        self.validate_registration(&input, &config).await?;

        let password_hash = hash_password_blocking(&input.password1, &config.security).await?;
        let nonce = generate_token();
        let email = input.email.trim().to_lowercase();

        let new_user = NewUser {
            normalized_email: normalize_email(&email),
            email,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            agreed_to_tos: input.agreed_to_tos,
            activation_nonce: Some(nonce.clone()),
            nonce_expires: Some(
                Utc::now() + Duration::hours(config.accounts.verification_nonce_hours),
            ),
        };

        let user = match self.store.create_user(new_user.clone(), password_hash).await {
            Ok(user) => user,
            Err(e) => {
                // Lost a race with a concurrent registration of the same address
                if self
                    .store
                    .normalized_email_exists(&new_user.normalized_email)
                    .await?
                {
                    let mut errors = FormErrors::new();
                    errors.add("email", MSG_DUPLICATE_EMAIL);
                    return Err(AccountError::Validation(errors));
                }
                return Err(e.into());
            }
        };

        self.send_verification_email(&user, &nonce, &config).await?;

        metrics::counter!("accounts_registered_total").increment(1);
        info!(user_id = user.id, "Registered new user");

        Ok(user)
    }

    async fn verify_email(&self, user_id: i32, nonce: &str) -> Result<User, AccountError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AccountError::InvalidVerificationLink)?;

        let now = Utc::now();
        let nonce_matches = user.activation_nonce.as_deref() == Some(nonce);
        let nonce_live = user.nonce_expires.is_some_and(|expires| expires > now);

        if user.email_verified || user.deactivated_by_user || !nonce_matches || !nonce_live {
            warn!(user_id, "Rejected verification link");
            return Err(AccountError::InvalidVerificationLink);
        }

        let allowance = self.config.read().await.accounts.daily_case_allowance;
        let user = self.store.mark_user_verified(user_id, allowance).await?;
        self.store.ensure_api_key(user_id).await?;

        info!(user_id, "Verified email address");
        Ok(user)
    }

    async fn resend_verification(&self, email: &str) -> Result<(), AccountError> {
        let Some(user) = self.store.get_user_by_email(email).await? else {
            return Ok(());
        };
        if user.email_verified || user.deactivated_by_user {
            return Ok(());
        }

        let config = self.config.read().await.clone();
        let now = Utc::now();

        // Re-send the same link while it is still valid
        let nonce = match (&user.activation_nonce, user.nonce_expires) {
            (Some(nonce), Some(expires)) if expires > now => nonce.clone(),
            _ => {
                let nonce = generate_token();
                let expires = now + Duration::hours(config.accounts.verification_nonce_hours);
                self.store
                    .set_activation_nonce(user.id, &nonce, expires)
                    .await?;
                nonce
            }
        };

        self.send_verification_email(&user, &nonce, &config).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let Some((user, password_hash)) = self.store.get_user_with_password(email).await? else {
            metrics::counter!("logins_total", "outcome" => "invalid").increment(1);
            return Err(AccountError::InvalidCredentials);
        };

        if !verify_password_blocking(password, &password_hash).await? || user.deactivated_by_user
        {
            metrics::counter!("logins_total", "outcome" => "invalid").increment(1);
            return Err(AccountError::InvalidCredentials);
        }

        if !user.email_verified {
            metrics::counter!("logins_total", "outcome" => "unverified").increment(1);
            return Err(AccountError::EmailNotVerified);
        }

        metrics::counter!("logins_total", "outcome" => "success").increment(1);
        Ok(user)
    }

    async fn active_user(&self, user_id: i32) -> Result<Option<User>, AccountError> {
        let user = self.store.get_user(user_id).await?;
        Ok(user.filter(|u| !u.deactivated_by_user))
    }

    async fn api_key(&self, user_id: i32) -> Result<Option<String>, AccountError> {
        Ok(self.store.get_api_key(user_id).await?)
    }

    async fn rotate_api_key(&self, user_id: i32) -> Result<String, AccountError> {
        let user = self
            .active_user(user_id)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        let new_key = self.store.rotate_api_key(user_id).await?;

        let config = self.config.read().await.clone();
        let body = self.templates.render_email(
            "api_key_reset",
            &json!({
                "first_name": user.first_name,
                "reset_at": Utc::now().format("%B %-d, %Y %H:%M UTC").to_string(),
                "details_url": format!("{}/user/details", config.base_url()),
            }),
        )?;
        self.mailer
            .send(EmailMessage::new(
                &config.mail.from_address,
                vec![user.email.clone()],
                "Your Case.law API key has been reset",
                body,
            ))
            .await?;

        info!(user_id, "API key rotated");
        Ok(new_key)
    }

    async fn deactivate(&self, user_id: i32) -> Result<(), AccountError> {
        if self.active_user(user_id).await?.is_none() {
            return Err(AccountError::UserNotFound);
        }

        self.store.deactivate_user(user_id, Utc::now()).await?;
        self.store.delete_api_key(user_id).await?;

        info!(user_id, "Account deactivated by user");
        Ok(())
    }
}
