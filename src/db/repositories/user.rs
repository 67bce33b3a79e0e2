use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, sea_query::Expr,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::domain::access::AccessProfile;
use crate::entities::users;

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub agreed_to_tos: bool,
    pub activation_nonce: Option<String>,
    pub nonce_expires: Option<DateTime<Utc>>,
    pub total_case_allowance: i32,
    pub case_allowance_remaining: i32,
    pub case_allowance_last_updated: DateTime<Utc>,
    pub unlimited_access: bool,
    pub unlimited_access_until: Option<DateTime<Utc>>,
    pub harvard_access: bool,
    pub is_contract_approver: bool,
    pub deactivated_by_user: bool,
    pub deactivated_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            email_verified: model.email_verified,
            agreed_to_tos: model.agreed_to_tos,
            activation_nonce: model.activation_nonce,
            nonce_expires: model.nonce_expires,
            total_case_allowance: model.total_case_allowance,
            case_allowance_remaining: model.case_allowance_remaining,
            case_allowance_last_updated: model.case_allowance_last_updated,
            unlimited_access: model.unlimited_access,
            unlimited_access_until: model.unlimited_access_until,
            harvard_access: model.harvard_access,
            is_contract_approver: model.is_contract_approver,
            deactivated_by_user: model.deactivated_by_user,
            deactivated_date: model.deactivated_date,
            created_at: model.created_at,
        }
    }
}

impl User {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    #[must_use]
    pub const fn access_profile(&self) -> AccessProfile {
        AccessProfile {
            user_id: self.id,
            email_verified: self.email_verified,
            unlimited_access: self.unlimited_access,
            unlimited_access_until: self.unlimited_access_until,
            total_case_allowance: self.total_case_allowance,
            case_allowance_remaining: self.case_allowance_remaining,
            case_allowance_last_updated: self.case_allowance_last_updated,
        }
    }

    #[must_use]
    pub fn unlimited_access_in_effect(&self, now: DateTime<Utc>) -> bool {
        self.access_profile().unlimited_access_in_effect(now)
    }
}

/// Fields needed to insert a freshly registered account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub normalized_email: String,
    pub first_name: String,
    pub last_name: String,
    pub agreed_to_tos: bool,
    pub activation_nonce: Option<String>,
    pub nonce_expires: Option<DateTime<Utc>>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    async fn find_model(&self, id: i32) -> Result<users::Model> {
        users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Get user by email (case-insensitive; addresses are stored lowercased)
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    /// Get user by email together with the password hash (for login)
    pub async fn get_by_email_with_password(&self, email: &str) -> Result<Option<(User, String)>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (User::from(u), password_hash)
        }))
    }

    pub async fn normalized_email_exists(&self, normalized: &str) -> Result<bool> {
        let user = users::Entity::find()
            .filter(users::Column::NormalizedEmail.eq(normalized))
            .one(&self.conn)
            .await
            .context("Failed to query user by normalized email")?;

        Ok(user.is_some())
    }

    pub async fn create(&self, new_user: NewUser, password_hash: String) -> Result<User> {
        let now = Utc::now();

        let active = users::ActiveModel {
            email: Set(new_user.email.trim().to_lowercase()),
            normalized_email: Set(new_user.normalized_email),
            password_hash: Set(password_hash),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            email_verified: Set(false),
            agreed_to_tos: Set(new_user.agreed_to_tos),
            activation_nonce: Set(new_user.activation_nonce),
            nonce_expires: Set(new_user.nonce_expires),
            total_case_allowance: Set(0),
            case_allowance_remaining: Set(0),
            case_allowance_last_updated: Set(now),
            unlimited_access: Set(false),
            unlimited_access_until: Set(None),
            harvard_access: Set(false),
            is_contract_approver: Set(false),
            deactivated_by_user: Set(false),
            deactivated_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    pub async fn set_activation_nonce(
        &self,
        id: i32,
        nonce: &str,
        expires: DateTime<Utc>,
    ) -> Result<()> {
        let mut active: users::ActiveModel = self.find_model(id).await?.into();
        active.activation_nonce = Set(Some(nonce.to_string()));
        active.nonce_expires = Set(Some(expires));
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;
        Ok(())
    }

    /// Mark the email verified, consume the nonce and grant the daily allowance.
    pub async fn mark_verified(&self, id: i32, daily_allowance: i32) -> Result<User> {
        let now = Utc::now();
        let mut active: users::ActiveModel = self.find_model(id).await?.into();
        active.email_verified = Set(true);
        active.activation_nonce = Set(None);
        active.nonce_expires = Set(None);
        active.total_case_allowance = Set(daily_allowance);
        active.case_allowance_remaining = Set(daily_allowance);
        active.case_allowance_last_updated = Set(now);
        active.updated_at = Set(now);
        let model = active.update(&self.conn).await?;
        Ok(User::from(model))
    }

    /// Use one unit of the daily case allowance, refilling the counter first
    /// when the last reset is more than a day old.
    ///
    /// Both steps are conditional updates, so concurrent requests never take
    /// the counter below zero. Returns what is left.
    pub async fn consume_case_allowance(&self, id: i32, now: DateTime<Utc>) -> Result<i32> {
        let txn = self.conn.begin().await?;

        users::Entity::update_many()
            .col_expr(
                users::Column::CaseAllowanceRemaining,
                Expr::col(users::Column::TotalCaseAllowance).into(),
            )
            .col_expr(users::Column::CaseAllowanceLastUpdated, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .filter(users::Column::CaseAllowanceLastUpdated.lte(now - Duration::hours(24)))
            .exec(&txn)
            .await
            .context("Failed to refill case allowance")?;

        users::Entity::update_many()
            .col_expr(
                users::Column::CaseAllowanceRemaining,
                Expr::col(users::Column::CaseAllowanceRemaining).sub(1),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .filter(users::Column::CaseAllowanceRemaining.gt(0))
            .exec(&txn)
            .await
            .context("Failed to consume case allowance")?;

        let model = users::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User {id} not found"))?;

        txn.commit().await?;
        Ok(model.case_allowance_remaining)
    }

    pub async fn grant_unlimited_access(&self, id: i32, until: DateTime<Utc>) -> Result<()> {
        let mut active: users::ActiveModel = self.find_model(id).await?.into();
        active.unlimited_access = Set(true);
        active.unlimited_access_until = Set(Some(until));
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn set_harvard_access(&self, id: i32, granted: bool) -> Result<()> {
        let mut active: users::ActiveModel = self.find_model(id).await?.into();
        active.harvard_access = Set(granted);
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn set_contract_approver(&self, id: i32, approver: bool) -> Result<()> {
        let mut active: users::ActiveModel = self.find_model(id).await?.into();
        active.is_contract_approver = Set(approver);
        active.updated_at = Set(Utc::now());
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn deactivate(&self, id: i32, now: DateTime<Utc>) -> Result<()> {
        let mut active: users::ActiveModel = self.find_model(id).await?.into();
        active.deactivated_by_user = Set(true);
        active.deactivated_date = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn list_contract_approvers(&self) -> Result<Vec<User>> {
        let rows = users::Entity::find()
            .filter(users::Column::IsContractApprover.eq(true))
            .filter(users::Column::DeactivatedByUser.eq(false))
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list contract approvers")?;

        Ok(rows.into_iter().map(User::from).collect())
    }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses default (high memory) params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Hash on the blocking pool; Argon2 would otherwise stall the runtime.
pub async fn hash_password_blocking(password: &str, config: &SecurityConfig) -> Result<String> {
    let password = password.to_string();
    let config = config.clone();
    task::spawn_blocking(move || hash_password(&password, Some(&config)))
        .await
        .context("Password hashing task panicked")?
}

pub async fn verify_password_blocking(password: &str, password_hash: &str) -> Result<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();

    task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

        Ok::<bool, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .context("Password verification task panicked")?
}

/// Generate a random 64 character hex string (API keys, verification nonces)
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
        }
    }

    #[tokio::test]
    async fn test_hash_and_verify_password() {
        let hash = hash_password_blocking("Password2", &fast_params())
            .await
            .unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password_blocking("Password2", &hash).await.unwrap());
        assert!(!verify_password_blocking("password2", &hash).await.unwrap());
    }

    async fn verified_user(allowance: i32) -> (crate::db::Store, User) {
        let store = crate::db::Store::new("sqlite::memory:").await.unwrap();
        let user = store
            .create_user(
                NewUser {
                    email: "counted@example.com".to_string(),
                    normalized_email: "counted@example.com".to_string(),
                    first_name: "Count".to_string(),
                    last_name: "Ed".to_string(),
                    agreed_to_tos: true,
                    activation_nonce: None,
                    nonce_expires: None,
                },
                "hash".to_string(),
            )
            .await
            .unwrap();
        let user = store.mark_user_verified(user.id, allowance).await.unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn allowance_never_goes_below_zero() {
        let (store, user) = verified_user(2).await;
        let now = Utc::now();

        assert_eq!(store.consume_case_allowance(user.id, now).await.unwrap(), 1);
        assert_eq!(store.consume_case_allowance(user.id, now).await.unwrap(), 0);
        assert_eq!(store.consume_case_allowance(user.id, now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn allowance_refills_after_a_day() {
        let (store, user) = verified_user(3).await;
        let now = Utc::now();

        store.consume_case_allowance(user.id, now).await.unwrap();
        store.consume_case_allowance(user.id, now).await.unwrap();

        let tomorrow = now + Duration::hours(25);
        assert_eq!(
            store.consume_case_allowance(user.id, tomorrow).await.unwrap(),
            2
        );
        assert_eq!(
            store.consume_case_allowance(user.id, tomorrow).await.unwrap(),
            1
        );
    }

    #[test]
    fn test_generate_token() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
