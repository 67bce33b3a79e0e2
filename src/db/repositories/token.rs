use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};

use super::user::generate_token;
use crate::entities::api_tokens;

/// One live API key per user. Rotation replaces the row so the old key stops
/// resolving immediately.
pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_for_user(&self, user_id: i32) -> Result<Option<String>> {
        let token = api_tokens::Entity::find()
            .filter(api_tokens::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query API token for user")?;

        Ok(token.map(|t| t.key))
    }

    /// Resolve a presented key to its owner's user id
    pub async fn user_id_for_key(&self, key: &str) -> Result<Option<i32>> {
        let token = api_tokens::Entity::find()
            .filter(api_tokens::Column::Key.eq(key))
            .one(&self.conn)
            .await
            .context("Failed to query API token by key")?;

        Ok(token.map(|t| t.user_id))
    }

    /// Create a key for the user unless one already exists; returns the live key
    pub async fn ensure_for_user(&self, user_id: i32) -> Result<String> {
        if let Some(existing) = self.get_for_user(user_id).await? {
            return Ok(existing);
        }

        let active = api_tokens::ActiveModel {
            key: Set(generate_token()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert API token")?;

        Ok(model.key)
    }

    /// Replace the user's key with a fresh one
    pub async fn rotate(&self, user_id: i32) -> Result<String> {
        let txn = self.conn.begin().await?;

        api_tokens::Entity::delete_many()
            .filter(api_tokens::Column::UserId.eq(user_id))
            .exec(&txn)
            .await
            .context("Failed to delete old API token")?;

        let active = api_tokens::ActiveModel {
            key: Set(generate_token()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = active
            .insert(&txn)
            .await
            .context("Failed to insert rotated API token")?;

        txn.commit().await?;
        Ok(model.key)
    }

    pub async fn delete_for_user(&self, user_id: i32) -> Result<u64> {
        let result = api_tokens::Entity::delete_many()
            .filter(api_tokens::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete API token")?;

        Ok(result.rows_affected)
    }
}
