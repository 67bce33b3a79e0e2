use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::email_blocklist;

pub struct BlocklistRepository {
    conn: DatabaseConnection,
}

impl BlocklistRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_domains(&self) -> Result<Vec<String>> {
        let rows = email_blocklist::Entity::find()
            .order_by_asc(email_blocklist::Column::Domain)
            .all(&self.conn)
            .await
            .context("Failed to list blocked domains")?;

        Ok(rows.into_iter().map(|r| r.domain).collect())
    }

    /// Returns false if the domain was already blocked
    pub async fn add(&self, domain: &str) -> Result<bool> {
        let domain = domain.trim().trim_start_matches('@').to_ascii_lowercase();

        let existing = email_blocklist::Entity::find()
            .filter(email_blocklist::Column::Domain.eq(&domain))
            .one(&self.conn)
            .await?;
        if existing.is_some() {
            return Ok(false);
        }

        let active = email_blocklist::ActiveModel {
            domain: Set(domain),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        active
            .insert(&self.conn)
            .await
            .context("Failed to insert blocked domain")?;

        Ok(true)
    }

    pub async fn remove(&self, domain: &str) -> Result<bool> {
        let result = email_blocklist::Entity::delete_many()
            .filter(email_blocklist::Column::Domain.eq(domain.trim().to_ascii_lowercase()))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }
}
