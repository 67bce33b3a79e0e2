use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::entities::cases;

pub use crate::entities::cases::Model as Case;

pub struct CaseRepository {
    conn: DatabaseConnection,
}

impl CaseRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<Case>> {
        cases::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query case")
    }

    pub async fn add(
        &self,
        name_abbreviation: &str,
        decision_date: Option<&str>,
        restricted: bool,
        body: &str,
    ) -> Result<Case> {
        let active = cases::ActiveModel {
            name_abbreviation: Set(name_abbreviation.to_string()),
            decision_date: Set(decision_date.map(str::to_string)),
            restricted: Set(restricted),
            body: Set(body.to_string()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert case")
    }
}
