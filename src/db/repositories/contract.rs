use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, sea_query::Expr,
};

use crate::domain::{ContractDecision, ContractStatus};
use crate::entities::{harvard_contracts, research_contracts, users};

pub use crate::entities::harvard_contracts::Model as HarvardContract;
pub use crate::entities::research_contracts::Model as ResearchContract;

#[derive(Debug, Clone)]
pub struct NewResearchContract {
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub institution: String,
    pub title: String,
    pub area_of_interest: String,
    pub contract_html: String,
}

#[derive(Debug, Clone)]
pub struct NewHarvardContract {
    pub user_id: i32,
    pub name: String,
    pub title: String,
    pub area_of_interest: String,
    pub contract_html: String,
}

pub struct ContractRepository {
    conn: DatabaseConnection,
}

impl ContractRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create_research(&self, contract: NewResearchContract) -> Result<ResearchContract> {
        let active = research_contracts::ActiveModel {
            user_id: Set(contract.user_id),
            name: Set(contract.name),
            email: Set(contract.email),
            institution: Set(contract.institution),
            title: Set(contract.title),
            area_of_interest: Set(contract.area_of_interest),
            status: Set(ContractStatus::Pending.as_str().to_string()),
            approver_id: Set(None),
            approver_signature_date: Set(None),
            approver_notes: Set(None),
            contract_html: Set(contract.contract_html),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert research contract")
    }

    pub async fn get_research(&self, id: i32) -> Result<Option<ResearchContract>> {
        research_contracts::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query research contract")
    }

    pub async fn list_research_for_user(&self, user_id: i32) -> Result<Vec<ResearchContract>> {
        research_contracts::Entity::find()
            .filter(research_contracts::Column::UserId.eq(user_id))
            .order_by_desc(research_contracts::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list research contracts")
    }

    pub async fn list_pending_research(&self) -> Result<Vec<ResearchContract>> {
        research_contracts::Entity::find()
            .filter(research_contracts::Column::Status.eq(ContractStatus::Pending.as_str()))
            .order_by_asc(research_contracts::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list pending research contracts")
    }

    /// Apply a decision to a pending contract.
    ///
    /// The status check and the write happen in one statement, so a contract
    /// is decided at most once. With `grant_until` set, the requester's
    /// unlimited access is written in the same transaction. Returns false if
    /// the contract was no longer pending.
    pub async fn decide(
        &self,
        id: i32,
        decision: ContractDecision,
        approver_id: i32,
        notes: Option<String>,
        now: DateTime<Utc>,
        grant_until: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let txn = self.conn.begin().await?;

        let result = research_contracts::Entity::update_many()
            .col_expr(
                research_contracts::Column::Status,
                Expr::value(decision.resulting_status().as_str()),
            )
            .col_expr(
                research_contracts::Column::ApproverId,
                Expr::value(Some(approver_id)),
            )
            .col_expr(
                research_contracts::Column::ApproverSignatureDate,
                Expr::value(Some(now)),
            )
            .col_expr(research_contracts::Column::ApproverNotes, Expr::value(notes))
            .filter(research_contracts::Column::Id.eq(id))
            .filter(research_contracts::Column::Status.eq(ContractStatus::Pending.as_str()))
            .exec(&txn)
            .await
            .context("Failed to update research contract status")?;

        if result.rows_affected != 1 {
            return Ok(false);
        }

        if let Some(until) = grant_until {
            let contract = research_contracts::Entity::find_by_id(id)
                .one(&txn)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Research contract {id} vanished"))?;

            let granted = users::Entity::update_many()
                .col_expr(users::Column::UnlimitedAccess, Expr::value(true))
                .col_expr(users::Column::UnlimitedAccessUntil, Expr::value(Some(until)))
                .col_expr(users::Column::UpdatedAt, Expr::value(now))
                .filter(users::Column::Id.eq(contract.user_id))
                .exec(&txn)
                .await
                .context("Failed to grant unlimited access")?;

            if granted.rows_affected != 1 {
                anyhow::bail!(
                    "Requester {} of research contract {id} not found",
                    contract.user_id
                );
            }
        }

        txn.commit().await?;
        Ok(true)
    }

    /// Put a decided contract back into the approval queue
    pub async fn reset_to_pending(&self, id: i32) -> Result<bool> {
        let result = research_contracts::Entity::update_many()
            .col_expr(
                research_contracts::Column::Status,
                Expr::value(ContractStatus::Pending.as_str()),
            )
            .col_expr(
                research_contracts::Column::ApproverId,
                Expr::value(Option::<i32>::None),
            )
            .col_expr(
                research_contracts::Column::ApproverSignatureDate,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(research_contracts::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to reset research contract")?;

        Ok(result.rows_affected == 1)
    }

    pub async fn create_harvard(&self, contract: NewHarvardContract) -> Result<HarvardContract> {
        let active = harvard_contracts::ActiveModel {
            user_id: Set(contract.user_id),
            name: Set(contract.name),
            title: Set(contract.title),
            area_of_interest: Set(contract.area_of_interest),
            contract_html: Set(contract.contract_html),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert harvard contract")
    }

    pub async fn list_harvard_for_user(&self, user_id: i32) -> Result<Vec<HarvardContract>> {
        harvard_contracts::Entity::find()
            .filter(harvard_contracts::Column::UserId.eq(user_id))
            .order_by_desc(harvard_contracts::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list harvard contracts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use chrono::Duration;

    async fn store_with_contract(user_id: i32) -> (Store, ResearchContract) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let contract = store
            .create_research_contract(NewResearchContract {
                user_id,
                name: "Sam Scholar".to_string(),
                email: "sam@example.org".to_string(),
                institution: "State University".to_string(),
                title: "Professor".to_string(),
                area_of_interest: "Sentencing".to_string(),
                contract_html: "<p>signed</p>".to_string(),
            })
            .await
            .unwrap();
        (store, contract)
    }

    #[tokio::test]
    async fn approval_rolls_back_when_the_grant_fails() {
        let (store, contract) = store_with_contract(4242).await;
        let now = Utc::now();

        let result = store
            .decide_research_contract(
                contract.id,
                ContractDecision::Approve,
                1,
                None,
                now,
                Some(now + Duration::days(365)),
            )
            .await;
        assert!(result.is_err());

        let stored = store
            .get_research_contract(contract.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, "pending");
        assert_eq!(stored.approver_id, None);
    }

    #[tokio::test]
    async fn denial_is_applied_once() {
        let (store, contract) = store_with_contract(4242).await;
        let now = Utc::now();

        let first = store
            .decide_research_contract(contract.id, ContractDecision::Deny, 1, None, now, None)
            .await
            .unwrap();
        let second = store
            .decide_research_contract(contract.id, ContractDecision::Deny, 1, None, now, None)
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
    }
}
