use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::domain::ContractDecision;

pub mod migrator;
pub mod repositories;

pub use repositories::case::Case;
pub use repositories::contract::{
    HarvardContract, NewHarvardContract, NewResearchContract, ResearchContract,
};
pub use repositories::export::{CaseExport, NewCaseExport};
pub use repositories::user::{NewUser, User};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        // Every pooled connection to `sqlite::memory:` is a separate database
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        if !in_memory {
            opt.idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn token_repo(&self) -> repositories::token::TokenRepository {
        repositories::token::TokenRepository::new(self.conn.clone())
    }

    fn blocklist_repo(&self) -> repositories::blocklist::BlocklistRepository {
        repositories::blocklist::BlocklistRepository::new(self.conn.clone())
    }

    fn export_repo(&self) -> repositories::export::ExportRepository {
        repositories::export::ExportRepository::new(self.conn.clone())
    }

    fn case_repo(&self) -> repositories::case::CaseRepository {
        repositories::case::CaseRepository::new(self.conn.clone())
    }

    fn contract_repo(&self) -> repositories::contract::ContractRepository {
        repositories::contract::ContractRepository::new(self.conn.clone())
    }

    // Users

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_with_password(&self, email: &str) -> Result<Option<(User, String)>> {
        self.user_repo().get_by_email_with_password(email).await
    }

    pub async fn normalized_email_exists(&self, normalized: &str) -> Result<bool> {
        self.user_repo().normalized_email_exists(normalized).await
    }

    pub async fn create_user(&self, new_user: NewUser, password_hash: String) -> Result<User> {
        self.user_repo().create(new_user, password_hash).await
    }

    pub async fn set_activation_nonce(
        &self,
        user_id: i32,
        nonce: &str,
        expires: DateTime<Utc>,
    ) -> Result<()> {
        self.user_repo()
            .set_activation_nonce(user_id, nonce, expires)
            .await
    }

    pub async fn mark_user_verified(&self, user_id: i32, daily_allowance: i32) -> Result<User> {
        self.user_repo()
            .mark_verified(user_id, daily_allowance)
            .await
    }

    pub async fn consume_case_allowance(&self, user_id: i32, now: DateTime<Utc>) -> Result<i32> {
        self.user_repo().consume_case_allowance(user_id, now).await
    }

    pub async fn grant_unlimited_access(&self, user_id: i32, until: DateTime<Utc>) -> Result<()> {
        self.user_repo().grant_unlimited_access(user_id, until).await
    }

    pub async fn set_harvard_access(&self, user_id: i32, granted: bool) -> Result<()> {
        self.user_repo().set_harvard_access(user_id, granted).await
    }

    pub async fn set_contract_approver(&self, user_id: i32, approver: bool) -> Result<()> {
        self.user_repo()
            .set_contract_approver(user_id, approver)
            .await
    }

    pub async fn deactivate_user(&self, user_id: i32, now: DateTime<Utc>) -> Result<()> {
        self.user_repo().deactivate(user_id, now).await
    }

    pub async fn list_contract_approvers(&self) -> Result<Vec<User>> {
        self.user_repo().list_contract_approvers().await
    }

    // API keys

    pub async fn get_api_key(&self, user_id: i32) -> Result<Option<String>> {
        self.token_repo().get_for_user(user_id).await
    }

    pub async fn ensure_api_key(&self, user_id: i32) -> Result<String> {
        self.token_repo().ensure_for_user(user_id).await
    }

    pub async fn rotate_api_key(&self, user_id: i32) -> Result<String> {
        self.token_repo().rotate(user_id).await
    }

    pub async fn delete_api_key(&self, user_id: i32) -> Result<u64> {
        self.token_repo().delete_for_user(user_id).await
    }

    /// Resolve an API key to an active user; keys of deactivated users are ignored.
    pub async fn verify_api_key(&self, key: &str) -> Result<Option<User>> {
        let Some(user_id) = self.token_repo().user_id_for_key(key).await? else {
            return Ok(None);
        };
        let user = self.get_user(user_id).await?;
        Ok(user.filter(|u| !u.deactivated_by_user))
    }

    // Email blocklist

    pub async fn list_blocked_domains(&self) -> Result<Vec<String>> {
        self.blocklist_repo().list_domains().await
    }

    pub async fn block_domain(&self, domain: &str) -> Result<bool> {
        self.blocklist_repo().add(domain).await
    }

    pub async fn unblock_domain(&self, domain: &str) -> Result<bool> {
        self.blocklist_repo().remove(domain).await
    }

    // Bulk exports and cases

    pub async fn get_case_export(&self, id: i32) -> Result<Option<CaseExport>> {
        self.export_repo().get(id).await
    }

    pub async fn list_case_exports(&self) -> Result<Vec<CaseExport>> {
        self.export_repo().list_all().await
    }

    pub async fn add_case_export(&self, export: NewCaseExport) -> Result<CaseExport> {
        self.export_repo().add(export).await
    }

    pub async fn get_case(&self, id: i32) -> Result<Option<Case>> {
        self.case_repo().get(id).await
    }

    pub async fn add_case(
        &self,
        name_abbreviation: &str,
        decision_date: Option<&str>,
        restricted: bool,
        body: &str,
    ) -> Result<Case> {
        self.case_repo()
            .add(name_abbreviation, decision_date, restricted, body)
            .await
    }

    // Research contracts

    pub async fn create_research_contract(
        &self,
        contract: NewResearchContract,
    ) -> Result<ResearchContract> {
        self.contract_repo().create_research(contract).await
    }

    pub async fn get_research_contract(&self, id: i32) -> Result<Option<ResearchContract>> {
        self.contract_repo().get_research(id).await
    }

    pub async fn list_research_contracts_for_user(
        &self,
        user_id: i32,
    ) -> Result<Vec<ResearchContract>> {
        self.contract_repo().list_research_for_user(user_id).await
    }

    pub async fn list_pending_research_contracts(&self) -> Result<Vec<ResearchContract>> {
        self.contract_repo().list_pending_research().await
    }

    pub async fn decide_research_contract(
        &self,
        id: i32,
        decision: ContractDecision,
        approver_id: i32,
        notes: Option<String>,
        now: DateTime<Utc>,
        grant_until: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        self.contract_repo()
            .decide(id, decision, approver_id, notes, now, grant_until)
            .await
    }

    pub async fn reset_research_contract(&self, id: i32) -> Result<bool> {
        self.contract_repo().reset_to_pending(id).await
    }

    pub async fn create_harvard_contract(
        &self,
        contract: NewHarvardContract,
    ) -> Result<HarvardContract> {
        self.contract_repo().create_harvard(contract).await
    }

    pub async fn list_harvard_contracts_for_user(
        &self,
        user_id: i32,
    ) -> Result<Vec<HarvardContract>> {
        self.contract_repo().list_harvard_for_user(user_id).await
    }
}
