//! `SeaORM` implementation of the `ResearchService` trait.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;
use crate::db::{
    HarvardContract, NewHarvardContract, NewResearchContract, ResearchContract, Store, User,
};
use crate::domain::email::email_domain;
use crate::domain::forms::FormErrors;
use crate::domain::{ContractDecision, ContractStatus};
use crate::mail::{EmailMessage, Mailer};
use crate::services::research_service::{
    ContractReview, HarvardRequestInput, ResearchError, ResearchRequestInput, ResearchService,
};
use crate::templates::Templates;

pub struct SeaOrmResearchService {
    store: Store,
    config: Arc<RwLock<Config>>,
    mailer: Arc<dyn Mailer>,
    templates: Arc<Templates>,
}

impl SeaOrmResearchService {
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

    async fn send(
        &self,
        to: Vec<String>,
        subject: &str,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<(), ResearchError> {
        let config = self.config.read().await;
        let body = self.templates.render_email(template, data)?;
        self.mailer
            .send(EmailMessage::new(
                &config.mail.from_address,
                to,
                subject,
                body,
            ))
            .await?;
        Ok(())
    }

    async fn approver_addresses(&self) -> Result<Vec<String>, ResearchError> {
        let approvers = self.store.list_contract_approvers().await?;
        if approvers.is_empty() {
            let fallback = self
                .config
                .read()
                .await
                .research
                .approver_fallback_email
                .clone();
            return Ok(vec![fallback]);
        }
        Ok(approvers.into_iter().map(|u| u.email).collect())
    }

    async fn load_review(&self, contract_id: i32) -> Result<ContractReview, ResearchError> {
        let contract = self
            .store
            .get_research_contract(contract_id)
            .await?
            .ok_or(ResearchError::ContractNotFound(contract_id))?;
        let requester = self
            .store
            .get_user(contract.user_id)
            .await?
            .ok_or_else(|| {
                ResearchError::Internal(format!(
                    "Requester {} of contract {contract_id} is missing",
                    contract.user_id
                ))
            })?;

        Ok(ContractReview {
            contract,
            requester,
        })
    }
}

fn contract_fields(contract: &ResearchContract) -> serde_json::Value {
    json!({
        "id": contract.id,
        "name": contract.name,
        "email": contract.email,
        "institution": contract.institution,
        "title": contract.title,
        "area_of_interest": contract.area_of_interest,
        "status": contract.status,
    })
}

#[async_trait]
impl ResearchService for SeaOrmResearchService {
    async fn is_harvard_user(&self, user: &User) -> bool {
        let harvard_domain = self.config.read().await.research.harvard_domain.clone();
        email_domain(&user.email).is_some_and(|domain| domain == harvard_domain)
    }

    async fn submit_harvard_request(
        &self,
        user: &User,
        input: HarvardRequestInput,
    ) -> Result<HarvardContract, ResearchError> {
        if !self.is_harvard_user(user).await {
            return Err(ResearchError::NotHarvard);
        }

        let mut errors = FormErrors::new();
        let name = errors.require_line("name", &input.name).to_string();
        let title = errors.require_line("title", &input.title).to_string();
        let area_of_interest = errors
            .require("area_of_interest", &input.area_of_interest)
            .to_string();
        errors.into_result().map_err(ResearchError::Validation)?;

        let signed = Utc::now().format("%B %-d, %Y").to_string();
        let contract_html = self.templates.render_contract(
            "harvard",
            &json!({
                "name": name,
                "email": user.email,
                "title": title,
                "area_of_interest": area_of_interest,
                "date": signed,
            }),
        )?;

        let contract = self
            .store
            .create_harvard_contract(NewHarvardContract {
                user_id: user.id,
                name,
                title,
                area_of_interest,
                contract_html,
            })
            .await?;
        self.store.set_harvard_access(user.id, true).await?;

        self.send(
            vec![user.email.clone()],
            "Caselaw Access Project: Harvard research access",
            "harvard_access_granted",
            &json!({
                "name": contract.name,
                "email": user.email,
                "title": contract.title,
                "area_of_interest": contract.area_of_interest,
                "contract_html": contract.contract_html,
            }),
        )
        .await?;

        info!(user_id = user.id, contract_id = contract.id, "Harvard research agreement signed");
        Ok(contract)
    }

    async fn submit_research_request(
        &self,
        user: &User,
        input: ResearchRequestInput,
    ) -> Result<ResearchContract, ResearchError> {
        let mut errors = FormErrors::new();
        let name = errors.require_line("name", &input.name).to_string();
        let institution = errors.require_line("institution", &input.institution).to_string();
        let title = errors.require_line("title", &input.title).to_string();
        let area_of_interest = errors
            .require("area_of_interest", &input.area_of_interest)
            .to_string();
        errors.into_result().map_err(ResearchError::Validation)?;

        let contract_html = self.templates.render_contract(
            "research",
            &json!({
                "name": name,
                "email": user.email,
                "institution": institution,
                "title": title,
                "area_of_interest": area_of_interest,
                "date": Utc::now().format("%B %-d, %Y").to_string(),
            }),
        )?;

        let contract = self
            .store
            .create_research_contract(NewResearchContract {
                user_id: user.id,
                name,
                email: user.email.clone(),
                institution,
                title,
                area_of_interest,
                contract_html,
            })
            .await?;

        let approve_url = format!(
            "{}/user/research/approve/{}/",
            self.config.read().await.base_url(),
            contract.id
        );
        let recipients = self.approver_addresses().await?;
        self.send(
            recipients,
            &format!("Research access request from {}", contract.name),
            "research_request_received",
            &json!({
                "contract": contract_fields(&contract),
                "approve_url": approve_url,
            }),
        )
        .await?;

        info!(user_id = user.id, contract_id = contract.id, "Research access requested");
        Ok(contract)
    }

    async fn review(
        &self,
        approver: &User,
        contract_id: i32,
    ) -> Result<ContractReview, ResearchError> {
        if !approver.is_contract_approver {
            return Err(ResearchError::NotApprover);
        }
        self.load_review(contract_id).await
    }

    async fn decide(
        &self,
        approver: &User,
        contract_id: i32,
        decision: ContractDecision,
        notes: Option<String>,
    ) -> Result<ContractReview, ResearchError> {
        let review = self.review(approver, contract_id).await?;

        let status: ContractStatus = review
            .contract
            .status
            .parse()
            .map_err(ResearchError::Internal)?;
        if !status.is_pending() {
            return Err(ResearchError::AlreadyDecided(status.to_string()));
        }

        let now = Utc::now();
        let grant_until = match decision {
            ContractDecision::Approve => {
                let days = self.config.read().await.research.access_duration_days;
                Some(now + Duration::days(days))
            }
            ContractDecision::Deny => None,
        };

        let applied = self
            .store
            .decide_research_contract(contract_id, decision, approver.id, notes, now, grant_until)
            .await?;
        if !applied {
            let current = self.load_review(contract_id).await?;
            return Err(ResearchError::AlreadyDecided(current.contract.status));
        }

        let decided = self.load_review(contract_id).await?;
        let (subject, template) = match decision {
            ContractDecision::Approve => (
                "Your Caselaw Access Project research request has been approved",
                "research_request_approved",
            ),
            ContractDecision::Deny => (
                "Your Caselaw Access Project research request has been denied",
                "research_request_denied",
            ),
        };
        self.send(
            vec![decided.requester.email.clone()],
            subject,
            template,
            &json!({
                "contract": contract_fields(&decided.contract),
                "contract_html": decided.contract.contract_html,
                "approver_name": approver.full_name(),
            }),
        )
        .await?;

        metrics::counter!("contracts_decided_total", "decision" => decision.past_tense())
            .increment(1);
        info!(
            contract_id,
            approver_id = approver.id,
            decision = decision.past_tense(),
            "Research contract decided"
        );

        Ok(decided)
    }
}
