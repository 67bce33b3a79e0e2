//! Access gate for bulk exports and restricted case text.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::db::{CaseExport, User};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Not found")]
    NotFound,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Access denied")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AccessError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// An export the viewer is allowed to download.
#[derive(Debug, Clone)]
pub struct AuthorizedExport {
    pub export: CaseExport,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseBody {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseView {
    pub id: i32,
    pub name_abbreviation: String,
    pub decision_date: Option<String>,
    pub restricted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub casebody: Option<CaseBody>,
}

#[async_trait::async_trait]
pub trait AccessService: Send + Sync {
    /// Exports the viewer may download, in listing order.
    async fn visible_exports(&self, viewer: Option<&User>) -> Result<Vec<CaseExport>, AccessError>;

    /// Resolves an export to a file on disk if the viewer may download it.
    ///
    /// # Errors
    ///
    /// [`AccessError::NotFound`] for an unknown id or a missing file, and
    /// [`AccessError::AuthenticationRequired`] / [`AccessError::Forbidden`]
    /// for private exports.
    async fn authorize_export(
        &self,
        viewer: Option<&User>,
        export_id: i32,
    ) -> Result<AuthorizedExport, AccessError>;

    /// Loads a case. With `full_case` the body is included when allowed,
    /// consuming one unit of the viewer's allowance for restricted cases.
    async fn view_case(
        &self,
        viewer: Option<&User>,
        case_id: i32,
        full_case: bool,
    ) -> Result<CaseView, AccessError>;
}
