use async_trait::async_trait;
use chrono::Utc;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::Config;
use crate::db::{CaseExport, Store, User};
use crate::domain::access::{CaseAccess, ExportAccess, case_access, export_access};
use crate::services::access_service::{
    AccessError, AccessService, AuthorizedExport, CaseBody, CaseView,
};

pub struct SeaOrmAccessService {
    store: Store,
    config: Arc<RwLock<Config>>,
}

impl SeaOrmAccessService {
    #[must_use]
    pub const fn new(store: Store, config: Arc<RwLock<Config>>) -> Self {
        Self { store, config }
    }
}

/// Joins `relative` onto `root`, refusing anything that could escape it.
fn resolve_export_path(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

#[async_trait]
impl AccessService for SeaOrmAccessService {
    async fn visible_exports(&self, viewer: Option<&User>) -> Result<Vec<CaseExport>, AccessError> {
        let now = Utc::now();
        let profile = viewer.map(User::access_profile);

        let exports = self.store.list_case_exports().await?;
        Ok(exports
            .into_iter()
            .filter(|e| {
                export_access(profile.as_ref(), e.public, e.owner_id, now) == ExportAccess::Allowed
            })
            .collect())
    }

    async fn authorize_export(
        &self,
        viewer: Option<&User>,
        export_id: i32,
    ) -> Result<AuthorizedExport, AccessError> {
        let export = self
            .store
            .get_case_export(export_id)
            .await?
            .ok_or(AccessError::NotFound)?;

        let profile = viewer.map(User::access_profile);
        match export_access(profile.as_ref(), export.public, export.owner_id, Utc::now()) {
            ExportAccess::Allowed => {}
            ExportAccess::AuthenticationRequired => {
                return Err(AccessError::AuthenticationRequired);
            }
            ExportAccess::Forbidden => return Err(AccessError::Forbidden),
        }

        let root = self.config.read().await.bulk.exports_root.clone();
        let Some(path) = resolve_export_path(Path::new(&root), &export.file_path) else {
            warn!(export_id, file_path = %export.file_path, "Export path escapes exports root");
            return Err(AccessError::NotFound);
        };

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            warn!(export_id, path = %path.display(), "Export file is missing");
            return Err(AccessError::NotFound);
        }

        Ok(AuthorizedExport { export, path })
    }

    async fn view_case(
        &self,
        viewer: Option<&User>,
        case_id: i32,
        full_case: bool,
    ) -> Result<CaseView, AccessError> {
        let case = self
            .store
            .get_case(case_id)
            .await?
            .ok_or(AccessError::NotFound)?;

        let casebody = if full_case {
            let now = Utc::now();
            let profile = viewer.map(User::access_profile);
            let access = case_access(profile.as_ref(), case.restricted, now);

            if let (CaseAccess::ConsumesAllowance, Some(user)) = (access, viewer) {
                let remaining = self.store.consume_case_allowance(user.id, now).await?;
                debug!(user_id = user.id, case_id, remaining, "Case allowance consumed");
            }

            Some(CaseBody {
                status: access.status(),
                data: access.is_allowed().then(|| case.body.clone()),
            })
        } else {
            None
        };

        Ok(CaseView {
            id: case.id,
            name_abbreviation: case.name_abbreviation,
            decision_date: case.decision_date,
            restricted: case.restricted,
            casebody,
        })
    }
}
