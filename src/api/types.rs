use serde::{Deserialize, Serialize};

use crate::db::CaseExport;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// A bulk export row on the listing page.
#[derive(Debug, Serialize, Clone)]
pub struct CaseExportDto {
    pub id: i32,
    pub file_name: String,
    pub export_date: String,
    pub body_format: String,
    pub filter_type: String,
    pub filter_slug: String,
    pub public: bool,
    pub download_url: String,
}

impl From<CaseExport> for CaseExportDto {
    fn from(export: CaseExport) -> Self {
        Self {
            download_url: format!("/api/v1/bulk/{}/download/", export.id),
            id: export.id,
            file_name: export.file_name,
            export_date: export.export_date.format("%Y-%m-%d").to_string(),
            body_format: export.body_format,
            filter_type: export.filter_type,
            filter_slug: export.filter_slug,
            public: export.public,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
    pub uptime: u64,
}

// Form bodies. Every field defaults so a missing input becomes a
// "This field is required." message rather than a 422.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password1: String,
    pub password2: String,
    pub agreed_to_tos: Option<String>,
}

impl RegisterForm {
    /// Checkbox semantics: present and non-empty means checked.
    #[must_use]
    pub fn agreed(&self) -> bool {
        self.agreed_to_tos
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmailForm {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HarvardForm {
    pub name: String,
    pub title: String,
    pub area_of_interest: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResearchForm {
    pub name: String,
    pub email: String,
    pub institution: String,
    pub title: String,
    pub area_of_interest: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApproveForm {
    pub contract_id: Option<i32>,
    pub approve: Option<String>,
    pub deny: Option<String>,
    pub notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaseQuery {
    #[serde(default)]
    pub full_case: Option<String>,
}

impl CaseQuery {
    #[must_use]
    pub fn wants_full_case(&self) -> bool {
        self.full_case
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}
