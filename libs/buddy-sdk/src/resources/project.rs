use super::SortOptions;
use crate::BuddyClient;
use buddy_http::{
    ApiPath, CallContext, HttpError, Nullable, RawResponse, api_path, encode_segment, is_empty_str,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Project {
    pub url: String,
    pub html_url: String,
    pub name: String,
    pub display_name: String,
    /// `ACTIVE` or `CLOSED`
    pub status: String,
    /// `PRIVATE` or `PUBLIC`
    pub access: String,
    pub create_date: String,
    pub http_repository: String,
    pub ssh_repository: String,
    pub default_branch: String,
    pub fetch_submodules: bool,
    pub fetch_submodules_env_key: String,
    pub allow_pull_requests: bool,
    pub without_repository: bool,
    pub external_project_id: String,
    pub git_lab_project_id: String,
    pub custom_repo_url: String,
    pub custom_repo_user: String,
}

envelope! {
    ProjectList { projects: Project }
}

/// Git hosting integration backing a project's repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationRef {
    pub hash_id: String,
}

/// Create/update options.
///
/// Repository source is one of: an `integration` with
/// `external_project_id` (or `git_lab_project_id`), a custom repository
/// (`custom_repo_*`), or `without_repository`. When none is set the project
/// gets a Buddy-hosted repository.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectOps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration: Option<IntegrationRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_lab_project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_repo_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_repo_pass: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_repo_ssh_key_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_submodules: Option<bool>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub fetch_submodules_env_key: Nullable<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_pull_requests: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub without_repository: Option<bool>,
}

/// Listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectFilter {
    /// Only projects the token owner is a member of
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership: Option<bool>,
    #[serde(skip_serializing_if = "is_empty_str")]
    pub status: String,
    #[serde(flatten)]
    pub sort: SortOptions,
}

pub struct Projects<'c> {
    client: &'c BuddyClient,
}

fn projects_path(domain: &str) -> ApiPath {
    api_path!("/workspaces/{}/projects", encode_segment(domain))
}

fn project_path(domain: &str, project: &str) -> ApiPath {
    api_path!(
        "/workspaces/{}/projects/{}",
        encode_segment(domain),
        encode_segment(project)
    )
}

impl<'c> Projects<'c> {
    #[must_use]
    pub fn new(client: &'c BuddyClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Any [`HttpError`]; a taken name is a 4xx error record.
    pub async fn create(
        &self,
        ctx: &CallContext,
        domain: &str,
        ops: &ProjectOps,
    ) -> Result<(Project, RawResponse), HttpError> {
        self.client.create(ctx, &projects_path(domain), ops).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn get(
        &self,
        ctx: &CallContext,
        domain: &str,
        project: &str,
    ) -> Result<(Project, RawResponse), HttpError> {
        self.client.get(ctx, &project_path(domain, project)).await
    }

    /// Renaming changes the project's URL; use the returned `name` afterwards.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn update(
        &self,
        ctx: &CallContext,
        domain: &str,
        project: &str,
        ops: &ProjectOps,
    ) -> Result<(Project, RawResponse), HttpError> {
        self.client
            .update(ctx, &project_path(domain, project), ops)
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`]; a success status other than 204 is an error too.
    pub async fn delete(
        &self,
        ctx: &CallContext,
        domain: &str,
        project: &str,
    ) -> Result<RawResponse, HttpError> {
        self.client.delete(ctx, &project_path(domain, project)).await
    }

    /// All matching projects, every page.
    ///
    /// # Errors
    ///
    /// The first failing page's error.
    pub async fn list(
        &self,
        ctx: &CallContext,
        domain: &str,
        filter: &ProjectFilter,
    ) -> Result<(ProjectList, RawResponse), HttpError> {
        self.client.list_all(ctx, &projects_path(domain), filter).await
    }
}
