use super::SortOptions;
use crate::BuddyClient;
use buddy_http::{ApiPath, CallContext, HttpError, Nullable, RawResponse, api_path, encode_segment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Pipeline {
    pub url: String,
    pub html_url: String,
    pub id: i64,
    pub name: String,
    /// Trigger mode: `CLICK`, `EVENT` or `SCHEDULE`
    pub on: String,
    pub refs: Vec<String>,
    pub priority: String,
    pub cron: String,
    pub disabled: bool,
    pub disabling_reason: String,
    pub always_from_scratch: bool,
    pub auto_clear_cache: bool,
    pub no_skip_to_most_recent: bool,
    pub do_not_create_commit_status: bool,
    pub fail_on_prepare_env_warning: bool,
    pub execution_message_template: String,
    pub target_site_url: String,
    pub folder: String,
    pub tags: Vec<String>,
    pub last_execution_status: String,
    pub create_date: String,
}

envelope! {
    PipelineList { pipelines: Pipeline }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub cron: Nullable<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub disabling_reason: Nullable<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_from_scratch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_clear_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_skip_to_most_recent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_not_create_commit_status: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_on_prepare_env_warning: Option<bool>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub execution_message_template: Nullable<String>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub target_site_url: Nullable<String>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub folder: Nullable<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

pub struct Pipelines<'c> {
    client: &'c BuddyClient,
}

fn pipelines_path(domain: &str, project: &str) -> ApiPath {
    api_path!(
        "/workspaces/{}/projects/{}/pipelines",
        encode_segment(domain),
        encode_segment(project)
    )
}

fn pipeline_path(domain: &str, project: &str, pipeline_id: i64) -> ApiPath {
    api_path!(
        "/workspaces/{}/projects/{}/pipelines/{}",
        encode_segment(domain),
        encode_segment(project),
        pipeline_id
    )
}

impl<'c> Pipelines<'c> {
    #[must_use]
    pub fn new(client: &'c BuddyClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn create(
        &self,
        ctx: &CallContext,
        domain: &str,
        project: &str,
        ops: &PipelineOps,
    ) -> Result<(Pipeline, RawResponse), HttpError> {
        self.client
            .create(ctx, &pipelines_path(domain, project), ops)
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn get(
        &self,
        ctx: &CallContext,
        domain: &str,
        project: &str,
        pipeline_id: i64,
    ) -> Result<(Pipeline, RawResponse), HttpError> {
        self.client
            .get(ctx, &pipeline_path(domain, project, pipeline_id))
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn update(
        &self,
        ctx: &CallContext,
        domain: &str,
        project: &str,
        pipeline_id: i64,
        ops: &PipelineOps,
    ) -> Result<(Pipeline, RawResponse), HttpError> {
        self.client
            .update(ctx, &pipeline_path(domain, project, pipeline_id), ops)
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
        pipeline_id: i64,
    ) -> Result<RawResponse, HttpError> {
        self.client
            .delete(ctx, &pipeline_path(domain, project, pipeline_id))
            .await
    }

    /// All pipelines of a project, every page.
    ///
    /// # Errors
    ///
    /// The first failing page's error.
    pub async fn list(
        &self,
        ctx: &CallContext,
        domain: &str,
        project: &str,
        sort: &SortOptions,
    ) -> Result<(PipelineList, RawResponse), HttpError> {
        self.client
            .list_all(ctx, &pipelines_path(domain, project), sort)
            .await
    }
}
