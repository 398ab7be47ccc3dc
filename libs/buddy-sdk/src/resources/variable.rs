use crate::BuddyClient;
use buddy_http::{
    ApiPath, CallContext, HttpError, Nullable, RawResponse, api_path, encode_segment, is_empty_str,
    is_zero,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub id: i64,
}

/// Environment variable, scoped to the workspace, a project or a pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variable {
    pub url: String,
    pub id: i64,
    pub key: String,
    /// Ciphertext for encrypted variables
    pub value: String,
    /// `VAR`, `FILE` or `SSH_KEY`
    #[serde(rename = "type")]
    pub kind: String,
    pub encrypted: bool,
    pub settable: bool,
    pub description: String,
    pub file_place: String,
    pub file_path: String,
    pub file_chmod: String,
    pub public_value: String,
    pub key_fingerprint: String,
    pub checksum: String,
    pub project: Option<ProjectRef>,
    pub pipeline: Option<PipelineRef>,
}

envelope! {
    VariableList { variables: Variable }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VariableOps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settable: Option<bool>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub description: Nullable<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_chmod: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineRef>,
}

/// Narrow a listing to one scope. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariableFilter {
    #[serde(rename = "projectName", skip_serializing_if = "is_empty_str")]
    pub project_name: String,
    #[serde(rename = "pipelineId", skip_serializing_if = "is_zero")]
    pub pipeline_id: i64,
    #[serde(rename = "actionId", skip_serializing_if = "is_zero")]
    pub action_id: i64,
}

pub struct Variables<'c> {
    client: &'c BuddyClient,
}

fn variables_path(domain: &str) -> ApiPath {
    api_path!("/workspaces/{}/variables", encode_segment(domain))
}

fn variable_path(domain: &str, variable_id: i64) -> ApiPath {
    api_path!(
        "/workspaces/{}/variables/{}",
        encode_segment(domain),
        variable_id
    )
}

impl<'c> Variables<'c> {
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
        ops: &VariableOps,
    ) -> Result<(Variable, RawResponse), HttpError> {
        self.client.create(ctx, &variables_path(domain), ops).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn get(
        &self,
        ctx: &CallContext,
        domain: &str,
        variable_id: i64,
    ) -> Result<(Variable, RawResponse), HttpError> {
        self.client.get(ctx, &variable_path(domain, variable_id)).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn update(
        &self,
        ctx: &CallContext,
        domain: &str,
        variable_id: i64,
        ops: &VariableOps,
    ) -> Result<(Variable, RawResponse), HttpError> {
        self.client
            .update(ctx, &variable_path(domain, variable_id), ops)
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`]; a success status other than 204 is an error too.
    pub async fn delete(
        &self,
        ctx: &CallContext,
        domain: &str,
        variable_id: i64,
    ) -> Result<RawResponse, HttpError> {
        self.client
            .delete(ctx, &variable_path(domain, variable_id))
            .await
    }

    /// Variables visible in the filtered scope. Not paginated.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn list(
        &self,
        ctx: &CallContext,
        domain: &str,
        filter: &VariableFilter,
    ) -> Result<(VariableList, RawResponse), HttpError> {
        self.client
            .get_with(ctx, &variables_path(domain), filter)
            .await
    }
}
