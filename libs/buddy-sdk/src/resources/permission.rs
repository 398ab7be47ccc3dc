use crate::BuddyClient;
use buddy_http::{ApiPath, CallContext, HttpError, Nullable, RawResponse, api_path, encode_segment};
use serde::{Deserialize, Serialize};

/// Custom permission set. Access levels are `DENIED`, `READ_ONLY`,
/// `RUN_ONLY`, `READ_WRITE`, `MANAGE` or `USE_ONLY` depending on the area.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionSet {
    pub url: String,
    pub html_url: String,
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub pipeline_access_level: String,
    pub repository_access_level: String,
    pub sandbox_access_level: String,
    pub project_team_access_level: String,
    pub environment_access_level: String,
}

envelope! {
    PermissionSetList { permissions: PermissionSet }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionSetOps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub description: Nullable<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_access_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_access_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_access_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_team_access_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_access_level: Option<String>,
}

pub struct PermissionSets<'c> {
    client: &'c BuddyClient,
}

fn permissions_path(domain: &str) -> ApiPath {
    api_path!("/workspaces/{}/permissions", encode_segment(domain))
}

fn permission_path(domain: &str, permission_id: i64) -> ApiPath {
    api_path!(
        "/workspaces/{}/permissions/{}",
        encode_segment(domain),
        permission_id
    )
}

impl<'c> PermissionSets<'c> {
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
        ops: &PermissionSetOps,
    ) -> Result<(PermissionSet, RawResponse), HttpError> {
        self.client.create(ctx, &permissions_path(domain), ops).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn get(
        &self,
        ctx: &CallContext,
        domain: &str,
        permission_id: i64,
    ) -> Result<(PermissionSet, RawResponse), HttpError> {
        self.client
            .get(ctx, &permission_path(domain, permission_id))
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn update(
        &self,
        ctx: &CallContext,
        domain: &str,
        permission_id: i64,
        ops: &PermissionSetOps,
    ) -> Result<(PermissionSet, RawResponse), HttpError> {
        self.client
            .update(ctx, &permission_path(domain, permission_id), ops)
            .await
    }

    /// Built-in sets (`DEVELOPER`, `READ_ONLY`, ...) cannot be deleted.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`]; a success status other than 204 is an error too.
    pub async fn delete(
        &self,
        ctx: &CallContext,
        domain: &str,
        permission_id: i64,
    ) -> Result<RawResponse, HttpError> {
        self.client
            .delete(ctx, &permission_path(domain, permission_id))
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn list(
        &self,
        ctx: &CallContext,
        domain: &str,
    ) -> Result<(PermissionSetList, RawResponse), HttpError> {
        self.client.get(ctx, &permissions_path(domain)).await
    }
}
