use crate::BuddyClient;
use buddy_http::{
    ApiPath, CallContext, HttpError, Nullable, RawResponse, api_path, encode_segment,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workspace {
    pub url: String,
    pub html_url: String,
    pub id: i64,
    pub name: String,
    pub domain: String,
    pub owner_id: i64,
    pub frozen: bool,
    pub create_date: String,
    pub default_pipeline_resource: String,
}

envelope! {
    /// `GET /workspaces`
    WorkspaceList { workspaces: Workspace }
}

/// Create/update options. `domain` is only accepted on create.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkspaceOps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_salt: Option<String>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub default_pipeline_resource: Nullable<String>,
}

pub struct Workspaces<'c> {
    client: &'c BuddyClient,
}

impl<'c> Workspaces<'c> {
    #[must_use]
    pub fn new(client: &'c BuddyClient) -> Self {
        Self { client }
    }

    /// Workspaces the token can see. Not paginated.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn list(
        &self,
        ctx: &CallContext,
    ) -> Result<(WorkspaceList, RawResponse), HttpError> {
        self.client.get(ctx, &ApiPath::new("/workspaces")).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`]; 404 when the domain does not exist.
    pub async fn get(
        &self,
        ctx: &CallContext,
        domain: &str,
    ) -> Result<(Workspace, RawResponse), HttpError> {
        let path = api_path!("/workspaces/{}", encode_segment(domain));
        self.client.get(ctx, &path).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`]; a taken domain is a 4xx error record.
    pub async fn create(
        &self,
        ctx: &CallContext,
        ops: &WorkspaceOps,
    ) -> Result<(Workspace, RawResponse), HttpError> {
        self.client.create(ctx, &ApiPath::new("/workspaces"), ops).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn update(
        &self,
        ctx: &CallContext,
        domain: &str,
        ops: &WorkspaceOps,
    ) -> Result<(Workspace, RawResponse), HttpError> {
        let path = api_path!("/workspaces/{}", encode_segment(domain));
        self.client.update(ctx, &path, ops).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`]; a success status other than 204 is an error too.
    pub async fn delete(
        &self,
        ctx: &CallContext,
        domain: &str,
    ) -> Result<RawResponse, HttpError> {
        let path = api_path!("/workspaces/{}", encode_segment(domain));
        self.client.delete(ctx, &path).await
    }
}
