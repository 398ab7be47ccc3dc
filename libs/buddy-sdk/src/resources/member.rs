use super::SortOptions;
use crate::BuddyClient;
use buddy_http::{ApiPath, CallContext, HttpError, RawResponse, api_path, encode_segment};
use serde::{Deserialize, Serialize};

/// Workspace member
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Member {
    pub url: String,
    pub html_url: String,
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub admin: bool,
    pub workspace_owner: bool,
    pub auto_assign_to_new_projects: bool,
    pub auto_assign_permission_set_id: i64,
}

envelope! {
    MemberList { members: Member }
}

/// Invite (`email`) or update (`admin`, auto-assignment) a member
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemberOps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_assign_to_new_projects: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_assign_permission_set_id: Option<i64>,
}

pub struct Members<'c> {
    client: &'c BuddyClient,
}

fn members_path(domain: &str) -> ApiPath {
    api_path!("/workspaces/{}/members", encode_segment(domain))
}

fn member_path(domain: &str, member_id: i64) -> ApiPath {
    api_path!("/workspaces/{}/members/{}", encode_segment(domain), member_id)
}

impl<'c> Members<'c> {
    #[must_use]
    pub fn new(client: &'c BuddyClient) -> Self {
        Self { client }
    }

    /// Invite a member by email.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn create(
        &self,
        ctx: &CallContext,
        domain: &str,
        ops: &MemberOps,
    ) -> Result<(Member, RawResponse), HttpError> {
        self.client.create(ctx, &members_path(domain), ops).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn get(
        &self,
        ctx: &CallContext,
        domain: &str,
        member_id: i64,
    ) -> Result<(Member, RawResponse), HttpError> {
        self.client.get(ctx, &member_path(domain, member_id)).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn update(
        &self,
        ctx: &CallContext,
        domain: &str,
        member_id: i64,
        ops: &MemberOps,
    ) -> Result<(Member, RawResponse), HttpError> {
        self.client
            .update(ctx, &member_path(domain, member_id), ops)
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`]; a success status other than 204 is an error too.
    pub async fn delete(
        &self,
        ctx: &CallContext,
        domain: &str,
        member_id: i64,
    ) -> Result<RawResponse, HttpError> {
        self.client.delete(ctx, &member_path(domain, member_id)).await
    }

    /// All members, every page.
    ///
    /// # Errors
    ///
    /// The first failing page's error.
    pub async fn list(
        &self,
        ctx: &CallContext,
        domain: &str,
        sort: &SortOptions,
    ) -> Result<(MemberList, RawResponse), HttpError> {
        self.client.list_all(ctx, &members_path(domain), sort).await
    }
}
