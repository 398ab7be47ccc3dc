use super::SortOptions;
use crate::BuddyClient;
use buddy_http::{
    ApiPath, CallContext, HttpError, Nullable, RawResponse, api_path, encode_segment, is_empty_str,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub url: String,
    pub html_url: String,
    pub id: i64,
    pub name: String,
    pub description: String,
    pub auto_assign_to_new_projects: bool,
    pub auto_assign_permission_set_id: i64,
}

envelope! {
    GroupList { groups: Group }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupOps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `Null` clears the description
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub description: Nullable<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_assign_to_new_projects: Option<bool>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub auto_assign_permission_set_id: Nullable<i64>,
}

/// A workspace member seen through its group membership
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupMember {
    pub url: String,
    pub html_url: String,
    pub id: i64,
    pub name: String,
    pub email: String,
    pub admin: bool,
    /// `MEMBER` or `MANAGER`
    pub status: String,
}

envelope! {
    GroupMemberList { members: GroupMember }
}

/// Add (`id` required) or re-role (`status`) a group member
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupMemberOps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "is_empty_str")]
    pub status: String,
}

pub struct Groups<'c> {
    client: &'c BuddyClient,
}

fn groups_path(domain: &str) -> ApiPath {
    api_path!("/workspaces/{}/groups", encode_segment(domain))
}

fn group_path(domain: &str, group_id: i64) -> ApiPath {
    api_path!("/workspaces/{}/groups/{}", encode_segment(domain), group_id)
}

fn group_members_path(domain: &str, group_id: i64) -> ApiPath {
    api_path!(
        "/workspaces/{}/groups/{}/members",
        encode_segment(domain),
        group_id
    )
}

fn group_member_path(domain: &str, group_id: i64, member_id: i64) -> ApiPath {
    api_path!(
        "/workspaces/{}/groups/{}/members/{}",
        encode_segment(domain),
        group_id,
        member_id
    )
}

impl<'c> Groups<'c> {
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
        ops: &GroupOps,
    ) -> Result<(Group, RawResponse), HttpError> {
        self.client.create(ctx, &groups_path(domain), ops).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn get(
        &self,
        ctx: &CallContext,
        domain: &str,
        group_id: i64,
    ) -> Result<(Group, RawResponse), HttpError> {
        self.client.get(ctx, &group_path(domain, group_id)).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn update(
        &self,
        ctx: &CallContext,
        domain: &str,
        group_id: i64,
        ops: &GroupOps,
    ) -> Result<(Group, RawResponse), HttpError> {
        self.client
            .update(ctx, &group_path(domain, group_id), ops)
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`]; a success status other than 204 is an error too.
    pub async fn delete(
        &self,
        ctx: &CallContext,
        domain: &str,
        group_id: i64,
    ) -> Result<RawResponse, HttpError> {
        self.client.delete(ctx, &group_path(domain, group_id)).await
    }

    /// All groups, every page.
    ///
    /// # Errors
    ///
    /// The first failing page's error.
    pub async fn list(
        &self,
        ctx: &CallContext,
        domain: &str,
        sort: &SortOptions,
    ) -> Result<(GroupList, RawResponse), HttpError> {
        self.client.list_all(ctx, &groups_path(domain), sort).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn add_member(
        &self,
        ctx: &CallContext,
        domain: &str,
        group_id: i64,
        ops: &GroupMemberOps,
    ) -> Result<(GroupMember, RawResponse), HttpError> {
        self.client
            .create(ctx, &group_members_path(domain, group_id), ops)
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`]; 404 when the member is not in the group.
    pub async fn get_member(
        &self,
        ctx: &CallContext,
        domain: &str,
        group_id: i64,
        member_id: i64,
    ) -> Result<(GroupMember, RawResponse), HttpError> {
        self.client
            .get(ctx, &group_member_path(domain, group_id, member_id))
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn update_member(
        &self,
        ctx: &CallContext,
        domain: &str,
        group_id: i64,
        member_id: i64,
        ops: &GroupMemberOps,
    ) -> Result<(GroupMember, RawResponse), HttpError> {
        self.client
            .update(ctx, &group_member_path(domain, group_id, member_id), ops)
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`]; a success status other than 204 is an error too.
    pub async fn remove_member(
        &self,
        ctx: &CallContext,
        domain: &str,
        group_id: i64,
        member_id: i64,
    ) -> Result<RawResponse, HttpError> {
        self.client
            .delete(ctx, &group_member_path(domain, group_id, member_id))
            .await
    }

    /// Members of one group. Not paginated.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn list_members(
        &self,
        ctx: &CallContext,
        domain: &str,
        group_id: i64,
    ) -> Result<(GroupMemberList, RawResponse), HttpError> {
        self.client
            .get(ctx, &group_members_path(domain, group_id))
            .await
    }
}
