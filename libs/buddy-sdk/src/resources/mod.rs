//! Per-resource facades.
//!
//! Each facade borrows the [`BuddyClient`](crate::BuddyClient) and maps the
//! resource's CRUD operations onto its API paths. Identifiers passed in by
//! callers are percent-encoded as single path segments.

// List envelope: `url`, `html_url` and the named item array.
macro_rules! envelope {
    ($(#[$meta:meta])* $name:ident { $field:ident: $item:ty }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        pub struct $name {
            pub url: String,
            pub html_url: String,
            pub $field: Vec<$item>,
        }

        impl $crate::pagination::Envelope for $name {
            type Item = $item;

            fn items(&self) -> &[$item] {
                &self.$field
            }

            fn items_mut(&mut self) -> &mut Vec<$item> {
                &mut self.$field
            }
        }
    };
}

mod group;
mod integration;
mod member;
mod permission;
mod pipeline;
mod project;
mod variable;
mod webhook;
mod workspace;

pub use group::{Group, GroupList, GroupMember, GroupMemberList, GroupMemberOps, GroupOps, Groups};
pub use integration::{Integration, IntegrationList, IntegrationOps, Integrations};
pub use member::{Member, MemberList, MemberOps, Members};
pub use permission::{PermissionSet, PermissionSetList, PermissionSetOps, PermissionSets};
pub use pipeline::{Pipeline, PipelineList, PipelineOps, Pipelines};
pub use project::{IntegrationRef, Project, ProjectFilter, ProjectList, ProjectOps, Projects};
pub use variable::{
    PipelineRef, ProjectRef, Variable, VariableFilter, VariableList, VariableOps, Variables,
};
pub use webhook::{Webhook, WebhookList, WebhookOps, Webhooks};
pub use workspace::{Workspace, WorkspaceList, WorkspaceOps, Workspaces};

use buddy_http::is_empty_str;
use serde::Serialize;

/// Sorting accepted by paginated listings. Empty fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SortOptions {
    #[serde(skip_serializing_if = "is_empty_str")]
    pub sort_by: String,
    #[serde(skip_serializing_if = "is_empty_str")]
    pub sort_direction: String,
}
