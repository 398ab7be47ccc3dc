use crate::BuddyClient;
use buddy_http::{ApiPath, CallContext, HttpError, Nullable, RawResponse, api_path, encode_segment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Webhook {
    pub url: String,
    pub html_url: String,
    pub id: i64,
    pub target_url: String,
    pub secret_key: String,
    /// e.g. `PUSH`, `EXECUTION_SUCCESSFUL`
    pub events: Vec<String>,
    /// Project names the webhook fires for; empty means all
    pub projects: Vec<String>,
}

envelope! {
    WebhookList { webhooks: Webhook }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WebhookOps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(skip_serializing_if = "Nullable::is_absent")]
    pub secret_key: Nullable<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
}

pub struct Webhooks<'c> {
    client: &'c BuddyClient,
}

fn webhooks_path(domain: &str) -> ApiPath {
    api_path!("/workspaces/{}/webhooks", encode_segment(domain))
}

fn webhook_path(domain: &str, webhook_id: i64) -> ApiPath {
    api_path!(
        "/workspaces/{}/webhooks/{}",
        encode_segment(domain),
        webhook_id
    )
}

impl<'c> Webhooks<'c> {
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
        ops: &WebhookOps,
    ) -> Result<(Webhook, RawResponse), HttpError> {
        self.client.create(ctx, &webhooks_path(domain), ops).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn get(
        &self,
        ctx: &CallContext,
        domain: &str,
        webhook_id: i64,
    ) -> Result<(Webhook, RawResponse), HttpError> {
        self.client.get(ctx, &webhook_path(domain, webhook_id)).await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn update(
        &self,
        ctx: &CallContext,
        domain: &str,
        webhook_id: i64,
        ops: &WebhookOps,
    ) -> Result<(Webhook, RawResponse), HttpError> {
        self.client
            .update(ctx, &webhook_path(domain, webhook_id), ops)
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`]; a success status other than 204 is an error too.
    pub async fn delete(
        &self,
        ctx: &CallContext,
        domain: &str,
        webhook_id: i64,
    ) -> Result<RawResponse, HttpError> {
        self.client
            .delete(ctx, &webhook_path(domain, webhook_id))
            .await
    }

    /// # Errors
    ///
    /// Any [`HttpError`] from the call.
    pub async fn list(
        &self,
        ctx: &CallContext,
        domain: &str,
    ) -> Result<(WebhookList, RawResponse), HttpError> {
        self.client.get(ctx, &webhooks_path(domain)).await
    }
}
