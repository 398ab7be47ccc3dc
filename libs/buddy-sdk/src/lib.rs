#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! # `buddy-sdk` - typed client for the Buddy.Works API
//!
//! Builds on [`buddy_http`] and adds:
//!
//! - **Provider configuration** (`config`): token, base URL and TLS bypass
//!   layered from defaults, `BUDDY_*` variables and engine-supplied values
//! - **Resource facades** (`resources`): create/get/update/delete/list for
//!   workspaces, members, groups, projects, pipelines, variables, webhooks,
//!   integrations and permission sets
//! - **Auto-pagination** (`pagination`): page-number listings merged into a
//!   single envelope
//! - **Adapter helpers** (`adapter`): 404 as "absent" and engine diagnostics
//!
//! ## Example
//!
//! ```rust,ignore
//! use buddy_sdk::{BuddyClient, CallContext, ProviderConfig, ProviderSettings};
//! use buddy_sdk::adapter::{ReadOutcome, read_outcome};
//!
//! let client = BuddyClient::new(&ProviderConfig::load(&ProviderSettings::default())?)?;
//! let ctx = CallContext::background().with_timeout(Duration::from_secs(120));
//!
//! match read_outcome(client.projects().get(&ctx, "acme", "web").await)? {
//!     ReadOutcome::Present(project, _) => println!("{}", project.display_name),
//!     ReadOutcome::Absent => println!("gone"),
//! }
//! ```

pub mod adapter;
mod client;
pub mod config;
pub mod pagination;
pub mod resources;

pub use buddy_http::{
    ApiPath, CallContext, ErrorKind, ErrorResponse, HttpError, Nullable, RawResponse,
};
pub use client::{BuddyClient, DEFAULT_USER_AGENT, DELETE_FAILED_MESSAGE};
pub use config::{ConfigError, DEFAULT_BASE_URL, ProviderConfig, ProviderSettings};
pub use pagination::Envelope;
pub use resources::SortOptions;
