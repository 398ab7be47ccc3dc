//! `buddyctl` - inspect and clean up Buddy.Works resources from a shell
//!
//! Uses the same configuration layering as the provider: flags override
//! `BUDDY_TOKEN` / `BUDDY_BASE_URL` / `BUDDY_INSECURE`, which override the
//! built-in defaults.
//!
//! ```bash
//! BUDDY_TOKEN=... buddyctl projects list acme --status ACTIVE
//! buddyctl -vv pipelines get acme web 42
//! buddyctl raw /workspaces/acme/projects/web/repository/contents/README.md > README.md
//! ```

// CLI tools are expected to print to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use buddy_sdk::adapter::{ReadOutcome, diagnostic, read_outcome};
use buddy_sdk::resources::{ProjectFilter, VariableFilter};
use buddy_sdk::{
    ApiPath, BuddyClient, CallContext, HttpError, ProviderConfig, ProviderSettings, RawResponse,
    SortOptions,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Command-line client for the Buddy.Works API
#[derive(Parser)]
#[command(name = "buddyctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Personal access token (overrides `BUDDY_TOKEN`)
    #[arg(long, global = true)]
    token: Option<String>,

    /// API root, e.g. `https://buddy.example.com/api` (overrides `BUDDY_BASE_URL`)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Skip TLS certificate verification (overrides `BUDDY_INSECURE`)
    #[arg(long, global = true)]
    insecure: bool,

    /// Overall deadline for the command in seconds
    #[arg(long, global = true, default_value_t = 120)]
    timeout: u64,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Workspaces visible to the token
    Workspaces,
    /// Projects of a workspace
    #[command(subcommand)]
    Projects(ProjectCommand),
    /// Pipelines of a project
    #[command(subcommand)]
    Pipelines(PipelineCommand),
    /// Environment variables of a workspace
    Variables(VariableArgs),
    /// GET an API path and stream the body to stdout
    Raw {
        /// Path below the API root
        path: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    List {
        domain: String,
        /// `ACTIVE` or `CLOSED`
        #[arg(long, default_value = "")]
        status: String,
        /// Only projects the token's user is a member of
        #[arg(long)]
        membership: bool,
        #[command(flatten)]
        sort: SortArgs,
    },
    Get {
        domain: String,
        name: String,
    },
    Delete {
        domain: String,
        name: String,
    },
}

#[derive(Subcommand)]
enum PipelineCommand {
    List {
        domain: String,
        project: String,
        #[command(flatten)]
        sort: SortArgs,
    },
    Get {
        domain: String,
        project: String,
        id: i64,
    },
    Delete {
        domain: String,
        project: String,
        id: i64,
    },
}

#[derive(Args)]
struct SortArgs {
    #[arg(long, default_value = "")]
    sort_by: String,
    /// `ASC` or `DESC`
    #[arg(long, default_value = "")]
    sort_direction: String,
}

impl From<SortArgs> for SortOptions {
    fn from(args: SortArgs) -> Self {
        Self {
            sort_by: args.sort_by,
            sort_direction: args.sort_direction,
        }
    }
}

#[derive(Args)]
struct VariableArgs {
    domain: String,
    #[arg(long, default_value = "")]
    project: String,
    #[arg(long, default_value_t = 0)]
    pipeline: i64,
    #[arg(long, default_value_t = 0)]
    action: i64,
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run `call`, turning an API failure into a printed diagnostic.
async fn report<T, F>(operation: &str, call: F) -> Option<T>
where
    F: Future<Output = Result<T, HttpError>>,
{
    match call.await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(error = ?err, operation, "request failed");
            let diag = diagnostic(operation, &err);
            eprintln!("Error: {}\n\n{}", diag.summary, diag.detail);
            None
        }
    }
}

/// Print a single record, or a note when the API says it no longer exists.
fn print_read<T: Serialize>(what: &str, outcome: ReadOutcome<T>) -> Result<()> {
    match outcome {
        ReadOutcome::Present(record, raw) => {
            tracing::info!(status = raw.status.as_u16(), url = %raw.url, "read {what}");
            print_json(&record)
        }
        ReadOutcome::Absent => {
            eprintln!("{what} not found");
            Ok(())
        }
    }
}

fn print_deleted(what: &str, raw: &RawResponse) {
    tracing::info!(status = raw.status.as_u16(), url = %raw.url, "deleted {what}");
    println!("{what} deleted");
}

async fn projects(
    client: &BuddyClient,
    ctx: &CallContext,
    command: ProjectCommand,
) -> Result<bool> {
    let projects = client.projects();
    match command {
        ProjectCommand::List {
            domain,
            status,
            membership,
            sort,
        } => {
            let filter = ProjectFilter {
                membership: membership.then_some(true),
                status,
                sort: sort.into(),
            };
            let call = projects.list(ctx, &domain, &filter);
            let Some((list, _)) = report("list projects", call).await else {
                return Ok(false);
            };
            print_json(&list.projects)?;
        }
        ProjectCommand::Get { domain, name } => {
            let result = projects.get(ctx, &domain, &name).await;
            let Some(outcome) = report("read project", async { read_outcome(result) }).await else {
                return Ok(false);
            };
            print_read("project", outcome)?;
        }
        ProjectCommand::Delete { domain, name } => {
            let call = projects.delete(ctx, &domain, &name);
            let Some(raw) = report("delete project", call).await else {
                return Ok(false);
            };
            print_deleted("project", &raw);
        }
    }
    Ok(true)
}

async fn pipelines(
    client: &BuddyClient,
    ctx: &CallContext,
    command: PipelineCommand,
) -> Result<bool> {
    let pipelines = client.pipelines();
    match command {
        PipelineCommand::List {
            domain,
            project,
            sort,
        } => {
            let sort = SortOptions::from(sort);
            let call = pipelines.list(ctx, &domain, &project, &sort);
            let Some((list, _)) = report("list pipelines", call).await else {
                return Ok(false);
            };
            print_json(&list.pipelines)?;
        }
        PipelineCommand::Get {
            domain,
            project,
            id,
        } => {
            let result = pipelines.get(ctx, &domain, &project, id).await;
            let Some(outcome) = report("read pipeline", async { read_outcome(result) }).await
            else {
                return Ok(false);
            };
            print_read("pipeline", outcome)?;
        }
        PipelineCommand::Delete {
            domain,
            project,
            id,
        } => {
            let call = pipelines.delete(ctx, &domain, &project, id);
            let Some(raw) = report("delete pipeline", call).await else {
                return Ok(false);
            };
            print_deleted("pipeline", &raw);
        }
    }
    Ok(true)
}

async fn download(client: &BuddyClient, ctx: &CallContext, path: String) -> bool {
    let mut stdout = tokio::io::stdout();
    let path = ApiPath::new(path);
    let call = client.download(ctx, &path, &mut stdout);
    let Some((written, raw)) = report("download", call).await else {
        return false;
    };
    tracing::info!(bytes = written, status = raw.status.as_u16(), "download complete");
    true
}

async fn run(cli: Cli) -> Result<bool> {
    let overrides = ProviderSettings {
        token: cli.token,
        base_url: cli.base_url,
        insecure: cli.insecure.then_some(true),
    };
    let config = ProviderConfig::load(&overrides).context("loading provider configuration")?;
    let client = BuddyClient::new(&config).context("building Buddy API client")?;
    let ctx = CallContext::background().with_timeout(Duration::from_secs(cli.timeout));

    match cli.command {
        Commands::Workspaces => {
            let workspaces = client.workspaces();
            let call = workspaces.list(&ctx);
            let Some((list, _)) = report("list workspaces", call).await else {
                return Ok(false);
            };
            print_json(&list.workspaces)?;
            Ok(true)
        }
        Commands::Projects(command) => projects(&client, &ctx, command).await,
        Commands::Pipelines(command) => pipelines(&client, &ctx, command).await,
        Commands::Variables(args) => {
            let filter = VariableFilter {
                project_name: args.project,
                pipeline_id: args.pipeline,
                action_id: args.action,
            };
            let variables = client.variables();
            let call = variables.list(&ctx, &args.domain, &filter);
            let Some((list, _)) = report("list variables", call).await else {
                return Ok(false);
            };
            print_json(&list.variables)?;
            Ok(true)
        }
        Commands::Raw { path } => Ok(download(&client, &ctx, path).await),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if run(cli).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "buddyctl",
            "projects",
            "list",
            "acme",
            "--status",
            "ACTIVE",
            "--sort-by",
            "name",
            "--insecure",
            "-vv",
        ])
        .unwrap();

        assert!(cli.insecure);
        assert_eq!(cli.verbose, 2);
        let Commands::Projects(ProjectCommand::List {
            domain,
            status,
            membership,
            sort,
        }) = cli.command
        else {
            panic!("expected projects list");
        };
        assert_eq!(domain, "acme");
        assert_eq!(status, "ACTIVE");
        assert!(!membership);
        assert_eq!(SortOptions::from(sort).sort_by, "name");
    }

    #[test]
    fn variable_filter_defaults_to_unscoped() {
        let cli = Cli::try_parse_from(["buddyctl", "variables", "acme"]).unwrap();
        let Commands::Variables(args) = cli.command else {
            panic!("expected variables");
        };
        assert!(args.project.is_empty());
        assert_eq!(args.pipeline, 0);
        assert_eq!(args.action, 0);
    }
}
