/// # bucket-sync CLI interface
///
/// Command parsing and the glue between the command line and the
/// `bucket-sync-core` engine. All transfer logic lives in the core crate;
/// this module resolves configuration and identity, builds a
/// [`SyncContext`], runs one command and applies the exit policy.
///
/// ## Exit policy
/// Setup errors (bad config, no credentials, unreadable source, failed
/// listing) are returned as errors. Per-file failures are logged and counted
/// in the summary line, and only turn into an error with `--strict`.
///
/// ## How To Use
/// - From the shell: `bucket-sync --help`.
/// - Programmatically and in tests: call [`run`] with a constructed [`Cli`].
use crate::credentials::{identity_from_token, resolve_identity, CredentialStore};
use crate::load_config::load_settings;
use anyhow::{bail, Context, Result};
use bucket_sync_core::client::ApiClient;
use bucket_sync_core::contract::Visibility;
use bucket_sync_core::download::{download, DownloadRequest};
use bucket_sync_core::pool::TransferReport;
use bucket_sync_core::synchronise::SyncContext;
use bucket_sync_core::upload::{upload, UploadRequest};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// CLI for bucket-sync: bulk upload and download against a remote file bucket.
#[derive(Debug, Parser)]
#[clap(
    name = "bucket-sync",
    version,
    about = "Synchronise local directories with a remote file bucket"
)]
pub struct Cli {
    /// Optional YAML config file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Credential store location (defaults to the user config directory)
    #[clap(long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Access token; takes precedence over BUCKET_SYNC_TOKEN and stored credentials
    #[clap(long, global = true)]
    pub token: Option<String>,

    /// Exit with an error when any single transfer failed
    #[clap(long, global = true)]
    pub strict: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload a local file or directory tree
    Upload {
        /// Local file or directory
        #[clap(short, long)]
        source: PathBuf,
        /// Remote destination prefix
        #[clap(short, long, default_value = "/uploads/")]
        destination: String,
        /// Upload as private files
        #[clap(short, long)]
        private: bool,
    },
    /// Download every file below a remote prefix
    Download {
        /// Remote prefix
        #[clap(short, long)]
        source: String,
        /// Local directory to write into
        #[clap(short, long)]
        destination: PathBuf,
    },
    /// Store an access token for later runs (requires --token)
    Auth,
    /// Forget stored credentials
    Logout,
}

/// Async CLI entrypoint for `main` and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    let store = CredentialStore::at(cli.credentials.as_deref())?;

    match cli.command {
        Commands::Upload {
            source,
            destination,
            private,
        } => {
            let ctx = context(&cli.config, cli.token.as_deref(), &store)?;
            let visibility = if private {
                Visibility::Private
            } else {
                Visibility::Public
            };
            info!(command = "upload", source = %source.display(), %destination, "Starting upload");
            let report = upload(
                &ctx,
                UploadRequest {
                    source,
                    destination,
                    visibility,
                },
            )
            .await
            .context("upload failed")?;
            finish(&report, cli.strict)
        }
        Commands::Download {
            source,
            destination,
        } => {
            let ctx = context(&cli.config, cli.token.as_deref(), &store)?;
            info!(command = "download", %source, destination = %destination.display(), "Starting download");
            let report = download(
                &ctx,
                DownloadRequest {
                    source,
                    destination,
                },
            )
            .await
            .context("download failed")?;
            finish(&report, cli.strict)
        }
        Commands::Auth => {
            let Some(token) = cli.token else {
                bail!("auth requires --token <jwt>");
            };
            let mut identity = identity_from_token(&token)?;
            let settings = load_settings(cli.config.as_deref())?;
            let client = ApiClient::new(&settings.client, &identity)?;
            let tenant = client
                .tenant(&identity.tenant_id)
                .await
                .context("token was rejected by the tenant lookup")?;
            identity.tenant_name = Some(tenant.name.clone());
            store.save(&identity)?;
            info!(command = "auth", tenant = %tenant.name, "Authenticated");
            Ok(())
        }
        Commands::Logout => {
            if store.remove()? {
                info!(command = "logout", "Logged out");
            } else {
                warn!(command = "logout", "No stored credentials to remove");
            }
            Ok(())
        }
    }
}

fn context(
    config: &Option<PathBuf>,
    token: Option<&str>,
    store: &CredentialStore,
) -> Result<SyncContext> {
    let settings = load_settings(config.as_deref())?;
    let identity = resolve_identity(token, store)?;
    info!(tenant = %identity.tenant_id, "Resolved identity");
    SyncContext::connect(identity, settings).context("constructing API client")
}

fn finish(report: &TransferReport, strict: bool) -> Result<()> {
    info!(
        "finished: {} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    for failure in &report.failed {
        error!(item = %failure.item, error = %failure.error, "✗ failed");
    }
    if strict && !report.all_succeeded() {
        bail!("{} of {} transfers failed", report.failed.len(), report.total());
    }
    Ok(())
}
