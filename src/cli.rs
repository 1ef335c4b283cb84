//! # octosphere CLI (invocation boundary)
//!
//! Thin glue over the library: parses arguments, wires the ledger and the two
//! network adapters, and triggers exactly one sync pass per invocation. All
//! business logic stays in the library modules; this module only handles
//! argument exposure, summary printing and exit status.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use crate::atproto::AtprotoClient;
use crate::config::Settings;
use crate::ledger::{Identity, Ledger};
use crate::octopus::OctopusClient;
use crate::synchronise::{sync_identity, SyncReport};

/// CLI for octosphere: mirror Octopus publications to the AT Protocol.
#[derive(Parser)]
#[clap(
    name = "octosphere",
    version,
    about = "Mirror Octopus publications into an author's AT Protocol repository"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Link an ORCID to a Bluesky account and store the credential
    Link {
        /// ORCID of the author (e.g. 0000-0002-1825-0097)
        #[clap(long)]
        orcid: String,
        /// Internal Octopus user id the publications are listed under
        #[clap(long)]
        octopus_user_id: String,
        /// Bluesky handle to publish as
        #[clap(long)]
        handle: String,
        /// AT Proto app password for the handle
        #[clap(long)]
        app_password: String,
        /// Skip verifying the credential against the PDS
        #[clap(long)]
        no_verify: bool,
    },
    /// Run one sync pass for a linked identity
    Sync {
        #[clap(long)]
        orcid: String,
    },
    /// Sync every identity whose last pass is older than the interval
    SyncDue {
        /// Override SYNC_INTERVAL_DAYS for this run
        #[clap(long)]
        interval_days: Option<i64>,
    },
    /// Deactivate a linked identity (keeps its audit trail)
    Unlink {
        #[clap(long)]
        orcid: String,
    },
    /// Show link and sync state for an identity
    Status {
        #[clap(long)]
        orcid: String,
    },
}

/// Async CLI entrypoint, callable from `main` and from integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env()?;
    settings.trace_loaded();
    let ledger = Ledger::open(&settings.database_path)
        .await
        .context("opening sync ledger")?;

    match cli.command {
        Commands::Link {
            orcid,
            octopus_user_id,
            handle,
            app_password,
            no_verify,
        } => {
            if !no_verify {
                let atproto = AtprotoClient::new(&settings.atproto_pds_url);
                atproto
                    .create_session(&handle, &app_password)
                    .await
                    .context("verifying credential against the PDS")?;
            }
            ledger
                .upsert_identity(&Identity {
                    orcid: orcid.clone(),
                    octopus_user_id,
                    bsky_handle: handle.clone(),
                    app_password,
                    last_sync: None,
                    active: true,
                })
                .await?;
            println!("Linked {orcid} to @{handle}");
            Ok(())
        }
        Commands::Sync { orcid } => {
            let octopus =
                OctopusClient::new(&settings.octopus_api_url, &settings.octopus_web_url, None);
            let atproto = AtprotoClient::new(&settings.atproto_pds_url);
            let report = sync_identity(&ledger, &octopus, &atproto, &orcid).await?;
            print_report(&orcid, &report);
            Ok(())
        }
        Commands::SyncDue { interval_days } => {
            let interval = interval_days.unwrap_or(settings.sync_interval_days);
            let octopus =
                OctopusClient::new(&settings.octopus_api_url, &settings.octopus_web_url, None);
            let atproto = AtprotoClient::new(&settings.atproto_pds_url);
            let due = ledger.identities_due(interval).await?;
            println!("{} identities due for sync", due.len());
            for identity in due {
                match sync_identity(&ledger, &octopus, &atproto, &identity.orcid).await {
                    Ok(report) => print_report(&identity.orcid, &report),
                    Err(e) => {
                        // One failing identity must not block the rest.
                        tracing::error!(orcid = %identity.orcid, error = %e, "Sync pass failed");
                        eprintln!("Sync failed for {}: {e}", identity.orcid);
                    }
                }
            }
            Ok(())
        }
        Commands::Unlink { orcid } => {
            if ledger.get_identity(&orcid).await?.is_none() {
                return Err(anyhow!("no linked identity for {orcid}"));
            }
            ledger.deactivate(&orcid).await?;
            println!("Deactivated sync for {orcid}");
            Ok(())
        }
        Commands::Status { orcid } => {
            let identity = ledger
                .get_identity(&orcid)
                .await?
                .ok_or_else(|| anyhow!("no linked identity for {orcid}"))?;
            let synced = ledger.synced_for(&orcid).await?;
            let last_sync = identity
                .last_sync
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!("ORCID:      {}", identity.orcid);
            println!("Handle:     @{}", identity.bsky_handle);
            println!("Active:     {}", identity.active);
            println!("Last sync:  {last_sync}");
            println!("Synced:     {} versions", synced.len());
            Ok(())
        }
    }
}

fn print_report(orcid: &str, report: &SyncReport) {
    println!(
        "{orcid}: {} published, {} skipped, {} failed",
        report.published.len(),
        report.skipped,
        report.failed.len()
    );
    for published in &report.published {
        println!(
            "  {} (version {}) -> {}",
            published.publication_id, published.version_id, published.uri
        );
    }
    for failed in &report.failed {
        eprintln!(
            "  FAILED {} (version {}): {}",
            failed.publication_id, failed.version_id, failed.reason
        );
    }
}
