//! `LetterFeed` - newsletter ingestion daemon
//!
//! Polls an IMAP mailbox, files newsletter mail under its newsletter and
//! stores each issue as a feed entry.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use letterfeed_core::settings::{
    DEFAULT_CHECK_INTERVAL, SettingsOverrides, SettingsProvider, SettingsRepository,
};
use letterfeed_core::{FolderOutcome, ImapConnector, Ingestor, NewsletterRepository, RunReport};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};

type LetterFeed = Ingestor<SettingsRepository, NewsletterRepository, ImapConnector>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "letterfeed=info,letterfeed_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let overrides = SettingsOverrides::from_env().context("invalid settings in environment")?;
    let settings = SettingsRepository::new(&cli.database, overrides)
        .await
        .with_context(|| format!("failed to open settings in {}", cli.database))?;
    let store = NewsletterRepository::new(&cli.database)
        .await
        .with_context(|| format!("failed to open newsletters in {}", cli.database))?;
    let ingestor = Ingestor::new(settings, store, cli.connector());

    match cli.command.unwrap_or_default() {
        Command::Run => run(&ingestor).await,
        Command::Once => once(&ingestor).await,
        Command::Check => check(&ingestor).await,
        Command::Folders => folders(&ingestor).await,
    }
}

/// Runs a pass now, then one per check interval until Ctrl-C.
async fn run(ingestor: &LetterFeed) -> Result<()> {
    info!("Starting LetterFeed");

    loop {
        if let Err(e) = ingestor.run().await {
            error!(error = %e, "Ingestion pass failed");
        }

        let minutes = match ingestor.settings().resolve(false).await {
            Ok(settings) => settings.email_check_interval.max(1),
            Err(e) => {
                warn!(error = %e, "Failed to read check interval, using default");
                DEFAULT_CHECK_INTERVAL
            }
        };
        info!(minutes, "Next check scheduled");

        tokio::select! {
            () = tokio::time::sleep(Duration::from_secs(u64::from(minutes) * 60)) => {}
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

async fn once(ingestor: &LetterFeed) -> Result<()> {
    let report = ingestor.run().await.context("ingestion pass failed")?;
    print_report(&report);
    Ok(())
}

async fn check(ingestor: &LetterFeed) -> Result<()> {
    let settings = ingestor.settings().resolve(true).await?;
    if !settings.is_configured() {
        bail!("IMAP server, username and password must be configured");
    }

    ingestor
        .connector()
        .test_connection(&settings)
        .await
        .with_context(|| format!("cannot log in to {}", settings.imap_server))?;
    println!("Logged in to {} as {}", settings.imap_server, settings.imap_username);
    Ok(())
}

async fn folders(ingestor: &LetterFeed) -> Result<()> {
    let settings = ingestor.settings().resolve(true).await?;
    if !settings.is_configured() {
        bail!("IMAP server, username and password must be configured");
    }

    for folder in ingestor.connector().list_folders(&settings).await? {
        println!("{folder}");
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    if !report.configured {
        println!("Not configured: set the IMAP server, username and password first");
        return;
    }

    for folder in &report.folders {
        match &folder.outcome {
            FolderOutcome::Skipped { reason } => println!("{}: skipped ({reason})", folder.folder),
            FolderOutcome::Scanned(stats) => println!(
                "{}: {} unseen, {} new, {} duplicate, {} unmatched, {} skipped, {} failed",
                folder.folder,
                stats.found,
                stats.created,
                stats.duplicates,
                stats.unmatched,
                stats.skipped,
                stats.failed
            ),
            FolderOutcome::Failed { stats, error } => println!(
                "{}: failed after {} new entries ({error})",
                folder.folder, stats.created
            ),
        }
    }
    println!(
        "{} new entries, {} newsletters added",
        report.created(),
        report.provisioned()
    );
}
