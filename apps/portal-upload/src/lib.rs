//! `portal-upload`: log into the retirement-plan portal and upload a PDF
//!
//! Everything that can fail without a browser (input file, settings,
//! credentials) is checked by [`prepare`] before Chrome is started.

pub mod browser;
pub mod config;
pub mod steps;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::{headless_from_lookup, Credentials, PortalConfig};
use crate::steps::{run_step, Step};

#[derive(Parser, Debug, Clone)]
#[command(name = "portal-upload")]
#[command(version, about = "Upload a PDF to the retirement-plan portal")]
pub struct Args {
    /// PDF document to upload
    pub pdf_path: PathBuf,

    /// Portal settings file (TOML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show the browser window (overrides EMPOWER_HEADLESS)
    #[arg(long)]
    pub headed: bool,

    /// Leave the browser open until Ctrl-C
    #[arg(long)]
    pub keep_open: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Inputs of an upload run, validated
#[derive(Debug)]
pub struct Prepared {
    /// Absolute path of the PDF
    pub pdf: PathBuf,
    pub config: PortalConfig,
    pub credentials: Credentials,
    pub headless: bool,
}

/// Validate the PDF path, load settings and read credentials through `lookup`
pub fn prepare<F>(args: &Args, lookup: F) -> Result<Prepared>
where
    F: Fn(&str) -> Option<String>,
{
    if !args.pdf_path.is_file() {
        bail!("PDF not found: {}", args.pdf_path.display());
    }
    let pdf = fs::canonicalize(&args.pdf_path)
        .with_context(|| format!("Failed to resolve {}", args.pdf_path.display()))?;

    let config = match &args.config {
        Some(path) => PortalConfig::from_file(path)?,
        None => PortalConfig::default(),
    };
    let credentials = Credentials::from_lookup(&lookup)?;
    let headless = if args.headed {
        false
    } else {
        headless_from_lookup(&lookup)?
    };

    Ok(Prepared {
        pdf,
        config,
        credentials,
        headless,
    })
}

/// Launch the browser, run the upload flow, close the browser
pub async fn run(args: &Args) -> Result<()> {
    let prepared = prepare(args, |name| std::env::var(name).ok())?;
    info!(file = %prepared.pdf.display(), portal = %prepared.config.url, "Starting upload");

    let (mut browser, handle) = run_step(
        Step::Launch,
        browser::launch(&prepared.config.profile_dir, prepared.headless),
    )
    .await?;

    let result = async {
        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser tab")?;
        steps::upload(&page, &prepared.config, &prepared.credentials, &prepared.pdf).await?;
        info!(file = %prepared.pdf.display(), "Upload complete");

        if args.keep_open {
            info!("Browser left open, press Ctrl-C to exit");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    if let Err(e) = browser.close().await {
        warn!("Failed to close browser: {}", e);
    }
    if let Err(e) = browser.wait().await {
        warn!("Failed to wait for browser exit: {}", e);
    }
    handle.abort();

    result
}
