//! Browser launch with a persistent profile

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::fs;
use std::path::Path;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Chrome flags that keep a reused profile from offering to restore tabs
const SESSION_RESTORE_FLAGS: [&str; 3] = [
    "--disable-session-crashed-bubble",
    "--hide-crash-restore-bubble",
    "--no-first-run",
];

/// Launch Chrome on `profile_dir` and spawn the CDP event handler.
///
/// The returned task runs until the browser goes away.
pub async fn launch(profile_dir: &Path, headless: bool) -> Result<(Browser, JoinHandle<()>)> {
    fs::create_dir_all(profile_dir).with_context(|| {
        format!(
            "Failed to create browser profile directory: {}",
            profile_dir.display()
        )
    })?;

    let mut builder = BrowserConfig::builder().user_data_dir(profile_dir);
    if !headless {
        builder = builder.with_head();
    }
    for flag in SESSION_RESTORE_FLAGS {
        builder = builder.arg(flag);
    }
    let config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

    info!(profile = %profile_dir.display(), headless, "Launching browser");
    let (browser, mut handler) = Browser::launch(config)
        .await
        .context("Failed to launch browser")?;

    let handle = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            // Unknown CDP messages surface as errors; the connection is still usable
            if let Err(e) = event {
                warn!("Browser handler error: {:?}", e);
            }
        }
        debug!("Browser handler finished");
    });

    Ok((browser, handle))
}
