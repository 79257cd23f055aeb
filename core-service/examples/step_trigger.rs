//! Cron-style step trigger
//!
//! Boots the service from the environment and schedules a driver step for
//! one owner at a fixed interval until interrupted. Useful for finishing an
//! import when nobody is polling `/check_status`.
//!
//! Run with:
//! ```bash
//! OAUTH_CLIENT_ID=... OAUTH_CLIENT_SECRET=... \
//! ACCESS_TEAM_DOMAIN=https://team.cloudflareaccess.com ACCESS_AUD_TAG=... \
//! cargo run -p core-service --example step_trigger -- <owner-id> [interval-secs]
//! ```

use anyhow::Context;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_runtime::ImportConfig;
use std::env;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::from_env()?)?;

    let mut args = env::args().skip(1);
    let owner_id = args.next().context("usage: step_trigger <owner-id> [interval-secs]")?;
    let interval = args
        .next()
        .map(|s| s.parse::<u64>())
        .transpose()
        .context("interval must be a number of seconds")?
        .unwrap_or(5);

    let config = ImportConfig::from_env()?;
    let service = core_service::bootstrap(config).await?;
    info!(owner_id = %owner_id, interval, "Triggering steps");

    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = service.enqueue_step(&owner_id);
                info!(?outcome, "Step requested");
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Signal handler failed");
                }
                break;
            }
        }
    }

    service.shutdown().await;
    Ok(())
}
