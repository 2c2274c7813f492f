//! unpacker - clean up after failed Packer builds
//!
//! ## Usage
//!
//! ```bash
//! # See what would be removed
//! unpacker --region eu-west-1 --tag-key Builder --tag-value packer --dryrun
//!
//! # Remove it
//! unpacker --region eu-west-1 --tag-key Builder --tag-value packer
//! ```

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unpacker::{render_json, render_text, Cli, Ec2Provider};
use unpacker_core::{run, CleanupReport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout is reserved for the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "unpacker=info,unpacker_core=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let report = match cleanup(&cli).await {
        Ok(report) => report,
        Err(e) => {
            error!("❌ Cleanup aborted: {}", e);
            return Err(e.into());
        }
    };

    if cli.json {
        println!("{}", render_json(&report)?);
    } else {
        println!("{}", render_text(&report));
    }

    Ok(())
}

async fn cleanup(cli: &Cli) -> unpacker_core::Result<CleanupReport> {
    let config = cli.run_config()?;
    config.validate()?;

    info!(
        region = %config.region,
        tag = %format!("{}={}", config.tag_key, config.tag_value),
        dry_run = config.dry_run,
        "🔍 Looking for leftover packer resources"
    );

    let provider = Ec2Provider::connect(config.region.clone()).await;
    run(&provider, &config, chrono::Utc::now()).await
}
