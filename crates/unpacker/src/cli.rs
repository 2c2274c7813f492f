//! Command line interface

use clap::Parser;
use std::time::Duration;
use unpacker_core::{
    RetentionPolicy, Result, RunConfig, TerminationPolicy, DEFAULT_MAX_AGE_MINUTES,
    DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_SECS,
};

/// unpacker: clean up instances, key pairs and security groups left behind by Packer
#[derive(Parser, Debug)]
#[command(name = "unpacker", version)]
#[command(about = "Remove EC2 resources left behind by failed Packer builds", long_about = None)]
pub struct Cli {
    /// Region to connect to
    #[arg(long)]
    pub region: String,

    /// Tag key associated to packer builds
    #[arg(long, alias = "tag_key")]
    pub tag_key: String,

    /// Tag value associated to packer builds
    #[arg(long, alias = "tag_value")]
    pub tag_value: String,

    /// Report what would be removed without removing anything
    #[arg(long, alias = "dry-run")]
    pub dryrun: bool,

    /// Instances older than this many minutes are terminated
    #[arg(long, default_value_t = DEFAULT_MAX_AGE_MINUTES, allow_negative_numbers = true)]
    pub max_age_minutes: i64,

    /// Termination state polls before giving up
    #[arg(long, default_value_t = DEFAULT_POLL_ATTEMPTS)]
    pub poll_attempts: u32,

    /// Seconds between termination state polls
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval_secs: u64,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Build the run configuration from the parsed flags
    pub fn run_config(&self) -> Result<RunConfig> {
        let retention = RetentionPolicy::from_minutes(self.max_age_minutes)?;
        Ok(RunConfig::new(&self.tag_key, &self.tag_value, &self.region)
            .with_dry_run(self.dryrun)
            .with_retention(retention)
            .with_termination(
                TerminationPolicy::default()
                    .with_max_attempts(self.poll_attempts)
                    .with_interval(Duration::from_secs(self.poll_interval_secs)),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from([
            "unpacker",
            "--region",
            "eu-west-1",
            "--tag-key",
            "Builder",
            "--tag-value",
            "packer",
        ])
        .unwrap();

        let config = cli.run_config().unwrap();

        assert_eq!(config.region, "eu-west-1");
        assert!(!config.dry_run);
        assert_eq!(config.retention.max_age, TimeDelta::minutes(45));
        assert_eq!(config.termination.max_attempts, 20);
        assert_eq!(config.termination.interval, Duration::from_secs(30));
        assert!(!cli.json);
    }

    #[test]
    fn test_underscore_aliases_and_overrides() {
        let cli = Cli::try_parse_from([
            "unpacker",
            "--region",
            "us-east-1",
            "--tag_key",
            "Builder",
            "--tag_value",
            "packer",
            "--dryrun",
            "--max-age-minutes",
            "90",
            "--poll-interval-secs",
            "5",
        ])
        .unwrap();

        let config = cli.run_config().unwrap();

        assert_eq!(config.tag_key, "Builder");
        assert_eq!(config.tag_value, "packer");
        assert!(config.dry_run);
        assert_eq!(config.retention.max_age, TimeDelta::minutes(90));
        assert_eq!(config.termination.interval, Duration::from_secs(5));
    }

    #[test]
    fn test_out_of_range_max_age_is_config_error() {
        for minutes in [-5, i64::MAX] {
            let flag = format!("--max-age-minutes={minutes}");
            let cli = Cli::try_parse_from([
                "unpacker",
                "--region",
                "eu-west-1",
                "--tag-key",
                "Builder",
                "--tag-value",
                "packer",
                flag.as_str(),
            ])
            .unwrap();

            let err = cli.run_config().unwrap_err();
            assert!(matches!(err, unpacker_core::Error::Config(_)), "{minutes}: {err}");
        }
    }

    #[test]
    fn test_missing_tag_is_usage_error() {
        let err = Cli::try_parse_from(["unpacker", "--region", "us-east-1", "--tag-key", "Builder"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_missing_region_is_usage_error() {
        let err = Cli::try_parse_from(["unpacker", "--tag-key", "Builder", "--tag-value", "packer"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
