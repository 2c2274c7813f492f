//! Cleanup run: discovery, planning and execution
//!
//! ```text
//! list instances ─► classify ─► list key pairs / groups ─► diff ─► plan
//! plan ─► terminate + confirm ─► delete key pairs ─► delete groups
//! ```
//!
//! Discovery and termination failures abort the run. A key pair or
//! security group that fails to delete is recorded and the run moves on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::confirm::{TerminationConfirmer, TerminationPolicy};
use crate::diff::symmetric_difference;
use crate::error::{Error, Result};
use crate::naming::{packer_key_pairs, packer_security_groups};
use crate::provider::CloudProvider;
use crate::retention::{classify, RetentionPolicy};
use crate::types::{ClassifiedInstances, ACTIVE_STATES};

/// Everything a single run needs to know
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Tag key Packer puts on its build instances
    pub tag_key: String,

    /// Tag value Packer puts on its build instances
    pub tag_value: String,

    /// Region the provider talks to
    pub region: String,

    /// Report actions without executing them
    pub dry_run: bool,

    /// Age threshold for instances
    pub retention: RetentionPolicy,

    /// Poll budget for termination confirmation
    pub termination: TerminationPolicy,
}

impl RunConfig {
    pub fn new(
        tag_key: impl Into<String>,
        tag_value: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            tag_key: tag_key.into(),
            tag_value: tag_value.into(),
            region: region.into(),
            dry_run: false,
            retention: RetentionPolicy::default(),
            termination: TerminationPolicy::default(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_termination(mut self, termination: TerminationPolicy) -> Self {
        self.termination = termination;
        self
    }

    /// Reject a configuration missing the tag or the region
    pub fn validate(&self) -> Result<()> {
        if self.tag_key.trim().is_empty() {
            return Err(Error::config("tag key is required"));
        }
        if self.tag_value.trim().is_empty() {
            return Err(Error::config("tag value is required"));
        }
        if self.region.trim().is_empty() {
            return Err(Error::config("region is required"));
        }
        if self.termination.max_attempts == 0 {
            return Err(Error::config("at least one termination poll is required"));
        }
        Ok(())
    }
}

/// What a run is going to do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupPlan {
    /// Classification the plan was derived from
    pub classified: ClassifiedInstances,
    /// Instances to terminate
    pub instances: Vec<String>,
    /// Packer key pairs no retained instance uses
    pub key_pairs: Vec<String>,
    /// Packer security group ids no retained instance uses
    pub security_groups: Vec<String>,
}

/// Kind of auxiliary resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    KeyPair,
    SecurityGroup,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyPair => f.write_str("key pair"),
            Self::SecurityGroup => f.write_str("security group"),
        }
    }
}

/// A delete that failed without stopping the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionFailure {
    pub kind: ResourceKind,
    pub id: String,
    pub message: String,
}

/// What a run did (or, for a dry run, would have done)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub terminated_instances: Vec<String>,
    pub confirmation_polls: u32,
    pub deleted_key_pairs: Vec<String>,
    pub deleted_security_groups: Vec<String>,
    pub failures: Vec<DeletionFailure>,
}

/// Discover resources and decide what to remove
pub async fn plan<P>(provider: &P, config: &RunConfig, now: DateTime<Utc>) -> Result<CleanupPlan>
where
    P: CloudProvider + ?Sized,
{
    let instances = provider
        .list_instances(&config.tag_key, &config.tag_value, &ACTIVE_STATES)
        .await
        .map_err(|e| Error::discovery("instances", e))?;
    debug!(count = instances.len(), "Discovered tagged instances");

    let classified = classify(&instances, now, &config.retention)?;

    let key_pairs = provider
        .list_key_pairs()
        .await
        .map_err(|e| Error::discovery("key pairs", e))
        .map(packer_key_pairs)?;
    let security_groups = provider
        .list_security_groups()
        .await
        .map_err(|e| Error::discovery("security groups", e))
        .map(packer_security_groups)?;
    debug!(
        key_pairs = key_pairs.len(),
        security_groups = security_groups.len(),
        "Discovered packer resources"
    );

    let key_pairs = deletable(&classified.saved_key_pairs(), &key_pairs);
    let security_groups = deletable(&classified.saved_security_groups(), &security_groups);

    Ok(CleanupPlan {
        instances: classified.kill_ids(),
        classified,
        key_pairs,
        security_groups,
    })
}

/// Names in `candidates` not held by a retained instance
///
/// Retained names outside `candidates` come out of the symmetric
/// difference too; they are not packer-owned and are dropped.
fn deletable(retained: &[String], candidates: &[String]) -> Vec<String> {
    symmetric_difference(retained, candidates)
        .into_iter()
        .filter(|name| {
            let owned = candidates.contains(name);
            if !owned {
                debug!(name = %name, "Retained resource is not packer-owned, skipping");
            }
            owned
        })
        .collect()
}

/// Carry out `plan`
pub async fn execute<P>(provider: &P, plan: &CleanupPlan, config: &RunConfig) -> Result<CleanupReport>
where
    P: CloudProvider + ?Sized,
{
    if config.dry_run {
        return Ok(dry_run(plan));
    }

    let mut report = CleanupReport::default();

    if !plan.instances.is_empty() {
        let confirmer = TerminationConfirmer::new(config.termination);
        let confirmation = confirmer
            .terminate_and_confirm(provider, &plan.instances)
            .await?;
        report.terminated_instances = plan.instances.clone();
        report.confirmation_polls = confirmation.attempts;
    }

    for name in &plan.key_pairs {
        info!(key_pair = %name, "Deleting key pair {}", name);
        match provider.delete_key_pair(name).await {
            Ok(()) => report.deleted_key_pairs.push(name.clone()),
            Err(e) => report.failures.push(failed(ResourceKind::KeyPair, name, e)),
        }
    }

    for id in &plan.security_groups {
        info!(security_group = %id, "Deleting security group {}", id);
        match provider.delete_security_group(id).await {
            Ok(()) => report.deleted_security_groups.push(id.clone()),
            Err(e) => report.failures.push(failed(ResourceKind::SecurityGroup, id, e)),
        }
    }

    Ok(report)
}

fn failed(kind: ResourceKind, id: &str, err: Error) -> DeletionFailure {
    warn!(kind = %kind, id = %id, error = %err, "Failed to delete {}", kind);
    DeletionFailure {
        kind,
        id: id.to_string(),
        message: err.to_string(),
    }
}

fn dry_run(plan: &CleanupPlan) -> CleanupReport {
    for id in &plan.instances {
        debug!(instance_id = %id, "Terminating instance {} - DRYRUN", id);
    }
    for name in &plan.key_pairs {
        debug!(key_pair = %name, "Deleting key pair {} - DRYRUN", name);
    }
    for id in &plan.security_groups {
        debug!(security_group = %id, "Deleting security group {} - DRYRUN", id);
    }

    CleanupReport {
        dry_run: true,
        terminated_instances: plan.instances.clone(),
        confirmation_polls: 0,
        deleted_key_pairs: plan.key_pairs.clone(),
        deleted_security_groups: plan.security_groups.clone(),
        failures: Vec::new(),
    }
}

/// Validate, plan and execute one cleanup
pub async fn run<P>(provider: &P, config: &RunConfig, now: DateTime<Utc>) -> Result<CleanupReport>
where
    P: CloudProvider + ?Sized,
{
    config.validate()?;

    let plan = plan(provider, config, now).await?;
    info!("Found {} instances to terminate", plan.instances.len());
    info!("Found {} security groups to delete", plan.security_groups.len());
    info!("Found {} key pairs to delete", plan.key_pairs.len());

    execute(provider, &plan, config).await
}
