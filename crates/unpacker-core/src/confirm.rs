//! Termination confirmation
//!
//! Terminating an instance is asynchronous on the provider side: the
//! request returns while the instance is still `shutting-down`. Security
//! groups cannot be deleted while an instance still references them, so
//! the cleanup blocks here until every requested instance reports
//! `terminated`.
//!
//! ```text
//! Requested ──► Polling ──┬─► Confirmed   (pending set empty)
//!                         └─► TimedOut    (attempt budget exhausted)
//! ```
//!
//! Each poll rebuilds the pending set by filtering out the ids reported as
//! terminated, so several confirmations arriving in one batch can never
//! shift or skip a neighbouring entry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::provider::ResourceMutation;
use crate::types::InstanceState;

/// Default number of state polls before giving up
pub const DEFAULT_POLL_ATTEMPTS: u32 = 20;

/// Default pause between state polls (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Poll budget for termination confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    /// Maximum number of state queries
    pub max_attempts: u32,
    /// Fixed pause between two queries
    pub interval: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_POLL_ATTEMPTS,
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl TerminationPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Phase of a termination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationPhase {
    /// Terminate request issued for the full id set
    Requested,
    /// Waiting for the provider to report every id terminated
    Polling,
    /// Every id confirmed terminated
    Confirmed,
    /// Poll budget exhausted with ids still pending
    TimedOut,
}

impl fmt::Display for TerminationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "requested",
            Self::Polling => "polling",
            Self::Confirmed => "confirmed",
            Self::TimedOut => "timed-out",
        };
        f.write_str(name)
    }
}

/// Successful outcome of a confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// State queries issued before every id was confirmed
    pub attempts: u32,
}

/// Drives termination of a batch of instances to completion
#[derive(Debug, Clone, Default)]
pub struct TerminationConfirmer {
    policy: TerminationPolicy,
}

impl TerminationConfirmer {
    pub fn new(policy: TerminationPolicy) -> Self {
        Self { policy }
    }

    /// Request termination of `ids` and wait until all are terminated
    pub async fn terminate_and_confirm<P>(&self, provider: &P, ids: &[String]) -> Result<Confirmation>
    where
        P: ResourceMutation + ?Sized,
    {
        if ids.is_empty() {
            return Ok(Confirmation { attempts: 0 });
        }

        let acks = provider
            .terminate_instances(ids)
            .await
            .map_err(|e| Error::TerminationRequest(e.to_string()))?;
        info!(
            phase = %TerminationPhase::Requested,
            count = ids.len(),
            "Termination requested"
        );
        for ack in &acks {
            info!(
                instance_id = %ack.instance_id,
                state = %ack.current_state,
                "Instance {} is now in state {}",
                ack.instance_id,
                ack.current_state
            );
        }

        self.confirm(provider, ids).await
    }

    /// Poll until every id in `ids` reports `terminated`
    pub async fn confirm<P>(&self, provider: &P, ids: &[String]) -> Result<Confirmation>
    where
        P: ResourceMutation + ?Sized,
    {
        let mut pending = dedup(ids);
        if pending.is_empty() {
            return Ok(Confirmation { attempts: 0 });
        }

        for attempt in 1..=self.policy.max_attempts {
            info!(
                phase = %TerminationPhase::Polling,
                attempt,
                pending = pending.len(),
                "Polling to confirm instance termination..."
            );

            let states = provider
                .query_instance_states(&pending)
                .await
                .map_err(|e| Error::StateQuery(e.to_string()))?;

            pending = still_pending(pending, &states);

            if pending.is_empty() {
                info!(phase = %TerminationPhase::Confirmed, attempts = attempt, "All instances terminated");
                return Ok(Confirmation { attempts: attempt });
            }

            debug!(attempt, pending = ?pending, "Instances not terminated yet");

            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.interval).await;
            }
        }

        warn!(
            phase = %TerminationPhase::TimedOut,
            attempts = self.policy.max_attempts,
            pending = ?pending,
            "Gave up waiting for instance termination"
        );
        Err(Error::ConfirmationTimeout {
            attempts: self.policy.max_attempts,
            pending,
        })
    }
}

/// Ids not reported as terminated, in their original order
fn still_pending(pending: Vec<String>, states: &HashMap<String, InstanceState>) -> Vec<String> {
    pending
        .into_iter()
        .filter(|id| !states.get(id).is_some_and(InstanceState::is_terminated))
        .collect()
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}
