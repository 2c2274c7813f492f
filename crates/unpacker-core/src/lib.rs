//! # unpacker core
//!
//! Removes EC2 instances, key pairs and security groups left behind by
//! failed or abandoned Packer builds.
//!
//! - [`retention`]: age-based split of tagged instances into kill / save
//! - [`diff`]: symmetric difference protecting resources of saved instances
//! - [`confirm`]: terminate-and-poll until every instance is gone
//! - [`run`]: wires discovery, planning and execution together
//!
//! Cloud access goes through the [`provider`] traits only; [`memory`]
//! provides an in-memory implementation for tests.

#![warn(clippy::all)]

pub mod confirm;
pub mod diff;
pub mod error;
pub mod memory;
pub mod naming;
pub mod provider;
pub mod retention;
pub mod run;
pub mod types;

pub use confirm::{
    Confirmation, TerminationConfirmer, TerminationPhase, TerminationPolicy, DEFAULT_POLL_ATTEMPTS,
    DEFAULT_POLL_INTERVAL_SECS,
};
pub use diff::symmetric_difference;
pub use error::{Error, Result};
pub use memory::{MemoryProvider, Termination};
pub use naming::{PACKER_KEY_PAIR_PREFIX, PACKER_SECURITY_GROUP_PREFIX};
pub use provider::{CloudProvider, ResourceDiscovery, ResourceMutation};
pub use retention::{classify, RetentionPolicy, DEFAULT_MAX_AGE_MINUTES};
pub use run::{
    execute, plan, run, CleanupPlan, CleanupReport, DeletionFailure, ResourceKind, RunConfig,
};
pub use types::{
    ClassifiedInstance, ClassifiedInstances, Instance, InstanceState, SecurityGroup,
    TerminationAck, ACTIVE_STATES,
};
