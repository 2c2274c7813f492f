//! Provider capability traits
//!
//! The cleanup run works through these interfaces only, never through a
//! concrete cloud client. The EC2 implementation lives in the `unpacker`
//! crate; [`crate::memory::MemoryProvider`] backs the tests.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::types::{Instance, InstanceState, SecurityGroup, TerminationAck};

/// Read side: find candidate resources
#[async_trait]
pub trait ResourceDiscovery: Send + Sync {
    /// Instances tagged `tag_key=tag_value` whose state is one of `states`
    async fn list_instances(
        &self,
        tag_key: &str,
        tag_value: &str,
        states: &[&str],
    ) -> Result<Vec<Instance>>;

    /// Names of every key pair in the region
    async fn list_key_pairs(&self) -> Result<Vec<String>>;

    /// Every security group in the region
    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>>;
}

/// Write side: delete resources and observe instance state
#[async_trait]
pub trait ResourceMutation: Send + Sync {
    async fn delete_key_pair(&self, name: &str) -> Result<()>;

    async fn delete_security_group(&self, id: &str) -> Result<()>;

    /// Request termination of all `ids` in one call
    async fn terminate_instances(&self, ids: &[String]) -> Result<Vec<TerminationAck>>;

    /// Current state of each of `ids`; ids the provider no longer reports
    /// are simply absent from the map
    async fn query_instance_states(&self, ids: &[String]) -> Result<HashMap<String, InstanceState>>;
}

/// Full capability needed by a cleanup run
pub trait CloudProvider: ResourceDiscovery + ResourceMutation {}

impl<T: ResourceDiscovery + ResourceMutation> CloudProvider for T {}
