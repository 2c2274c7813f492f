//! In-memory provider
//!
//! Stands in for a cloud account: instances, key pairs and security groups
//! are seeded up front, termination is scripted per instance, failures can
//! be injected per call, and every mutation is recorded for inspection.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::provider::{ResourceDiscovery, ResourceMutation};
use crate::types::{Instance, InstanceState, SecurityGroup, TerminationAck};

/// How a seeded instance behaves once its state is queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Reports `terminated` from its n-th state query on (1-based)
    AfterPolls(u32),
    /// Stays `shutting-down` forever
    Never,
}

#[derive(Debug, Clone)]
struct SeededInstance {
    instance: Instance,
    tag: (String, String),
    state: InstanceState,
}

#[derive(Debug, Default)]
struct Inner {
    instances: Vec<SeededInstance>,
    key_pairs: Vec<String>,
    security_groups: Vec<SecurityGroup>,
    terminations: HashMap<String, Termination>,
    polls: HashMap<String, u32>,

    fail_discovery: HashSet<&'static str>,
    fail_terminate: bool,
    fail_state_query_on: Option<usize>,
    fail_key_pairs: HashSet<String>,
    fail_security_groups: HashSet<String>,

    terminate_requests: Vec<Vec<String>>,
    state_queries: Vec<Vec<String>>,
    deleted_key_pairs: Vec<String>,
    deleted_security_groups: Vec<String>,
}

/// Fake provider backed by plain collections
#[derive(Debug, Default)]
pub struct MemoryProvider {
    inner: Mutex<Inner>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with(self, f: impl FnOnce(&mut Inner)) -> Self {
        f(&mut self.lock());
        self
    }

    /// Seed a running instance carrying the tag `tag_key=tag_value`
    pub fn with_instance(
        self,
        instance: Instance,
        tag_key: impl Into<String>,
        tag_value: impl Into<String>,
    ) -> Self {
        let tag = (tag_key.into(), tag_value.into());
        self.with(|inner| {
            inner.instances.push(SeededInstance {
                instance,
                tag,
                state: InstanceState::Running,
            })
        })
    }

    /// Override the lifecycle state of a seeded instance
    pub fn with_instance_state(self, id: &str, state: InstanceState) -> Self {
        self.with(|inner| {
            for seeded in inner.instances.iter_mut().filter(|s| s.instance.id == id) {
                seeded.state = state.clone();
            }
        })
    }

    pub fn with_key_pair(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.with(|inner| inner.key_pairs.push(name))
    }

    pub fn with_security_group(self, id: impl Into<String>, name: impl Into<String>) -> Self {
        let group = SecurityGroup::new(id, name);
        self.with(|inner| inner.security_groups.push(group))
    }

    /// Script how `id` reports its state while being confirmed
    pub fn with_termination(self, id: impl Into<String>, termination: Termination) -> Self {
        let id = id.into();
        self.with(|inner| {
            inner.terminations.insert(id, termination);
        })
    }

    /// Fail listing of `resource` ("instances", "key pairs" or "security groups")
    pub fn fail_discovery(self, resource: &'static str) -> Self {
        self.with(|inner| {
            inner.fail_discovery.insert(resource);
        })
    }

    pub fn fail_terminate(self) -> Self {
        self.with(|inner| inner.fail_terminate = true)
    }

    /// Fail the n-th state query (1-based)
    pub fn fail_state_query_on(self, n: usize) -> Self {
        self.with(|inner| inner.fail_state_query_on = Some(n))
    }

    pub fn fail_delete_key_pair(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.with(|inner| {
            inner.fail_key_pairs.insert(name);
        })
    }

    pub fn fail_delete_security_group(self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.with(|inner| {
            inner.fail_security_groups.insert(id);
        })
    }

    /// Id batches passed to `terminate_instances`, in call order
    pub fn terminate_requests(&self) -> Vec<Vec<String>> {
        self.lock().terminate_requests.clone()
    }

    /// Id batches passed to `query_instance_states`, in call order
    pub fn state_queries(&self) -> Vec<Vec<String>> {
        self.lock().state_queries.clone()
    }

    pub fn deleted_key_pairs(&self) -> Vec<String> {
        self.lock().deleted_key_pairs.clone()
    }

    pub fn deleted_security_groups(&self) -> Vec<String> {
        self.lock().deleted_security_groups.clone()
    }

    /// True when nothing was terminated or deleted
    pub fn is_untouched(&self) -> bool {
        let inner = self.lock();
        inner.terminate_requests.is_empty()
            && inner.deleted_key_pairs.is_empty()
            && inner.deleted_security_groups.is_empty()
    }
}

impl Inner {
    fn check_discovery(&self, resource: &'static str) -> Result<()> {
        if self.fail_discovery.contains(resource) {
            return Err(Error::Provider(format!("injected failure listing {resource}")));
        }
        Ok(())
    }

    fn state_of(&mut self, id: &str) -> Option<InstanceState> {
        if let Some(termination) = self.terminations.get(id).copied() {
            let polls = self.polls.entry(id.to_string()).or_default();
            *polls += 1;
            let state = match termination {
                Termination::AfterPolls(n) if *polls >= n => InstanceState::Terminated,
                _ => InstanceState::ShuttingDown,
            };
            return Some(state);
        }
        self.instances
            .iter()
            .find(|s| s.instance.id == id)
            .map(|s| s.state.clone())
    }
}

#[async_trait]
impl ResourceDiscovery for MemoryProvider {
    async fn list_instances(
        &self,
        tag_key: &str,
        tag_value: &str,
        states: &[&str],
    ) -> Result<Vec<Instance>> {
        let inner = self.lock();
        inner.check_discovery("instances")?;
        Ok(inner
            .instances
            .iter()
            .filter(|s| s.tag.0 == tag_key && s.tag.1 == tag_value)
            .filter(|s| states.contains(&s.state.as_str()))
            .map(|s| s.instance.clone())
            .collect())
    }

    async fn list_key_pairs(&self) -> Result<Vec<String>> {
        let inner = self.lock();
        inner.check_discovery("key pairs")?;
        Ok(inner.key_pairs.clone())
    }

    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        let inner = self.lock();
        inner.check_discovery("security groups")?;
        Ok(inner.security_groups.clone())
    }
}

#[async_trait]
impl ResourceMutation for MemoryProvider {
    async fn delete_key_pair(&self, name: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_key_pairs.contains(name) {
            return Err(Error::Provider(format!("key pair {name} is in use")));
        }
        inner.key_pairs.retain(|k| k != name);
        inner.deleted_key_pairs.push(name.to_string());
        Ok(())
    }

    async fn delete_security_group(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_security_groups.contains(id) {
            return Err(Error::Provider(format!("security group {id} has a dependent object")));
        }
        inner.security_groups.retain(|g| g.id != id);
        inner.deleted_security_groups.push(id.to_string());
        Ok(())
    }

    async fn terminate_instances(&self, ids: &[String]) -> Result<Vec<TerminationAck>> {
        let mut inner = self.lock();
        if inner.fail_terminate {
            return Err(Error::Provider("injected terminate failure".to_string()));
        }
        inner.terminate_requests.push(ids.to_vec());
        for seeded in inner
            .instances
            .iter_mut()
            .filter(|s| ids.contains(&s.instance.id))
        {
            seeded.state = InstanceState::ShuttingDown;
        }
        Ok(ids
            .iter()
            .map(|id| TerminationAck {
                instance_id: id.clone(),
                current_state: InstanceState::ShuttingDown,
            })
            .collect())
    }

    async fn query_instance_states(&self, ids: &[String]) -> Result<HashMap<String, InstanceState>> {
        let mut inner = self.lock();
        inner.state_queries.push(ids.to_vec());
        if inner.fail_state_query_on == Some(inner.state_queries.len()) {
            return Err(Error::Provider("injected state query failure".to_string()));
        }
        Ok(ids
            .iter()
            .filter_map(|id| inner.state_of(id).map(|state| (id.clone(), state)))
            .collect())
    }
}
