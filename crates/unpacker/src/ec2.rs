//! EC2 provider
//!
//! Implements the unpacker-core provider traits on top of `aws-sdk-ec2`.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ec2::types::{
    Filter, Instance as AwsInstance, InstanceStateChange, InstanceStatus,
    SecurityGroup as AwsSecurityGroup,
};
use aws_sdk_ec2::Client;
use aws_types::region::Region;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};
use unpacker_core::{
    Error, Instance, InstanceState, ResourceDiscovery, ResourceMutation, Result, SecurityGroup,
    TerminationAck,
};

/// Convert an EC2 SDK error into a provider error
fn ec2_error<E>(err: E) -> Error
where
    aws_sdk_ec2::Error: From<E>,
{
    Error::from_aws(aws_sdk_ec2::Error::from(err))
}

/// Create EC2 client for `region`
pub async fn create_ec2_client(region: impl Into<String>) -> Client {
    let region = region.into();
    debug!("Creating EC2 client for region: {}", region);

    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region))
        .load()
        .await;

    Client::new(&config)
}

/// Provider backed by the EC2 API of one region
pub struct Ec2Provider {
    client: Client,
}

impl Ec2Provider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect with the default credential chain
    pub async fn connect(region: impl Into<String>) -> Self {
        Self::new(create_ec2_client(region).await)
    }
}

#[async_trait]
impl ResourceDiscovery for Ec2Provider {
    async fn list_instances(
        &self,
        tag_key: &str,
        tag_value: &str,
        states: &[&str],
    ) -> Result<Vec<Instance>> {
        let tag_filter = Filter::builder()
            .name(format!("tag:{}", tag_key))
            .values(tag_value)
            .build();
        let state_filter = Filter::builder()
            .name("instance-state-name")
            .set_values(Some(states.iter().map(|s| s.to_string()).collect()))
            .build();

        let pages = self
            .client
            .describe_instances()
            .filters(tag_filter)
            .filters(state_filter)
            .into_paginator()
            .send()
            .try_collect()
            .await
            .map_err(ec2_error)?;

        Ok(pages
            .iter()
            .flat_map(|page| page.reservations())
            .flat_map(|reservation| reservation.instances())
            .filter_map(parse_instance)
            .collect())
    }

    async fn list_key_pairs(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .describe_key_pairs()
            .send()
            .await
            .map_err(ec2_error)?;

        Ok(response
            .key_pairs()
            .iter()
            .filter_map(|k| k.key_name().map(str::to_string))
            .collect())
    }

    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        let pages = self
            .client
            .describe_security_groups()
            .into_paginator()
            .send()
            .try_collect()
            .await
            .map_err(ec2_error)?;

        Ok(pages
            .iter()
            .flat_map(|page| page.security_groups())
            .filter_map(parse_security_group)
            .collect())
    }
}

#[async_trait]
impl ResourceMutation for Ec2Provider {
    async fn delete_key_pair(&self, name: &str) -> Result<()> {
        self.client
            .delete_key_pair()
            .key_name(name)
            .send()
            .await
            .map_err(ec2_error)?;
        Ok(())
    }

    async fn delete_security_group(&self, id: &str) -> Result<()> {
        self.client
            .delete_security_group()
            .group_id(id)
            .send()
            .await
            .map_err(ec2_error)?;
        Ok(())
    }

    async fn terminate_instances(&self, ids: &[String]) -> Result<Vec<TerminationAck>> {
        let response = self
            .client
            .terminate_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(ec2_error)?;

        Ok(response
            .terminating_instances()
            .iter()
            .filter_map(parse_state_change)
            .collect())
    }

    async fn query_instance_states(&self, ids: &[String]) -> Result<HashMap<String, InstanceState>> {
        let response = self
            .client
            .describe_instance_status()
            .set_instance_ids(Some(ids.to_vec()))
            .include_all_instances(true)
            .send()
            .await
            .map_err(ec2_error)?;

        Ok(response
            .instance_statuses()
            .iter()
            .filter_map(parse_status)
            .collect())
    }
}

/// Parse an AWS EC2 instance into our Instance type
///
/// Only the first security group counts as the instance's association.
fn parse_instance(instance: &AwsInstance) -> Option<Instance> {
    let Some(id) = instance.instance_id() else {
        warn!("Skipping instance without an id");
        return None;
    };

    // a missing launch time classifies as brand new, i.e. retained
    let launch_time = instance
        .launch_time()
        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_else(Utc::now);

    Some(Instance {
        id: id.to_string(),
        launch_time,
        security_group_id: instance
            .security_groups()
            .first()
            .and_then(|g| g.group_id())
            .map(str::to_string),
        key_name: instance.key_name().map(str::to_string),
    })
}

fn parse_security_group(group: &AwsSecurityGroup) -> Option<SecurityGroup> {
    Some(SecurityGroup::new(group.group_id()?, group.group_name()?))
}

fn parse_state_change(change: &InstanceStateChange) -> Option<TerminationAck> {
    let state = change
        .current_state()
        .and_then(|s| s.name())
        .map(|n| InstanceState::from_name(n.as_str()))?;
    Some(TerminationAck {
        instance_id: change.instance_id()?.to_string(),
        current_state: state,
    })
}

fn parse_status(status: &InstanceStatus) -> Option<(String, InstanceState)> {
    let state = status
        .instance_state()
        .and_then(|s| s.name())
        .map(|n| InstanceState::from_name(n.as_str()))?;
    Some((status.instance_id()?.to_string(), state))
}
