//! Core data types shared by the classifier, the confirmer and providers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Instance states used to filter discovery (running or pending builds)
pub const ACTIVE_STATES: [&str; 2] = ["running", "pending"];

/// Instance state as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    /// Instance is pending
    Pending,
    /// Instance is running
    Running,
    /// Instance is stopping
    Stopping,
    /// Instance is stopped
    Stopped,
    /// Instance is shutting down
    ShuttingDown,
    /// Instance is terminated
    Terminated,
    /// Any state name this tool does not know about
    Unknown(String),
}

impl InstanceState {
    /// Parse from the provider's state name (e.g. `"shutting-down"`)
    pub fn from_name(name: &str) -> Self {
        match name {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "shutting-down" => Self::ShuttingDown,
            "terminated" => Self::Terminated,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Provider state name
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
            Self::Unknown(name) => name,
        }
    }

    /// Check if the instance is fully gone
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a discovered instance
///
/// The associations are optional at the provider boundary; the retention
/// classifier rejects instances that lack either of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance ID
    pub id: String,

    /// Launch time
    pub launch_time: DateTime<Utc>,

    /// First security group attached to the instance
    pub security_group_id: Option<String>,

    /// Key pair used to launch the instance
    pub key_name: Option<String>,
}

impl Instance {
    /// Create an instance snapshot with both associations set
    pub fn new(
        id: impl Into<String>,
        launch_time: DateTime<Utc>,
        security_group_id: impl Into<String>,
        key_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            launch_time,
            security_group_id: Some(security_group_id.into()),
            key_name: Some(key_name.into()),
        }
    }
}

/// Security group as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    /// Group ID (what gets deleted)
    pub id: String,
    /// Group name (what the naming convention matches)
    pub name: String,
}

impl SecurityGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Per-instance acknowledgment of a terminate request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationAck {
    pub instance_id: String,
    pub current_state: InstanceState,
}

/// Instance reduced to the identifiers the cleanup needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedInstance {
    pub id: String,
    pub security_group_id: String,
    pub key_pair_name: String,
}

/// Instances partitioned by age
///
/// Every classified instance is in exactly one of the two lists, in
/// discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedInstances {
    /// Older than the retention threshold
    pub to_kill: Vec<ClassifiedInstance>,
    /// Within the retention threshold; their resources are protected
    pub to_save: Vec<ClassifiedInstance>,
}

impl ClassifiedInstances {
    /// IDs of the instances to terminate
    pub fn kill_ids(&self) -> Vec<String> {
        self.to_kill.iter().map(|i| i.id.clone()).collect()
    }

    /// Key pairs still in use by retained instances
    pub fn saved_key_pairs(&self) -> Vec<String> {
        self.to_save.iter().map(|i| i.key_pair_name.clone()).collect()
    }

    /// Security groups still in use by retained instances
    pub fn saved_security_groups(&self) -> Vec<String> {
        self.to_save
            .iter()
            .map(|i| i.security_group_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_state_from_name() {
        assert_eq!(InstanceState::from_name("running"), InstanceState::Running);
        assert_eq!(
            InstanceState::from_name("shutting-down"),
            InstanceState::ShuttingDown
        );
        assert_eq!(
            InstanceState::from_name("terminated"),
            InstanceState::Terminated
        );
        assert_eq!(
            InstanceState::from_name("rebooting"),
            InstanceState::Unknown("rebooting".to_string())
        );
    }

    #[test]
    fn test_instance_state_name_is_stable() {
        for name in ["pending", "running", "stopping", "stopped", "shutting-down", "terminated"] {
            assert_eq!(InstanceState::from_name(name).as_str(), name);
        }
        assert_eq!(InstanceState::ShuttingDown.to_string(), "shutting-down");
    }

    #[test]
    fn test_only_terminated_is_terminated() {
        assert!(InstanceState::Terminated.is_terminated());
        assert!(!InstanceState::ShuttingDown.is_terminated());
        assert!(!InstanceState::Unknown("terminated ".to_string()).is_terminated());
    }

    #[test]
    fn test_saved_resources_follow_to_save() {
        let classified = ClassifiedInstances {
            to_kill: vec![ClassifiedInstance {
                id: "i-old".to_string(),
                security_group_id: "sg-old".to_string(),
                key_pair_name: "packer_old".to_string(),
            }],
            to_save: vec![ClassifiedInstance {
                id: "i-new".to_string(),
                security_group_id: "sg-new".to_string(),
                key_pair_name: "packer_new".to_string(),
            }],
        };

        assert_eq!(classified.kill_ids(), vec!["i-old"]);
        assert_eq!(classified.saved_key_pairs(), vec!["packer_new"]);
        assert_eq!(classified.saved_security_groups(), vec!["sg-new"]);
    }
}
