//! Age-based retention of discovered instances
//!
//! Instances older than the threshold are considered abandoned builds and
//! are terminated. Younger ones may still belong to a running build, so
//! they and their key pair and security group are left alone.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{ClassifiedInstance, ClassifiedInstances, Instance};

/// Default maximum age of a build instance (minutes)
pub const DEFAULT_MAX_AGE_MINUTES: i64 = 45;

/// Retention threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Instances strictly older than this are terminated
    pub max_age: TimeDelta,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: TimeDelta::minutes(DEFAULT_MAX_AGE_MINUTES),
        }
    }
}

impl RetentionPolicy {
    /// Threshold of `minutes`; negative or unrepresentable values are rejected
    pub fn from_minutes(minutes: i64) -> Result<Self> {
        if minutes < 0 {
            return Err(Error::config(format!(
                "maximum instance age must not be negative, got {minutes} minutes"
            )));
        }
        let max_age = TimeDelta::try_minutes(minutes).ok_or_else(|| {
            Error::config(format!("maximum instance age of {minutes} minutes is too large"))
        })?;
        Ok(Self { max_age })
    }
}

/// Partition `instances` into `to_kill` and `to_save`
///
/// An instance exactly `max_age` old is saved. Every instance must carry a
/// security group and a key pair; one that does not fails the whole run.
pub fn classify(
    instances: &[Instance],
    now: DateTime<Utc>,
    policy: &RetentionPolicy,
) -> Result<ClassifiedInstances> {
    let mut classified = ClassifiedInstances::default();

    for instance in instances {
        let security_group_id = instance
            .security_group_id
            .clone()
            .ok_or_else(|| Error::MissingAssociation {
                instance_id: instance.id.clone(),
                association: "security group",
            })?;
        let key_pair_name = instance
            .key_name
            .clone()
            .ok_or_else(|| Error::MissingAssociation {
                instance_id: instance.id.clone(),
                association: "key pair",
            })?;

        let age = now - instance.launch_time;
        let entry = ClassifiedInstance {
            id: instance.id.clone(),
            security_group_id,
            key_pair_name,
        };

        if age > policy.max_age {
            debug!(instance_id = %entry.id, age_minutes = age.num_minutes(), "Marked for termination");
            classified.to_kill.push(entry);
        } else {
            debug!(instance_id = %entry.id, age_minutes = age.num_minutes(), "Retained");
            classified.to_save.push(entry);
        }
    }

    Ok(classified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1700000000, 0).unwrap()
    }

    fn aged(id: &str, age: TimeDelta) -> Instance {
        Instance::new(id, now() - age, format!("sg-{id}"), format!("packer_{id}"))
    }

    #[test]
    fn test_default_threshold_is_45_minutes() {
        assert_eq!(RetentionPolicy::default().max_age, TimeDelta::minutes(45));
    }

    #[test]
    fn test_from_minutes_rejects_out_of_range() {
        assert_eq!(
            RetentionPolicy::from_minutes(90).unwrap().max_age,
            TimeDelta::minutes(90)
        );
        assert_eq!(RetentionPolicy::from_minutes(0).unwrap().max_age, TimeDelta::zero());
        assert!(matches!(RetentionPolicy::from_minutes(-1), Err(Error::Config(_))));
        assert!(matches!(
            RetentionPolicy::from_minutes(i64::MAX),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_old_instance_killed_young_saved() {
        let instances = vec![
            aged("i-1", TimeDelta::minutes(50)),
            aged("i-2", TimeDelta::minutes(10)),
        ];

        let classified = classify(&instances, now(), &RetentionPolicy::default()).unwrap();

        assert_eq!(classified.kill_ids(), vec!["i-1"]);
        assert_eq!(classified.to_save.len(), 1);
        assert_eq!(classified.to_save[0].id, "i-2");
        assert_eq!(classified.to_save[0].security_group_id, "sg-i-2");
        assert_eq!(classified.to_save[0].key_pair_name, "packer_i-2");
    }

    #[test]
    fn test_instance_at_threshold_is_saved() {
        let instances = vec![
            aged("i-edge", TimeDelta::minutes(45)),
            aged("i-over", TimeDelta::minutes(45) + TimeDelta::seconds(1)),
        ];

        let classified = classify(&instances, now(), &RetentionPolicy::default()).unwrap();

        assert_eq!(classified.kill_ids(), vec!["i-over"]);
        assert_eq!(classified.to_save[0].id, "i-edge");
    }

    #[test]
    fn test_future_launch_time_is_saved() {
        let instances = vec![aged("i-skew", TimeDelta::minutes(-5))];
        let classified = classify(&instances, now(), &RetentionPolicy::default()).unwrap();
        assert!(classified.to_kill.is_empty());
        assert_eq!(classified.to_save.len(), 1);
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let instances: Vec<_> = (0..20)
            .map(|m| aged(&format!("i-{m}"), TimeDelta::minutes(m * 5)))
            .collect();
        let policy = RetentionPolicy::from_minutes(30).unwrap();

        let classified = classify(&instances, now(), &policy).unwrap();

        assert_eq!(
            classified.to_kill.len() + classified.to_save.len(),
            instances.len()
        );
        for instance in &instances {
            let killed = classified.to_kill.iter().any(|c| c.id == instance.id);
            let saved = classified.to_save.iter().any(|c| c.id == instance.id);
            assert!(killed != saved, "{} must be in exactly one set", instance.id);
            assert_eq!(killed, now() - instance.launch_time > policy.max_age);
        }
    }

    #[test]
    fn test_missing_security_group_fails() {
        let mut instance = aged("i-bare", TimeDelta::minutes(60));
        instance.security_group_id = None;

        let err = classify(&[instance], now(), &RetentionPolicy::default()).unwrap_err();

        assert!(matches!(
            err,
            Error::MissingAssociation { ref instance_id, association: "security group" }
                if instance_id == "i-bare"
        ));
    }

    #[test]
    fn test_missing_key_pair_fails_even_when_young() {
        let mut instance = aged("i-nokey", TimeDelta::minutes(1));
        instance.key_name = None;

        let err = classify(&[instance], now(), &RetentionPolicy::default()).unwrap_err();

        assert!(matches!(
            err,
            Error::MissingAssociation { association: "key pair", .. }
        ));
    }

    #[test]
    fn test_empty_input() {
        let classified = classify(&[], now(), &RetentionPolicy::default()).unwrap();
        assert_eq!(classified, ClassifiedInstances::default());
    }
}
