//! Rendering of the final cleanup report
//!
//! Logs go to stderr; whatever is rendered here is the only thing written
//! to stdout, so `--json` output can be piped straight into a parser.

use unpacker_core::CleanupReport;

/// Report as pretty-printed JSON
pub fn render_json(report: &CleanupReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Report as human readable lines
pub fn render_text(report: &CleanupReport) -> String {
    let mut lines = Vec::new();

    if report.dry_run {
        for id in &report.terminated_instances {
            lines.push(format!("Terminating instance {} - DRYRUN", id));
        }
        for name in &report.deleted_key_pairs {
            lines.push(format!("Deleting key pair {} - DRYRUN", name));
        }
        for id in &report.deleted_security_groups {
            lines.push(format!("Deleting security group {} - DRYRUN", id));
        }
        lines.push("Unpacker DryRun completed successfully".to_string());
        return lines.join("\n");
    }

    lines.push(format!(
        "Terminated {} instances, deleted {} key pairs and {} security groups",
        report.terminated_instances.len(),
        report.deleted_key_pairs.len(),
        report.deleted_security_groups.len()
    ));
    for failure in &report.failures {
        lines.push(format!(
            "⚠️  Could not delete {} {}: {}",
            failure.kind, failure.id, failure.message
        ));
    }
    if report.failures.is_empty() {
        lines.push("Unpacker completed successfully".to_string());
    } else {
        lines.push(format!(
            "Unpacker completed with {} failed deletions",
            report.failures.len()
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use unpacker_core::{DeletionFailure, ResourceKind};

    fn dry_run_report() -> CleanupReport {
        CleanupReport {
            dry_run: true,
            terminated_instances: vec!["i-old".to_string()],
            deleted_key_pairs: vec!["packer_old".to_string()],
            deleted_security_groups: vec!["sg-old".to_string()],
            ..CleanupReport::default()
        }
    }

    #[test]
    fn test_json_output_is_the_bare_report() {
        let report = dry_run_report();

        let out = render_json(&report).unwrap();

        let parsed: CleanupReport = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, report);
        assert!(!out.contains("DRYRUN"));
    }

    #[test]
    fn test_dry_run_lines_appear_once() {
        let out = render_text(&dry_run_report());

        assert_eq!(out.matches("Terminating instance i-old - DRYRUN").count(), 1);
        assert_eq!(out.matches("Deleting key pair packer_old - DRYRUN").count(), 1);
        assert_eq!(out.matches("Deleting security group sg-old - DRYRUN").count(), 1);
        assert!(out.ends_with("Unpacker DryRun completed successfully"));
    }

    #[test]
    fn test_failures_listed_in_summary() {
        let report = CleanupReport {
            terminated_instances: vec!["i-old".to_string()],
            deleted_key_pairs: vec!["packer_old".to_string()],
            failures: vec![DeletionFailure {
                kind: ResourceKind::SecurityGroup,
                id: "sg-old".to_string(),
                message: "DependencyViolation".to_string(),
            }],
            ..CleanupReport::default()
        };

        let out = render_text(&report);

        assert!(out.starts_with("Terminated 1 instances, deleted 1 key pairs and 0 security groups"));
        assert!(out.contains("Could not delete security group sg-old: DependencyViolation"));
        assert!(out.ends_with("Unpacker completed with 1 failed deletions"));
    }
}
