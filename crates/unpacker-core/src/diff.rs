//! Symmetric difference of resource names

use std::collections::HashSet;

/// Names present in exactly one of `a` and `b`
///
/// Duplicates within an input count once. The result lists the names
/// unique to `a` in first-occurrence order, then those unique to `b`.
pub fn symmetric_difference(a: &[String], b: &[String]) -> Vec<String> {
    let in_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let in_b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let mut seen = HashSet::new();
    a.iter()
        .filter(|name| !in_b.contains(name.as_str()))
        .chain(b.iter().filter(|name| !in_a.contains(name.as_str())))
        .filter(|name| seen.insert(*name))
        .cloned()
        .collect()
}
