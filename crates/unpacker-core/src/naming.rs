//! Naming convention shared with Packer
//!
//! Packer names the temporary key pairs and security groups it creates
//! after itself. Key pairs must carry the `packer_` prefix; security group
//! names only need to start with `packer`.

use crate::types::SecurityGroup;

/// Prefix of key pairs created by Packer
pub const PACKER_KEY_PAIR_PREFIX: &str = "packer_";

/// Prefix of security group names created by Packer
pub const PACKER_SECURITY_GROUP_PREFIX: &str = "packer";

pub fn is_packer_key_pair(name: &str) -> bool {
    name.starts_with(PACKER_KEY_PAIR_PREFIX)
}

pub fn is_packer_security_group(name: &str) -> bool {
    name.starts_with(PACKER_SECURITY_GROUP_PREFIX)
}

/// Keep the key pair names that Packer owns
pub fn packer_key_pairs(names: Vec<String>) -> Vec<String> {
    names.into_iter().filter(|n| is_packer_key_pair(n)).collect()
}

/// IDs of the security groups whose name Packer owns
pub fn packer_security_groups(groups: Vec<SecurityGroup>) -> Vec<String> {
    groups
        .into_iter()
        .filter(|g| is_packer_security_group(&g.name))
        .map(|g| g.id)
        .collect()
}
