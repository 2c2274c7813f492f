//! Error types for unpacker

use thiserror::Error;

/// Result type for unpacker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop a cleanup run
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid run configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Raw failure reported by a provider call
    #[error("Provider error: {0}")]
    Provider(String),

    /// Listing instances, key pairs or security groups failed
    #[error("Failed to discover {resource}: {message}")]
    Discovery {
        resource: &'static str,
        message: String,
    },

    /// A discovered instance has no security group or key pair
    #[error("Instance {instance_id} has no {association}")]
    MissingAssociation {
        instance_id: String,
        association: &'static str,
    },

    /// The terminate request itself was rejected
    #[error("Failed to request instance termination: {0}")]
    TerminationRequest(String),

    /// Querying instance state while polling failed
    #[error("Failed to query instance state: {0}")]
    StateQuery(String),

    /// Instances still not terminated once the poll budget ran out
    #[error("Unable to confirm termination of instances {pending:?} after {attempts} polls")]
    ConfirmationTimeout { attempts: u32, pending: Vec<String> },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Convert from any displayable provider / SDK error
    pub fn from_aws<E>(err: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::Provider(err.to_string())
    }

    /// Wrap a failure while listing `resource`
    pub fn discovery(resource: &'static str, err: Error) -> Self {
        Self::Discovery {
            resource,
            message: err.to_string(),
        }
    }
}
