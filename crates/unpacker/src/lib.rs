//! # unpacker
//!
//! EC2 provider and CLI for the unpacker cleanup tool. The cleanup logic
//! itself lives in `unpacker-core`.

#![warn(clippy::all)]

pub mod cli;
pub mod ec2;
pub mod report;

pub use cli::Cli;
pub use ec2::{create_ec2_client, Ec2Provider};
pub use report::{render_json, render_text};
