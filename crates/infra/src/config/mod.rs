//! Configuration loading and management
//!
//! This module provides the client configuration type and utilities for
//! loading it from environment variables and files.

pub mod loader;
pub mod settings;

// Re-export commonly used items
pub use loader::{
    load, load_from_env, load_from_file, load_from_lookup, load_iam_from_env,
    load_iam_from_lookup, probe_config_paths,
};
pub use settings::{ClientConfig, ServiceResolver, StaticServiceResolver};
