//! Test utilities for backup-orchestrator
//!
//! This crate provides shared test utilities, mock implementations,
//! and helper functions for testing the backup-orchestrator application.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::new();
//!     let source = ctx.create_file("data/a.txt", "hello");
//!     let (config, _dir) = ConfigBuilder::new()
//!         .add_directory_job("data", source.parent().unwrap())
//!         .persist();
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{OptionAssertions, ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use backup_orchestrator::config::{Config, GlobalConfig, JobConfig, ObjectStoreConfig};
pub use backup_orchestrator::jobs::{
    BackupJob, BackupRun, Destination, JobId, NewJob, RemoteEndpoint, RunStatus, Schedule, SourceKind,
};

// Re-export mock implementations from the main crate
pub use backup_orchestrator::destinations::mock::MockAdapter;
pub use backup_orchestrator::utils::executor::mock::{CommandCall, MockExecutor, MockResponse};
pub use backup_orchestrator::utils::executor::CommandExecutor;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
