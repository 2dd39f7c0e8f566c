//! Configuration module for backup-orchestrator
//!
//! This module handles loading and validating configuration from TOML files,
//! and seeding the job store with the job definitions it contains.
//!
//! ## Example Usage
//!
//! ```no_run
//! use backup_orchestrator::config;
//!
//! let config = config::load_config("config.toml")?;
//!
//! for (name, job) in &config.jobs {
//!     println!("Job: {}, Destination: {}", name, job.destination.describe());
//! }
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{load_config, parse_config, ConfigError, Result};
pub use types::*;

use crate::jobs::JobId;
use crate::store::JobStore;
use tracing::{debug, info};

/// Upsert every job definition from the configuration into the store.
///
/// Jobs are matched by (client_id, name); run status and the enabled flag of
/// existing jobs are left untouched, and jobs missing from the configuration
/// are never deleted.
pub fn sync_jobs(config: &Config, store: &dyn JobStore) -> crate::error::Result<Vec<JobId>> {
    let mut ids = Vec::with_capacity(config.jobs.len());

    for (name, job) in &config.jobs {
        let id = store.upsert_job(&job.to_new_job(name))?;
        debug!("Synced job '{}' (ID: {})", name, id);
        ids.push(id);
    }

    if !ids.is_empty() {
        info!("Synced {} job definition(s) from configuration", ids.len());
    }

    Ok(ids)
}

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
