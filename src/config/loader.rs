use super::types::*;
use super::expand_tilde;
use crate::archive::database::{is_embedded_database, ConnectionString};
use crate::jobs::{Destination, RemoteEndpoint, SourceKind};
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(contents: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(contents)?;
    expand_paths(&mut config.global);
    validate_config(&config)?;
    Ok(config)
}

fn expand_paths(global: &mut GlobalConfig) {
    global.scratch_dir = expand_tilde(&global.scratch_dir);
    global.database_path = expand_tilde(&global.database_path);
    global.key_file = expand_tilde(&global.key_file);
    global.lock_directory = expand_tilde(&global.lock_directory);
    global.log_directory = expand_tilde(&global.log_directory);
}

/// Validate the configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.global.tick_seconds == 0 {
        return Err(ConfigError::ValidationError(
            "tick_seconds must be greater than zero".to_string(),
        ));
    }

    if config.global.dump_tool.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "dump_tool must not be empty".to_string(),
        ));
    }

    for (name, job) in &config.jobs {
        validate_job(name, job)?;
    }

    Ok(())
}

fn validate_job(name: &str, job: &JobConfig) -> Result<()> {
    let fail = |msg: String| Err(ConfigError::ValidationError(format!("Job '{}': {}", name, msg)));

    if name.trim().is_empty() || name.contains(['/', '\\']) {
        return fail("job name must be non-empty and must not contain path separators".to_string());
    }

    if job.source_path.trim().is_empty() {
        return fail("source_path is empty".to_string());
    }

    if job.source_kind == SourceKind::Database && !is_embedded_database(&job.source_path) {
        if let Err(e) = ConnectionString::parse(&job.source_path) {
            return fail(e.to_string());
        }
    }

    match &job.destination {
        Destination::Local { path } => {
            if path.as_os_str().is_empty() {
                return fail("local destination path is empty".to_string());
            }
        }
        Destination::Ftp(endpoint) => validate_endpoint(endpoint).or_else(|msg| fail(msg))?,
        Destination::Smb(endpoint) => {
            validate_endpoint(endpoint).or_else(|msg| fail(msg))?;
            if endpoint.path_segments().is_empty() {
                return fail("smb remote_path must start with the share name".to_string());
            }
        }
        Destination::ObjectStore { .. } => {}
    }

    Ok(())
}

fn validate_endpoint(endpoint: &RemoteEndpoint) -> std::result::Result<(), String> {
    if endpoint.host.trim().is_empty() {
        return Err("remote destination host is empty".to_string());
    }
    if endpoint.user.trim().is_empty() {
        return Err("remote destination user is empty".to_string());
    }
    Ok(())
}
