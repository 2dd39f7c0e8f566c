use anyhow::{Context, Result};
use backup_orchestrator::archive;
use backup_orchestrator::config::{self, expand_tilde, Config};
use backup_orchestrator::crypto::{plain_name, Encryptor, KeyStore, ENCRYPTED_SUFFIX};
use backup_orchestrator::destinations::ObjectStoreSettings;
use backup_orchestrator::jobs::{BackupJob, BackupRun, Destination, JobId, SourceKind};
use backup_orchestrator::managers::logging::{self, LoggingConfig};
use backup_orchestrator::utils::RealExecutor;
use backup_orchestrator::{BackupExecutor, JobStore, Scheduler, SqliteJobStore};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "backup-orchestrator")]
#[command(about = "Scheduled backups of files, directories and databases", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/backup-orchestrator/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backup job now
    Execute {
        /// Job ID (see `list`)
        job_id: JobId,
    },

    /// List all known jobs
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Start the scheduler and block until interrupted
    Run,

    /// Show a job's definition and recent runs
    Status {
        job_id: JobId,

        /// Number of past runs to show
        #[arg(long, default_value_t = 10)]
        history: usize,
    },

    /// Enable a job
    Enable { job_id: JobId },

    /// Disable a job (the scheduler and `execute` will skip it)
    Disable { job_id: JobId },

    /// Validate configuration file and external tools
    Validate,

    /// Decrypt (if needed) and unpack an artifact
    Restore {
        /// Artifact file (`.tar`, `.tar.gz`, optionally `.enc`)
        artifact: PathBuf,

        /// Directory to unpack into
        #[arg(short, long)]
        target: PathBuf,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = config::load_config(expand_tilde(&cli.config))?;

    // Setup logging with file rotation (must keep guard alive)
    let _log_guard = match cli.command {
        Commands::Validate => {
            logging::init_console_logging();
            None
        }
        _ => Some(logging::init_logging(&LoggingConfig::from_global(&config.global))?),
    };

    match cli.command {
        Commands::Execute { job_id } => handle_execute(&config, open_store(&config)?, job_id),
        Commands::List { json } => handle_list(open_store(&config)?.as_ref(), json),
        Commands::Run => handle_run(&config, open_store(&config)?),
        Commands::Status { job_id, history } => handle_status(open_store(&config)?.as_ref(), job_id, history),
        Commands::Enable { job_id } => {
            open_store(&config)?.set_active(job_id, true)?;
            println!("✓ Job {} enabled", job_id);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Disable { job_id } => {
            open_store(&config)?.set_active(job_id, false)?;
            println!("✓ Job {} disabled", job_id);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate => handle_validate(&config),
        Commands::Restore { artifact, target, yes } => handle_restore(&config, &artifact, &target, yes),
    }
}

/// Open the job store and bring it in line with the configured jobs
fn open_store(config: &Config) -> Result<Arc<SqliteJobStore>> {
    let store = SqliteJobStore::open(&config.global.database_path)
        .with_context(|| format!("Failed to open job store {:?}", config.global.database_path))?;
    config::sync_jobs(config, &store)?;
    Ok(Arc::new(store))
}

fn handle_execute(config: &Config, store: Arc<SqliteJobStore>, job_id: JobId) -> Result<ExitCode> {
    let executor = BackupExecutor::from_config(config, store, Arc::new(RealExecutor::new()));

    match executor.execute(job_id) {
        Ok(run) => {
            let outcome = if run.is_success() { "SUCCESS" } else { "FAILED" };
            println!("Backup job {}: {}", job_id, outcome);
            if let Some(message) = &run.message {
                println!("{}", message);
            }
            Ok(if run.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Err(e) => {
            error!("Backup job {} did not start: {}", job_id, e);
            println!("Backup job {}: FAILED", job_id);
            println!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn handle_run(config: &Config, store: Arc<SqliteJobStore>) -> Result<ExitCode> {
    let executor = BackupExecutor::from_config(config, store.clone(), Arc::new(RealExecutor::new()));
    let scheduler = Scheduler::new(
        store,
        Arc::new(executor),
        Duration::from_secs(config.global.tick_seconds),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    runtime.block_on(scheduler.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    }))?;
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct JobView<'a> {
    id: JobId,
    name: &'a str,
    client_id: &'a str,
    source_kind: SourceKind,
    source_path: String,
    destination: String,
    schedule: Option<String>,
    retention_days: u32,
    compress: bool,
    encrypt: bool,
    active: bool,
    last_run: Option<&'a BackupRun>,
}

impl<'a> From<&'a BackupJob> for JobView<'a> {
    fn from(job: &'a BackupJob) -> Self {
        Self {
            id: job.id,
            name: &job.name,
            client_id: &job.client_id,
            source_kind: job.source_kind,
            source_path: display_source(job),
            destination: job.destination.describe(),
            schedule: job.schedule.as_ref().map(|s| s.to_string()),
            retention_days: job.retention_days,
            compress: job.compress,
            encrypt: job.encrypt,
            active: job.active,
            last_run: job.last_run.as_ref(),
        }
    }
}

/// Source path with database passwords masked
fn display_source(job: &BackupJob) -> String {
    if job.source_kind == SourceKind::Database && !archive::database::is_embedded_database(&job.source_path) {
        if let Some((head, _)) = job.source_path.rsplit_once(':') {
            return format!("{}:****", head);
        }
    }
    job.source_path.clone()
}

fn handle_list(store: &dyn JobStore, json: bool) -> Result<ExitCode> {
    let jobs = store.list_jobs()?;

    if json {
        let views: Vec<JobView> = jobs.iter().map(JobView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(ExitCode::SUCCESS);
    }

    if jobs.is_empty() {
        println!("No jobs configured");
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{:<5} {:<20} {:<12} {:<10} {:<16} {:<8} {}",
        "ID", "NAME", "CLIENT", "SOURCE", "SCHEDULE", "ACTIVE", "LAST RUN"
    );
    for job in &jobs {
        let schedule = job
            .schedule
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "manual".to_string());
        let last = job
            .last_run
            .as_ref()
            .map(|run| format!("{} ({})", run.status, run.started_at.format("%Y-%m-%d %H:%M")))
            .unwrap_or_else(|| "never".to_string());

        println!(
            "{:<5} {:<20} {:<12} {:<10} {:<16} {:<8} {}",
            job.id,
            job.name,
            job.client_id,
            job.source_kind.as_str(),
            schedule,
            if job.active { "yes" } else { "no" },
            last
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_status(store: &dyn JobStore, job_id: JobId, history: usize) -> Result<ExitCode> {
    let job = store
        .get_job(job_id)?
        .ok_or_else(|| anyhow::anyhow!("Job {} not found", job_id))?;

    println!("=== Job {}: {} ===\n", job.id, job.name);
    println!("Client: {}", job.client_id);
    println!("Source: {} ({})", display_source(&job), job.source_kind.as_str());
    println!("Destination: {}", job.destination.describe());
    println!(
        "Schedule: {}",
        job.schedule
            .as_ref()
            .map(|s| s.describe())
            .unwrap_or_else(|| "manual only".to_string())
    );
    println!("Retention: {} days", job.retention_days);
    println!("Compress: {}  Encrypt: {}", yes_no(job.compress), yes_no(job.encrypt));
    println!("Enabled: {}", yes_no(job.active));
    println!();

    let runs = store.run_history(job_id, history)?;
    if runs.is_empty() {
        println!("No runs recorded");
    } else {
        println!("Recent runs:");
        for run in &runs {
            println!(
                "  {}  {:<8} {}",
                run.started_at.format("%Y-%m-%d %H:%M:%S"),
                run.status,
                run.message.as_deref().unwrap_or("")
            );
        }
    }
    if job.is_running() {
        println!("\nA run is currently in progress");
    }
    Ok(ExitCode::SUCCESS)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

fn handle_validate(config: &Config) -> Result<ExitCode> {
    println!("✓ Configuration is valid ({} job(s))", config.jobs.len());

    let mut problems = 0;
    let mut check_tool = |tool: &str, reason: &str| match which::which(tool) {
        Ok(path) => println!("✓ {} found at {} ({})", tool, path.display(), reason),
        Err(_) => {
            println!("✗ {} not found in PATH ({})", tool, reason);
            problems += 1;
        }
    };

    let jobs = || config.jobs.values();
    if jobs().any(|j| j.source_kind == SourceKind::Database && !archive::database::is_embedded_database(&j.source_path)) {
        check_tool(&config.global.dump_tool, "database jobs");
    }
    if jobs().any(|j| matches!(j.destination, Destination::Smb(_))) {
        check_tool(&config.global.smb_client, "SMB destinations");
    }

    if jobs().any(|j| matches!(j.destination, Destination::ObjectStore { .. })) {
        let settings = ObjectStoreSettings::from_config(&config.object_store);
        if settings.access_key.is_empty() || settings.secret_key.is_empty() {
            println!("✗ Object store credentials are not configured");
            problems += 1;
        } else {
            println!("✓ Object store endpoint {}", settings.endpoint);
        }
    }

    if jobs().any(|j| j.encrypt) {
        let key_file = &config.global.key_file;
        if key_file.exists() {
            println!("✓ Encryption key present at {}", key_file.display());
        } else {
            println!("• Encryption key will be created at {} on first run", key_file.display());
        }
    }

    if problems > 0 {
        println!("\n{} problem(s) found", problems);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_restore(config: &Config, artifact: &Path, target: &Path, yes: bool) -> Result<ExitCode> {
    use dialoguer::Confirm;

    if !artifact.is_file() {
        anyhow::bail!("Artifact not found: {}", artifact.display());
    }

    println!("=== Restore {} ===\n", artifact.display());
    println!("Restore target: {}", target.display());

    if !yes {
        let confirm = Confirm::new()
            .with_prompt("Do you want to proceed with the restore?")
            .default(false)
            .interact()?;
        if !confirm {
            println!("Restore cancelled.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let encrypted = artifact.to_string_lossy().ends_with(ENCRYPTED_SUFFIX);
    let archive_path = if encrypted {
        let name = plain_name(artifact)
            .and_then(|p| p.file_name().map(|n| n.to_owned()))
            .context("Cannot derive archive name from artifact")?;
        std::fs::create_dir_all(&config.global.scratch_dir)?;
        let decrypted = config.global.scratch_dir.join(name);

        let key = KeyStore::new(&config.global.key_file).read_key()?;
        Encryptor::new().decrypt_file(artifact, &key, &decrypted)?;
        decrypted
    } else {
        artifact.to_path_buf()
    };

    let result = archive::list_entries(&archive_path).and_then(|entries| {
        let preview_count = 10;
        for entry in entries.iter().take(preview_count) {
            println!("  {}", entry.display());
        }
        if entries.len() > preview_count {
            println!("  ... and {} more files", entries.len() - preview_count);
        }
        archive::extract(&archive_path, target)
    });

    if encrypted {
        let _ = std::fs::remove_file(&archive_path);
    }

    match result {
        Ok(()) => {
            info!("Restored {:?} into {:?}", artifact, target);
            println!("\n✓ Restore completed successfully!");
            println!("Files restored to: {}", target.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Restore of {:?} failed: {}", artifact, e);
            eprintln!("\n✗ Restore failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
