//! Archive builder
//!
//! Turns a job's source (file, directory or database) into a single tar
//! artifact in the scratch directory, gzip-compressed when the job asks for it.

pub mod database;

use crate::error::{BackupError, Result};
use crate::jobs::{BackupJob, SourceKind};
use crate::utils::executor::CommandExecutor;
use chrono::Local;
use database::ConnectionString;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Builds archives for backup jobs
pub struct ArchiveBuilder {
    scratch_dir: PathBuf,
    executor: Arc<dyn CommandExecutor>,
    dump_tool: String,
    dump_timeout: Duration,
}

impl ArchiveBuilder {
    pub fn new(
        scratch_dir: impl Into<PathBuf>,
        executor: Arc<dyn CommandExecutor>,
        dump_tool: impl Into<String>,
        dump_timeout: Duration,
    ) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            executor,
            dump_tool: dump_tool.into(),
            dump_timeout,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Build the artifact for `job` and return its path.
    ///
    /// The caller owns the returned file. Nothing is left behind in the
    /// scratch directory when the build fails.
    pub fn build(&self, job: &BackupJob) -> Result<PathBuf> {
        fs::create_dir_all(&self.scratch_dir)?;

        let stem = format!("{}_{}", job.name, Local::now().format(TIMESTAMP_FORMAT));
        let extension = if job.compress { "tar.gz" } else { "tar" };
        let artifact = self.scratch_dir.join(format!("{}.{}", stem, extension));

        let result = match job.source_kind {
            SourceKind::File | SourceKind::Directory => {
                let source = Path::new(&job.source_path);
                if !source.exists() {
                    return Err(BackupError::SourceNotFound(source.to_path_buf()));
                }
                write_archive(source, &root_name(source, &job.name), &artifact, job.compress)
            }
            SourceKind::Database => self.build_database(job, &stem, &artifact),
        };

        match result {
            Ok(()) => {
                let size = fs::metadata(&artifact)?.len();
                info!("Archive created: {:?} ({} bytes)", artifact, size);
                Ok(artifact)
            }
            Err(e) => {
                remove_quietly(&artifact);
                Err(e)
            }
        }
    }

    fn build_database(&self, job: &BackupJob, stem: &str, artifact: &Path) -> Result<()> {
        let dump_name = format!("{}.sql", stem);
        let dump_path = self.scratch_dir.join(&dump_name);

        let dumped = if database::is_embedded_database(&job.source_path) {
            database::dump_embedded(Path::new(&job.source_path), &dump_path)
        } else {
            ConnectionString::parse(&job.source_path).and_then(|conn| {
                database::dump_server(
                    self.executor.as_ref(),
                    &self.dump_tool,
                    &conn,
                    &dump_path,
                    self.dump_timeout,
                )
            })
        };

        let result = dumped.and_then(|()| write_archive(&dump_path, &dump_name, artifact, job.compress));
        remove_quietly(&dump_path);
        result
    }
}

/// Output stream of an archive, optionally gzip-compressed
enum ArtifactWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl ArtifactWriter {
    fn create(path: &Path, compress: bool) -> io::Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Ok(if compress {
            ArtifactWriter::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            ArtifactWriter::Plain(file)
        })
    }

    fn finish(self) -> io::Result<()> {
        let mut file = match self {
            ArtifactWriter::Plain(file) => file,
            ArtifactWriter::Gzip(encoder) => encoder.finish()?,
        };
        file.flush()?;
        file.get_ref().sync_all()
    }
}

impl Write for ArtifactWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ArtifactWriter::Plain(w) => w.write(buf),
            ArtifactWriter::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ArtifactWriter::Plain(w) => w.flush(),
            ArtifactWriter::Gzip(w) => w.flush(),
        }
    }
}

/// Archive `source` under the single root entry `root`
fn write_archive(source: &Path, root: &str, artifact: &Path, compress: bool) -> Result<()> {
    let mut builder = tar::Builder::new(ArtifactWriter::create(artifact, compress)?);
    builder.follow_symlinks(false);

    if source.is_dir() {
        let mut files = 0usize;
        for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let name = Path::new(root).join(relative);

            if entry.file_type().is_dir() {
                builder.append_dir(&name, entry.path())?;
            } else {
                builder.append_path_with_name(entry.path(), &name)?;
                files += 1;
            }
        }
        debug!("Archived {} file(s) from {:?}", files, source);
    } else {
        builder.append_path_with_name(source, root)?;
    }

    builder.into_inner()?.finish()?;
    Ok(())
}

/// Root entry name: the source basename, or the job name for paths without one
fn root_name(source: &Path, job_name: &str) -> String {
    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| job_name.to_string())
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove {:?}: {}", path, e);
        }
    }
}

fn open_archive(artifact: &Path) -> Result<tar::Archive<Box<dyn Read>>> {
    let mut file = BufReader::new(File::open(artifact)?);

    let mut magic = [0u8; 2];
    let gzipped = file.read_exact(&mut magic).is_ok() && magic == [0x1f, 0x8b];
    drop(file);

    let file = BufReader::new(File::open(artifact)?);
    let reader: Box<dyn Read> = if gzipped {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(tar::Archive::new(reader))
}

/// Unpack a `.tar` or `.tar.gz` artifact into `target_dir`
pub fn extract(artifact: &Path, target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir)?;
    open_archive(artifact)?.unpack(target_dir)?;
    info!("Extracted {:?} into {:?}", artifact, target_dir);
    Ok(())
}

/// Paths of all regular-file entries in an artifact
pub fn list_entries(artifact: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = open_archive(artifact)?;
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        if entry.header().entry_type().is_file() {
            names.push(entry.path()?.into_owned());
        }
    }
    Ok(names)
}

/// Whether `file_name` is an artifact produced for `job_name`:
/// `{job_name}_YYYYMMDD_HHMMSS...`
pub fn is_job_artifact(job_name: &str, file_name: &str) -> bool {
    let Some(rest) = file_name
        .strip_prefix(job_name)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };

    let bytes = rest.as_bytes();
    bytes.len() > 15
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'_'
        && bytes[9..15].iter().all(u8::is_ascii_digit)
}
