//! Database sources: embedded SQLite files and networked MySQL-compatible servers

use crate::error::{BackupError, Result};
use crate::utils::executor::CommandExecutor;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const EMBEDDED_EXTENSIONS: &[&str] = &[".db", ".sqlite", ".sqlite3"];

/// Whether a database descriptor points at an embedded (SQLite) database file
pub fn is_embedded_database(descriptor: &str) -> bool {
    let lower = descriptor.to_lowercase();
    EMBEDDED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) || lower.contains("sqlite")
}

/// `host:port:database:user:password`
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl ConnectionString {
    pub fn parse(descriptor: &str) -> Result<Self> {
        let unsupported = || BackupError::UnsupportedConnectionString(redact(descriptor));

        let fields: Vec<&str> = descriptor.split(':').collect();
        let [host, port, database, user, password] = fields[..] else {
            return Err(unsupported());
        };

        if host.is_empty() || database.is_empty() || user.is_empty() {
            return Err(unsupported());
        }
        let port = port.parse::<u16>().map_err(|_| unsupported())?;

        Ok(Self {
            host: host.to_string(),
            port,
            database: database.to_string(),
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    /// Arguments for the dump utility, database name last
    pub fn dump_args(&self) -> Vec<String> {
        vec![
            format!("--host={}", self.host),
            format!("--port={}", self.port),
            format!("--user={}", self.user),
            format!("--password={}", self.password),
            "--single-transaction".to_string(),
            "--routines".to_string(),
            "--triggers".to_string(),
            self.database.clone(),
        ]
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"****")
            .finish()
    }
}

/// Hide the last field of a descriptor when it looks like a password
fn redact(descriptor: &str) -> String {
    match descriptor.rsplit_once(':') {
        Some((head, _)) if descriptor.matches(':').count() >= 4 => format!("{}:****", head),
        _ => descriptor.to_string(),
    }
}

/// Run the external dump utility with stdout captured into `output`
pub fn dump_server(
    executor: &dyn CommandExecutor,
    dump_tool: &str,
    connection: &ConnectionString,
    output: &Path,
    timeout: Duration,
) -> Result<()> {
    info!(
        "Dumping database '{}' from {}:{} with {}",
        connection.database, connection.host, connection.port, dump_tool
    );

    let args = connection.dump_args();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    executor
        .run_command_to_file(dump_tool, &args, &[], output, Some(timeout))
        .map_err(|e| BackupError::DumpTool(format!("{:#}", e)))
}

/// Write a logical SQL dump of an embedded database to `output`.
///
/// Rows are read inside one read transaction so the dump is a consistent
/// snapshot. Layout: `BEGIN TRANSACTION;`, tables with their rows, then
/// indexes, triggers and views, then `COMMIT;`.
pub fn dump_embedded(db_path: &Path, output: &Path) -> Result<()> {
    if !db_path.is_file() {
        return Err(BackupError::SourceNotFound(db_path.to_path_buf()));
    }

    let mut conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| BackupError::DumpTool(format!("cannot open {:?}: {}", db_path, e)))?;

    let mut out = BufWriter::new(File::create(output)?);
    let tx = conn.transaction().map_err(dump_error)?;

    writeln!(out, "BEGIN TRANSACTION;")?;

    let tables: Vec<(String, String)> = {
        let mut stmt = tx
            .prepare(
                "SELECT name, sql FROM sqlite_master \
                 WHERE type = 'table' AND sql IS NOT NULL \
                 ORDER BY name = 'sqlite_sequence', name",
            )
            .map_err(dump_error)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(dump_error)?;
        rows.collect::<std::result::Result<_, _>>().map_err(dump_error)?
    };

    let mut row_count = 0u64;
    for (name, create_sql) in &tables {
        if name == "sqlite_sequence" {
            writeln!(out, "DELETE FROM \"sqlite_sequence\";")?;
        } else if name.starts_with("sqlite_") {
            continue;
        } else {
            writeln!(out, "{};", create_sql)?;
        }
        row_count += dump_rows(&tx, name, &mut out)?;
    }

    let objects: Vec<String> = {
        let mut stmt = tx
            .prepare(
                "SELECT sql FROM sqlite_master \
                 WHERE sql IS NOT NULL AND type IN ('index', 'trigger', 'view') \
                 ORDER BY CASE type WHEN 'index' THEN 0 WHEN 'trigger' THEN 1 ELSE 2 END, name",
            )
            .map_err(dump_error)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(dump_error)?;
        rows.collect::<std::result::Result<_, _>>().map_err(dump_error)?
    };
    for sql in &objects {
        writeln!(out, "{};", sql)?;
    }

    writeln!(out, "COMMIT;")?;
    out.flush()?;
    tx.finish().map_err(dump_error)?;

    debug!(
        "Dumped {} table(s), {} row(s) from {:?}",
        tables.len(),
        row_count,
        db_path
    );
    Ok(())
}

fn dump_rows(conn: &Connection, table: &str, out: &mut impl Write) -> Result<u64> {
    let quoted = quote_ident(table);
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {}", quoted))
        .map_err(dump_error)?;
    let columns = stmt.column_count();
    let mut rows = stmt.query([]).map_err(dump_error)?;

    let mut count = 0u64;
    while let Some(row) = rows.next().map_err(dump_error)? {
        let mut values = Vec::with_capacity(columns);
        for i in 0..columns {
            values.push(sql_literal(row.get_ref(i).map_err(dump_error)?));
        }
        writeln!(out, "INSERT INTO {} VALUES({});", quoted, values.join(","))?;
        count += 1;
    }
    Ok(count)
}

fn sql_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(v) => v.to_string(),
        ValueRef::Real(f) => format!("{:?}", f),
        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t).replace('\'', "''")),
        ValueRef::Blob(b) => format!("X'{}'", hex::encode_upper(b)),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn dump_error(err: rusqlite::Error) -> BackupError {
    BackupError::DumpTool(format!("sqlite dump: {}", err))
}
