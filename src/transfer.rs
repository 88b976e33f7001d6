use crate::error::BackupError;
use crate::runlog::LogSink;
use clap::ValueEnum;
use log::{debug, warn};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};

/// Album directories exposed by an rclone Google Photos remote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum AlbumKind {
    Album,
    SharedAlbum,
}

impl AlbumKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlbumKind::Album => "album",
            AlbumKind::SharedAlbum => "shared-album",
        }
    }
}

impl fmt::Display for AlbumKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `rclone copy` from a remote path into a destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferDirective {
    /// Human readable name used in the run log.
    pub label: String,
    /// Remote path, escaped for a double-quoted shell argument. Only shown
    /// in the run log.
    pub source: String,
    /// Remote path handed to rclone as is.
    pub remote_path: String,
    pub destination: PathBuf,
}

impl TransferDirective {
    pub fn for_year(remote: &str, year: i32, destination: &Path) -> Self {
        let remote_path = format!("{}:media/by-year/{}", remote, year);
        TransferDirective {
            label: format!("year {}", year),
            source: remote_path.clone(),
            remote_path,
            destination: destination.join(year.to_string()),
        }
    }

    pub fn for_album(remote: &str, kind: AlbumKind, album: &str, destination: &Path) -> Self {
        TransferDirective {
            label: format!("album {}", album),
            source: format!("{}:{}/{}", remote, kind, source_segment(album)),
            remote_path: format!("{}:{}/{}", remote, kind, album),
            destination: destination
                .join(kind.as_str())
                .join(destination_segment(album)),
        }
    }

    /// The command as it would be typed in a shell, for the run log.
    pub fn command_line(&self, rclone: &str) -> String {
        format!(
            "{} copy \"{}\" \"{}\"",
            rclone,
            self.source,
            self.destination.display()
        )
    }
}

/// Makes an album name usable as a single path segment.
pub fn destination_segment(album: &str) -> String {
    album.replace('"', "").replace('/', "")
}

/// Escapes an album name for interpolation into a double-quoted argument.
pub fn source_segment(album: &str) -> String {
    album.replace('"', "\\\"")
}

pub trait Executor: Sync {
    /// The command line that `execute` runs for the directive.
    fn command_line(&self, directive: &TransferDirective) -> String;

    /// Runs the transfer, returning whether it succeeded.
    fn execute(&self, directive: &TransferDirective) -> bool;
}

/// Spawns rclone directly, without a shell in between.
pub struct RcloneExecutor {
    rclone: PathBuf,
}

impl RcloneExecutor {
    pub fn new(rclone: &Path) -> Self {
        RcloneExecutor {
            rclone: rclone.to_path_buf(),
        }
    }
}

impl Executor for RcloneExecutor {
    fn command_line(&self, directive: &TransferDirective) -> String {
        directive.command_line(&self.rclone.to_string_lossy())
    }

    fn execute(&self, directive: &TransferDirective) -> bool {
        let command = self.command_line(directive);
        debug!("Running {}", command);
        let status = Command::new(&self.rclone)
            .arg("copy")
            .arg(&directive.remote_path)
            .arg(&directive.destination)
            .status();
        match status {
            Ok(status) => {
                if !status.success() {
                    warn!("{} exited with {}", command, status);
                }
                status.success()
            }
            Err(err) => {
                warn!("Failed to spawn {}: {}", command, err);
                false
            }
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub succeeded: usize,
    /// Labels of the directives which failed.
    pub failed: Vec<String>,
}

fn log_line<L: LogSink>(log: &Mutex<L>, line: &str) -> Result<(), BackupError> {
    let mut log = log.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(log.write(line)?)
}

/// Runs every directive, recording each step in the log.
///
/// A failed transfer does not stop the remaining ones. With more than one
/// job the directives are spread over a dedicated thread pool, in which case
/// lines from different transfers may interleave in the log.
pub fn run_transfers<E, L>(
    executor: &E,
    directives: &[TransferDirective],
    jobs: usize,
    log: &Mutex<L>,
) -> Result<TransferSummary, BackupError>
where
    E: Executor,
    L: LogSink + Send,
{
    let run_one = |directive: &TransferDirective| -> Result<bool, BackupError> {
        let command = executor.command_line(directive);
        log_line(log, &format!("Starting backup {}...", directive.label))?;
        log_line(log, &format!("  Exec command: {}", command))?;
        let status = executor.execute(directive);
        log_line(log, &format!("  Status: {}", status))?;
        if !status {
            let err = BackupError::TransferExecution {
                label: directive.label.clone(),
                command,
            };
            log_line(log, &format!("  Error: {}", err))?;
        }
        Ok(status)
    };

    let outcomes: Vec<bool> = if jobs <= 1 {
        directives.iter().map(&run_one).collect::<Result<_, _>>()?
    } else {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
        pool.install(|| directives.par_iter().map(&run_one).collect::<Result<_, _>>())?
    };

    let mut summary = TransferSummary::default();
    for (directive, succeeded) in directives.iter().zip(outcomes) {
        if succeeded {
            summary.succeeded += 1;
        } else {
            summary.failed.push(directive.label.clone());
        }
    }
    Ok(summary)
}
