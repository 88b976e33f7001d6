use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Destination of the human readable record of a run.
pub trait LogSink {
    fn write(&mut self, line: &str) -> io::Result<()>;
}

/// Echoes every line to stdout and appends it to `backup-<timestamp>.txt`.
pub struct RunLog {
    path: PathBuf,
    file: File,
}

impl RunLog {
    pub fn create(dir: &Path, timestamp: i64) -> io::Result<Self> {
        let path = dir.join(format!("backup-{}.txt", timestamp));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(RunLog { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes and deletes the log file.
    pub fn remove(self) -> io::Result<()> {
        let RunLog { path, file } = self;
        drop(file);
        fs::remove_file(path)
    }
}

impl LogSink for RunLog {
    fn write(&mut self, line: &str) -> io::Result<()> {
        println!("{}", line);
        writeln!(self.file, "{}", line)
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryLog {
    pub lines: Vec<String>,
}

#[cfg(test)]
impl LogSink for MemoryLog {
    fn write(&mut self, line: &str) -> io::Result<()> {
        self.lines.push(line.to_string());
        Ok(())
    }
}
