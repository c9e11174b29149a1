//! Append-only log files.
//!
//! All NetProbe output lives under a single log directory:
//! ```text
//! {log_dir}/
//!   net_10.0.1.0_24.log     one block per ping sweep of that network
//!   summary.log             one block per completed run
//!   ping_8.8.8.8.log        ping monitor sessions
//!   tcp_example.com_443.log TCP monitor sessions
//! ```
//! Files are only ever opened in append mode, so repeated runs add new
//! blocks after the old ones.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::ScanSummary;

/// Directory that owns every log file of a run.
#[derive(Debug, Clone)]
pub struct Logbook {
    root: PathBuf,
}

impl Logbook {
    /// Create a logbook rooted at the given directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `net_<cidr>.log` with the prefix slash replaced by an underscore.
    pub fn network_log_path(&self, cidr: &str) -> PathBuf {
        self.root.join(format!("net_{}.log", cidr.replace('/', "_")))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join("summary.log")
    }

    pub fn ping_monitor_path(&self, host: &str) -> PathBuf {
        self.root.join(format!("ping_{host}.log"))
    }

    pub fn tcp_monitor_path(&self, host: &str, port: u16) -> PathBuf {
        self.root.join(format!("tcp_{host}_{port}.log"))
    }

    /// Open the ping sweep block for one network.
    pub fn open_ping_scan(&self, cidr: &str) -> io::Result<LogBlock> {
        LogBlock::open(
            &self.network_log_path(cidr),
            &format!("\n===== PING SCAN {cidr} ====="),
            Some(format!("===== END PING {cidr} =====")),
        )
    }

    /// Append one summary block with a single write.
    pub fn append_summary(&self, summary: &ScanSummary) -> io::Result<()> {
        let path = self.summary_path();
        let mut file = append(&path)?;
        file.write_all(summary.render().as_bytes())?;
        file.flush()?;

        tracing::debug!(path = %path.display(), "Summary appended");
        Ok(())
    }
}

fn append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// A header/footer delimited section of an append-only log.
///
/// The header is written on open. The footer is written by [`close`](Self::close)
/// or, if the block is dropped early (error, cancellation, panic unwinding),
/// by `Drop`. Every line is flushed as it is written.
pub struct LogBlock {
    path: PathBuf,
    writer: BufWriter<File>,
    footer: Option<String>,
    closed: bool,
}

impl LogBlock {
    pub fn open(path: &Path, header: &str, footer: Option<String>) -> io::Result<Self> {
        let mut writer = BufWriter::new(append(path)?);
        writeln!(writer, "{header}")?;
        writer.flush()?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            footer,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }

    /// Write the footer and release the file.
    pub fn close(mut self) -> io::Result<()> {
        self.finish(&[])
    }

    /// Write trailing lines, then the footer, and release the file.
    pub fn close_with(mut self, trailer: &[String]) -> io::Result<()> {
        self.finish(trailer)
    }

    fn finish(&mut self, trailer: &[String]) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        for line in trailer {
            writeln!(self.writer, "{line}")?;
        }
        if let Some(footer) = self.footer.take() {
            writeln!(self.writer, "{footer}")?;
        }
        self.writer.flush()
    }
}

impl Drop for LogBlock {
    fn drop(&mut self) {
        if let Err(e) = self.finish(&[]) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to close log block");
        }
    }
}
