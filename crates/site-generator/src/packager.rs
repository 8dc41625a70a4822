//! Archive packager
//!
//! Zips a workspace and hands the bytes out incrementally. The archive is
//! written with `ZipWriter::new_stream`, so nothing needs to seek and the
//! full archive never exists in memory or on disk.

use bytes::Bytes;
use folio_common::{Error, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Download name used when the profile has no usable name
pub const FALLBACK_FILE_STEM: &str = "portfolio";

/// Size of the chunks handed to the response body
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks buffered between the packager and a slow client
const CHANNEL_DEPTH: usize = 8;

/// Deflate level; downloads are one-shot so size wins over speed
const COMPRESSION_LEVEL: i64 = 9;

/// One file to be added to an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// File on disk
    pub path: PathBuf,
    /// `/`-separated path inside the archive
    pub name: String,
}

/// Suggested `<name>.zip` for a profile display name.
///
/// Every character outside `[A-Za-z0-9._-]` becomes `_`.
pub fn download_file_name(display_name: &str) -> String {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        return format!("{}.zip", FALLBACK_FILE_STEM);
    }

    let stem: String = trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!("{}.zip", stem)
}

/// List every regular file under `dir`, sorted by archive name.
pub fn collect_entries(dir: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    walk(dir, "", &mut entries)?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn walk(dir: &Path, prefix: &str, entries: &mut Vec<ArchiveEntry>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            warn!("Skipping non UTF-8 file name in {}", dir.display());
            continue;
        };
        let name = format!("{}{}", prefix, file_name);

        if file_type.is_dir() {
            walk(&entry.path(), &format!("{}/", name), entries)?;
        } else if file_type.is_file() {
            entries.push(ArchiveEntry {
                path: entry.path(),
                name,
            });
        }
    }

    Ok(())
}

/// Write a zip of `entries` to `sink`, returning the number of files added.
pub fn write_archive<W: Write>(entries: &[ArchiveEntry], sink: W) -> Result<usize> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL))
        .unix_permissions(0o644);

    let mut zip = ZipWriter::new_stream(sink);
    for entry in entries {
        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| Error::Archive(e.to_string()))?;
        let mut file = File::open(&entry.path)?;
        io::copy(&mut file, &mut zip)?;
    }

    let mut sink = zip.finish().map_err(|e| Error::Archive(e.to_string()))?;
    sink.flush()?;

    Ok(entries.len())
}

/// Zip every file under `dir` into `sink`
pub fn stream<W: Write>(dir: &Path, sink: W) -> Result<usize> {
    let entries = collect_entries(dir)?;
    write_archive(&entries, sink)
}

/// `Write` adapter that forwards fixed-size chunks into a channel.
///
/// Sending blocks while the channel is full, which is how a slow client
/// throttles the packager. A dropped receiver turns into `BrokenPipe`.
pub struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    buf: Vec<u8>,
}

impl ChannelWriter {
    pub fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }

        let chunk = Bytes::from(std::mem::replace(
            &mut self.buf,
            Vec::with_capacity(CHUNK_SIZE),
        ));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive receiver dropped"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let room = CHUNK_SIZE - self.buf.len();
        let n = data.len().min(room);
        self.buf.extend_from_slice(&data[..n]);

        if self.buf.len() >= CHUNK_SIZE {
            self.send_buffered()?;
        }

        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}

/// An archive being produced on a blocking thread
pub struct ArchiveStream {
    /// Archive bytes in order; an `Err` item means packaging failed
    pub chunks: mpsc::Receiver<io::Result<Bytes>>,

    /// Resolves to the number of files packed once the archive is complete
    pub task: JoinHandle<Result<usize>>,
}

/// Start packing `entries` on the blocking pool.
///
/// Must be called from within a tokio runtime.
pub fn spawn_archive_stream(entries: Vec<ArchiveEntry>) -> ArchiveStream {
    let (tx, chunks) = mpsc::channel(CHANNEL_DEPTH);

    let task = tokio::task::spawn_blocking(move || {
        let result = write_archive(&entries, ChannelWriter::new(tx.clone()));

        match &result {
            Ok(files) => debug!("Archive complete with {} file(s)", files),
            Err(e) => {
                // Receiver may already be gone; nothing else to tell then
                let _ = tx.blocking_send(Err(io::Error::other(e.to_string())));
            }
        }

        result
    });

    ArchiveStream { chunks, task }
}
