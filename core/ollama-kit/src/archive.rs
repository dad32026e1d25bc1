//! Archive extraction for downloaded releases.
//!
//! Windows releases ship as ZIP files, which need random access and are
//! therefore written to disk first. macOS and Linux releases ship as gzipped
//! tarballs, which are decoded straight off the network through a
//! [`ChannelReader`].
//!
//! Every regular file is flushed with `sync_all` before the next entry is
//! read, so a successful return means the whole tree is on disk. Files and
//! directories are never written through a symbolic link, including links
//! created by earlier entries of the same archive.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use tar::Archive;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Number of in-flight chunks between the downloader and the tar decoder.
pub const CHANNEL_CAPACITY: usize = 16;

/// Extracts a ZIP archive into `dest_dir`.
///
/// Entries are streamed one at a time from the file. When `remove_archive`
/// is set the archive is deleted after a successful extraction; a failed
/// delete is only logged.
///
/// # Errors
///
/// Returns [`Error::Extraction`] if the archive cannot be opened or decoded,
/// an entry has an unsafe path, or an entry cannot be written.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path, remove_archive: bool) -> Result<()> {
    let file = File::open(archive_path)
        .map_err(|e| Error::extraction(archive_path, format!("failed to open archive: {e}")))?;

    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Error::extraction(archive_path, format!("invalid ZIP archive: {e}")))?;

    create_dir(dest_dir)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| {
            Error::extraction(archive_path, format!("failed to read entry {i}: {e}"))
        })?;

        let Some(entry_path) = entry.enclosed_name() else {
            return Err(Error::extraction(
                archive_path,
                format!("refusing to extract unsafe path: {}", entry.name()),
            ));
        };
        ensure_relative(&entry_path)?;
        ensure_no_symlinks(dest_dir, &entry_path)?;

        let output_path = dest_dir.join(&entry_path);
        if entry.is_dir() {
            create_dir(&output_path)?;
        } else {
            let mode = entry.unix_mode();
            write_file(&mut entry, &output_path, mode)?;
        }
    }

    if remove_archive {
        remove_quietly(archive_path);
    }

    Ok(())
}

/// Extracts a gzipped tarball read from `reader` into `dest_dir`.
///
/// The reader is decoded on the fly; nothing but the extracted entries is
/// written. Symbolic and hard links are created by `tar` itself.
///
/// # Errors
///
/// Returns [`Error::Extraction`] if the stream is not a valid gzipped tar, an
/// entry has an unsafe path, or an entry cannot be written. Partial output
/// may remain in `dest_dir`.
pub fn extract_tar_gz<R: Read>(reader: R, dest_dir: &Path) -> Result<()> {
    create_dir(dest_dir)?;

    let mut archive = Archive::new(GzDecoder::new(reader));
    let entries = archive
        .entries()
        .map_err(|e| Error::extraction(dest_dir, format!("failed to read tar entries: {e}")))?;

    for entry in entries {
        let mut entry = entry
            .map_err(|e| Error::extraction(dest_dir, format!("failed to read tar entry: {e}")))?;

        let entry_path = entry
            .path()
            .map_err(|e| Error::extraction(dest_dir, format!("invalid entry path: {e}")))?
            .into_owned();
        ensure_relative(&entry_path)?;

        let output_path = dest_dir.join(&entry_path);
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            ensure_no_symlinks(dest_dir, &entry_path)?;
            create_dir(&output_path)?;
        } else if entry_type.is_file() {
            ensure_no_symlinks(dest_dir, &entry_path)?;
            let mode = entry.header().mode().ok();
            write_file(&mut entry, &output_path, mode)?;
        } else {
            if let Some(parent) = output_path.parent() {
                create_dir(parent)?;
            }
            entry.unpack_in(dest_dir).map_err(|e| {
                Error::extraction(&output_path, format!("failed to unpack entry: {e}"))
            })?;
        }
    }

    Ok(())
}

/// Extracts a gzipped tarball stored at `archive_path`.
///
/// # Errors
///
/// Same as [`extract_tar_gz`], plus [`Error::Extraction`] if the file cannot
/// be opened.
pub fn extract_tar_gz_file(
    archive_path: &Path,
    dest_dir: &Path,
    remove_archive: bool,
) -> Result<()> {
    let file = File::open(archive_path)
        .map_err(|e| Error::extraction(archive_path, format!("failed to open archive: {e}")))?;
    extract_tar_gz(file, dest_dir)?;

    if remove_archive {
        remove_quietly(archive_path);
    }

    Ok(())
}

/// A blocking [`Read`] over chunks arriving on a bounded channel.
///
/// The async side sends `Ok(chunk)` for data and `Err(e)` to abort the
/// stream. Dropping the sender ends the stream.
///
/// `read` calls `blocking_recv`, so this must only be used off the async
/// runtime (e.g. inside `spawn_blocking`).
#[derive(Debug)]
pub struct ChannelReader {
    rx: mpsc::Receiver<io::Result<Vec<u8>>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl ChannelReader {
    /// Wraps the receiving half of a chunk channel.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<io::Result<Vec<u8>>>) -> Self {
        Self {
            rx,
            chunk: Vec::new(),
            pos: 0,
        }
    }

    /// Creates a connected sender and reader with [`CHANNEL_CAPACITY`] slots.
    #[must_use]
    pub fn channel() -> (mpsc::Sender<io::Result<Vec<u8>>>, Self) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (tx, Self::new(rx))
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pos >= self.chunk.len() {
            match self.rx.blocking_recv() {
                Some(Ok(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(0),
            }
        }

        let remaining = &self.chunk[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Rejects absolute paths and `..` components.
fn ensure_relative(path: &Path) -> Result<()> {
    if path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(Error::extraction(
            path,
            "refusing to extract path with parent directory or absolute reference",
        ));
    }
    Ok(())
}

/// Rejects `entry_path` if an existing component of it below `dest_dir` is a
/// symbolic link.
fn ensure_no_symlinks(dest_dir: &Path, entry_path: &Path) -> Result<()> {
    let mut current = dest_dir.to_path_buf();
    for component in entry_path.components() {
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(Error::extraction(
                    &current,
                    "refusing to extract through symbolic link",
                ));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(Error::extraction(
                    &current,
                    format!("failed to inspect path: {e}"),
                ));
            }
        }
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .map_err(|e| Error::extraction(path, format!("failed to create directory: {e}")))
}

/// Copies one entry to `output_path` and waits for it to reach the disk.
fn write_file(reader: &mut impl Read, output_path: &Path, mode: Option<u32>) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        create_dir(parent)?;
    }

    let mut outfile = File::create(output_path)
        .map_err(|e| Error::extraction(output_path, format!("failed to create file: {e}")))?;

    io::copy(reader, &mut outfile)
        .map_err(|e| Error::extraction(output_path, format!("failed to write file: {e}")))?;

    set_mode(&outfile, output_path, mode)?;

    outfile
        .sync_all()
        .map_err(|e| Error::extraction(output_path, format!("failed to sync file: {e}")))
}

#[cfg(unix)]
fn set_mode(file: &File, path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let Some(mode) = mode else {
        return Ok(());
    };
    file.set_permissions(std::fs::Permissions::from_mode(mode & 0o7777))
        .map_err(|e| Error::extraction(path, format!("failed to set permissions: {e}")))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn set_mode(_file: &File, _path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove archive");
    }
}
