//! Streaming access to package and patch archives.
//!
//! Full packages and patches may be published as zip, gzip-compressed tar, or
//! plain tar. The format is detected from the file's magic bytes rather than
//! its name, since downloads land in temporary files.
//!
//! Entries are visited in archive order through [`visit_entries`]. Each visit
//! gets an [`EntryHeader`] with the raw, untrusted entry name and a reader for
//! the entry payload. Callers decide where (and whether) to write it.
//!
//! Tar symlink and hard-link entries are never handed to callers: they are
//! skipped with a warning, as are special files.

use crate::core::LauncherError;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::cell::Cell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::rc::Rc;
use tracing::{trace, warn};

const ZIP_MAGIC: &[u8] = b"PK";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const UNIX_FILE_TYPE_MASK: u32 = 0o170_000;
const UNIX_SYMLINK: u32 = 0o120_000;

/// Container formats the launcher can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// PKZIP archive.
    Zip,
    /// Tar stream compressed with gzip.
    TarGz,
    /// Uncompressed tar stream.
    Tar,
}

impl ArchiveFormat {
    /// Detect the format of the archive at `path` from its first bytes.
    ///
    /// Anything that is neither zip nor gzip is assumed to be plain tar; a
    /// file that is not a tar either fails when its entries are read.
    pub fn detect(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).with_context(|| format!("Failed to open archive {}", path.display()))?;
        let mut magic = [0u8; 2];
        let read = read_up_to(&mut file, &mut magic)
            .with_context(|| format!("Failed to read archive {}", path.display()))?;

        Ok(match &magic[..read] {
            m if m == ZIP_MAGIC => Self::Zip,
            m if m == GZIP_MAGIC => Self::TarGz,
            _ => Self::Tar,
        })
    }
}

fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Metadata for one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Entry name exactly as stored in the archive. Untrusted.
    pub name: String,
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Unix permission bits stored with the entry, if any.
    pub mode: Option<u32>,
    /// Bytes of the archive file consumed when this entry was reached.
    pub consumed: u64,
    /// Total size of the archive file.
    pub archive_len: u64,
}

impl EntryHeader {
    /// Fraction of the archive consumed when this entry was reached.
    #[must_use]
    pub fn consumed_fraction(&self) -> f32 {
        if self.archive_len == 0 {
            1.0
        } else {
            (self.consumed as f64 / self.archive_len as f64).min(1.0) as f32
        }
    }
}

/// File reader that publishes its current offset.
struct TrackedFile {
    inner: File,
    position: Rc<Cell<u64>>,
}

impl Read for TrackedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position.set(self.position.get() + n as u64);
        Ok(n)
    }
}

impl Seek for TrackedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let offset = self.inner.seek(pos)?;
        self.position.set(offset);
        Ok(offset)
    }
}

/// Visit every entry of the archive at `path` in stored order.
///
/// `visit` receives the entry header and a reader over its payload (empty for
/// directories). Returning an error from `visit` stops the walk immediately
/// and propagates the error; entries after it are not read.
///
/// # Errors
///
/// [`LauncherError::ArchiveError`] if the archive cannot be decoded, or
/// whatever `visit` returns.
pub fn visit_entries<F>(path: &Path, mut visit: F) -> Result<()>
where
    F: FnMut(&EntryHeader, &mut dyn Read) -> Result<()>,
{
    let format = ArchiveFormat::detect(path)?;
    let file = File::open(path).with_context(|| format!("Failed to open archive {}", path.display()))?;
    let archive_len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let position = Rc::new(Cell::new(0));
    let tracked = TrackedFile {
        inner: file,
        position: Rc::clone(&position),
    };

    trace!("Reading {:?} archive {} ({} bytes)", format, path.display(), archive_len);
    match format {
        ArchiveFormat::Zip => visit_zip(path, tracked, &position, archive_len, &mut visit),
        ArchiveFormat::TarGz => {
            visit_tar(path, GzDecoder::new(tracked), &position, archive_len, &mut visit)
        }
        ArchiveFormat::Tar => visit_tar(path, tracked, &position, archive_len, &mut visit),
    }
}

/// Number of entries [`visit_entries`] would hand out.
pub fn count_entries(path: &Path) -> Result<u64> {
    let mut count = 0;
    visit_entries(path, |_, _| {
        count += 1;
        Ok(())
    })?;
    Ok(count)
}

fn archive_error(path: &Path, reason: impl ToString) -> LauncherError {
    LauncherError::ArchiveError {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn visit_zip<F>(
    path: &Path,
    reader: TrackedFile,
    position: &Cell<u64>,
    archive_len: u64,
    visit: &mut F,
) -> Result<()>
where
    F: FnMut(&EntryHeader, &mut dyn Read) -> Result<()>,
{
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| archive_error(path, e))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| archive_error(path, e))?;
        let mode = entry.unix_mode();

        if mode.is_some_and(|m| m & UNIX_FILE_TYPE_MASK == UNIX_SYMLINK) {
            warn!("Skipping symlink entry '{}' in {}", entry.name(), path.display());
            continue;
        }

        let header = EntryHeader {
            name: entry.name().to_string(),
            is_dir: entry.is_dir(),
            mode: mode.map(|m| m & 0o7777),
            consumed: position.get(),
            archive_len,
        };
        visit(&header, &mut entry)?;
    }

    Ok(())
}

fn visit_tar<R, F>(
    path: &Path,
    reader: R,
    position: &Cell<u64>,
    archive_len: u64,
    visit: &mut F,
) -> Result<()>
where
    R: Read,
    F: FnMut(&EntryHeader, &mut dyn Read) -> Result<()>,
{
    let mut archive = tar::Archive::new(reader);
    let entries = archive.entries().map_err(|e| archive_error(path, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(path, e))?;
        let entry_type = entry.header().entry_type();
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

        if entry_type.is_symlink() || entry_type.is_hard_link() {
            warn!("Skipping link entry '{}' in {}", name, path.display());
            continue;
        }
        if !entry_type.is_dir() && !entry_type.is_file() && !entry_type.is_contiguous() {
            trace!("Skipping {:?} entry '{}'", entry_type, name);
            continue;
        }

        let header = EntryHeader {
            name,
            is_dir: entry_type.is_dir(),
            mode: entry.header().mode().ok().map(|m| m & 0o7777),
            consumed: position.get(),
            archive_len,
        };
        visit(&header, &mut entry)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{ArchiveBuilder, FixtureEntry};
    use tempfile::tempdir;

    fn collect(path: &Path) -> Vec<(String, bool, String)> {
        let mut seen = Vec::new();
        visit_entries(path, |header, reader| {
            let mut content = String::new();
            reader.read_to_string(&mut content)?;
            seen.push((header.name.clone(), header.is_dir, content));
            Ok(())
        })
        .unwrap();
        seen
    }

    fn sample() -> ArchiveBuilder {
        ArchiveBuilder::new()
            .entry(FixtureEntry::dir("app/"))
            .entry(FixtureEntry::file("app/readme.txt", b"hello"))
            .entry(FixtureEntry::file("app/bin/tool", b"#!/bin/sh").mode(0o755))
    }

    #[test]
    fn test_detect_formats() {
        let temp = tempdir().unwrap();
        let zip = sample().write_zip(&temp.path().join("a.bin")).unwrap();
        let tgz = sample().write_tar_gz(&temp.path().join("b.bin")).unwrap();
        let tar = sample().write_tar(&temp.path().join("c.bin")).unwrap();

        assert_eq!(ArchiveFormat::detect(&zip).unwrap(), ArchiveFormat::Zip);
        assert_eq!(ArchiveFormat::detect(&tgz).unwrap(), ArchiveFormat::TarGz);
        assert_eq!(ArchiveFormat::detect(&tar).unwrap(), ArchiveFormat::Tar);
    }

    #[test]
    fn test_entries_in_order_for_each_format() {
        let temp = tempdir().unwrap();
        for path in [
            sample().write_zip(&temp.path().join("p.zip")).unwrap(),
            sample().write_tar_gz(&temp.path().join("p.tar.gz")).unwrap(),
            sample().write_tar(&temp.path().join("p.tar")).unwrap(),
        ] {
            let seen = collect(&path);
            let names: Vec<_> = seen.iter().map(|(n, d, _)| (n.trim_end_matches('/'), *d)).collect();
            assert_eq!(names, vec![("app", true), ("app/readme.txt", false), ("app/bin/tool", false)]);
            assert_eq!(seen[1].2, "hello");
            assert_eq!(count_entries(&path).unwrap(), 3);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_mode_is_reported() {
        let temp = tempdir().unwrap();
        let path = sample().write_tar_gz(&temp.path().join("p.tar.gz")).unwrap();

        let mut modes = Vec::new();
        visit_entries(&path, |header, _| {
            modes.push((header.name.clone(), header.mode));
            Ok(())
        })
        .unwrap();
        assert_eq!(modes[2], ("app/bin/tool".to_string(), Some(0o755)));
    }

    #[test]
    fn test_consumed_is_monotonic() {
        let temp = tempdir().unwrap();
        let big = vec![7u8; 64 * 1024];
        let path = ArchiveBuilder::new()
            .entry(FixtureEntry::file("a", &big))
            .entry(FixtureEntry::file("b", &big))
            .entry(FixtureEntry::file("c", &big))
            .write_tar(&temp.path().join("p.tar"))
            .unwrap();

        let mut fractions = Vec::new();
        visit_entries(&path, |header, reader| {
            io::copy(reader, &mut io::sink())?;
            fractions.push(header.consumed_fraction());
            Ok(())
        })
        .unwrap();

        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
    }

    #[test]
    fn test_visitor_error_stops_walk() {
        let temp = tempdir().unwrap();
        let path = sample().write_zip(&temp.path().join("p.zip")).unwrap();

        let mut visited = 0;
        let result = visit_entries(&path, |_, _| {
            visited += 1;
            anyhow::bail!("stop")
        });
        assert!(result.is_err());
        assert_eq!(visited, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_tar_symlinks_are_skipped() {
        let temp = tempdir().unwrap();
        let path = ArchiveBuilder::new()
            .entry(FixtureEntry::symlink("app/link", "/etc/passwd"))
            .entry(FixtureEntry::file("app/real", b"x"))
            .write_tar_gz(&temp.path().join("p.tar.gz"))
            .unwrap();

        let names: Vec<_> = collect(&path).into_iter().map(|(n, _, _)| n).collect();
        assert_eq!(names, vec!["app/real"]);
    }

    #[test]
    fn test_garbage_is_an_archive_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("junk");
        std::fs::write(&path, b"PK this is not a zip").unwrap();

        let err = visit_entries(&path, |_, _| Ok(())).unwrap_err();
        assert!(matches!(
            crate::core::find_launcher_error(&err),
            Some(LauncherError::ArchiveError { .. })
        ));
    }
}
