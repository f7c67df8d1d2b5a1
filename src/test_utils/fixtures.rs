//! Fixtures for archives, patches, and index listings.
//!
//! Archive names are written verbatim (no path validation), so hostile
//! entries such as `../escape` can be produced for containment tests.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

#[derive(Clone, Debug)]
enum FixtureKind {
    File(Vec<u8>),
    Dir,
    Symlink(String),
}

/// One entry to place in a fixture archive.
#[derive(Clone, Debug)]
pub struct FixtureEntry {
    name: String,
    kind: FixtureKind,
    mode: Option<u32>,
}

impl FixtureEntry {
    /// Regular file with `content`.
    pub fn file(name: impl Into<String>, content: &[u8]) -> Self {
        Self {
            name: name.into(),
            kind: FixtureKind::File(content.to_vec()),
            mode: None,
        }
    }

    /// Directory entry. A trailing `/` is added for zip if missing.
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FixtureKind::Dir,
            mode: None,
        }
    }

    /// Symbolic link pointing at `target`.
    pub fn symlink(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FixtureKind::Symlink(target.into()),
            mode: None,
        }
    }

    /// bsdiff entry at `bsdiff/<relative>` turning `old` into `new`.
    pub fn bsdiff(relative: &str, old: &[u8], new: &[u8]) -> Self {
        Self::file(format!("bsdiff/{relative}"), &bsdiff_patch(old, new))
    }

    /// xdelta entry at `xdelta/<relative>` turning `old` into `new`.
    #[cfg(feature = "xdelta")]
    pub fn xdelta(relative: &str, old: &[u8], new: &[u8]) -> Self {
        Self::file(format!("xdelta/{relative}"), &xdelta_patch(old, new))
    }

    /// Set the stored Unix permission bits.
    #[must_use]
    pub const fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Builds zip, tar.gz and tar archives from [`FixtureEntry`] values.
#[derive(Clone, Debug, Default)]
pub struct ArchiveBuilder {
    entries: Vec<FixtureEntry>,
}

impl ArchiveBuilder {
    /// Empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    #[must_use]
    pub fn entry(mut self, entry: FixtureEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Write as a zip archive at `path`.
    pub fn write_zip(&self, path: &Path) -> Result<PathBuf> {
        let file = create(path)?;
        let mut writer = zip::ZipWriter::new(file);

        for entry in &self.entries {
            let options = SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .unix_permissions(entry.mode.unwrap_or(match entry.kind {
                    FixtureKind::Dir => 0o755,
                    _ => 0o644,
                }));
            match &entry.kind {
                FixtureKind::File(content) => {
                    writer.start_file(entry.name.as_str(), options)?;
                    writer.write_all(content)?;
                }
                FixtureKind::Dir => {
                    writer.add_directory(entry.name.as_str(), options)?;
                }
                FixtureKind::Symlink(target) => {
                    writer.add_symlink(entry.name.as_str(), target.as_str(), options)?;
                }
            }
        }

        writer.finish().context("Failed to finish zip fixture")?;
        Ok(path.to_path_buf())
    }

    /// Write as a gzip-compressed tar archive at `path`.
    pub fn write_tar_gz(&self, path: &Path) -> Result<PathBuf> {
        let encoder = GzEncoder::new(create(path)?, Compression::default());
        let encoder = self.append_tar(encoder)?;
        encoder.finish().context("Failed to finish gzip stream")?;
        Ok(path.to_path_buf())
    }

    /// Write as an uncompressed tar archive at `path`.
    pub fn write_tar(&self, path: &Path) -> Result<PathBuf> {
        let mut file = self.append_tar(create(path)?)?;
        file.flush()?;
        Ok(path.to_path_buf())
    }

    fn append_tar<W: Write>(&self, writer: W) -> Result<W> {
        let mut builder = tar::Builder::new(writer);

        for entry in &self.entries {
            let mut header = tar::Header::new_gnu();
            set_raw_name(&mut header.as_old_mut().name, &entry.name)?;

            let data: &[u8] = match &entry.kind {
                FixtureKind::File(content) => {
                    header.set_entry_type(tar::EntryType::Regular);
                    header.set_mode(entry.mode.unwrap_or(0o644));
                    content
                }
                FixtureKind::Dir => {
                    header.set_entry_type(tar::EntryType::Directory);
                    header.set_mode(entry.mode.unwrap_or(0o755));
                    &[]
                }
                FixtureKind::Symlink(target) => {
                    header.set_entry_type(tar::EntryType::Symlink);
                    header.set_mode(0o777);
                    set_raw_name(&mut header.as_old_mut().linkname, target)?;
                    &[]
                }
            };
            header.set_size(data.len() as u64);
            header.set_cksum();
            builder.append(&header, data)?;
        }

        builder.into_inner().context("Failed to finish tar stream")
    }
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    File::create(path).with_context(|| format!("Failed to create fixture {}", path.display()))
}

fn set_raw_name(field: &mut [u8; 100], name: &str) -> Result<()> {
    let bytes = name.as_bytes();
    anyhow::ensure!(bytes.len() < field.len(), "fixture name too long: {name}");
    field.fill(0);
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

/// bsdiff patch bytes turning `old` into `new`.
pub fn bsdiff_patch(old: &[u8], new: &[u8]) -> Vec<u8> {
    let mut patch = Vec::new();
    qbsdiff::Bsdiff::new(old, new).compare(&mut patch).unwrap_or_else(|e| panic!("bsdiff failed: {e}"));
    patch
}

/// xdelta (VCDIFF) patch bytes turning `old` into `new`.
#[cfg(feature = "xdelta")]
pub fn xdelta_patch(old: &[u8], new: &[u8]) -> Vec<u8> {
    xdelta3::encode(new, old).unwrap_or_else(|| panic!("xdelta encode failed"))
}

/// S3-style bucket listing containing `keys`.
pub fn bucket_listing<S: AsRef<str>>(keys: &[S]) -> String {
    let contents: String = keys
        .iter()
        .map(|key| {
            format!(
                "<Contents><Key>{}</Key><LastModified>2026-01-01T00:00:00.000Z</LastModified><Size>1024</Size></Contents>",
                key.as_ref()
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>builds</Name><IsTruncated>false</IsTruncated>{contents}</ListBucketResult>"#
    )
}
