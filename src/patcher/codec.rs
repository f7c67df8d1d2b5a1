//! Binary diff codecs.
//!
//! Patch archives carry per-file deltas produced by `bsdiff` or `xdelta`
//! (VCDIFF). Both are consumed through the same narrow interface: given the
//! old file and the delta, produce the new file.

use crate::core::LauncherError;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

/// Encoding of one patch archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// The payload is the new file content.
    None,
    /// The payload is a bsdiff delta.
    Bsdiff,
    /// The payload is an xdelta / VCDIFF delta.
    Xdelta,
}

impl Codec {
    /// Codec selected by a leading archive key segment, if it names one.
    #[must_use]
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "bsdiff" => Some(Self::Bsdiff),
            "xdelta" => Some(Self::Xdelta),
            _ => None,
        }
    }

    /// Lowercase codec name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bsdiff => "bsdiff",
            Self::Xdelta => "xdelta",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reconstructs a file from its previous version and a delta.
pub trait DiffCodec: Send + Sync {
    /// Apply `diff` to `base`, returning the new content.
    ///
    /// # Errors
    ///
    /// A human-readable reason when the delta is corrupt or does not match
    /// `base`.
    fn apply(&self, base: &[u8], diff: &[u8]) -> Result<Vec<u8>, String>;
}

/// bsdiff 4.x deltas via `qbsdiff`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsdiffCodec;

impl DiffCodec for BsdiffCodec {
    fn apply(&self, base: &[u8], diff: &[u8]) -> Result<Vec<u8>, String> {
        let patcher = qbsdiff::Bspatch::new(diff).map_err(|e| e.to_string())?;
        let mut target = Vec::with_capacity(usize::try_from(patcher.hint_target_size()).unwrap_or(0));
        patcher.apply(base, Cursor::new(&mut target)).map_err(|e| e.to_string())?;
        Ok(target)
    }
}

/// VCDIFF deltas via the xdelta3 reference implementation.
#[cfg(feature = "xdelta")]
#[derive(Debug, Clone, Copy, Default)]
pub struct XdeltaCodec;

#[cfg(feature = "xdelta")]
impl DiffCodec for XdeltaCodec {
    fn apply(&self, base: &[u8], diff: &[u8]) -> Result<Vec<u8>, String> {
        xdelta3::decode(diff, base).ok_or_else(|| "xdelta3 could not decode delta".to_string())
    }
}

/// The codec implementations available to a [`PatchApplier`](super::PatchApplier).
#[derive(Clone)]
pub struct CodecRegistry {
    bsdiff: Option<Arc<dyn DiffCodec>>,
    xdelta: Option<Arc<dyn DiffCodec>>,
}

impl CodecRegistry {
    /// Registry with no codecs; every delta entry is unsupported.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            bsdiff: None,
            xdelta: None,
        }
    }

    /// Replace the implementation used for `codec`.
    #[must_use]
    pub fn with(mut self, codec: Codec, implementation: Arc<dyn DiffCodec>) -> Self {
        match codec {
            Codec::Bsdiff => self.bsdiff = Some(implementation),
            Codec::Xdelta => self.xdelta = Some(implementation),
            Codec::None => {}
        }
        self
    }

    /// Implementation for `codec`.
    ///
    /// # Errors
    ///
    /// [`LauncherError::UnsupportedCodec`] if none is registered.
    pub fn get(&self, codec: Codec) -> Result<&dyn DiffCodec, LauncherError> {
        let found = match codec {
            Codec::Bsdiff => self.bsdiff.as_deref(),
            Codec::Xdelta => self.xdelta.as_deref(),
            Codec::None => None,
        };
        found.ok_or_else(|| LauncherError::UnsupportedCodec {
            codec: codec.to_string(),
        })
    }
}

impl Default for CodecRegistry {
    /// bsdiff always; xdelta when built with the `xdelta` feature.
    fn default() -> Self {
        let registry = Self::empty().with(Codec::Bsdiff, Arc::new(BsdiffCodec));
        #[cfg(feature = "xdelta")]
        let registry = registry.with(Codec::Xdelta, Arc::new(XdeltaCodec));
        registry
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("bsdiff", &self.bsdiff.is_some())
            .field("xdelta", &self.xdelta.is_some())
            .finish()
    }
}
