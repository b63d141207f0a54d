//! Core types for optimization options and results.

use std::ops::{BitOr, BitOrAssign, Deref};

use serde::{Deserialize, Serialize};

/// Metadata stripping options as a bit set.
///
/// Unknown bits are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct StripFlags(u32);

impl StripFlags {
    pub const NONE: Self = Self(0);
    /// Drop EXIF, XMP and IPTC segments
    pub const STRIP_METADATA: Self = Self(1);
    /// Drop the ICC color profile
    pub const STRIP_ICC: Self = Self(2);
    /// Keep EXIF tags but remove the embedded thumbnail
    pub const STRIP_THUMBNAIL: Self = Self(4);

    const ALL: u32 = 1 | 2 | 4;

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the EXIF thumbnail has to be rewritten. Stripping all
    /// metadata takes precedence.
    pub const fn rewrites_thumbnail(self) -> bool {
        self.contains(Self::STRIP_THUMBNAIL) && !self.contains(Self::STRIP_METADATA)
    }
}

impl BitOr for StripFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for StripFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<u32> for StripFlags {
    fn from(bits: u32) -> Self {
        Self::from_bits(bits)
    }
}

impl From<StripFlags> for u32 {
    fn from(flags: StripFlags) -> Self {
        flags.0
    }
}

/// Where the re-encoded stream goes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OutputTarget {
    /// Allocate exactly this many bytes and fail if the result does not fit
    Limit(usize),
    /// Write into a caller buffer; only the written prefix is meaningful
    Buffer(Vec<u8>),
}

/// A re-encoded JPEG owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedImage {
    data: Vec<u8>,
}

impl OptimizedImage {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl Deref for OptimizedImage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for OptimizedImage {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Successful result of one optimization task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizeOutput {
    /// A newly allocated stream
    Buffer(OptimizedImage),
    /// The caller's target, holding `len` valid bytes at the front
    Written { target: Vec<u8>, len: usize },
}

impl OptimizeOutput {
    pub fn len(&self) -> usize {
        match self {
            Self::Buffer(image) => image.len(),
            Self::Written { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The encoded stream, whichever buffer holds it.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Buffer(image) => image.as_bytes(),
            Self::Written { target, len } => &target[..*len],
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        match self {
            Self::Buffer(image) => image.into_vec(),
            Self::Written { mut target, len } => {
                target.truncate(len);
                target
            }
        }
    }
}

/// Optimization options in their serialized form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizeOptions {
    /// Drop EXIF, XMP and IPTC segments
    pub strip: bool,
    /// Drop the ICC color profile
    pub strip_icc: bool,
    /// Remove the embedded EXIF thumbnail
    pub strip_thumbnail: bool,
    /// Optional output target, a byte limit or a buffer
    pub out: Option<OutputTarget>,
}

impl OptimizeOptions {
    pub fn flags(&self) -> StripFlags {
        let mut flags = StripFlags::NONE;
        if self.strip {
            flags |= StripFlags::STRIP_METADATA;
        }
        if self.strip_icc {
            flags |= StripFlags::STRIP_ICC;
        }
        if self.strip_thumbnail {
            flags |= StripFlags::STRIP_THUMBNAIL;
        }
        flags
    }

    pub fn into_parts(self) -> (StripFlags, Option<OutputTarget>) {
        (self.flags(), self.out)
    }
}

/// Result of optimizing one file.
///
/// Contains the original and optimized file information along with
/// compression statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    /// Path to the original input file
    pub original_path: String,
    /// Path to the optimized output file
    pub optimized_path: String,
    /// Original file size in bytes
    pub original_size: u64,
    /// Optimized file size in bytes
    pub optimized_size: u64,
    /// Whether the optimization succeeded
    pub success: bool,
    /// Error message if optimization failed
    pub error: Option<String>,
    /// Whether the failure was caused by the input itself
    pub invalid_image: bool,
    /// Bytes saved (can be negative if file grew)
    pub saved_bytes: i64,
    /// Compression ratio as a percentage
    pub compression_ratio: f64,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of concurrently running pipelines
    pub workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(1, 8);
        Self { workers }
    }
}

/// Versions of the collaborators doing the actual work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Versions {
    pub engine: String,
    pub copyright: String,
    /// Present when thumbnail stripping is available
    pub exif: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_flag_bits_are_ignored() {
        let flags = StripFlags::from_bits(0xFF);
        assert_eq!(flags.bits(), 7);
        assert!(flags.contains(StripFlags::STRIP_ICC));
        assert!(!flags.rewrites_thumbnail());
        assert!(StripFlags::STRIP_THUMBNAIL.rewrites_thumbnail());
    }

    #[test]
    fn test_options_deserialize() {
        let options: OptimizeOptions =
            serde_json::from_str(r#"{"strip": true, "stripThumbnail": true, "out": 2048}"#).unwrap();
        let (flags, out) = options.into_parts();
        assert_eq!(flags, StripFlags::STRIP_METADATA | StripFlags::STRIP_THUMBNAIL);
        assert_eq!(out, Some(OutputTarget::Limit(2048)));

        let options: OptimizeOptions = serde_json::from_str(r#"{"out": [0, 0, 0]}"#).unwrap();
        assert_eq!(options.flags(), StripFlags::NONE);
        assert_eq!(options.out, Some(OutputTarget::Buffer(vec![0; 3])));

        let flags: StripFlags = serde_json::from_str("10").unwrap();
        assert_eq!(flags, StripFlags::STRIP_ICC);
    }

    #[test]
    fn test_written_output_exposes_prefix() {
        let output = OptimizeOutput::Written { target: b"jpegjunk".to_vec(), len: 4 };
        assert_eq!(output.len(), 4);
        assert_eq!(output.bytes(), b"jpeg");
        assert_eq!(output.into_vec(), b"jpeg");
    }

    #[test]
    fn test_pool_config_default_is_bounded() {
        let config = PoolConfig::default();
        assert!((1..=8).contains(&config.workers));
        let parsed: PoolConfig = serde_json::from_str(r#"{"workers": 3}"#).unwrap();
        assert_eq!(parsed.workers, 3);
    }
}
