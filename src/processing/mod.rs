//! The recompression pipeline and its parts.
//!
//! - [`MemoryDestination`]: growable or fixed in-memory output
//! - [`ErrorManager`]: classification of engine faults
//! - [`filter_markers`]: metadata segment selection and ordering
//! - [`ThumbnailStripping`]: optional EXIF thumbnail removal
//! - [`RecompressionPipeline`]: decode, filter and re-encode one stream
//! - [`dump_dct`]: raw coefficient export

mod dct;
mod destination;
mod error_manager;
pub mod markers;
mod pipeline;
mod thumbnail;

pub use dct::dump_dct;
pub use destination::{DestinationKind, GROWTH_QUANTUM, MemoryDestination};
pub use error_manager::ErrorManager;
pub use markers::{filter_markers, retention_for};
pub use pipeline::{PipelineState, RecompressionPipeline};
pub use thumbnail::{MetadataCodec, ThumbnailStripping};
#[cfg(feature = "exif")]
pub use thumbnail::{ExifTags, KamadakExif};
