//! Fault codes raised by a codec engine.

use thiserror::Error;

/// A fatal condition reported by the codec engine.
///
/// Engines never return partially valid state alongside a fault: once an
/// operation yields `Err`, the session that produced it must not be driven
/// any further.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineFault {
    #[error("Not a JPEG file: starts with 0x{0:02x} 0x{1:02x}")]
    NoSoi(u8, u8),

    #[error("JPEG datastream contains no image")]
    NoImage,

    #[error("Huffman table 0x{0:02x} was not defined")]
    NoHuffmanTable(u8),

    #[error("Quantization table 0x{0:02x} was not defined")]
    NoQuantTable(u8),

    /// The output destination refused to provide more space.
    #[error("Suspension not allowed here")]
    CantSuspend,

    #[error("Unsupported JPEG process: SOF type 0x{0:02x}")]
    UnsupportedProcess(u8),

    #[error("Unsupported JPEG data precision {0}")]
    BadPrecision(u8),

    #[error("Bogus marker length")]
    BadLength,

    #[error("Bogus sampling factors")]
    BadSampling,

    #[error("Too many color components: {0}, max 4")]
    ComponentCount(usize),

    #[error("Invalid component ID {0} in SOS")]
    BadComponentId(u8),

    #[error("Bogus Huffman table definition")]
    BadHuffmanTable,

    #[error("Cannot transcode due to multiple use of quantization table {0}")]
    MismatchedQuantTable(u8),

    #[error("Bogus DQT index {0}")]
    BadQuantIndex(u8),

    #[error("Bogus DHT index {0}")]
    BadHuffmanIndex(u8),

    #[error("Invalid progressive parameters Ss={ss} Se={se} Ah={ah} Al={al}")]
    BadProgression { ss: u8, se: u8, ah: u8, al: u8 },

    #[error("Invalid JPEG file structure: {0}")]
    Structure(&'static str),

    #[error("Empty JPEG image (DNL not supported)")]
    EmptyImage,

    #[error("DCT coefficient out of range")]
    BadCoefficient,

    #[error("Improper call to JPEG library in state {0}")]
    BadState(&'static str),

    #[error("Requested output coding is not supported: {0}")]
    UnsupportedOutput(&'static str),
}

impl EngineFault {
    /// Faults that mean the input is not a usable JPEG at all.
    pub fn is_invalid_image(&self) -> bool {
        matches!(
            self,
            Self::NoSoi(..) | Self::NoImage | Self::NoHuffmanTable(_) | Self::NoQuantTable(_)
        )
    }
}
