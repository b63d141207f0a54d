//! Pure-Rust coefficient codec.
//!
//! Decodes baseline, extended sequential and progressive Huffman JPEGs down
//! to quantized DCT coefficients and writes them back as a single
//! sequential scan with optimal Huffman tables.

mod bits;
mod decoder;
mod encoder;
mod huffman;
mod reader;
mod scan;
mod tables;

pub use decoder::NativeDecoder;
pub use encoder::NativeEncoder;

use lazy_static::lazy_static;

use super::{
    CodecEngine, CriticalParameters, DecodeSession, Destination, EncodeOptions, EncodeSession,
    EngineFault, MarkerRetention,
};

lazy_static! {
    static ref VERSION: String = format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
}

const COPYRIGHT: &str = "Native coefficient codec, no third-party JPEG library";

/// The built-in [`CodecEngine`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl CodecEngine for NativeEngine {
    fn version(&self) -> &str {
        &VERSION
    }

    fn copyright(&self) -> &str {
        COPYRIGHT
    }

    fn open_decoder<'i>(
        &self,
        input: &'i [u8],
        retention: MarkerRetention,
    ) -> Result<Box<dyn DecodeSession + 'i>, EngineFault> {
        Ok(Box::new(NativeDecoder::new(input, retention)))
    }

    fn open_encoder<'s>(
        &self,
        params: CriticalParameters,
        options: EncodeOptions,
        dest: &'s mut dyn Destination,
    ) -> Result<Box<dyn EncodeSession<'s> + 's>, EngineFault> {
        Ok(Box::new(NativeEncoder::new(params, options, dest)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_names_the_crate() {
        let engine = NativeEngine::new();
        assert!(engine.version().starts_with("jpeg-optimizer "));
        assert!(!engine.copyright().is_empty());
    }
}
