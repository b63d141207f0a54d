//! The codec engine seam.
//!
//! The recompression pipeline never touches entropy-coded data itself. It
//! drives an engine through three small session traits:
//! - [`DecodeSession`]: header, saved markers and quantized coefficients
//! - [`EncodeSession`]: re-synthesis of a stream from coefficients and markers
//! - [`Destination`]: the pull-based byte sink an encode session writes into
//!
//! [`NativeEngine`] is the built-in pure-Rust implementation.

pub mod engine;
mod fault;
mod types;

pub use engine::NativeEngine;
pub use fault::EngineFault;
pub use types::{
    APP0, Block, ColorSpace, Coefficients, ComponentCoefficients, ComponentInfo,
    CriticalParameters, FrameHeader, JfifInfo, Marker, MarkerRetention, QuantTable, app,
};

pub(crate) use types::mcu_grid;

/// EXIF and XMP segments.
pub const APP1: u8 = app(1);
/// ICC profile chunks.
pub const APP2: u8 = app(2);
/// Photoshop IRB / IPTC.
pub const APP13: u8 = app(13);
/// Adobe color transform segment.
pub const APP14: u8 = app(14);

/// Largest payload a single marker segment can carry.
pub const MAX_MARKER_PAYLOAD: usize = 65533;

/// Byte sink driven by an encode session.
///
/// The session fills [`window`](Destination::window) and reports consumed
/// bytes through [`advance`](Destination::advance). When the window is
/// exhausted it calls [`empty`](Destination::empty); a `false` return means the
/// sink cannot take more data and the session aborts with
/// [`EngineFault::CantSuspend`].
pub trait Destination {
    /// Prepares the writable window. Called once before any output.
    fn init(&mut self);

    /// The currently writable, not yet used region.
    fn window(&mut self) -> &mut [u8];

    /// Marks `n` bytes at the start of the window as written.
    fn advance(&mut self, n: usize);

    /// Requests more space once the window is exhausted.
    fn empty(&mut self) -> bool;

    /// Records the final length. Called once after the last byte.
    fn term(&mut self);
}

/// Copies `bytes` into `dest`, asking for more space as the window runs out.
pub fn emit(dest: &mut dyn Destination, mut bytes: &[u8]) -> Result<(), EngineFault> {
    while !bytes.is_empty() {
        if dest.window().is_empty() && (!dest.empty() || dest.window().is_empty()) {
            return Err(EngineFault::CantSuspend);
        }
        let window = dest.window();
        let n = window.len().min(bytes.len());
        window[..n].copy_from_slice(&bytes[..n]);
        dest.advance(n);
        bytes = &bytes[n..];
    }
    Ok(())
}

/// Output coding requested from an encode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Compute Huffman tables from the image's own symbol statistics.
    pub optimize_coding: bool,
    pub progressive: bool,
    pub arithmetic: bool,
}

impl EncodeOptions {
    /// Sequential Huffman coding with per-image optimal tables.
    pub const OPTIMIZED_SEQUENTIAL: Self = Self {
        optimize_coding: true,
        progressive: false,
        arithmetic: false,
    };
}

/// A decoder bound to one input buffer.
pub trait DecodeSession {
    /// Parses everything up to the first scan.
    fn read_header(&mut self) -> Result<(), EngineFault>;

    /// Available after a successful [`read_header`](DecodeSession::read_header).
    fn header(&self) -> Option<&FrameHeader>;

    /// Decodes all scans into the coefficient store.
    fn read_coefficients(&mut self) -> Result<(), EngineFault>;

    /// Available after a successful
    /// [`read_coefficients`](DecodeSession::read_coefficients).
    fn coefficients(&self) -> Option<&Coefficients>;

    /// Retained markers in encounter order.
    fn markers(&self) -> &[Marker];

    /// Parameters an encoder needs to reproduce the coefficients exactly.
    fn critical_parameters(&self) -> Result<CriticalParameters, EngineFault>;
}

/// An encoder writing one output stream into a borrowed destination.
///
/// Calls must follow the order `write_coefficients`, any number of
/// `write_marker`, then `finish`.
pub trait EncodeSession<'s> {
    /// Emits the stream header and takes the coefficients to encode.
    fn write_coefficients(&mut self, coefficients: &'s Coefficients) -> Result<(), EngineFault>;

    /// Emits one marker segment right after the stream header.
    fn write_marker(&mut self, code: u8, payload: &[u8]) -> Result<(), EngineFault>;

    /// Emits tables, entropy-coded data and EOI, then terminates the
    /// destination.
    fn finish(&mut self) -> Result<(), EngineFault>;
}

/// A coefficient-level JPEG codec.
pub trait CodecEngine: Send + Sync {
    fn version(&self) -> &str;

    fn copyright(&self) -> &str;

    fn open_decoder<'i>(
        &self,
        input: &'i [u8],
        retention: MarkerRetention,
    ) -> Result<Box<dyn DecodeSession + 'i>, EngineFault>;

    fn open_encoder<'s>(
        &self,
        params: CriticalParameters,
        options: EncodeOptions,
        dest: &'s mut dyn Destination,
    ) -> Result<Box<dyn EncodeSession<'s> + 's>, EngineFault>;
}
