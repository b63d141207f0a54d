//! Data exchanged between the pipeline and a codec engine.

/// One 8x8 block of quantized DCT coefficients, in natural (row-major) order.
pub type Block = [i16; 64];

/// Marker code of the first application segment.
pub const APP0: u8 = 0xE0;

/// Marker code of application segment `n` (0..=15).
pub const fn app(n: u8) -> u8 {
    APP0 + n
}

/// Color space of the encoded components, as detected from the frame
/// layout and the JFIF/Adobe segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Grayscale,
    YCbCr,
    Rgb,
    Cmyk,
    Ycck,
    Unknown,
}

impl ColorSpace {
    /// Detects the color space the way decoders conventionally do: JFIF
    /// implies YCbCr, an Adobe transform flag decides between the RGB/YCbCr
    /// and CMYK/YCCK pairs, and component ids are the last resort.
    pub fn detect(component_ids: &[u8], saw_jfif: bool, adobe_transform: Option<u8>) -> Self {
        match component_ids.len() {
            1 => Self::Grayscale,
            3 => {
                if saw_jfif {
                    return Self::YCbCr;
                }
                match adobe_transform {
                    Some(0) => Self::Rgb,
                    Some(_) => Self::YCbCr,
                    None => match component_ids {
                        [1, 2, 3] => Self::YCbCr,
                        [b'R', b'G', b'B'] => Self::Rgb,
                        _ => Self::YCbCr,
                    },
                }
            }
            4 => match adobe_transform {
                Some(0) => Self::Cmyk,
                Some(_) => Self::Ycck,
                None => Self::Cmyk,
            },
            _ => Self::Unknown,
        }
    }
}

/// JFIF APP0 fields that survive recompression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JfifInfo {
    pub major_version: u8,
    pub minor_version: u8,
    pub density_unit: u8,
    pub x_density: u16,
    pub y_density: u16,
}

impl Default for JfifInfo {
    fn default() -> Self {
        Self {
            major_version: 1,
            minor_version: 1,
            density_unit: 0,
            x_density: 1,
            y_density: 1,
        }
    }
}

/// A quantization table in natural order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTable {
    pub values: [u16; 64],
}

impl QuantTable {
    /// Whether any entry needs the 16-bit DQT encoding.
    pub fn needs_16_bit(&self) -> bool {
        self.values.iter().any(|&v| v > 255)
    }
}

/// Per-component frame parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    pub id: u8,
    pub h_samp: u8,
    pub v_samp: u8,
    pub quant_table: u8,
    /// Blocks covering the component's own samples, excluding MCU padding.
    pub width_in_blocks: usize,
    pub height_in_blocks: usize,
}

/// Frame-level information made available after the header is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub width: u32,
    pub height: u32,
    pub precision: u8,
    pub progressive: bool,
    pub components: Vec<ComponentInfo>,
    pub color_space: ColorSpace,
}

impl FrameHeader {
    pub fn max_h_samp(&self) -> u8 {
        max_h_samp(&self.components)
    }

    pub fn max_v_samp(&self) -> u8 {
        max_v_samp(&self.components)
    }
}

pub(crate) fn max_h_samp(components: &[ComponentInfo]) -> u8 {
    components.iter().map(|c| c.h_samp).max().unwrap_or(1)
}

pub(crate) fn max_v_samp(components: &[ComponentInfo]) -> u8 {
    components.iter().map(|c| c.v_samp).max().unwrap_or(1)
}

/// MCU grid of an interleaved scan over the whole frame: (columns, rows).
pub(crate) fn mcu_grid(width: u32, height: u32, components: &[ComponentInfo]) -> (usize, usize) {
    let mcu_w = 8 * max_h_samp(components) as usize;
    let mcu_h = 8 * max_v_samp(components) as usize;
    (
        (width as usize).div_ceil(mcu_w),
        (height as usize).div_ceil(mcu_h),
    )
}

/// The coefficient blocks of one component.
///
/// Storage is padded out to whole MCUs so interleaved scans can address
/// their edge blocks; `width_in_blocks`/`height_in_blocks` delimit the real
/// image area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentCoefficients {
    pub width_in_blocks: usize,
    pub height_in_blocks: usize,
    stride: usize,
    rows: usize,
    blocks: Vec<Block>,
}

impl ComponentCoefficients {
    pub fn new(width_in_blocks: usize, height_in_blocks: usize, stride: usize, rows: usize) -> Self {
        let stride = stride.max(width_in_blocks);
        let rows = rows.max(height_in_blocks);
        Self {
            width_in_blocks,
            height_in_blocks,
            stride,
            rows,
            blocks: vec![[0; 64]; stride * rows],
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn padded_rows(&self) -> usize {
        self.rows
    }

    pub fn block(&self, row: usize, col: usize) -> &Block {
        &self.blocks[row * self.stride + col]
    }

    pub fn block_mut(&mut self, row: usize, col: usize) -> &mut Block {
        &mut self.blocks[row * self.stride + col]
    }

    /// The real (unpadded) blocks of one block row.
    pub fn row(&self, row: usize) -> &[Block] {
        let start = row * self.stride;
        &self.blocks[start..start + self.width_in_blocks]
    }

    /// Iterates the real blocks in raster order.
    pub fn real_blocks(&self) -> impl Iterator<Item = &Block> {
        (0..self.height_in_blocks).flat_map(move |r| self.row(r).iter())
    }
}

/// All coefficient data of an image, one entry per frame component.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Coefficients {
    pub components: Vec<ComponentCoefficients>,
}

impl Coefficients {
    /// Compares only the real image area of every component.
    pub fn same_blocks(&self, other: &Coefficients) -> bool {
        self.components.len() == other.components.len()
            && self.components.iter().zip(&other.components).all(|(a, b)| {
                a.width_in_blocks == b.width_in_blocks
                    && a.height_in_blocks == b.height_in_blocks
                    && a.real_blocks().eq(b.real_blocks())
            })
    }
}

/// Codec parameters that must be carried unchanged from decode to encode
/// for the coefficients to stay valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalParameters {
    pub width: u32,
    pub height: u32,
    pub components: Vec<ComponentInfo>,
    /// Indexed by table slot (0..=3).
    pub quant_tables: [Option<QuantTable>; 4],
    pub color_space: ColorSpace,
    pub jfif: Option<JfifInfo>,
}

/// A saved metadata segment, payload excludes the marker and length bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub code: u8,
    pub payload: Vec<u8>,
}

impl Marker {
    pub fn new(code: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }
}

/// Which application segments a decode session should keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarkerRetention(u16);

impl MarkerRetention {
    pub const NONE: Self = Self(0);

    /// Also retain `APP<n>` segments. Codes outside APP0..=APP15 are ignored.
    pub fn keep(mut self, code: u8) -> Self {
        if let Some(n) = code.checked_sub(APP0).filter(|n| *n < 16) {
            self.0 |= 1 << n;
        }
        self
    }

    pub fn keeps(&self, code: u8) -> bool {
        code.checked_sub(APP0)
            .filter(|n| *n < 16)
            .is_some_and(|n| self.0 & (1 << n) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}
