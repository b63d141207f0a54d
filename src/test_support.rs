//! Fixtures shared by the unit tests.

use crate::codec::engine::NativeEncoder;
use crate::codec::{
    ColorSpace, Coefficients, ComponentCoefficients, ComponentInfo, CriticalParameters,
    EncodeOptions, EncodeSession, JfifInfo, QuantTable,
};
use crate::processing::MemoryDestination;

/// 1x1 grayscale baseline JPEG with the standard luminance tables.
pub const MINIMAL_JPEG: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xDB, 0x00, 0x43, 0x00, 0x08, 0x06, 0x06, 0x07, 0x06,
    0x05, 0x08, 0x07, 0x07, 0x07, 0x09, 0x09, 0x08, 0x0A, 0x0C, 0x14, 0x0D, 0x0C, 0x0B, 0x0B,
    0x0C, 0x19, 0x12, 0x13, 0x0F, 0x14, 0x1D, 0x1A, 0x1F, 0x1E, 0x1D, 0x1A, 0x1C, 0x1C, 0x20,
    0x24, 0x2E, 0x27, 0x20, 0x22, 0x2C, 0x23, 0x1C, 0x1C, 0x28, 0x37, 0x29, 0x2C, 0x30, 0x31,
    0x34, 0x34, 0x34, 0x1F, 0x27, 0x39, 0x3D, 0x38, 0x32, 0x3C, 0x2E, 0x33, 0x34, 0x32, 0xFF,
    0xC0, 0x00, 0x0B, 0x08, 0x00, 0x01, 0x00, 0x01, 0x01, 0x01, 0x11, 0x00, 0xFF, 0xC4, 0x00,
    0x1F, 0x00, 0x00, 0x01, 0x05, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
    0xFF, 0xC4, 0x00, 0xB5, 0x10, 0x00, 0x02, 0x01, 0x03, 0x03, 0x02, 0x04, 0x03, 0x05, 0x05,
    0x04, 0x04, 0x00, 0x00, 0x01, 0x7D, 0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21,
    0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07, 0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xA1, 0x08,
    0x23, 0x42, 0xB1, 0xC1, 0x15, 0x52, 0xD1, 0xF0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0A,
    0x16, 0x17, 0x18, 0x19, 0x1A, 0x25, 0x26, 0x27, 0x28, 0x29, 0x2A, 0x34, 0x35, 0x36, 0x37,
    0x38, 0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x4A, 0x53, 0x54, 0x55, 0x56,
    0x57, 0x58, 0x59, 0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0x6A, 0x73, 0x74, 0x75,
    0x76, 0x77, 0x78, 0x79, 0x7A, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8A, 0x92, 0x93,
    0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9,
    0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6,
    0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xE1, 0xE2,
    0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7,
    0xF8, 0xF9, 0xFA, 0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, 0xFB, 0xD5,
    0xDB, 0x20, 0xA8, 0xF1, 0x7E, 0xFF, 0xD9,
];

/// 8x8 grayscale progressive JPEG: a DC scan setting DC to 3 and one AC
/// scan setting coefficient 1 to 1.
pub const PROGRESSIVE_JPEG: &[u8] = &[
    0xFF, 0xD8,
    // DQT, slot 0, all ones
    0xFF, 0xDB, 0x00, 0x43, 0x00,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    // SOF2, 8x8, one component
    0xFF, 0xC2, 0x00, 0x0B, 0x08, 0x00, 0x08, 0x00, 0x08, 0x01, 0x01, 0x11, 0x00,
    // DHT DC 0: a single 1-bit code for category 2
    0xFF, 0xC4, 0x00, 0x14, 0x00,
    1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0x02,
    // DC first scan: code 0, bits 11
    0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00,
    0x7F,
    // DHT AC 0: 0x01 -> 0, EOB -> 10
    0xFF, 0xC4, 0x00, 0x15, 0x10,
    1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0x01, 0x00,
    // AC first scan over 1..=63: value 1 at k=1, then EOB
    0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x01, 0x3F, 0x00,
    0x6F,
    0xFF, 0xD9,
];

/// Installs a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Synthesizes baseline JPEGs with pseudo-random coefficients.
pub struct JpegBuilder {
    width: u32,
    height: u32,
    components: Vec<(u8, u8, u8, u8)>,
    markers: Vec<(u8, Vec<u8>)>,
    quant_scale: u32,
    quant_tables: bool,
}

impl JpegBuilder {
    /// A grayscale image by default.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            components: vec![(1, 1, 1, 0)],
            markers: Vec::new(),
            quant_scale: 100,
            quant_tables: true,
        }
    }

    /// Components as `(id, h_samp, v_samp, quant_table)`.
    pub fn components(mut self, components: &[(u8, u8, u8, u8)]) -> Self {
        self.components = components.to_vec();
        self
    }

    pub fn marker(mut self, code: u8, payload: &[u8]) -> Self {
        self.markers.push((code, payload.to_vec()));
        self
    }

    /// Percentage applied to the quantizer values. Above ~180 the tables
    /// need 16-bit precision.
    pub fn quant_scale(mut self, percent: u32) -> Self {
        self.quant_scale = percent;
        self
    }

    /// Drops every DQT segment from the output.
    pub fn without_quant_tables(mut self) -> Self {
        self.quant_tables = false;
        self
    }

    fn params(&self) -> CriticalParameters {
        let max_h = self.components.iter().map(|c| c.1).max().unwrap_or(1) as u32;
        let max_v = self.components.iter().map(|c| c.2).max().unwrap_or(1) as u32;
        let components: Vec<ComponentInfo> = self
            .components
            .iter()
            .map(|&(id, h, v, tq)| ComponentInfo {
                id,
                h_samp: h,
                v_samp: v,
                quant_table: tq,
                width_in_blocks: (self.width * h as u32).div_ceil(max_h).div_ceil(8) as usize,
                height_in_blocks: (self.height * v as u32).div_ceil(max_v).div_ceil(8) as usize,
            })
            .collect();

        let mut quant_tables: [Option<QuantTable>; 4] = Default::default();
        for &(_, _, _, tq) in &self.components {
            let mut values = [0u16; 64];
            for (i, value) in values.iter_mut().enumerate() {
                let base = 16 + 2 * i as u32 + 3 * tq as u32;
                *value = (base * self.quant_scale / 100).clamp(1, u16::MAX as u32) as u16;
            }
            quant_tables[tq as usize] = Some(QuantTable { values });
        }

        let ids: Vec<u8> = self.components.iter().map(|c| c.0).collect();
        let color_space = ColorSpace::detect(&ids, true, None);
        let jfif = matches!(color_space, ColorSpace::Grayscale | ColorSpace::YCbCr)
            .then(JfifInfo::default);

        CriticalParameters {
            width: self.width,
            height: self.height,
            components,
            quant_tables,
            color_space,
            jfif,
        }
    }

    fn coefficients(params: &CriticalParameters) -> Coefficients {
        let mut seed: u32 = 0x2545_F491;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };
        let components = params
            .components
            .iter()
            .map(|info| {
                let (w, h) = (info.width_in_blocks, info.height_in_blocks);
                let mut store = ComponentCoefficients::new(w, h, w, h);
                for row in 0..h {
                    for col in 0..w {
                        let block = store.block_mut(row, col);
                        block[0] = (next() % 101) as i16 - 50;
                        for k in 1..64 {
                            let r = next();
                            block[k] = match r % 16 {
                                0 => (r >> 8) as i16 % 1000,
                                1..=4 => ((r >> 8) % 41) as i16 - 20,
                                _ => 0,
                            };
                        }
                    }
                }
                store
            })
            .collect();
        Coefficients { components }
    }

    pub fn build(&self) -> Vec<u8> {
        let params = self.params();
        let coefficients = Self::coefficients(&params);
        let mut dest = MemoryDestination::growable(0);
        {
            let mut encoder =
                NativeEncoder::new(params, EncodeOptions::OPTIMIZED_SEQUENTIAL, &mut dest)
                    .expect("valid fixture parameters");
            encoder.write_coefficients(&coefficients).expect("coefficients");
            for (code, payload) in &self.markers {
                encoder.write_marker(*code, payload).expect("marker");
            }
            encoder.finish().expect("finish");
        }
        let jpeg = dest.into_vec().expect("growable output");
        if self.quant_tables { jpeg } else { strip_segments(&jpeg, 0xDB) }
    }
}

/// Removes all header segments with the given marker code.
fn strip_segments(jpeg: &[u8], code: u8) -> Vec<u8> {
    let mut out = jpeg[..2].to_vec();
    let mut pos = 2;
    while pos + 4 <= jpeg.len() && jpeg[pos] == 0xFF {
        let marker = jpeg[pos + 1];
        if marker == 0xDA {
            break;
        }
        let len = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        if marker != code {
            out.extend_from_slice(&jpeg[pos..pos + 2 + len]);
        }
        pos += 2 + len;
    }
    out.extend_from_slice(&jpeg[pos..]);
    out
}

fn push_segment(out: &mut Vec<u8>, code: u8, body: &[u8]) {
    out.extend_from_slice(&[0xFF, code]);
    out.extend_from_slice(&(body.len() as u16 + 2).to_be_bytes());
    out.extend_from_slice(body);
}

fn push_dqt(out: &mut Vec<u8>, slot: u8, value: u8) {
    let mut body = vec![slot];
    body.extend_from_slice(&[value; 64]);
    push_segment(out, 0xDB, &body);
}

/// DC table 0 with `0 -> category 0` and `1 -> category 1`, AC table 0
/// with the single code `0 -> EOB`.
fn push_tiny_huffman_tables(out: &mut Vec<u8>) {
    let mut dc = vec![0x00, 2];
    dc.extend_from_slice(&[0; 15]);
    dc.extend_from_slice(&[0x00, 0x01]);
    push_segment(out, 0xC4, &dc);
    let mut ac = vec![0x10, 1];
    ac.extend_from_slice(&[0; 15]);
    ac.push(0x00);
    push_segment(out, 0xC4, &ac);
}

/// 16x8 grayscale baseline JPEG with a restart interval of one block. Both
/// blocks code a DC difference of +1, so they decode to DC 1 only when the
/// prediction is reset at the restart marker. Without `with_markers` the
/// RST0 between the blocks is left out.
pub fn restart_jpeg(with_markers: bool) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    push_dqt(&mut out, 0, 1);
    push_segment(&mut out, 0xC0, &[0x08, 0x00, 0x08, 0x00, 0x10, 0x01, 0x01, 0x11, 0x00]);
    push_tiny_huffman_tables(&mut out);
    push_segment(&mut out, 0xDD, &[0x00, 0x01]);
    push_segment(&mut out, 0xDA, &[0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
    // DC code 1, extra bit 1, EOB 0, padded with ones.
    out.push(0xDF);
    if with_markers {
        out.extend_from_slice(&[0xFF, 0xD0]);
    }
    out.push(0xDF);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// 8x8 three-component baseline JPEG with one scan per component.
/// Component 1 uses slot 0, which is redefined after its scan; components
/// 2 and 3 use slot 1.
pub fn requantized_jpeg() -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    push_dqt(&mut out, 0, 1);
    push_dqt(&mut out, 1, 2);
    push_segment(
        &mut out,
        0xC0,
        &[0x08, 0x00, 0x08, 0x00, 0x08, 0x03, 0x01, 0x11, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01],
    );
    push_tiny_huffman_tables(&mut out);
    for id in 1..=3u8 {
        if id == 2 {
            push_dqt(&mut out, 0, 50);
        }
        push_segment(&mut out, 0xDA, &[0x01, id, 0x00, 0x00, 0x3F, 0x00]);
        // DC code 0, EOB 0, padded with ones.
        out.push(0x3F);
    }
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}
