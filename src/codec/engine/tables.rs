//! Marker codes and coefficient ordering.

pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOS: u8 = 0xDA;
pub const DQT: u8 = 0xDB;
pub const DNL: u8 = 0xDC;
pub const DRI: u8 = 0xDD;
pub const DHT: u8 = 0xC4;
pub const SOF0: u8 = 0xC0;
pub const SOF1: u8 = 0xC1;
pub const SOF2: u8 = 0xC2;
pub const RST0: u8 = 0xD0;
pub const RST7: u8 = 0xD7;
pub const TEM: u8 = 0x01;
pub const COM: u8 = 0xFE;

/// Natural (row-major) index of each zigzag position.
///
/// The extra entries absorb run lengths that overshoot the block in corrupt
/// data, so lookups with `k` up to 79 stay in bounds and land on the last
/// coefficient.
pub const NATURAL_ORDER: [usize; 80] = [
    0, 1, 8, 16, 9, 2, 3, 10, //
    17, 24, 32, 25, 18, 11, 4, 5, //
    12, 19, 26, 33, 40, 48, 41, 34, //
    27, 20, 13, 6, 7, 14, 21, 28, //
    35, 42, 49, 56, 57, 50, 43, 36, //
    29, 22, 15, 23, 30, 37, 44, 51, //
    58, 59, 52, 45, 38, 31, 39, 46, //
    53, 60, 61, 54, 47, 55, 62, 63, //
    63, 63, 63, 63, 63, 63, 63, 63, //
    63, 63, 63, 63, 63, 63, 63, 63, //
];

/// SOF markers this engine cannot decode (lossless, hierarchical, arithmetic).
pub fn is_unsupported_sof(code: u8) -> bool {
    matches!(code, 0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF)
}

pub fn is_rst(code: u8) -> bool {
    (RST0..=RST7).contains(&code)
}
