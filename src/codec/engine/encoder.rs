use tracing::{debug, trace};

use super::bits::BitWriter;
use super::huffman::{EncodeTable, Frequencies, HuffmanSpec};
use super::tables::{DHT, DQT, EOI, NATURAL_ORDER, SOF0, SOF1, SOI, SOS};
use crate::codec::{
    APP0, APP14, Block, Coefficients, ColorSpace, CriticalParameters, Destination,
    EncodeOptions, EncodeSession, EngineFault, MAX_MARKER_PAYLOAD, emit, mcu_grid,
};

/// Bytes of entropy-coded data buffered before handing them to the
/// destination.
const FLUSH_THRESHOLD: usize = 4096;

/// Largest DC difference magnitude category for 8-bit data.
const MAX_DC_BITS: u32 = 11;
const MAX_AC_BITS: u32 = 10;

/// Encode session of [`NativeEngine`](super::NativeEngine).
///
/// Writes one interleaved sequential scan with Huffman tables optimized for
/// the image. The file header goes out with the coefficients, markers follow
/// it, and everything else is produced by `finish`.
pub struct NativeEncoder<'s> {
    params: CriticalParameters,
    dest: &'s mut dyn Destination,
    coefficients: Option<&'s Coefficients>,
    finished: bool,
}

impl<'s> NativeEncoder<'s> {
    pub fn new(
        params: CriticalParameters,
        options: EncodeOptions,
        dest: &'s mut dyn Destination,
    ) -> Result<Self, EngineFault> {
        if options.progressive {
            return Err(EngineFault::UnsupportedOutput("progressive"));
        }
        if options.arithmetic {
            return Err(EngineFault::UnsupportedOutput("arithmetic coding"));
        }
        if !options.optimize_coding {
            return Err(EngineFault::UnsupportedOutput("fixed Huffman tables"));
        }
        validate(&params)?;
        dest.init();
        Ok(Self {
            params,
            dest,
            coefficients: None,
            finished: false,
        })
    }

    fn write_file_header(&mut self) -> Result<(), EngineFault> {
        let mut out = vec![0xFF, SOI];
        match self.params.color_space {
            ColorSpace::Grayscale | ColorSpace::YCbCr => {
                let jfif = self.params.jfif.unwrap_or_default();
                let mut body = b"JFIF\0".to_vec();
                body.extend_from_slice(&[jfif.major_version, jfif.minor_version, jfif.density_unit]);
                body.extend_from_slice(&jfif.x_density.to_be_bytes());
                body.extend_from_slice(&jfif.y_density.to_be_bytes());
                body.extend_from_slice(&[0, 0]);
                push_segment(&mut out, APP0, &body);
            }
            ColorSpace::Rgb | ColorSpace::Cmyk | ColorSpace::Ycck => {
                let transform = match self.params.color_space {
                    ColorSpace::Ycck => 2,
                    _ => 0,
                };
                let mut body = b"Adobe".to_vec();
                body.extend_from_slice(&[0, 100, 0, 0, 0, 0, transform]);
                push_segment(&mut out, APP14, &body);
            }
            ColorSpace::Unknown => {}
        }
        emit(&mut *self.dest, &out)
    }

    /// Huffman table slot used by each component.
    fn table_slots(&self) -> Vec<usize> {
        let n = self.params.components.len();
        match self.params.color_space {
            ColorSpace::YCbCr if n == 3 => vec![0, 1, 1],
            ColorSpace::Ycck if n == 4 => vec![0, 1, 1, 0],
            _ => vec![0; n],
        }
    }

    fn write_frame(&mut self, specs: &TableSpecs) -> Result<(), EngineFault> {
        let mut out = Vec::new();

        let mut sent = [false; 4];
        for component in &self.params.components {
            let slot = component.quant_table as usize;
            if sent[slot] {
                continue;
            }
            sent[slot] = true;
            let table = self.params.quant_tables[slot]
                .as_ref()
                .ok_or(EngineFault::NoQuantTable(slot as u8))?;
            let wide = table.needs_16_bit();
            let mut body = vec![((wide as u8) << 4) | slot as u8];
            for &natural in &NATURAL_ORDER[..64] {
                let v = table.values[natural];
                if wide {
                    body.extend_from_slice(&v.to_be_bytes());
                } else {
                    body.push(v as u8);
                }
            }
            push_segment(&mut out, DQT, &body);
        }

        let baseline = self.params.components.iter().all(|c| {
            self.params.quant_tables[c.quant_table as usize]
                .as_ref()
                .is_some_and(|t| !t.needs_16_bit())
        });
        let mut body = vec![8];
        body.extend_from_slice(&(self.params.height as u16).to_be_bytes());
        body.extend_from_slice(&(self.params.width as u16).to_be_bytes());
        body.push(self.params.components.len() as u8);
        for c in &self.params.components {
            body.extend_from_slice(&[c.id, (c.h_samp << 4) | c.v_samp, c.quant_table]);
        }
        push_segment(&mut out, if baseline { SOF0 } else { SOF1 }, &body);

        for (slot, spec) in specs.dc.iter().enumerate() {
            if let Some(spec) = spec {
                push_segment(&mut out, DHT, &dht_body(slot as u8, spec));
            }
        }
        for (slot, spec) in specs.ac.iter().enumerate() {
            if let Some(spec) = spec {
                push_segment(&mut out, DHT, &dht_body(0x10 | slot as u8, spec));
            }
        }

        let slots = self.table_slots();
        let mut body = vec![self.params.components.len() as u8];
        for (c, &slot) in self.params.components.iter().zip(&slots) {
            body.extend_from_slice(&[c.id, ((slot as u8) << 4) | slot as u8]);
        }
        body.extend_from_slice(&[0, 63, 0]);
        push_segment(&mut out, SOS, &body);

        trace!("Frame header: {} bytes, baseline: {}", out.len(), baseline);
        emit(&mut *self.dest, &out)
    }
}

fn validate(params: &CriticalParameters) -> Result<(), EngineFault> {
    let n = params.components.len();
    if n == 0 || params.width == 0 || params.height == 0 {
        return Err(EngineFault::EmptyImage);
    }
    if n > 4 {
        return Err(EngineFault::ComponentCount(n));
    }
    if params.width > u16::MAX as u32 || params.height > u16::MAX as u32 {
        return Err(EngineFault::Structure("image dimensions exceed 65535"));
    }
    for c in &params.components {
        if !(1..=4).contains(&c.h_samp) || !(1..=4).contains(&c.v_samp) {
            return Err(EngineFault::BadSampling);
        }
        let slot = c.quant_table;
        if params.quant_tables.get(slot as usize).and_then(Option::as_ref).is_none() {
            return Err(EngineFault::NoQuantTable(slot));
        }
    }
    Ok(())
}

fn push_segment(out: &mut Vec<u8>, code: u8, body: &[u8]) {
    out.extend_from_slice(&[0xFF, code]);
    out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(body);
}

fn dht_body(index: u8, spec: &HuffmanSpec) -> Vec<u8> {
    let mut body = vec![index];
    body.extend_from_slice(&spec.counts);
    body.extend_from_slice(&spec.symbols);
    body
}

fn magnitude_bits(v: i32) -> u32 {
    32 - v.unsigned_abs().leading_zeros()
}

/// Receives the symbol stream of a scan.
trait SymbolSink {
    fn dc(&mut self, slot: usize, symbol: u8);
    fn ac(&mut self, slot: usize, symbol: u8);
    fn extra(&mut self, value: u32, size: u32);

    fn end_mcu(&mut self) -> Result<(), EngineFault> {
        Ok(())
    }
}

#[derive(Default)]
struct Statistics {
    dc: [Frequencies; 2],
    ac: [Frequencies; 2],
}

impl Statistics {
    fn into_specs(self) -> Result<TableSpecs, EngineFault> {
        let mut specs = TableSpecs::default();
        for slot in 0..2 {
            if !self.dc[slot].is_empty() {
                specs.dc[slot] = Some(self.dc[slot].optimal_table()?);
            }
            if !self.ac[slot].is_empty() {
                specs.ac[slot] = Some(self.ac[slot].optimal_table()?);
            }
        }
        Ok(specs)
    }
}

impl SymbolSink for Statistics {
    fn dc(&mut self, slot: usize, symbol: u8) {
        self.dc[slot].count(symbol);
    }

    fn ac(&mut self, slot: usize, symbol: u8) {
        self.ac[slot].count(symbol);
    }

    fn extra(&mut self, _value: u32, _size: u32) {}
}

#[derive(Default)]
struct TableSpecs {
    dc: [Option<HuffmanSpec>; 2],
    ac: [Option<HuffmanSpec>; 2],
}

struct Emitter<'d> {
    writer: BitWriter,
    dc: [Option<EncodeTable>; 2],
    ac: [Option<EncodeTable>; 2],
    dest: &'d mut dyn Destination,
}

impl<'d> Emitter<'d> {
    fn new(specs: &TableSpecs, dest: &'d mut dyn Destination) -> Result<Self, EngineFault> {
        let build = |spec: &Option<HuffmanSpec>| spec.as_ref().map(EncodeTable::new).transpose();
        Ok(Self {
            writer: BitWriter::new(),
            dc: [build(&specs.dc[0])?, build(&specs.dc[1])?],
            ac: [build(&specs.ac[0])?, build(&specs.ac[1])?],
            dest,
        })
    }

    fn finish(mut self) -> Result<(), EngineFault> {
        self.writer.flush();
        let tail = self.writer.take();
        emit(&mut *self.dest, &tail)
    }
}

fn put_symbol(writer: &mut BitWriter, table: &Option<EncodeTable>, symbol: u8) {
    if let Some(table) = table {
        let (code, size) = table.code(symbol);
        writer.put(code, size);
    }
}

impl SymbolSink for Emitter<'_> {
    fn dc(&mut self, slot: usize, symbol: u8) {
        put_symbol(&mut self.writer, &self.dc[slot], symbol);
    }

    fn ac(&mut self, slot: usize, symbol: u8) {
        put_symbol(&mut self.writer, &self.ac[slot], symbol);
    }

    fn extra(&mut self, value: u32, size: u32) {
        self.writer.put(value, size);
    }

    fn end_mcu(&mut self) -> Result<(), EngineFault> {
        if self.writer.len() >= FLUSH_THRESHOLD {
            let bytes = self.writer.take();
            emit(&mut *self.dest, &bytes)?;
        }
        Ok(())
    }
}

fn encode_block(
    block: &Block,
    last_dc: &mut i32,
    slot: usize,
    sink: &mut impl SymbolSink,
) -> Result<(), EngineFault> {
    let dc = block[0] as i32;
    let diff = dc - *last_dc;
    *last_dc = dc;
    let nbits = magnitude_bits(diff);
    if nbits > MAX_DC_BITS {
        return Err(EngineFault::BadCoefficient);
    }
    sink.dc(slot, nbits as u8);
    sink.extra(extra_bits(diff), nbits);

    let mut run = 0u32;
    for &natural in &NATURAL_ORDER[1..64] {
        let v = block[natural] as i32;
        if v == 0 {
            run += 1;
            continue;
        }
        while run > 15 {
            sink.ac(slot, 0xF0);
            run -= 16;
        }
        let nbits = magnitude_bits(v);
        if nbits > MAX_AC_BITS {
            return Err(EngineFault::BadCoefficient);
        }
        sink.ac(slot, ((run << 4) | nbits) as u8);
        sink.extra(extra_bits(v), nbits);
        run = 0;
    }
    if run > 0 {
        sink.ac(slot, 0x00);
    }
    Ok(())
}

/// Low bits coded after a magnitude category: the value itself when
/// positive, its one's complement when negative.
fn extra_bits(v: i32) -> u32 {
    if v < 0 { (v - 1) as u32 } else { v as u32 }
}

/// Feeds every block of the scan to `sink` in coding order.
///
/// Multi-component images are coded as one interleaved scan whose partial
/// MCUs at the right and bottom edges are padded with dummy blocks: zero AC
/// coefficients and the DC value of the block coded just before them.
fn walk_blocks(
    params: &CriticalParameters,
    coefficients: &Coefficients,
    slots: &[usize],
    sink: &mut impl SymbolSink,
) -> Result<(), EngineFault> {
    let mut last_dc = [0i32; 4];

    if coefficients.components.len() == 1 {
        let store = &coefficients.components[0];
        for row in 0..store.height_in_blocks {
            for block in store.row(row) {
                encode_block(block, &mut last_dc[0], slots[0], sink)?;
                sink.end_mcu()?;
            }
        }
        return Ok(());
    }

    let (mcus_per_row, mcu_rows) = mcu_grid(params.width, params.height, &params.components);
    let mut dummy: Block = [0; 64];
    for mcu_row in 0..mcu_rows {
        for mcu_col in 0..mcus_per_row {
            for (ci, info) in params.components.iter().enumerate() {
                let store = &coefficients.components[ci];
                let (h, v) = (info.h_samp as usize, info.v_samp as usize);
                let mut previous_dc = 0i16;
                for by in 0..v {
                    for bx in 0..h {
                        let row = mcu_row * v + by;
                        let col = mcu_col * h + bx;
                        let block = if row < store.height_in_blocks && col < store.width_in_blocks {
                            store.block(row, col)
                        } else {
                            dummy[0] = previous_dc;
                            &dummy
                        };
                        previous_dc = block[0];
                        encode_block(block, &mut last_dc[ci], slots[ci], sink)?;
                    }
                }
            }
            sink.end_mcu()?;
        }
    }
    Ok(())
}

impl<'s> EncodeSession<'s> for NativeEncoder<'s> {
    fn write_coefficients(&mut self, coefficients: &'s Coefficients) -> Result<(), EngineFault> {
        if self.coefficients.is_some() {
            return Err(EngineFault::BadState("coefficients already written"));
        }
        let matches = coefficients.components.len() == self.params.components.len()
            && self
                .params
                .components
                .iter()
                .zip(&coefficients.components)
                .all(|(info, store)| {
                    store.width_in_blocks == info.width_in_blocks
                        && store.height_in_blocks == info.height_in_blocks
                });
        if !matches {
            return Err(EngineFault::BadState("coefficient arrays do not match the frame"));
        }
        self.write_file_header()?;
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn write_marker(&mut self, code: u8, payload: &[u8]) -> Result<(), EngineFault> {
        if self.coefficients.is_none() || self.finished {
            return Err(EngineFault::BadState("marker outside of the header phase"));
        }
        if payload.len() > MAX_MARKER_PAYLOAD {
            return Err(EngineFault::BadLength);
        }
        let mut out = Vec::with_capacity(payload.len() + 4);
        push_segment(&mut out, code, payload);
        emit(&mut *self.dest, &out)
    }

    fn finish(&mut self) -> Result<(), EngineFault> {
        if self.finished {
            return Err(EngineFault::BadState("already finished"));
        }
        let coefficients = self
            .coefficients
            .ok_or(EngineFault::BadState("coefficients not written"))?;
        let slots = self.table_slots();

        let mut statistics = Statistics::default();
        walk_blocks(&self.params, coefficients, &slots, &mut statistics)?;
        let specs = statistics.into_specs()?;

        self.write_frame(&specs)?;

        let mut emitter = Emitter::new(&specs, &mut *self.dest)?;
        walk_blocks(&self.params, coefficients, &slots, &mut emitter)?;
        emitter.finish()?;

        emit(&mut *self.dest, &[0xFF, EOI])?;
        self.dest.term();
        self.finished = true;
        debug!("Encoder finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::engine::NativeDecoder;
    use crate::codec::{DecodeSession, MarkerRetention};
    use crate::processing::MemoryDestination;
    use crate::test_support::JpegBuilder;

    fn decode(jpeg: &[u8]) -> NativeDecoder<'_> {
        let mut decoder = NativeDecoder::new(jpeg, MarkerRetention::NONE.keep(0xE1));
        decoder.read_header().unwrap();
        decoder.read_coefficients().unwrap();
        decoder
    }

    fn reencode(decoder: &NativeDecoder<'_>) -> Vec<u8> {
        let mut dest = MemoryDestination::growable(0);
        {
            let params = decoder.critical_parameters().unwrap();
            let mut encoder =
                NativeEncoder::new(params, EncodeOptions::OPTIMIZED_SEQUENTIAL, &mut dest).unwrap();
            encoder.write_coefficients(decoder.coefficients().unwrap()).unwrap();
            for marker in decoder.markers() {
                encoder.write_marker(marker.code, &marker.payload).unwrap();
            }
            encoder.finish().unwrap();
        }
        dest.into_vec().unwrap()
    }

    #[test]
    fn test_magnitude_categories() {
        assert_eq!(magnitude_bits(0), 0);
        assert_eq!(magnitude_bits(1), 1);
        assert_eq!(magnitude_bits(-1), 1);
        assert_eq!(magnitude_bits(-1023), 10);
        assert_eq!(magnitude_bits(1024), 11);
        assert_eq!(extra_bits(-1) & 1, 0);
        assert_eq!(extra_bits(-2) & 0b11, 0b01);
    }

    #[test]
    fn test_reencoding_preserves_coefficients() {
        for (w, h, comps) in [
            (16, 16, vec![(1, 1, 1, 0)]),
            (35, 21, vec![(1, 2, 2, 0), (2, 1, 1, 1), (3, 1, 1, 1)]),
            (40, 9, vec![(1, 2, 1, 0), (2, 1, 1, 1), (3, 1, 1, 1)]),
            (17, 17, vec![(1, 1, 1, 0), (2, 1, 1, 0), (3, 1, 1, 0), (4, 1, 1, 0)]),
        ] {
            let jpeg = JpegBuilder::new(w, h).components(&comps).build();
            let original = decode(&jpeg);
            let output = reencode(&original);
            let again = decode(&output);
            assert!(
                original
                    .coefficients()
                    .unwrap()
                    .same_blocks(again.coefficients().unwrap()),
                "{}x{} with {} components",
                w,
                h,
                comps.len()
            );
        }
    }

    #[test]
    fn test_markers_follow_file_header() {
        let jpeg = JpegBuilder::new(8, 8).marker(0xE1, b"Exif\0\0data").build();
        let output = reencode(&decode(&jpeg));
        assert_eq!(&output[..4], &[0xFF, SOI, 0xFF, APP0]);
        let app0_len = u16::from_be_bytes([output[4], output[5]]) as usize;
        let next = 4 + app0_len;
        assert_eq!(&output[next..next + 2], &[0xFF, 0xE1]);
        assert_eq!(&output[output.len() - 2..], &[0xFF, EOI]);
    }

    #[test]
    fn test_progressive_input_becomes_sequential() {
        let original = decode(crate::test_support::PROGRESSIVE_JPEG);
        let output = reencode(&original);
        let again = decode(&output);
        assert!(!again.header().unwrap().progressive);
        assert_eq!(again.coefficients().unwrap().components[0].block(0, 0)[..3], [3, 1, 0]);
    }

    #[test]
    fn test_sixteen_bit_tables_use_extended_sof() {
        let jpeg = JpegBuilder::new(8, 8).quant_scale(300).build();
        let output = reencode(&decode(&jpeg));
        assert!(output.windows(2).any(|w| w == [0xFF, SOF1]));
        assert!(!output.windows(2).any(|w| w == [0xFF, SOF0]));
    }

    #[test]
    fn test_rejects_oversized_marker_and_bad_order() {
        let jpeg = JpegBuilder::new(8, 8).build();
        let decoder = decode(&jpeg);
        let mut dest = MemoryDestination::growable(0);
        let params = decoder.critical_parameters().unwrap();
        let mut encoder =
            NativeEncoder::new(params, EncodeOptions::OPTIMIZED_SEQUENTIAL, &mut dest).unwrap();
        assert!(matches!(
            encoder.write_marker(0xE1, b"early"),
            Err(EngineFault::BadState(_))
        ));
        encoder.write_coefficients(decoder.coefficients().unwrap()).unwrap();
        let huge = vec![0u8; MAX_MARKER_PAYLOAD + 1];
        assert_eq!(encoder.write_marker(0xE1, &huge), Err(EngineFault::BadLength));
    }

    #[test]
    fn test_rejects_progressive_output() {
        let jpeg = JpegBuilder::new(8, 8).build();
        let decoder = decode(&jpeg);
        let mut dest = MemoryDestination::growable(0);
        let options = EncodeOptions {
            progressive: true,
            ..EncodeOptions::OPTIMIZED_SEQUENTIAL
        };
        let result = NativeEncoder::new(decoder.critical_parameters().unwrap(), options, &mut dest);
        assert!(matches!(result, Err(EngineFault::UnsupportedOutput(_))));
    }
}
