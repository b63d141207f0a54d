//! Marker segment parsing.

use tracing::{debug, trace, warn};

use super::huffman::{DecodeTable, HuffmanSpec};
use super::tables::{
    COM, DHT, DNL, DQT, DRI, EOI, NATURAL_ORDER, SOF0, SOF1, SOF2, SOI, SOS, TEM,
    is_rst, is_unsupported_sof,
};
use crate::codec::{APP0, APP14, EngineFault, JfifInfo, Marker, MarkerRetention, QuantTable};

/// A frame component as declared in SOF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameComponent {
    pub id: u8,
    pub h_samp: u8,
    pub v_samp: u8,
    pub quant_table: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub precision: u8,
    pub progressive: bool,
    pub components: Vec<FrameComponent>,
}

/// A component taking part in a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanComponent {
    /// Index into the frame's component list.
    pub index: usize,
    pub dc_table: u8,
    pub ac_table: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHeader {
    pub components: Vec<ScanComponent>,
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
}

/// What stopped [`SegmentReader::read_until_scan`].
#[derive(Debug)]
pub enum Stop {
    Scan(ScanHeader),
    EndOfImage,
    /// The input ran out before EOI.
    EndOfData,
}

/// Walks the marker segments of a JPEG stream and accumulates the table
/// state scans need.
pub struct SegmentReader<'i> {
    data: &'i [u8],
    pos: usize,
    retention: MarkerRetention,
    pub quant_tables: [Option<QuantTable>; 4],
    pub dc_tables: [Option<DecodeTable>; 4],
    pub ac_tables: [Option<DecodeTable>; 4],
    pub restart_interval: u16,
    pub frame: Option<Frame>,
    pub markers: Vec<Marker>,
    pub jfif: Option<JfifInfo>,
    pub adobe_transform: Option<u8>,
}

impl<'i> SegmentReader<'i> {
    pub fn new(data: &'i [u8], retention: MarkerRetention) -> Self {
        Self {
            data,
            pos: 0,
            retention,
            quant_tables: Default::default(),
            dc_tables: Default::default(),
            ac_tables: Default::default(),
            restart_interval: 0,
            frame: None,
            markers: Vec::new(),
            jfif: None,
            adobe_transform: None,
        }
    }

    pub fn data(&self) -> &'i [u8] {
        self.data
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    /// Consumes the SOI marker that must open the stream.
    pub fn read_soi(&mut self) -> Result<(), EngineFault> {
        let b0 = self.data.first().copied().unwrap_or(0);
        let b1 = self.data.get(1).copied().unwrap_or(0);
        if b0 != 0xFF || b1 != SOI {
            return Err(EngineFault::NoSoi(b0, b1));
        }
        self.pos = 2;
        Ok(())
    }

    /// Finds the next marker code, skipping garbage and fill bytes.
    fn next_marker(&mut self) -> Option<u8> {
        let start = self.pos;
        loop {
            while self.data.get(self.pos).is_some_and(|&b| b != 0xFF) {
                self.pos += 1;
            }
            while self.data.get(self.pos) == Some(&0xFF) {
                self.pos += 1;
            }
            let code = *self.data.get(self.pos)?;
            self.pos += 1;
            if code != 0 {
                let skipped = self.pos - start - 2;
                if skipped > 0 {
                    debug!("Skipped {} bytes before marker 0x{:02x}", skipped, code);
                }
                return Some(code);
            }
        }
    }

    /// Reads one length-prefixed segment body, or `None` if the input ends
    /// inside it.
    fn segment(&mut self) -> Result<Option<&'i [u8]>, EngineFault> {
        let Some(bytes) = self.data.get(self.pos..self.pos + 2) else {
            self.pos = self.data.len();
            return Ok(None);
        };
        let length = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        if length < 2 {
            return Err(EngineFault::BadLength);
        }
        let start = self.pos + 2;
        let end = self.pos + length;
        match self.data.get(start..end) {
            Some(body) => {
                self.pos = end;
                Ok(Some(body))
            }
            None => {
                self.pos = self.data.len();
                Ok(None)
            }
        }
    }

    /// Processes segments up to the next SOS, EOI or the end of the data.
    pub fn read_until_scan(&mut self) -> Result<Stop, EngineFault> {
        loop {
            let Some(code) = self.next_marker() else {
                return Ok(Stop::EndOfData);
            };
            match code {
                SOI => return Err(EngineFault::Structure("SOI marker inside image")),
                EOI => return Ok(Stop::EndOfImage),
                TEM => {}
                c if is_rst(c) => warn!("Ignoring stray restart marker 0x{:02x}", c),
                c if is_unsupported_sof(c) => return Err(EngineFault::UnsupportedProcess(c)),
                _ => {
                    let Some(body) = self.segment()? else {
                        warn!("Premature end of data in marker 0x{:02x}", code);
                        return Ok(Stop::EndOfData);
                    };
                    if let Some(stop) = self.process_segment(code, body)? {
                        return Ok(stop);
                    }
                }
            }
        }
    }

    fn process_segment(&mut self, code: u8, body: &'i [u8]) -> Result<Option<Stop>, EngineFault> {
        match code {
            SOF0 | SOF1 | SOF2 => self.read_sof(code, body)?,
            DHT => self.read_dht(body)?,
            DQT => self.read_dqt(body)?,
            DRI => self.read_dri(body)?,
            SOS => return self.read_sos(body).map(|scan| Some(Stop::Scan(scan))),
            COM | DNL => trace!("Skipping marker 0x{:02x} ({} bytes)", code, body.len()),
            c if (APP0..=APP0 + 15).contains(&c) => self.read_app(c, body),
            c => trace!("Skipping unknown marker 0x{:02x}", c),
        }
        Ok(None)
    }

    fn read_app(&mut self, code: u8, body: &'i [u8]) {
        if code == APP0 && body.len() >= 14 && body.starts_with(b"JFIF\0") {
            self.jfif = Some(JfifInfo {
                major_version: body[5],
                minor_version: body[6],
                density_unit: body[7],
                x_density: u16::from_be_bytes([body[8], body[9]]),
                y_density: u16::from_be_bytes([body[10], body[11]]),
            });
        } else if code == APP14 && body.len() >= 12 && body.starts_with(b"Adobe") {
            self.adobe_transform = Some(body[11]);
        }
        if self.retention.keeps(code) {
            self.markers.push(Marker::new(code, body));
        }
    }

    fn read_sof(&mut self, code: u8, body: &[u8]) -> Result<(), EngineFault> {
        if self.frame.is_some() {
            return Err(EngineFault::Structure("duplicate SOF marker"));
        }
        if body.len() < 6 {
            return Err(EngineFault::BadLength);
        }
        let precision = body[0];
        let height = u16::from_be_bytes([body[1], body[2]]) as u32;
        let width = u16::from_be_bytes([body[3], body[4]]) as u32;
        let count = body[5] as usize;
        if body.len() != 6 + 3 * count {
            return Err(EngineFault::BadLength);
        }
        if precision != 8 {
            return Err(EngineFault::BadPrecision(precision));
        }
        if width == 0 || height == 0 || count == 0 {
            return Err(EngineFault::EmptyImage);
        }
        if count > 4 {
            return Err(EngineFault::ComponentCount(count));
        }

        let mut components = Vec::with_capacity(count);
        for chunk in body[6..].chunks_exact(3) {
            let (h_samp, v_samp) = (chunk[1] >> 4, chunk[1] & 0x0F);
            if !(1..=4).contains(&h_samp) || !(1..=4).contains(&v_samp) {
                return Err(EngineFault::BadSampling);
            }
            if chunk[2] > 3 {
                return Err(EngineFault::BadQuantIndex(chunk[2]));
            }
            components.push(FrameComponent {
                id: chunk[0],
                h_samp,
                v_samp,
                quant_table: chunk[2],
            });
        }
        if count > 1 {
            let blocks: usize = components.iter().map(|c| (c.h_samp * c.v_samp) as usize).sum();
            if blocks > 10 {
                return Err(EngineFault::BadSampling);
            }
        }

        debug!(
            "SOF 0x{:02x}: {}x{}, {} components",
            code, width, height, count
        );
        self.frame = Some(Frame {
            width,
            height,
            precision,
            progressive: code == SOF2,
            components,
        });
        Ok(())
    }

    fn read_dht(&mut self, mut body: &[u8]) -> Result<(), EngineFault> {
        while !body.is_empty() {
            if body.len() < 17 {
                return Err(EngineFault::BadLength);
            }
            let index = body[0];
            let (class, slot) = (index >> 4, (index & 0x0F) as usize);
            if class > 1 || slot > 3 {
                return Err(EngineFault::BadHuffmanIndex(index));
            }
            let mut counts = [0u8; 16];
            counts.copy_from_slice(&body[1..17]);
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            if total > 256 || body.len() < 17 + total {
                return Err(EngineFault::BadHuffmanTable);
            }
            let spec = HuffmanSpec {
                counts,
                symbols: body[17..17 + total].to_vec(),
            };
            let table = DecodeTable::new(&spec, class == 0)?;
            if class == 0 {
                self.dc_tables[slot] = Some(table);
            } else {
                self.ac_tables[slot] = Some(table);
            }
            body = &body[17 + total..];
        }
        Ok(())
    }

    fn read_dqt(&mut self, mut body: &[u8]) -> Result<(), EngineFault> {
        while !body.is_empty() {
            let (precision, slot) = (body[0] >> 4, body[0] & 0x0F);
            if slot > 3 {
                return Err(EngineFault::BadQuantIndex(slot));
            }
            let wide = precision != 0;
            let size = if wide { 128 } else { 64 };
            let Some(raw) = body.get(1..1 + size) else {
                return Err(EngineFault::BadLength);
            };
            let mut values = [0u16; 64];
            for (k, &natural) in NATURAL_ORDER[..64].iter().enumerate() {
                values[natural] = if wide {
                    u16::from_be_bytes([raw[2 * k], raw[2 * k + 1]])
                } else {
                    raw[k] as u16
                };
            }
            self.quant_tables[slot as usize] = Some(QuantTable { values });
            body = &body[1 + size..];
        }
        Ok(())
    }

    fn read_dri(&mut self, body: &[u8]) -> Result<(), EngineFault> {
        let [hi, lo] = body else {
            return Err(EngineFault::BadLength);
        };
        self.restart_interval = u16::from_be_bytes([*hi, *lo]);
        Ok(())
    }

    fn read_sos(&mut self, body: &[u8]) -> Result<ScanHeader, EngineFault> {
        let Some(frame) = &self.frame else {
            return Err(EngineFault::Structure("SOS before SOF"));
        };
        let count = body.first().copied().unwrap_or(0) as usize;
        if count == 0 || count > 4 || body.len() != 4 + 2 * count {
            return Err(EngineFault::BadLength);
        }
        let mut components = Vec::with_capacity(count);
        for chunk in body[1..1 + 2 * count].chunks_exact(2) {
            let index = frame
                .components
                .iter()
                .position(|c| c.id == chunk[0])
                .ok_or(EngineFault::BadComponentId(chunk[0]))?;
            if components.iter().any(|c: &ScanComponent| c.index == index) {
                return Err(EngineFault::BadComponentId(chunk[0]));
            }
            components.push(ScanComponent {
                index,
                dc_table: chunk[1] >> 4,
                ac_table: chunk[1] & 0x0F,
            });
        }
        let tail = &body[1 + 2 * count..];
        Ok(ScanHeader {
            components,
            ss: tail[0],
            se: tail[1],
            ah: tail[2] >> 4,
            al: tail[2] & 0x0F,
        })
    }
}
