//! Entropy decoding of one scan into the coefficient store.

use tracing::{debug, warn};

use super::bits::BitReader;
use super::huffman::DecodeTable;
use super::reader::{ScanHeader, SegmentReader};
use super::tables::NATURAL_ORDER;
use crate::codec::{Block, Coefficients, ComponentInfo, EngineFault};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Sequential,
    DcFirst,
    DcRefine,
    AcFirst,
    AcRefine,
}

fn scan_mode(scan: &ScanHeader, progressive: bool) -> Result<Mode, EngineFault> {
    let (ss, se, ah, al) = (scan.ss, scan.se, scan.ah, scan.al);
    if !progressive {
        if ss != 0 || se != 63 || ah != 0 || al != 0 {
            warn!("Invalid SOS parameters for sequential JPEG");
        }
        return Ok(Mode::Sequential);
    }

    let is_dc = ss == 0;
    let mut bad = if is_dc {
        se != 0
    } else {
        ss > se || se > 63 || scan.components.len() != 1
    };
    if ah != 0 && al != ah - 1 {
        bad = true;
    }
    if al > 13 {
        bad = true;
    }
    if bad {
        return Err(EngineFault::BadProgression { ss, se, ah, al });
    }

    Ok(match (is_dc, ah == 0) {
        (true, true) => Mode::DcFirst,
        (true, false) => Mode::DcRefine,
        (false, true) => Mode::AcFirst,
        (false, false) => Mode::AcRefine,
    })
}

fn table<'t>(tables: &'t [Option<DecodeTable>; 4], slot: u8, class: u8) -> Result<&'t DecodeTable, EngineFault> {
    tables
        .get(slot as usize)
        .and_then(Option::as_ref)
        .ok_or(EngineFault::NoHuffmanTable((class << 4) | slot))
}

/// Huffman tables of one scan component.
struct ComponentTables<'t> {
    dc: Option<&'t DecodeTable>,
    ac: Option<&'t DecodeTable>,
}

struct EntropyDecoder<'i> {
    bits: BitReader<'i>,
    predictions: [i32; 4],
    eobrun: u32,
    corrupt_warned: bool,
}

impl<'i> EntropyDecoder<'i> {
    fn symbol(&mut self, table: &DecodeTable) -> u8 {
        match table.decode(&mut self.bits) {
            Some(symbol) => symbol,
            None => {
                self.warn_corrupt("bad Huffman code");
                0
            }
        }
    }

    fn warn_corrupt(&mut self, what: &str) {
        if !self.corrupt_warned {
            warn!("Corrupt JPEG data: {}", what);
            self.corrupt_warned = true;
        }
    }

    fn sequential(&mut self, block: &mut Block, ci: usize, dc: &DecodeTable, ac: &DecodeTable) {
        let s = self.symbol(dc) as u32;
        let diff = self.bits.receive_extend(s);
        self.predictions[ci] = self.predictions[ci].wrapping_add(diff);
        block[0] = self.predictions[ci] as i16;

        let mut k = 1;
        while k < 64 {
            let rs = self.symbol(ac);
            let (r, s) = ((rs >> 4) as usize, (rs & 15) as u32);
            if s != 0 {
                k += r;
                block[NATURAL_ORDER[k]] = self.bits.receive_extend(s) as i16;
            } else if r == 15 {
                k += 15;
            } else {
                break;
            }
            k += 1;
        }
    }

    fn dc_first(&mut self, block: &mut Block, ci: usize, dc: &DecodeTable, al: u8) {
        let s = self.symbol(dc) as u32;
        let diff = self.bits.receive_extend(s);
        self.predictions[ci] = self.predictions[ci].wrapping_add(diff);
        block[0] = (self.predictions[ci] << al) as i16;
    }

    fn dc_refine(&mut self, block: &mut Block, al: u8) {
        if self.bits.bit() {
            block[0] |= 1 << al;
        }
    }

    fn ac_first(&mut self, block: &mut Block, ac: &DecodeTable, ss: u8, se: u8, al: u8) {
        if self.eobrun > 0 {
            self.eobrun -= 1;
            return;
        }
        let mut k = ss as usize;
        while k <= se as usize {
            let rs = self.symbol(ac);
            let (r, s) = ((rs >> 4) as usize, (rs & 15) as u32);
            if s != 0 {
                k += r;
                let v = self.bits.receive_extend(s);
                block[NATURAL_ORDER[k]] = (v << al) as i16;
            } else if r == 15 {
                k += 15;
            } else {
                self.eobrun = 1 << r;
                if r > 0 {
                    self.eobrun += self.bits.bits(r as u32);
                }
                self.eobrun -= 1;
                break;
            }
            k += 1;
        }
    }

    fn ac_refine(&mut self, block: &mut Block, ac: &DecodeTable, ss: u8, se: u8, al: u8) {
        let p1: i16 = 1 << al;
        let m1: i16 = -1 << al;
        let se = se as usize;
        let mut k = ss as usize;

        if self.eobrun == 0 {
            while k <= se {
                let rs = self.symbol(ac);
                let mut r = (rs >> 4) as i32;
                let s = rs & 15;
                let mut value = 0i16;
                if s != 0 {
                    if s != 1 {
                        self.warn_corrupt("bad refinement magnitude");
                    }
                    value = if self.bits.bit() { p1 } else { m1 };
                } else if r != 15 {
                    self.eobrun = 1 << r;
                    if r > 0 {
                        self.eobrun += self.bits.bits(r as u32);
                    }
                    break;
                }

                while k <= se {
                    let coef = &mut block[NATURAL_ORDER[k]];
                    if *coef != 0 {
                        refine(&mut self.bits, coef, p1, m1);
                    } else {
                        r -= 1;
                        if r < 0 {
                            break;
                        }
                    }
                    k += 1;
                }
                if value != 0 {
                    block[NATURAL_ORDER[k]] = value;
                }
                k += 1;
            }
        }

        if self.eobrun > 0 {
            while k <= se {
                let coef = &mut block[NATURAL_ORDER[k]];
                if *coef != 0 {
                    refine(&mut self.bits, coef, p1, m1);
                }
                k += 1;
            }
            self.eobrun -= 1;
        }
    }
}

fn refine(bits: &mut BitReader<'_>, coef: &mut i16, p1: i16, m1: i16) {
    if bits.bit() && (*coef & p1) == 0 {
        *coef = coef.wrapping_add(if *coef >= 0 { p1 } else { m1 });
    }
}

/// Decodes the scan starting at the reader's position and returns the
/// offset just past its entropy-coded data.
///
/// Corrupt or truncated data is not fatal: decoding stops, a warning is
/// logged and the untouched coefficients keep their current values.
pub fn decode_scan(
    reader: &SegmentReader<'_>,
    layout: &[ComponentInfo],
    mcu_grid: (usize, usize),
    progressive: bool,
    scan: &ScanHeader,
    coefficients: &mut Coefficients,
) -> Result<usize, EngineFault> {
    let mode = scan_mode(scan, progressive)?;

    let mut tables = Vec::with_capacity(scan.components.len());
    for sc in &scan.components {
        let slot = layout[sc.index].quant_table;
        if reader.quant_tables[slot as usize].is_none() {
            return Err(EngineFault::NoQuantTable(slot));
        }
        let dc = match mode {
            Mode::Sequential | Mode::DcFirst => Some(table(&reader.dc_tables, sc.dc_table, 0)?),
            _ => None,
        };
        let ac = match mode {
            Mode::Sequential | Mode::AcFirst | Mode::AcRefine => {
                Some(table(&reader.ac_tables, sc.ac_table, 1)?)
            }
            _ => None,
        };
        tables.push(ComponentTables { dc, ac });
    }

    let mut decoder = EntropyDecoder {
        bits: BitReader::new(reader.data(), reader.position()),
        predictions: [0; 4],
        eobrun: 0,
        corrupt_warned: false,
    };

    // Units of work: whole MCUs when interleaved, single blocks otherwise.
    let interleaved = scan.components.len() > 1;
    let (units_per_row, unit_rows) = if interleaved {
        mcu_grid
    } else {
        let info = &layout[scan.components[0].index];
        (info.width_in_blocks, info.height_in_blocks)
    };
    let interval = reader.restart_interval as usize;

    debug!(
        "Decoding {:?} scan: {} component(s), Ss={} Se={} Ah={} Al={}",
        mode,
        scan.components.len(),
        scan.ss,
        scan.se,
        scan.ah,
        scan.al
    );

    let mut unit = 0usize;
    'units: for unit_row in 0..unit_rows {
        for unit_col in 0..units_per_row {
            if interval > 0 && unit > 0 && unit % interval == 0 {
                if !decoder.bits.restart() {
                    decoder.warn_corrupt("missing restart marker");
                    break 'units;
                }
                decoder.predictions = [0; 4];
                decoder.eobrun = 0;
            }
            unit += 1;

            for (ci, sc) in scan.components.iter().enumerate() {
                let info = &layout[sc.index];
                let (h, v) = if interleaved {
                    (info.h_samp as usize, info.v_samp as usize)
                } else {
                    (1, 1)
                };
                let store = &mut coefficients.components[sc.index];
                for by in 0..v {
                    for bx in 0..h {
                        let block = store.block_mut(unit_row * v + by, unit_col * h + bx);
                        let t = &tables[ci];
                        match (mode, t.dc, t.ac) {
                            (Mode::Sequential, Some(dc), Some(ac)) => {
                                decoder.sequential(block, ci, dc, ac)
                            }
                            (Mode::DcFirst, Some(dc), _) => decoder.dc_first(block, ci, dc, scan.al),
                            (Mode::DcRefine, _, _) => decoder.dc_refine(block, scan.al),
                            (Mode::AcFirst, _, Some(ac)) => {
                                decoder.ac_first(block, ac, scan.ss, scan.se, scan.al)
                            }
                            (Mode::AcRefine, _, Some(ac)) => {
                                decoder.ac_refine(block, ac, scan.ss, scan.se, scan.al)
                            }
                            _ => {}
                        }
                    }
                }
            }

            if decoder.bits.overrun() {
                decoder.warn_corrupt("premature end of data segment");
                break 'units;
            }
        }
    }

    Ok(decoder.bits.position())
}
