use tracing::{debug, warn};

use super::reader::{ScanHeader, SegmentReader, Stop};
use super::scan::decode_scan;
use crate::codec::{
    Coefficients, ColorSpace, ComponentCoefficients, ComponentInfo, CriticalParameters,
    DecodeSession, EngineFault, FrameHeader, JfifInfo, Marker, MarkerRetention, QuantTable,
    mcu_grid,
};

/// Decode session of [`NativeEngine`](super::NativeEngine).
pub struct NativeDecoder<'i> {
    reader: SegmentReader<'i>,
    header: Option<FrameHeader>,
    pending_scan: Option<ScanHeader>,
    coefficients: Option<Coefficients>,
    /// Table each component was quantized with, taken at its first scan.
    scan_quant_tables: Vec<Option<QuantTable>>,
}

impl<'i> NativeDecoder<'i> {
    pub fn new(input: &'i [u8], retention: MarkerRetention) -> Self {
        Self {
            reader: SegmentReader::new(input, retention),
            header: None,
            pending_scan: None,
            coefficients: None,
            scan_quant_tables: Vec::new(),
        }
    }

    fn layout(&self) -> Result<&[ComponentInfo], EngineFault> {
        self.header
            .as_ref()
            .map(|h| h.components.as_slice())
            .ok_or(EngineFault::BadState("header not read"))
    }
}

fn blocks(size: u32, samp: u8, max_samp: u8) -> usize {
    (size as usize * samp as usize).div_ceil(8 * max_samp as usize)
}

impl DecodeSession for NativeDecoder<'_> {
    fn read_header(&mut self) -> Result<(), EngineFault> {
        if self.header.is_some() {
            return Err(EngineFault::BadState("header already read"));
        }
        self.reader.read_soi()?;
        let scan = match self.reader.read_until_scan()? {
            Stop::Scan(scan) => scan,
            Stop::EndOfImage | Stop::EndOfData => return Err(EngineFault::NoImage),
        };
        let frame = self
            .reader
            .frame
            .as_ref()
            .ok_or(EngineFault::Structure("SOS before SOF"))?;

        let max_h = frame.components.iter().map(|c| c.h_samp).max().unwrap_or(1);
        let max_v = frame.components.iter().map(|c| c.v_samp).max().unwrap_or(1);
        let components = frame
            .components
            .iter()
            .map(|c| ComponentInfo {
                id: c.id,
                h_samp: c.h_samp,
                v_samp: c.v_samp,
                quant_table: c.quant_table,
                width_in_blocks: blocks(frame.width, c.h_samp, max_h),
                height_in_blocks: blocks(frame.height, c.v_samp, max_v),
            })
            .collect::<Vec<_>>();
        let ids: Vec<u8> = components.iter().map(|c| c.id).collect();
        let color_space =
            ColorSpace::detect(&ids, self.reader.jfif.is_some(), self.reader.adobe_transform);

        debug!(
            "Header read: {}x{} {:?}, progressive: {}, {} saved markers",
            frame.width,
            frame.height,
            color_space,
            frame.progressive,
            self.reader.markers.len()
        );

        self.header = Some(FrameHeader {
            width: frame.width,
            height: frame.height,
            precision: frame.precision,
            progressive: frame.progressive,
            components,
            color_space,
        });
        self.pending_scan = Some(scan);
        Ok(())
    }

    fn header(&self) -> Option<&FrameHeader> {
        self.header.as_ref()
    }

    fn read_coefficients(&mut self) -> Result<(), EngineFault> {
        if self.coefficients.is_some() {
            return Err(EngineFault::BadState("coefficients already read"));
        }
        let Some(header) = &self.header else {
            return Err(EngineFault::BadState("header not read"));
        };
        let grid = mcu_grid(header.width, header.height, &header.components);
        let progressive = header.progressive;
        let mut coefficients = Coefficients {
            components: header
                .components
                .iter()
                .map(|c| {
                    ComponentCoefficients::new(
                        c.width_in_blocks,
                        c.height_in_blocks,
                        grid.0 * c.h_samp as usize,
                        grid.1 * c.v_samp as usize,
                    )
                })
                .collect(),
        };

        let layout = self.layout()?.to_vec();
        self.scan_quant_tables = vec![None; layout.len()];
        let mut scans = 0usize;
        let mut next = self.pending_scan.take();
        while let Some(scan) = next {
            for sc in &scan.components {
                let captured = &mut self.scan_quant_tables[sc.index];
                if captured.is_none() {
                    *captured = self.reader.quant_tables[layout[sc.index].quant_table as usize].clone();
                }
            }
            let end = decode_scan(&self.reader, &layout, grid, progressive, &scan, &mut coefficients)?;
            scans += 1;
            self.reader.seek(end);
            next = match self.reader.read_until_scan()? {
                Stop::Scan(scan) => Some(scan),
                Stop::EndOfImage => None,
                Stop::EndOfData => {
                    warn!("Premature end of JPEG file");
                    None
                }
            };
        }

        debug!("Decoded {} scan(s)", scans);
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn coefficients(&self) -> Option<&Coefficients> {
        self.coefficients.as_ref()
    }

    fn markers(&self) -> &[Marker] {
        &self.reader.markers
    }

    fn critical_parameters(&self) -> Result<CriticalParameters, EngineFault> {
        let header = self
            .header
            .as_ref()
            .ok_or(EngineFault::BadState("header not read"))?;
        for component in &header.components {
            let slot = component.quant_table;
            if self.reader.quant_tables[slot as usize].is_none() {
                return Err(EngineFault::NoQuantTable(slot));
            }
        }
        // A slot redefined after a component's first scan cannot describe
        // both the old and the new coefficients.
        for (component, captured) in header.components.iter().zip(&self.scan_quant_tables) {
            let slot = component.quant_table;
            if captured.is_some() && *captured != self.reader.quant_tables[slot as usize] {
                return Err(EngineFault::MismatchedQuantTable(slot));
            }
        }
        // Only JFIF 1.x version numbers are carried over.
        let jfif = self.reader.jfif.map(|j| {
            if j.major_version == 1 {
                j
            } else {
                let defaults = JfifInfo::default();
                JfifInfo {
                    major_version: defaults.major_version,
                    minor_version: defaults.minor_version,
                    ..j
                }
            }
        });
        Ok(CriticalParameters {
            width: header.width,
            height: header.height,
            components: header.components.clone(),
            quant_tables: self.reader.quant_tables.clone(),
            color_space: header.color_space,
            jfif,
        })
    }
}
