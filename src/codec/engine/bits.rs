//! Bit-level access to entropy-coded segments.

/// Reads bits MSB-first from an entropy-coded segment.
///
/// Stuffed `FF 00` pairs are unescaped. When a marker (or the end of the
/// input) is reached the reader stops in front of it and supplies zero bits
/// from then on; [`overrun`](BitReader::overrun) reports whether any of those
/// padding bits were actually consumed.
pub struct BitReader<'i> {
    data: &'i [u8],
    pos: usize,
    acc: u64,
    count: u32,
    padding: u32,
    at_marker: bool,
    overrun: bool,
}

impl<'i> BitReader<'i> {
    pub fn new(data: &'i [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            acc: 0,
            count: 0,
            padding: 0,
            at_marker: false,
            overrun: false,
        }
    }

    /// Byte offset of the first byte not yet pulled into the accumulator.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn overrun(&self) -> bool {
        self.overrun
    }

    fn next_byte(&mut self) -> Option<u8> {
        if self.at_marker {
            return None;
        }
        let Some(&byte) = self.data.get(self.pos) else {
            self.at_marker = true;
            return None;
        };
        if byte != 0xFF {
            self.pos += 1;
            return Some(byte);
        }
        let mut next = self.pos + 1;
        while self.data.get(next) == Some(&0xFF) {
            next += 1;
        }
        if self.data.get(next) == Some(&0) {
            self.pos = next + 1;
            Some(0xFF)
        } else {
            self.at_marker = true;
            None
        }
    }

    fn fill(&mut self) {
        while self.count <= 56 {
            let byte = match self.next_byte() {
                Some(b) => b,
                None => {
                    self.padding += 8;
                    0
                }
            };
            self.acc = (self.acc << 8) | byte as u64;
            self.count += 8;
        }
    }

    fn consume(&mut self, n: u32) {
        self.count -= n;
        if self.padding > self.count {
            self.overrun = true;
            self.padding = self.count;
        }
    }

    /// Next `n` bits (1..=16) without consuming them.
    pub fn peek(&mut self, n: u32) -> u32 {
        if self.count < n {
            self.fill();
        }
        ((self.acc >> (self.count - n)) & ((1u64 << n) - 1)) as u32
    }

    pub fn skip(&mut self, n: u32) {
        if self.count < n {
            self.fill();
        }
        self.consume(n);
    }

    pub fn bits(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        let v = self.peek(n);
        self.consume(n);
        v
    }

    pub fn bit(&mut self) -> bool {
        self.bits(1) != 0
    }

    /// Reads `s` magnitude bits and sign-extends them (JPEG `EXTEND`).
    pub fn receive_extend(&mut self, s: u32) -> i32 {
        if s == 0 {
            return 0;
        }
        let v = self.bits(s) as i32;
        if v < 1 << (s - 1) { v - (1 << s) + 1 } else { v }
    }

    /// Drops buffered bits and steps over the RSTn marker that ends a
    /// restart interval, if one is found before any other marker.
    ///
    /// Buffered bits never extend past a marker, so everything still in the
    /// accumulator is padding of the finished interval.
    ///
    /// Returns `false` when no restart marker could be located.
    pub fn restart(&mut self) -> bool {
        self.acc = 0;
        self.count = 0;
        self.padding = 0;
        self.at_marker = false;
        self.overrun = false;

        let mut pos = self.pos;
        while pos + 1 < self.data.len() {
            if self.data[pos] == 0xFF {
                let code = self.data[pos + 1];
                if super::tables::is_rst(code) {
                    self.pos = pos + 2;
                    return true;
                }
                if code != 0 && code != 0xFF {
                    self.pos = pos;
                    return false;
                }
            }
            pos += 1;
        }
        self.pos = self.data.len();
        false
    }
}

/// Accumulates bits MSB-first into bytes with `FF 00` stuffing.
#[derive(Default)]
pub struct BitWriter {
    acc: u64,
    count: u32,
    out: Vec<u8>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, code: u32, size: u32) {
        if size == 0 {
            return;
        }
        self.acc = (self.acc << size) | (code as u64 & ((1u64 << size) - 1));
        self.count += size;
        while self.count >= 8 {
            let byte = (self.acc >> (self.count - 8)) as u8;
            self.out.push(byte);
            if byte == 0xFF {
                self.out.push(0);
            }
            self.count -= 8;
        }
    }

    /// Pads the last partial byte with one-bits.
    pub fn flush(&mut self) {
        if self.count > 0 {
            let pad = 8 - self.count;
            self.put((1 << pad) - 1, pad);
        }
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    /// Takes the completed bytes, keeping any partial byte buffered.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_unstuffs_ff00() {
        let data = [0xFF, 0x00, 0x80, 0xFF, 0xD9];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(reader.bits(8), 0xFF);
        assert!(reader.bit());
        assert_eq!(reader.bits(7), 0);
        assert!(!reader.overrun());
        assert_eq!(reader.bits(4), 0);
        assert!(reader.overrun());
        assert_eq!(reader.position(), 3);
    }

    #[test]
    fn test_receive_extend() {
        // 0b01 in two bits is -2, 0b11 is 3
        let data = [0b0111_0000];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(reader.receive_extend(2), -2);
        assert_eq!(reader.receive_extend(2), 3);
    }

    #[test]
    fn test_restart_skips_marker() {
        let data = [0xAB, 0xCD, 0xFF, 0xD0, 0x5A];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(reader.bits(4), 0xA);
        assert!(reader.restart());
        assert_eq!(reader.bits(8), 0x5A);
    }

    #[test]
    fn test_restart_stops_at_other_marker() {
        let data = [0xAB, 0xFF, 0xD9];
        let mut reader = BitReader::new(&data, 0);
        reader.bits(3);
        assert!(!reader.restart());
        assert_eq!(reader.position(), 1);
    }

    #[test]
    fn test_writer_stuffs_and_pads() {
        let mut writer = BitWriter::new();
        writer.put(0xFF, 8);
        writer.put(0b101, 3);
        writer.flush();
        assert_eq!(writer.take(), vec![0xFF, 0x00, 0b1011_1111]);
    }
}
