//! Huffman table construction, decoding and optimal code generation.

use super::bits::BitReader;
use crate::codec::EngineFault;

const LOOKUP_BITS: u32 = 8;

/// A table as carried in a DHT segment: code counts per length and the
/// symbols in code order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanSpec {
    /// `counts[l - 1]` codes of length `l`.
    pub counts: [u8; 16],
    pub symbols: Vec<u8>,
}

impl HuffmanSpec {
    /// Canonical code assignment: `(code, length)` per symbol position.
    fn codes(&self) -> Result<Vec<(u32, u32)>, EngineFault> {
        let mut out = Vec::with_capacity(self.symbols.len());
        let mut code = 0u32;
        for (i, &n) in self.counts.iter().enumerate() {
            let len = i as u32 + 1;
            for _ in 0..n {
                out.push((code, len));
                code += 1;
            }
            // The all-ones code of each length is reserved.
            if code >= 1 << len {
                return Err(EngineFault::BadHuffmanTable);
            }
            code <<= 1;
        }
        Ok(out)
    }
}

/// Decoding tables: an 8-bit fast lookup backed by per-length code bounds.
#[derive(Debug, Clone)]
pub struct DecodeTable {
    /// `(length, symbol)` for codes of at most 8 bits, length 0 otherwise.
    lookup: Vec<(u8, u8)>,
    maxcode: [i32; 17],
    valoffset: [i32; 17],
    symbols: Vec<u8>,
}

impl DecodeTable {
    pub fn new(spec: &HuffmanSpec, is_dc: bool) -> Result<Self, EngineFault> {
        let total: usize = spec.counts.iter().map(|&c| c as usize).sum();
        if total > 256 || total != spec.symbols.len() {
            return Err(EngineFault::BadHuffmanTable);
        }
        if is_dc && spec.symbols.iter().any(|&s| s > 15) {
            return Err(EngineFault::BadHuffmanTable);
        }
        let codes = spec.codes()?;

        let mut maxcode = [-1i32; 17];
        let mut valoffset = [0i32; 17];
        let mut index = 0usize;
        for len in 1..=16usize {
            let n = spec.counts[len - 1] as usize;
            if n > 0 {
                let first = codes[index].0 as i32;
                valoffset[len] = index as i32 - first;
                maxcode[len] = codes[index + n - 1].0 as i32;
                index += n;
            }
        }
        let mut lookup = vec![(0u8, 0u8); 1 << LOOKUP_BITS];
        for (&(code, len), &symbol) in codes.iter().zip(&spec.symbols) {
            if len > LOOKUP_BITS {
                break;
            }
            let shift = LOOKUP_BITS - len;
            let start = (code << shift) as usize;
            for entry in &mut lookup[start..start + (1 << shift)] {
                *entry = (len as u8, symbol);
            }
        }

        Ok(Self {
            lookup,
            maxcode,
            valoffset,
            symbols: spec.symbols.clone(),
        })
    }

    /// Decodes one symbol. Returns `None` for a code not in the table.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Option<u8> {
        let (len, symbol) = self.lookup[reader.peek(LOOKUP_BITS) as usize];
        if len > 0 {
            reader.skip(len as u32);
            return Some(symbol);
        }
        let mut len = LOOKUP_BITS + 1;
        let mut code = reader.peek(len) as i32;
        while len <= 16 && code > self.maxcode[len as usize] {
            len += 1;
            code = reader.peek(len.min(16)) as i32;
        }
        if len > 16 {
            reader.skip(16);
            return None;
        }
        reader.skip(len);
        let index = (self.valoffset[len as usize] + code) as usize;
        self.symbols.get(index).copied()
    }
}

/// Per-symbol code words ready for emission.
#[derive(Debug, Clone)]
pub struct EncodeTable {
    codes: [(u32, u32); 256],
}

impl EncodeTable {
    pub fn new(spec: &HuffmanSpec) -> Result<Self, EngineFault> {
        let mut codes = [(0u32, 0u32); 256];
        for (&(code, len), &symbol) in spec.codes()?.iter().zip(&spec.symbols) {
            codes[symbol as usize] = (code, len);
        }
        Ok(Self { codes })
    }

    /// `(code, length)`; length 0 means the symbol has no code.
    pub fn code(&self, symbol: u8) -> (u32, u32) {
        self.codes[symbol as usize]
    }
}

/// Symbol frequencies gathered in a statistics pass.
#[derive(Debug, Clone)]
pub struct Frequencies([u64; 256]);

impl Default for Frequencies {
    fn default() -> Self {
        Self([0; 256])
    }
}

impl Frequencies {
    pub fn count(&mut self, symbol: u8) {
        self.0[symbol as usize] += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&f| f == 0)
    }

    /// Builds an optimal length-limited code for the counted symbols.
    ///
    /// One extra pseudo-symbol with frequency 1 is included during tree
    /// construction and removed afterwards, so no real symbol is assigned the
    /// all-ones code. Lengths above 16 are folded back into the tree by
    /// moving pairs of leaves up.
    pub fn optimal_table(&self) -> Result<HuffmanSpec, EngineFault> {
        let mut freq = [0u64; 257];
        freq[..256].copy_from_slice(&self.0);
        freq[256] = 1;
        let mut codesize = [0usize; 257];
        let mut others = [-1isize; 257];

        loop {
            let Some(c1) = smallest(&freq, None) else { break };
            let Some(c2) = smallest(&freq, Some(c1)) else { break };

            freq[c1] += freq[c2];
            freq[c2] = 0;

            let mut c = c1;
            codesize[c] += 1;
            while others[c] >= 0 {
                c = others[c] as usize;
                codesize[c] += 1;
            }
            others[c] = c2 as isize;

            let mut c = c2;
            codesize[c] += 1;
            while others[c] >= 0 {
                c = others[c] as usize;
                codesize[c] += 1;
            }
        }

        let mut bits = [0usize; 33];
        for &size in &codesize {
            if size > 32 {
                return Err(EngineFault::BadHuffmanTable);
            }
            if size > 0 {
                bits[size] += 1;
            }
        }

        for i in (17..=32).rev() {
            while bits[i] > 0 {
                let mut j = i - 2;
                while bits[j] == 0 {
                    j -= 1;
                }
                bits[i] -= 2;
                bits[i - 1] += 1;
                bits[j + 1] += 2;
                bits[j] -= 1;
            }
        }

        // Drop the pseudo-symbol from the longest length in use.
        let mut i = 16;
        while i > 0 && bits[i] == 0 {
            i -= 1;
        }
        if i > 0 {
            bits[i] -= 1;
        }

        let mut counts = [0u8; 16];
        for len in 1..=16 {
            counts[len - 1] = bits[len] as u8;
        }

        let mut symbols = Vec::new();
        for len in 1..=32 {
            for (symbol, &size) in codesize[..256].iter().enumerate() {
                if size == len {
                    symbols.push(symbol as u8);
                }
            }
        }

        Ok(HuffmanSpec { counts, symbols })
    }
}

/// Index of the smallest nonzero frequency, preferring the highest index on
/// ties, optionally skipping one index.
fn smallest(freq: &[u64; 257], skip: Option<usize>) -> Option<usize> {
    let mut best = None;
    let mut value = u64::MAX;
    for (i, &f) in freq.iter().enumerate() {
        if f != 0 && f <= value && Some(i) != skip {
            value = f;
            best = Some(i);
        }
    }
    best
}
