//! In-memory output sinks for the encoder.

use tracing::{trace, warn};

use crate::codec::Destination;

/// Growth step and rounding unit of growable buffers.
pub const GROWTH_QUANTUM: usize = 16 * 1024;

/// What backs a [`MemoryDestination`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Growable,
    Fixed,
}

#[derive(Debug)]
enum Storage<'a> {
    /// Length is the current capacity; bytes past `cursor` are scratch.
    Growable(Vec<u8>),
    Fixed(&'a mut [u8]),
}

/// A byte sink writing into memory.
///
/// A growable destination reallocates in [`GROWTH_QUANTUM`] steps whenever
/// the encoder runs out of room. A fixed one writes into a caller buffer and
/// refuses to grow, which the encoder reports as a suspension fault.
#[derive(Debug)]
pub struct MemoryDestination<'a> {
    storage: Storage<'a>,
    cursor: usize,
    written: Option<usize>,
}

impl MemoryDestination<'static> {
    /// Starts with `((hint / 16 KiB) + 1) * 16 KiB` bytes of room. If that
    /// allocation fails the buffer starts empty and grows on demand.
    pub fn growable(hint: usize) -> Self {
        let initial = (hint / GROWTH_QUANTUM)
            .saturating_add(1)
            .saturating_mul(GROWTH_QUANTUM);
        let mut buf = Vec::new();
        match buf.try_reserve_exact(initial) {
            Ok(()) => buf.resize(initial, 0),
            Err(e) => warn!("Initial output allocation of {} bytes failed: {}", initial, e),
        }
        Self {
            storage: Storage::Growable(buf),
            cursor: 0,
            written: None,
        }
    }
}

impl<'a> MemoryDestination<'a> {
    pub fn fixed(buf: &'a mut [u8]) -> Self {
        Self {
            storage: Storage::Fixed(buf),
            cursor: 0,
            written: None,
        }
    }

    pub fn kind(&self) -> DestinationKind {
        match self.storage {
            Storage::Growable(_) => DestinationKind::Growable,
            Storage::Fixed(_) => DestinationKind::Fixed,
        }
    }

    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Growable(buf) => buf.len(),
            Storage::Fixed(buf) => buf.len(),
        }
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.cursor
    }

    /// Final length, set once the encoder terminates the destination.
    pub fn written_len(&self) -> Option<usize> {
        self.written
    }

    /// The owned buffer of a growable destination.
    pub fn into_vec(self) -> Option<Vec<u8>> {
        match self.storage {
            Storage::Growable(mut buf) => {
                buf.truncate(self.cursor);
                Some(buf)
            }
            Storage::Fixed(_) => None,
        }
    }

    fn buffer(&mut self) -> &mut [u8] {
        match &mut self.storage {
            Storage::Growable(buf) => buf.as_mut_slice(),
            Storage::Fixed(buf) => &mut buf[..],
        }
    }
}

impl Destination for MemoryDestination<'_> {
    fn init(&mut self) {
        self.cursor = 0;
        self.written = None;
    }

    fn window(&mut self) -> &mut [u8] {
        let cursor = self.cursor;
        &mut self.buffer()[cursor..]
    }

    fn advance(&mut self, n: usize) {
        self.cursor = (self.cursor + n).min(self.capacity());
    }

    fn empty(&mut self) -> bool {
        match &mut self.storage {
            Storage::Fixed(_) => false,
            Storage::Growable(buf) => {
                let next = buf.len() + GROWTH_QUANTUM;
                if let Err(e) = buf.try_reserve(GROWTH_QUANTUM) {
                    warn!("Growing output buffer to {} bytes failed: {}", next, e);
                    return false;
                }
                buf.resize(next, 0);
                trace!("Output buffer grown to {} bytes", next);
                true
            }
        }
    }

    fn term(&mut self) {
        let written = self.cursor;
        self.written = Some(written);
        if let Storage::Growable(buf) = &mut self.storage {
            let slack = buf.len() - written;
            buf.truncate(written);
            if slack >= GROWTH_QUANTUM {
                buf.shrink_to_fit();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::emit;

    #[test]
    fn test_initial_capacity_rounds_up_hint() {
        assert_eq!(MemoryDestination::growable(0).capacity(), GROWTH_QUANTUM);
        assert_eq!(MemoryDestination::growable(16383).capacity(), GROWTH_QUANTUM);
        assert_eq!(MemoryDestination::growable(16384).capacity(), 2 * GROWTH_QUANTUM);
    }

    #[test]
    fn test_growable_extends_by_quantum() {
        let mut dest = MemoryDestination::growable(0);
        dest.init();
        let data = vec![7u8; GROWTH_QUANTUM + 10];
        emit(&mut dest, &data).unwrap();
        assert_eq!(dest.capacity(), 2 * GROWTH_QUANTUM);
        assert_eq!(dest.free(), GROWTH_QUANTUM - 10);
        dest.term();
        assert_eq!(dest.written_len(), Some(GROWTH_QUANTUM + 10));
        assert_eq!(dest.into_vec().unwrap(), data);
    }

    #[test]
    fn test_term_trims_large_slack() {
        let mut dest = MemoryDestination::growable(5 * GROWTH_QUANTUM);
        dest.init();
        emit(&mut dest, b"abc").unwrap();
        dest.term();
        assert_eq!(dest.written_len(), Some(3));
        let buf = dest.into_vec().unwrap();
        assert_eq!(buf, b"abc");
        assert!(buf.capacity() < GROWTH_QUANTUM);
    }

    #[test]
    fn test_fixed_refuses_to_grow() {
        let mut buf = [0u8; 4];
        let mut dest = MemoryDestination::fixed(&mut buf);
        dest.init();
        assert!(emit(&mut dest, b"abcdef").is_err());
        assert_eq!(dest.free(), 0);
        assert_eq!(dest.kind(), DestinationKind::Fixed);
        assert!(dest.into_vec().is_none());
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn test_fixed_records_written_length() {
        let mut buf = [0u8; 16];
        let mut dest = MemoryDestination::fixed(&mut buf);
        dest.init();
        emit(&mut dest, b"jpeg").unwrap();
        dest.term();
        assert_eq!(dest.written_len(), Some(4));
        assert_eq!(dest.capacity(), 16);
    }
}
