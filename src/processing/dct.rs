//! Raw coefficient export.

use tracing::debug;

use crate::codec::{CodecEngine, EngineFault, MarkerRetention};
use crate::processing::ErrorManager;
use crate::utils::{OptimizeError, OptimizeResult, validate_input};

/// Decodes `input` and hands every block row of every component to
/// `on_row`, as little-endian `i16` coefficients in natural order.
///
/// The slice passed to `on_row` is only valid for the duration of the call.
pub fn dump_dct<F>(engine: &dyn CodecEngine, input: &[u8], mut on_row: F) -> OptimizeResult<()>
where
    F: FnMut(&[u8]),
{
    validate_input(input)?;
    let mut errors = ErrorManager::new();
    let mut decoder = errors.check(engine.open_decoder(input, MarkerRetention::NONE))?;
    errors.check(decoder.read_header())?;
    errors.check(decoder.read_coefficients())?;
    let coefficients = decoder
        .coefficients()
        .ok_or(OptimizeError::InvalidImage(EngineFault::NoImage))?;

    let mut row_bytes = Vec::new();
    let mut rows = 0usize;
    for component in &coefficients.components {
        for row in 0..component.height_in_blocks {
            row_bytes.clear();
            for block in component.row(row) {
                for coefficient in block {
                    row_bytes.extend_from_slice(&coefficient.to_le_bytes());
                }
            }
            on_row(&row_bytes);
            rows += 1;
        }
    }
    debug!("Dumped {} block rows", rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NativeEngine;
    use crate::test_support::{JpegBuilder, PROGRESSIVE_JPEG};

    #[test]
    fn test_rows_per_component() {
        let jpeg = JpegBuilder::new(33, 17)
            .components(&[(1, 2, 2, 0), (2, 1, 1, 1), (3, 1, 1, 1)])
            .build();
        let mut lengths = Vec::new();
        dump_dct(&NativeEngine, &jpeg, |row| lengths.push(row.len())).unwrap();
        // 3 luma rows of 5 blocks, then 2 rows of 3 blocks per chroma plane.
        assert_eq!(lengths, vec![640, 640, 640, 384, 384, 384, 384]);
    }

    #[test]
    fn test_values_are_little_endian() {
        let mut rows = Vec::new();
        dump_dct(&NativeEngine, PROGRESSIVE_JPEG, |row| rows.push(row.to_vec())).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][..6], &[3, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_errors_are_classified() {
        assert!(matches!(
            dump_dct(&NativeEngine, &[], |_| {}),
            Err(OptimizeError::Precondition(_))
        ));
        let err = dump_dct(&NativeEngine, b"not a jpeg", |_| {}).unwrap_err();
        assert!(err.is_invalid_image());
    }
}
