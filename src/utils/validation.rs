use crate::core::{OutputTarget, StripFlags};
use crate::utils::PreconditionError;

/// Validates the input stream.
pub fn validate_input(input: &[u8]) -> Result<(), PreconditionError> {
    if input.is_empty() {
        return Err(PreconditionError::type_error("Expected a filled buffer"));
    }
    Ok(())
}

/// Validates an optional output target against the input it is produced from.
///
/// A `Buffer` target is an owned `Vec<u8>` and the input of a task is an
/// immutable `Bytes`, so a target built through the public types never
/// aliases its input. The overlap check still guards callers that validate
/// borrowed slices directly through [`overlaps`].
pub fn validate_target(input: &[u8], target: Option<&OutputTarget>) -> Result<(), PreconditionError> {
    match target {
        None => Ok(()),
        Some(OutputTarget::Limit(0)) => {
            Err(PreconditionError::type_error("Expected a non-zero output buffer"))
        }
        Some(OutputTarget::Limit(_)) => Ok(()),
        Some(OutputTarget::Buffer(buf)) => {
            if buf.is_empty() {
                return Err(PreconditionError::type_error("Expected a non-zero output buffer"));
            }
            if overlaps(input, buf) {
                return Err(PreconditionError::range_error(
                    "Input and output buffer cannot be the same",
                ));
            }
            Ok(())
        }
    }
}

/// Validates the strip flags against the available collaborators.
pub fn validate_flags(flags: StripFlags, can_strip_thumbnail: bool) -> Result<(), PreconditionError> {
    if flags.contains(StripFlags::STRIP_THUMBNAIL) && !can_strip_thumbnail {
        return Err(PreconditionError::range_error(
            "Thumbnail stripping is not available: no EXIF codec configured",
        ));
    }
    Ok(())
}

/// Whether two byte regions share any memory. Empty regions never overlap.
pub fn overlaps(a: &[u8], b: &[u8]) -> bool {
    let a = a.as_ptr_range();
    let b = b.as_ptr_range();
    !a.is_empty() && !b.is_empty() && a.start < b.end && b.start < a.end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_a_type_error() {
        let err = validate_input(&[]).unwrap_err();
        assert_eq!(err, PreconditionError::type_error("Expected a filled buffer"));
        assert!(validate_input(&[0xFF]).is_ok());
    }

    #[test]
    fn test_zero_length_targets() {
        let input = [0xFF, 0xD8];
        for target in [OutputTarget::Limit(0), OutputTarget::Buffer(Vec::new())] {
            let err = validate_target(&input, Some(&target)).unwrap_err();
            assert_eq!(err.message(), "Expected a non-zero output buffer");
        }
        assert!(validate_target(&input, Some(&OutputTarget::Limit(1))).is_ok());
        assert!(validate_target(&input, None).is_ok());
    }

    #[test]
    fn test_overlapping_regions() {
        let buf = [0u8; 16];
        assert!(overlaps(&buf, &buf));
        assert!(overlaps(&buf[..8], &buf[4..]));
        assert!(!overlaps(&buf[..8], &buf[8..]));
        assert!(!overlaps(&buf[..0], &buf));
        let other = [0u8; 16];
        assert!(!overlaps(&buf, &other));
    }

    #[test]
    fn test_target_aliasing_its_input() {
        let target = OutputTarget::Buffer(vec![0xFF, 0xD8, 0xFF, 0xD9]);
        let OutputTarget::Buffer(buf) = &target else { unreachable!() };
        let err = validate_target(&buf[1..], Some(&target)).unwrap_err();
        assert_eq!(err, PreconditionError::range_error("Input and output buffer cannot be the same"));

        let copy = buf.clone();
        assert!(validate_target(&copy, Some(&target)).is_ok());
    }

    #[test]
    fn test_thumbnail_flag_needs_codec() {
        assert!(validate_flags(StripFlags::STRIP_THUMBNAIL, true).is_ok());
        assert!(validate_flags(StripFlags::STRIP_METADATA | StripFlags::STRIP_ICC, false).is_ok());
        assert!(matches!(
            validate_flags(StripFlags::from_bits(7), false),
            Err(PreconditionError::RangeError(_))
        ));
    }
}
