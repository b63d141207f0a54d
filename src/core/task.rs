//! Optimization task definition and validation.

use bytes::Bytes;

use crate::core::{OptimizeOptions, OutputTarget, StripFlags};
use crate::utils::{PreconditionError, validate_flags, validate_input, validate_target};

/// Represents a single optimization task.
///
/// Owns its input and, if given, the output buffer, so nothing else can
/// touch either while the task is in flight.
#[derive(Debug, Clone)]
pub struct OptimizeTask {
    /// The JPEG stream to recompress
    pub input: Bytes,
    /// Metadata stripping options
    pub flags: StripFlags,
    /// Where the result goes; a new buffer when `None`
    pub target: Option<OutputTarget>,
}

impl OptimizeTask {
    pub fn new(input: impl Into<Bytes>, flags: StripFlags, target: Option<OutputTarget>) -> Self {
        Self {
            input: input.into(),
            flags,
            target,
        }
    }

    pub fn from_options(input: impl Into<Bytes>, options: OptimizeOptions) -> Self {
        let (flags, target) = options.into_parts();
        Self::new(input, flags, target)
    }

    /// Checks every precondition that does not need the engine.
    pub fn validate(&self, can_strip_thumbnail: bool) -> Result<(), PreconditionError> {
        validate_input(&self.input)?;
        validate_target(&self.input, self.target.as_ref())?;
        validate_flags(self.flags, can_strip_thumbnail)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preconditions_in_order() {
        let task = OptimizeTask::new(Vec::<u8>::new(), StripFlags::STRIP_THUMBNAIL, Some(OutputTarget::Limit(0)));
        assert_eq!(task.validate(false).unwrap_err().message(), "Expected a filled buffer");

        let task = OptimizeTask::new(vec![0xFFu8], StripFlags::STRIP_THUMBNAIL, Some(OutputTarget::Limit(0)));
        assert_eq!(task.validate(false).unwrap_err().message(), "Expected a non-zero output buffer");

        let task = OptimizeTask::new(vec![0xFFu8], StripFlags::STRIP_THUMBNAIL, None);
        assert!(matches!(task.validate(false), Err(PreconditionError::RangeError(_))));
        assert!(task.validate(true).is_ok());
    }

    #[test]
    fn test_from_options() {
        let options = OptimizeOptions {
            strip_icc: true,
            out: Some(OutputTarget::Limit(10)),
            ..Default::default()
        };
        let task = OptimizeTask::from_options(Bytes::from_static(b"\xFF\xD8"), options);
        assert_eq!(task.flags, StripFlags::STRIP_ICC);
        assert_eq!(task.target, Some(OutputTarget::Limit(10)));
    }
}
