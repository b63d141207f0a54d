pub mod error;
pub mod validation;
pub mod fs;

pub use error::{OptimizeError, OptimizeResult, PreconditionError};
pub use validation::{validate_flags, validate_input, validate_target};
pub use fs::{get_file_size, read_input, write_output};
