//! Classification of engine faults.
//!
//! Every engine call in the pipeline goes through [`ErrorManager::check`], so
//! the first fault short-circuits the remaining steps with `?` and carries
//! its classified form out of the pipeline.

use tracing::debug;

use crate::codec::EngineFault;
use crate::processing::DestinationKind;
use crate::utils::OptimizeError;

#[derive(Debug, Default)]
pub struct ErrorManager {
    destination: Option<DestinationKind>,
    failure: Option<String>,
}

impl ErrorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tells the manager what kind of sink a suspension fault refers to.
    pub fn bind_destination(&mut self, kind: DestinationKind) {
        self.destination = Some(kind);
    }

    /// Message of the first fault seen, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn check<T>(&mut self, result: Result<T, EngineFault>) -> Result<T, OptimizeError> {
        result.map_err(|fault| {
            let err = self.classify(fault);
            if self.failure.is_none() {
                self.failure = Some(err.to_string());
            }
            err
        })
    }

    pub fn classify(&self, fault: EngineFault) -> OptimizeError {
        debug!("Engine fault: {}", fault);
        if fault.is_invalid_image() {
            return OptimizeError::InvalidImage(fault);
        }
        match (fault, self.destination) {
            (EngineFault::CantSuspend, Some(DestinationKind::Growable)) => {
                OptimizeError::AllocationFailure
            }
            (EngineFault::CantSuspend, _) => OptimizeError::BufferTooSmall,
            (other, _) => OptimizeError::diagnostic(other.to_string()),
        }
    }
}
