//! Core types and the optimizer entry point.
//!
//! This module contains the fundamental types used throughout the crate:
//! - [`Optimizer`]: validates arguments and schedules recompression tasks
//! - [`OptimizeTask`]: one input with its options
//! - [`StripFlags`], [`OptimizeOptions`], [`OutputTarget`]: what to do and where to write
//! - [`OptimizeOutput`], [`OptimizationResult`]: results of a run

mod state;
mod types;
mod task;

pub use state::{Optimizer, versions};
pub use types::{
    OptimizationResult, OptimizeOptions, OptimizeOutput, OptimizedImage, OutputTarget, PoolConfig,
    StripFlags, Versions,
};
pub use task::OptimizeTask;
