//! The optimizer entry point.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use lazy_static::lazy_static;
use tracing::{debug, info, warn};

use crate::codec::{CodecEngine, NativeEngine};
use crate::core::{
    OptimizationResult, OptimizeOptions, OptimizeOutput, OptimizeTask, OutputTarget, PoolConfig,
    StripFlags, Versions,
};
use crate::processing::{ThumbnailStripping, dump_dct};
use crate::utils::{OptimizeResult, get_file_size, read_input, write_output};
use crate::worker::{OptimizeHandle, WorkerPool};

lazy_static! {
    static ref DEFAULT_VERSIONS: Versions = Versions {
        engine: NativeEngine.version().to_string(),
        copyright: NativeEngine.copyright().to_string(),
        exif: default_stripper().map(|s| s.version().to_string()),
    };
}

/// Versions of the collaborators a default [`Optimizer`] uses.
pub fn versions() -> &'static Versions {
    &DEFAULT_VERSIONS
}

#[cfg(feature = "exif")]
fn default_stripper() -> Option<Arc<dyn ThumbnailStripping>> {
    Some(Arc::new(crate::processing::KamadakExif))
}

#[cfg(not(feature = "exif"))]
fn default_stripper() -> Option<Arc<dyn ThumbnailStripping>> {
    None
}

/// Lossless JPEG optimizer.
///
/// Cheap to clone; clones share the engine and the worker pool.
#[derive(Clone)]
pub struct Optimizer {
    engine: Arc<dyn CodecEngine>,
    stripper: Option<Arc<dyn ThumbnailStripping>>,
    pool: WorkerPool,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl Optimizer {
    /// Creates an optimizer on the built-in engine. Thumbnail stripping is
    /// available when the `exif` feature is enabled.
    pub fn new(config: PoolConfig) -> Self {
        Self::with_collaborators(Arc::new(NativeEngine::new()), default_stripper(), config)
    }

    pub fn with_collaborators(
        engine: Arc<dyn CodecEngine>,
        stripper: Option<Arc<dyn ThumbnailStripping>>,
        config: PoolConfig,
    ) -> Self {
        debug!(
            "Optimizer created - engine: {}, workers: {}, thumbnail stripping: {}",
            engine.version(),
            config.workers,
            stripper.is_some()
        );
        let pool = WorkerPool::new(Arc::clone(&engine), stripper.clone(), config);
        Self { engine, stripper, pool }
    }

    pub fn supports_thumbnail_stripping(&self) -> bool {
        self.stripper.is_some()
    }

    pub fn versions(&self) -> Versions {
        Versions {
            engine: self.engine.version().to_string(),
            copyright: self.engine.copyright().to_string(),
            exif: self.stripper.as_ref().map(|s| s.version().to_string()),
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Validates the arguments and schedules the recompression.
    ///
    /// Argument errors are returned right away; everything the engine finds
    /// is delivered through the handle. Must be called within a Tokio
    /// runtime.
    pub fn optimize(
        &self,
        input: impl Into<Bytes>,
        flags: StripFlags,
        target: Option<OutputTarget>,
    ) -> OptimizeResult<OptimizeHandle> {
        self.submit(OptimizeTask::new(input, flags, target))
    }

    pub fn optimize_with(
        &self,
        input: impl Into<Bytes>,
        options: OptimizeOptions,
    ) -> OptimizeResult<OptimizeHandle> {
        self.submit(OptimizeTask::from_options(input, options))
    }

    pub fn submit(&self, task: OptimizeTask) -> OptimizeResult<OptimizeHandle> {
        task.validate(self.supports_thumbnail_stripping())?;
        Ok(self.pool.spawn(task)?)
    }

    /// Runs several tasks. Invalid tasks fail individually without being
    /// scheduled.
    pub async fn process_batch(&self, tasks: Vec<OptimizeTask>) -> Vec<OptimizeResult<OptimizeOutput>> {
        let can_strip = self.supports_thumbnail_stripping();
        let mut results: Vec<Option<OptimizeResult<OptimizeOutput>>> = Vec::with_capacity(tasks.len());
        let mut valid = Vec::new();
        for task in tasks {
            match task.validate(can_strip) {
                Ok(()) => {
                    valid.push(task);
                    results.push(None);
                }
                Err(e) => results.push(Some(Err(e.into()))),
            }
        }

        let mut processed = self.pool.process_batch(valid).await.into_iter();
        results
            .into_iter()
            .map(|slot| match slot {
                Some(rejected) => rejected,
                None => processed.next().unwrap_or_else(|| {
                    Err(crate::worker::WorkerError::ProcessingError("missing batch result".into()).into())
                }),
            })
            .collect()
    }

    /// Optimizes a file, writing the result to `output_path`.
    ///
    /// Engine failures are reported in the returned result and leave
    /// `output_path` untouched; argument and IO errors are returned as
    /// errors.
    pub async fn optimize_file(
        &self,
        input_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
        options: OptimizeOptions,
    ) -> OptimizeResult<OptimizationResult> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();
        let data = read_input(input_path).await?;
        let original_size = data.len() as u64;

        let handle = self.optimize_with(data, options)?;
        let mut result = OptimizationResult {
            original_path: input_path.display().to_string(),
            optimized_path: output_path.display().to_string(),
            original_size,
            optimized_size: 0,
            success: false,
            error: None,
            invalid_image: false,
            saved_bytes: 0,
            compression_ratio: 0.0,
        };

        match handle.await {
            Ok(output) => {
                write_output(output_path, output.bytes()).await?;
                let optimized_size = get_file_size(output_path).await?;
                let saved_bytes = original_size as i64 - optimized_size as i64;
                result.optimized_size = optimized_size;
                result.success = true;
                result.saved_bytes = saved_bytes;
                result.compression_ratio = if original_size > 0 {
                    (saved_bytes as f64 / original_size as f64) * 100.0
                } else {
                    0.0
                };
                info!(
                    "Optimized {}: {} -> {} bytes ({:.1}% saved)",
                    result.original_path, original_size, optimized_size, result.compression_ratio
                );
            }
            Err(e) => {
                warn!("Optimizing {} failed: {}", result.original_path, e);
                result.invalid_image = e.is_invalid_image();
                result.error = Some(e.to_string());
            }
        }
        Ok(result)
    }

    /// Calls `on_row` with the coefficients of each block row, see
    /// [`dump_dct`](crate::processing::dump_dct).
    pub fn dump_dct<F: FnMut(&[u8])>(&self, input: &[u8], on_row: F) -> OptimizeResult<()> {
        dump_dct(self.engine.as_ref(), input, on_row)
    }
}
