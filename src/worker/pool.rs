use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, Semaphore};
use crate::codec::CodecEngine;
use crate::core::{OptimizeOutput, OptimizeTask, PoolConfig};
use crate::processing::{RecompressionPipeline, ThumbnailStripping};
use crate::utils::OptimizeResult;
use crate::worker::{OptimizeHandle, WorkerError, WorkerResult};
use tracing::{debug, warn};

/// Runs recompression pipelines on the blocking thread pool, at most
/// `worker_count` at a time.
#[derive(Clone)]
pub struct WorkerPool {
    engine: Arc<dyn CodecEngine>,
    stripper: Option<Arc<dyn ThumbnailStripping>>,
    active_workers: Arc<Mutex<usize>>,
    semaphore: Arc<Semaphore>,
    worker_count: usize,
}

impl WorkerPool {
    pub fn new(
        engine: Arc<dyn CodecEngine>,
        stripper: Option<Arc<dyn ThumbnailStripping>>,
        config: PoolConfig,
    ) -> Self {
        let worker_count = config.workers.max(1);
        Self {
            engine,
            stripper,
            active_workers: Arc::new(Mutex::new(0)),
            semaphore: Arc::new(Semaphore::new(worker_count)),
            worker_count,
        }
    }

    /// Schedules `task` on the current runtime. The task must already be
    /// validated.
    pub fn spawn(&self, task: OptimizeTask) -> WorkerResult<OptimizeHandle> {
        let runtime = Handle::try_current()?;
        let pool = self.clone();
        let join = runtime.spawn(async move { pool.process(task).await });
        Ok(OptimizeHandle::new(join))
    }

    pub async fn process(&self, task: OptimizeTask) -> OptimizeResult<OptimizeOutput> {
        debug!("Acquiring semaphore for task ({} bytes)", task.input.len());
        let _permit = self.semaphore.acquire().await.map_err(|e| {
            warn!("Failed to acquire semaphore: {}", e);
            WorkerError::from(e)
        })?;

        let current_workers = {
            let mut count = self.active_workers.lock().await;
            *count += 1;
            *count
        };
        debug!(
            "Worker started - Active: {}/{}, Available permits: {}",
            current_workers, self.worker_count, self.semaphore.available_permits()
        );

        let engine = Arc::clone(&self.engine);
        let stripper = self.stripper.clone();
        let result = tokio::task::spawn_blocking(move || {
            RecompressionPipeline::new(engine.as_ref(), stripper.as_deref())
                .run(&task.input, task.flags, task.target)
        })
        .await
        .map_err(WorkerError::from);

        let remaining = {
            let mut count = self.active_workers.lock().await;
            *count -= 1;
            *count
        };
        debug!(
            "Worker finished - Active: {}/{}, Available permits: {}",
            remaining, self.worker_count, self.semaphore.available_permits() + 1
        );

        result?
    }

    /// Runs all tasks concurrently, returning one result per task in input
    /// order.
    pub async fn process_batch(&self, tasks: Vec<OptimizeTask>) -> Vec<OptimizeResult<OptimizeOutput>> {
        debug!("Processing batch of {} tasks", tasks.len());
        let handles: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                let pool = self.clone();
                tokio::spawn(async move { pool.process(task).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(WorkerError::from(e).into()),
            });
        }
        results
    }

    /// Stops accepting work. Tasks waiting for a worker fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub async fn get_active_workers(&self) -> usize {
        *self.active_workers.lock().await
    }
}
