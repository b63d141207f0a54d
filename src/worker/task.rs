use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::core::OptimizeOutput;
use crate::utils::OptimizeResult;
use crate::worker::WorkerError;

/// The pending result of a submitted task.
///
/// Resolves exactly once. Dropping the handle does not stop the pipeline; the
/// result is then simply discarded.
#[derive(Debug)]
pub struct OptimizeHandle {
    inner: JoinHandle<OptimizeResult<OptimizeOutput>>,
}

impl OptimizeHandle {
    pub(crate) fn new(inner: JoinHandle<OptimizeResult<OptimizeOutput>>) -> Self {
        Self { inner }
    }

    /// Whether the task has settled.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Future for OptimizeHandle {
    type Output = OptimizeResult<OptimizeOutput>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) => Err(WorkerError::from(e).into()),
        })
    }
}
