use crate::batch::{DrainHandoff, DrainStatus, Enlistment, Phase, PoolPhase};
use crate::conduit::ResultReceiver;
use crate::error::PoolError;
use crate::options::PoolOptions;
use crate::results::Results;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, debug_span, error, info, info_span, trace, warn, Instrument};

lazy_static::lazy_static! {
  static ref NEXT_TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// A pool that runs every submitted worker concurrently and gathers the
/// workers' return values into one result stream per batch.
///
/// A batch starts with construction (or with the first submission after the
/// previous batch closed) and ends when `collect` or `wait` has been called
/// and every task enlisted in it has delivered its result. Submissions are
/// never refused and never queued: each one starts executing immediately.
/// With a non-zero capacity the result buffer is bounded, so finished workers
/// wait for the consumer before they count as done.
pub struct GatherPool<R: Send + 'static> {
  pool_name: Arc<String>,
  capacity: usize,
  phase: Arc<Mutex<Phase<R>>>,
  next_batch_id: AtomicU64,
  tokio_handle: TokioHandle,
}

impl<R: Send + 'static> GatherPool<R> {
  pub fn new(options: PoolOptions, tokio_handle: TokioHandle) -> Arc<Self> {
    let bounded = options.is_bounded();
    let PoolOptions { capacity, name } = options;
    info!(pool_name = %name, capacity, bounded, "Creating pool and opening batch 0.");
    Arc::new(Self {
      pool_name: Arc::new(name),
      capacity,
      phase: Arc::new(Mutex::new(Phase::opened(0, capacity))),
      next_batch_id: AtomicU64::new(1),
      tokio_handle,
    })
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  /// Size of the result buffer; `0` means unbounded, so unread results stay in memory.
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn phase(&self) -> PoolPhase {
    self.phase.lock().public()
  }

  /// `true` while the current batch accepts submissions without reopening.
  pub fn is_open(&self) -> bool {
    self.phase() != PoolPhase::Closed
  }

  /// Number of tasks in the current batch that have not yet delivered their result.
  pub fn outstanding(&self) -> usize {
    self.phase.lock().batch().map_or(0, |batch| batch.tracker.len())
  }

  /// Identifier of the current batch, or `None` while closed.
  pub fn batch_id(&self) -> Option<u64> {
    self.phase.lock().batch().map(|batch| batch.id)
  }

  /// Runs `worker(args)` on the runtime's blocking thread pool and delivers its
  /// return value to the current batch.
  ///
  /// Workers that can fail should return their failure as part of `R`. A
  /// panicking worker is a fatal fault: it is logged and the process aborts.
  pub fn submit<A, F>(&self, worker: F, args: A)
  where
    A: Send + 'static,
    F: FnOnce(A) -> R + Send + 'static,
  {
    let task_id = NEXT_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    let Enlistment { batch_id, sender, token } = self.enlist(task_id);
    let pool_name = self.pool_name.clone();

    self.tokio_handle.spawn_blocking(move || {
      // Released last, so the batch only counts this task as done once its
      // result is pushed and its sender dropped.
      let _outstanding = token;
      let span = debug_span!("pool_worker", pool_name = %*pool_name, batch_id, task_id);
      let _entered = span.enter();

      let value = match std::panic::catch_unwind(AssertUnwindSafe(move || worker(args))) {
        Ok(value) => value,
        Err(_) => worker_panicked(&pool_name, batch_id, task_id),
      };
      trace!("Worker returned; pushing result.");
      if sender.blocking_send(value).is_err() {
        warn!("Result stream of this batch was dropped. Discarding result.");
      } else {
        debug!("Result delivered.");
      }
      drop(sender);
    });
  }

  /// Like `submit`, but the worker produces a future which runs as a Tokio task.
  pub fn submit_async<A, F, Fut>(&self, worker: F, args: A)
  where
    A: Send + 'static,
    F: FnOnce(A) -> Fut + Send + 'static,
    Fut: Future<Output = R> + Send + 'static,
  {
    let task_id = NEXT_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    let Enlistment { batch_id, sender, token } = self.enlist(task_id);
    let pool_name = self.pool_name.clone();
    let pool_name_for_span = self.pool_name.clone();

    self.tokio_handle.spawn(
      async move {
        let _outstanding = token;
        let value = match AssertUnwindSafe(async move { worker(args).await }).catch_unwind().await {
          Ok(value) => value,
          Err(_) => worker_panicked(&pool_name, batch_id, task_id),
        };
        trace!("Worker returned; pushing result.");
        if sender.send(value).await.is_err() {
          warn!("Result stream of this batch was dropped. Discarding result.");
        } else {
          debug!("Result delivered.");
        }
        drop(sender);
      }
      .instrument(info_span!("pool_worker", pool_name = %*pool_name_for_span, batch_id, task_id)),
    );
  }

  /// Returns the result stream of the current batch and starts its drain
  /// coordinator, which closes the stream once no task is outstanding.
  ///
  /// With nothing submitted the stream ends right away. Work submitted after
  /// that point belongs to the next batch.
  ///
  /// # Errors
  /// Returns `PoolError::AlreadyCollecting` if another consumer already holds
  /// the stream of the current batch.
  pub fn collect(&self) -> Result<Results<R>, PoolError> {
    let handoff = self.phase.lock().drain();
    match handoff {
      DrainHandoff::Started { batch_id, tracker, receiver } => Ok(self.start_drain_coordinator(batch_id, tracker, receiver)),
      DrainHandoff::InProgress { batch_id, .. } => {
        warn!(pool_name = %*self.pool_name, batch_id, "Collect: batch is already being collected.");
        Err(PoolError::AlreadyCollecting {
          pool: self.pool_name.to_string(),
          batch: batch_id,
        })
      }
      DrainHandoff::Closed => {
        debug!(pool_name = %*self.pool_name, "Collect on a closed pool: returning an empty stream.");
        Ok(Results::empty(self.pool_name.clone()))
      }
    }
  }

  /// Waits until every task of the current batch has finished, discarding
  /// their results. If another caller is already collecting the batch, this
  /// waits for that drain to close the batch instead.
  pub async fn wait(&self) {
    let handoff = self.phase.lock().drain();
    match handoff {
      DrainHandoff::Started { batch_id, tracker, receiver } => {
        let mut results = self.start_drain_coordinator(batch_id, tracker, receiver);
        while results.next().await.is_some() {}
        debug!(pool_name = %*self.pool_name, batch_id, discarded = results.received(), "Wait: batch finished.");
      }
      DrainHandoff::InProgress { batch_id, drained } => {
        debug!(pool_name = %*self.pool_name, batch_id, "Wait: joining the drain already in progress.");
        drained.cancelled().await;
        debug!(pool_name = %*self.pool_name, batch_id, "Wait: batch closed by its collector.");
      }
      DrainHandoff::Closed => {
        trace!(pool_name = %*self.pool_name, "Wait on a closed pool: nothing to wait for.");
      }
    }
  }

  fn start_drain_coordinator(&self, batch_id: u64, tracker: TaskTracker, receiver: ResultReceiver<R>) -> Results<R> {
    info!(pool_name = %*self.pool_name, batch_id, "Collecting batch; starting drain coordinator.");
    self.tokio_handle.spawn(
      Self::run_drain_coordinator(self.pool_name.clone(), self.phase.clone(), batch_id, tracker)
        .instrument(info_span!("drain_coordinator", pool_name = %*self.pool_name, batch_id)),
    );
    Results::new(self.pool_name.clone(), batch_id, receiver)
  }

  fn enlist(&self, task_id: u64) -> Enlistment<R> {
    let (enlistment, reopened) = self
      .phase
      .lock()
      .enlist(self.capacity, || self.next_batch_id.fetch_add(1, AtomicOrdering::Relaxed));
    if reopened {
      info!(pool_name = %*self.pool_name, batch_id = enlistment.batch_id, "Previous batch was closed; opened a fresh conduit.");
    }
    debug!(pool_name = %*self.pool_name, batch_id = enlistment.batch_id, %task_id, "Submitting task.");
    enlistment
  }

  async fn run_drain_coordinator(pool_name: Arc<String>, phase: Arc<Mutex<Phase<R>>>, batch_id: u64, tracker: TaskTracker) {
    loop {
      tracker.wait().await;
      let status = phase.lock().try_close(batch_id);
      match status {
        DrainStatus::Closed => {
          info!(pool_name = %*pool_name, batch_id, "All tasks finished; batch closed.");
          return;
        }
        DrainStatus::StillBusy => {
          trace!(pool_name = %*pool_name, batch_id, "Late submission joined the batch; waiting again.");
        }
      }
    }
  }
}

fn worker_panicked(pool_name: &str, batch_id: u64, task_id: u64) -> ! {
  error!(%pool_name, batch_id, task_id, "Worker panicked. Worker faults are fatal; aborting the process.");
  std::process::abort()
}

impl<R: Send + 'static> Drop for GatherPool<R> {
  fn drop(&mut self) {
    let phase = self.phase.lock();
    match phase.batch() {
      Some(batch) if !batch.tracker.is_empty() => {
        debug!(
          pool_name = %*self.pool_name,
          batch_id = batch.id,
          outstanding = batch.tracker.len(),
          "GatherPool dropped with outstanding tasks; they keep running and deliver to any live result stream."
        );
      }
      _ => trace!(pool_name = %*self.pool_name, "GatherPool dropped."),
    }
  }
}
