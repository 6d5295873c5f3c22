use crate::conduit::ResultReceiver;

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tracing::trace;

/// The result stream of one batch, returned by `GatherPool::collect`.
///
/// Results arrive in completion order. The stream ends once every task of the
/// batch has delivered its value, including tasks submitted while the stream
/// is being consumed. It cannot be restarted; the next batch needs another
/// call to `collect`.
pub struct Results<R: Send + 'static> {
  pool_name: Arc<String>,
  batch_id: Option<u64>,
  receiver: Option<ResultReceiver<R>>,
  received: usize,
}

impl<R: Send + 'static> fmt::Debug for Results<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Results")
      .field("pool_name", &self.pool_name)
      .field("batch_id", &self.batch_id)
      .field("received", &self.received)
      .field("exhausted", &self.receiver.is_none())
      .finish()
  }
}

impl<R: Send + 'static> Results<R> {
  pub(crate) fn new(pool_name: Arc<String>, batch_id: u64, receiver: ResultReceiver<R>) -> Self {
    Self {
      pool_name,
      batch_id: Some(batch_id),
      receiver: Some(receiver),
      received: 0,
    }
  }

  /// A stream that is already closed, for pools with no open batch.
  pub(crate) fn empty(pool_name: Arc<String>) -> Self {
    Self {
      pool_name,
      batch_id: None,
      receiver: None,
      received: 0,
    }
  }

  /// The batch these results belong to, or `None` for an empty stream.
  pub fn batch_id(&self) -> Option<u64> {
    self.batch_id
  }

  /// Number of results yielded so far.
  pub fn received(&self) -> usize {
    self.received
  }

  /// Waits for the next result. Returns `None` once the batch is complete.
  pub async fn next_result(&mut self) -> Option<R> {
    let next = match self.receiver.as_mut() {
      Some(receiver) => receiver.recv().await,
      None => None,
    };
    self.record(next)
  }

  fn record(&mut self, next: Option<R>) -> Option<R> {
    match next {
      Some(value) => {
        self.received += 1;
        Some(value)
      }
      None => {
        if self.receiver.take().is_some() {
          trace!(pool_name = %*self.pool_name, batch_id = ?self.batch_id, received = self.received, "Result stream exhausted.");
        }
        None
      }
    }
  }
}

impl<R: Send + 'static> Stream for Results<R> {
  type Item = R;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<R>> {
    let polled = match self.receiver.as_mut() {
      Some(receiver) => receiver.poll_recv(cx),
      None => Poll::Ready(None),
    };
    match polled {
      Poll::Ready(next) => Poll::Ready(self.record(next)),
      Poll::Pending => Poll::Pending,
    }
  }
}
