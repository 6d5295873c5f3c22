use std::fmt;
use std::task::{Context, Poll};

use tokio::sync::mpsc;

/// Creates the two halves of a result conduit.
///
/// A `capacity` of zero yields an unbounded channel; otherwise at most
/// `capacity` unread results are buffered and further pushes wait for the
/// consumer to make room.
pub(crate) fn conduit<R: Send + 'static>(capacity: usize) -> (ResultSender<R>, ResultReceiver<R>) {
  if capacity == 0 {
    let (tx, rx) = mpsc::unbounded_channel();
    (ResultSender::Unbounded(tx), ResultReceiver::Unbounded(rx))
  } else {
    let (tx, rx) = mpsc::channel(capacity);
    (ResultSender::Bounded(tx), ResultReceiver::Bounded(rx))
  }
}

/// The producer half of a conduit. Every in-flight worker holds a clone; the
/// conduit closes once the batch and all of its workers have dropped theirs.
pub(crate) enum ResultSender<R: Send + 'static> {
  Bounded(mpsc::Sender<R>),
  Unbounded(mpsc::UnboundedSender<R>),
}

impl<R: Send + 'static> Clone for ResultSender<R> {
  fn clone(&self) -> Self {
    match self {
      ResultSender::Bounded(tx) => ResultSender::Bounded(tx.clone()),
      ResultSender::Unbounded(tx) => ResultSender::Unbounded(tx.clone()),
    }
  }
}

impl<R: Send + 'static> fmt::Debug for ResultSender<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ResultSender::Bounded(tx) => f
        .debug_struct("ResultSender::Bounded")
        .field("max_capacity", &tx.max_capacity())
        .field("available", &tx.capacity())
        .finish(),
      ResultSender::Unbounded(_) => f.debug_struct("ResultSender::Unbounded").finish(),
    }
  }
}

impl<R: Send + 'static> ResultSender<R> {
  /// Pushes a result, waiting for buffer space on a bounded conduit.
  /// Gives the value back if the consumer is gone.
  pub(crate) async fn send(&self, value: R) -> Result<(), R> {
    match self {
      ResultSender::Bounded(tx) => tx.send(value).await.map_err(|e| e.0),
      ResultSender::Unbounded(tx) => tx.send(value).map_err(|e| e.0),
    }
  }

  /// Like `send`, but parks the calling thread. Must not be called from
  /// within an async execution context.
  pub(crate) fn blocking_send(&self, value: R) -> Result<(), R> {
    match self {
      ResultSender::Bounded(tx) => tx.blocking_send(value).map_err(|e| e.0),
      ResultSender::Unbounded(tx) => tx.send(value).map_err(|e| e.0),
    }
  }
}

/// The consumer half of a conduit. Not cloneable: one consumer per batch.
#[derive(Debug)]
pub(crate) enum ResultReceiver<R: Send + 'static> {
  Bounded(mpsc::Receiver<R>),
  Unbounded(mpsc::UnboundedReceiver<R>),
}

impl<R: Send + 'static> ResultReceiver<R> {
  /// Yields `Ready(None)` once every sender is dropped and the buffer is empty.
  pub(crate) fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<R>> {
    match self {
      ResultReceiver::Bounded(rx) => rx.poll_recv(cx),
      ResultReceiver::Unbounded(rx) => rx.poll_recv(cx),
    }
  }

  pub(crate) async fn recv(&mut self) -> Option<R> {
    match self {
      ResultReceiver::Bounded(rx) => rx.recv().await,
      ResultReceiver::Unbounded(rx) => rx.recv().await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_unbounded_send_never_waits() {
    let (tx, mut rx) = conduit::<u32>(0);
    for i in 0..1000 {
      tx.send(i).await.unwrap();
    }
    drop(tx);
    let mut count = 0;
    while rx.recv().await.is_some() {
      count += 1;
    }
    assert_eq!(count, 1000);
  }

  #[tokio::test]
  async fn test_bounded_send_waits_for_space() {
    let (tx, mut rx) = conduit::<u32>(1);
    tx.send(1).await.unwrap();

    let send_future = tx.send(2);
    tokio::pin!(send_future);

    tokio::select! {
        _ = &mut send_future => {
            panic!("Send should have blocked because the conduit is full.");
        },
        _ = tokio::time::sleep(Duration::from_millis(50)) => {}
    }

    assert_eq!(rx.recv().await, Some(1));

    tokio::time::timeout(Duration::from_millis(50), send_future)
      .await
      .expect("Send did not complete after the conduit was drained.")
      .unwrap();
    assert_eq!(rx.recv().await, Some(2));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_blocking_send_from_blocking_thread() {
    let (tx, mut rx) = conduit::<&'static str>(1);
    let producer = tokio::task::spawn_blocking(move || {
      tx.blocking_send("first").unwrap();
      tx.blocking_send("second").unwrap();
    });

    assert_eq!(rx.recv().await, Some("first"));
    assert_eq!(rx.recv().await, Some("second"));
    producer.await.unwrap();
    assert_eq!(rx.recv().await, None);
  }

  #[tokio::test]
  async fn test_send_after_receiver_dropped_returns_value() {
    for capacity in [0, 3] {
      let (tx, rx) = conduit::<String>(capacity);
      drop(rx);
      assert_eq!(tx.send("lost".to_string()).await, Err("lost".to_string()));
    }
  }

  #[tokio::test]
  async fn test_receiver_ends_when_all_senders_drop() {
    let (tx, mut rx) = conduit::<u8>(4);
    let second = tx.clone();
    tx.send(1).await.unwrap();
    drop(tx);
    second.send(2).await.unwrap();
    drop(second);

    assert_eq!(rx.recv().await, Some(1));
    assert_eq!(rx.recv().await, Some(2));
    assert_eq!(rx.recv().await, None);
  }
}
