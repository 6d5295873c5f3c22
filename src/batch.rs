use crate::conduit::{self, ResultReceiver, ResultSender};

use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;

/// Observable lifecycle phase of a pool's current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPhase {
  /// No conduit exists; the next submission opens a fresh one.
  Closed,
  /// Accepting submissions; nobody has asked for the results yet.
  Open,
  /// A consumer holds the result stream and the drain coordinator is waiting
  /// for outstanding work to finish. Submissions are still accepted.
  Draining,
}

/// One batch of work: the producer half of its conduit, the tracker that
/// counts its outstanding tasks, and the signal fired when the batch closes.
#[derive(Debug)]
pub(crate) struct Batch<R: Send + 'static> {
  pub(crate) id: u64,
  pub(crate) sender: ResultSender<R>,
  pub(crate) tracker: TaskTracker,
  pub(crate) drained: CancellationToken,
}

/// What a submission needs to take part in a batch. The token keeps the
/// batch's outstanding count raised until it is dropped.
pub(crate) struct Enlistment<R: Send + 'static> {
  pub(crate) batch_id: u64,
  pub(crate) sender: ResultSender<R>,
  pub(crate) token: TaskTrackerToken,
}

impl<R: Send + 'static> Batch<R> {
  pub(crate) fn open(id: u64, capacity: usize) -> (Self, ResultReceiver<R>) {
    let (sender, receiver) = conduit::conduit(capacity);
    let batch = Self {
      id,
      sender,
      tracker: TaskTracker::new(),
      drained: CancellationToken::new(),
    };
    (batch, receiver)
  }

  fn enlist(&self) -> Enlistment<R> {
    Enlistment {
      batch_id: self.id,
      sender: self.sender.clone(),
      token: self.tracker.token(),
    }
  }
}

/// Outcome of a drain coordinator's attempt to close its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainStatus {
  /// The batch was closed; its conduit ends once in-flight senders drop.
  Closed,
  /// Work was enlisted after the tracker last reported empty.
  StillBusy,
}

/// What a request to drain the current batch found.
#[derive(Debug)]
pub(crate) enum DrainHandoff<R: Send + 'static> {
  /// The batch was open and is now draining. The caller owns the receiver and
  /// must start a coordinator waiting on `tracker`.
  Started {
    batch_id: u64,
    tracker: TaskTracker,
    receiver: ResultReceiver<R>,
  },
  /// Another caller already drains this batch; `drained` fires when it closes.
  InProgress { batch_id: u64, drained: CancellationToken },
  /// Nothing to drain.
  Closed,
}

/// The per-pool state machine:
///
/// `Closed --submit--> Open --collect--> Draining --outstanding == 0--> Closed`
#[derive(Debug)]
pub(crate) enum Phase<R: Send + 'static> {
  Closed,
  Open {
    batch: Batch<R>,
    receiver: ResultReceiver<R>,
  },
  Draining {
    batch: Batch<R>,
  },
}

impl<R: Send + 'static> Phase<R> {
  pub(crate) fn opened(id: u64, capacity: usize) -> Self {
    let (batch, receiver) = Batch::open(id, capacity);
    Phase::Open { batch, receiver }
  }

  pub(crate) fn public(&self) -> PoolPhase {
    match self {
      Phase::Closed => PoolPhase::Closed,
      Phase::Open { .. } => PoolPhase::Open,
      Phase::Draining { .. } => PoolPhase::Draining,
    }
  }

  pub(crate) fn batch(&self) -> Option<&Batch<R>> {
    match self {
      Phase::Closed => None,
      Phase::Open { batch, .. } | Phase::Draining { batch } => Some(batch),
    }
  }

  /// Joins the current batch, opening a fresh one first when closed.
  /// `next_id` is only called when a new batch is created.
  pub(crate) fn enlist(&mut self, capacity: usize, next_id: impl FnOnce() -> u64) -> (Enlistment<R>, bool) {
    let (next, enlistment, reopened) = match std::mem::replace(self, Phase::Closed) {
      Phase::Closed => {
        let (batch, receiver) = Batch::open(next_id(), capacity);
        let enlistment = batch.enlist();
        (Phase::Open { batch, receiver }, enlistment, true)
      }
      Phase::Open { batch, receiver } => {
        let enlistment = batch.enlist();
        (Phase::Open { batch, receiver }, enlistment, false)
      }
      Phase::Draining { batch } => {
        let enlistment = batch.enlist();
        (Phase::Draining { batch }, enlistment, false)
      }
    };
    *self = next;
    (enlistment, reopened)
  }

  /// Moves an open batch to draining and hands out its receiver together with
  /// a tracker clone the coordinator can wait on. A draining batch is left
  /// untouched and reported with its close signal.
  pub(crate) fn drain(&mut self) -> DrainHandoff<R> {
    match std::mem::replace(self, Phase::Closed) {
      Phase::Open { batch, receiver } => {
        batch.tracker.close();
        let handoff = DrainHandoff::Started {
          batch_id: batch.id,
          tracker: batch.tracker.clone(),
          receiver,
        };
        *self = Phase::Draining { batch };
        handoff
      }
      Phase::Draining { batch } => {
        let handoff = DrainHandoff::InProgress {
          batch_id: batch.id,
          drained: batch.drained.clone(),
        };
        *self = Phase::Draining { batch };
        handoff
      }
      Phase::Closed => DrainHandoff::Closed,
    }
  }

  /// Closes batch `batch_id` if it has nothing outstanding, firing its
  /// `drained` signal. Only the batch's own coordinator calls this, so the
  /// phase is always `Draining` with that batch.
  pub(crate) fn try_close(&mut self, batch_id: u64) -> DrainStatus {
    match self {
      Phase::Draining { batch } if batch.id == batch_id => {
        if !batch.tracker.is_empty() {
          return DrainStatus::StillBusy;
        }
        batch.drained.cancel();
      }
      _ => debug_assert!(false, "batch {} closed by someone other than its coordinator", batch_id),
    }
    *self = Phase::Closed;
    DrainStatus::Closed
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_enlist_on_closed_opens_fresh_batch() {
    let mut phase = Phase::<u32>::Closed;
    let (enlistment, reopened) = phase.enlist(0, || 7);
    assert!(reopened);
    assert_eq!(enlistment.batch_id, 7);
    assert_eq!(phase.public(), PoolPhase::Open);
    assert_eq!(phase.batch().map(|b| b.tracker.len()), Some(1));
  }

  #[test]
  fn test_enlist_on_open_reuses_batch() {
    let mut phase = Phase::<u32>::opened(3, 1);
    let (first, first_reopened) = phase.enlist(1, || panic!("must not open a new batch"));
    let (second, second_reopened) = phase.enlist(1, || panic!("must not open a new batch"));
    assert!(!first_reopened && !second_reopened);
    assert_eq!(first.batch_id, 3);
    assert_eq!(second.batch_id, 3);
    assert_eq!(phase.batch().map(|b| b.tracker.len()), Some(2));

    drop(first);
    assert_eq!(phase.batch().map(|b| b.tracker.len()), Some(1));
  }

  #[test]
  fn test_drain_starts_only_from_open() {
    let mut phase = Phase::<u32>::opened(1, 0);
    let (batch_id, tracker) = match phase.drain() {
      DrainHandoff::Started { batch_id, tracker, .. } => (batch_id, tracker),
      other => panic!("Expected Started, got {:?}", other),
    };
    assert_eq!(batch_id, 1);
    assert!(tracker.is_closed());
    assert_eq!(phase.public(), PoolPhase::Draining);

    match phase.drain() {
      DrainHandoff::InProgress { batch_id, drained } => {
        assert_eq!(batch_id, 1);
        assert!(!drained.is_cancelled());
      }
      other => panic!("Expected InProgress, got {:?}", other),
    }
    assert_eq!(phase.public(), PoolPhase::Draining);

    let mut closed = Phase::<u32>::Closed;
    assert!(matches!(closed.drain(), DrainHandoff::Closed));
  }

  #[test]
  fn test_draining_accepts_late_enlistment() {
    let mut phase = Phase::<u32>::opened(4, 0);
    let _handoff = phase.drain();
    let (late, reopened) = phase.enlist(0, || panic!("must join the draining batch"));
    assert!(!reopened);
    assert_eq!(late.batch_id, 4);
    assert_eq!(phase.public(), PoolPhase::Draining);
  }

  #[test]
  fn test_try_close_waits_for_outstanding_work() {
    let mut phase = Phase::<u32>::opened(2, 0);
    let (enlistment, _) = phase.enlist(0, || 0);
    let _handoff = phase.drain();
    let drained = match phase.drain() {
      DrainHandoff::InProgress { drained, .. } => drained,
      other => panic!("Expected InProgress, got {:?}", other),
    };

    assert_eq!(phase.try_close(2), DrainStatus::StillBusy);
    assert_eq!(phase.public(), PoolPhase::Draining);
    assert!(!drained.is_cancelled());

    drop(enlistment);
    assert_eq!(phase.try_close(2), DrainStatus::Closed);
    assert_eq!(phase.public(), PoolPhase::Closed);
    assert!(drained.is_cancelled());
  }
}
