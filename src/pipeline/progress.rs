//! Best-effort progress reporting for long-running conversions.
//!
//! Events flow over a bounded channel; when the consumer falls behind, new
//! events are dropped rather than stalling synthesis workers.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

use tracing::trace;

/// A snapshot of pipeline progress, emitted after every chunk reaches a
/// terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Chunks that have reached a terminal state so far
    pub completed: usize,
    /// Total chunks in the plan
    pub total: usize,
    /// Chapter the just-finished chunk belongs to
    pub chapter: usize,
}

/// Sending half of the progress channel. Cloneable so every worker holds one.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: SyncSender<ProgressEvent>,
}

impl ProgressSender {
    /// Emit an event without blocking. Dropped silently when the channel is
    /// full or the receiver is gone.
    pub fn emit(&self, event: ProgressEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(ev)) => {
                trace!(completed = ev.completed, "progress event dropped, channel full");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Create a bounded progress channel.
pub fn progress_channel(capacity: usize) -> (ProgressSender, Receiver<ProgressEvent>) {
    let (tx, rx) = sync_channel(capacity);
    (ProgressSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (tx, rx) = progress_channel(8);
        for i in 0..3 {
            tx.emit(ProgressEvent {
                completed: i + 1,
                total: 3,
                chapter: 0,
            });
        }
        let got: Vec<usize> = rx.try_iter().map(|e| e.completed).collect();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let (tx, rx) = progress_channel(1);
        tx.emit(ProgressEvent {
            completed: 1,
            total: 2,
            chapter: 0,
        });
        // second emit must not block even though nothing was consumed
        tx.emit(ProgressEvent {
            completed: 2,
            total: 2,
            chapter: 0,
        });
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].completed, 1);
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_silent() {
        let (tx, rx) = progress_channel(1);
        drop(rx);
        tx.emit(ProgressEvent {
            completed: 1,
            total: 1,
            chapter: 0,
        });
    }
}
