// Deferred callbacks keyed by slide identity.
// One queue for the whole player: arming, firing and cancelling all go through here.

use crate::types::{SlideToken, Timestamp};
use crate::viewer::ViewerTimer;

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Move to the next slide.
    AutoAdvance,
    /// Deliver a deferred callback to the mounted viewer.
    Viewer(ViewerTimer),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub due: Timestamp,
    pub token: SlideToken,
    pub kind: TimerKind,
}

/// Cancellable timer queue. At most one pending timer per kind.
#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: Vec<ScheduledTimer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        TimerQueue {
            entries: Vec::new(),
        }
    }

    /// Arm `kind` for `due`, replacing any pending timer of the same kind.
    pub fn schedule(&mut self, token: SlideToken, kind: TimerKind, due: Timestamp) {
        self.cancel(kind);
        self.entries.push(ScheduledTimer { due, token, kind });
    }

    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        let before = self.entries.len();
        self.entries.retain(|t| t.kind != kind);
        self.entries.len() != before
    }

    /// Drop every pending timer. Returns how many were pending.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn due_of(&self, kind: TimerKind) -> Option<Timestamp> {
        self.entries.iter().find(|t| t.kind == kind).map(|t| t.due)
    }

    /// Earliest pending deadline, for the host to schedule its next wake-up.
    pub fn next_due(&self) -> Option<Timestamp> {
        self.entries.iter().map(|t| t.due).min()
    }

    /// Remove and return the earliest timer due at or before `now`.
    /// Ties fire in the order they were armed.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<ScheduledTimer> {
        let position = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(i, t)| (t.due, *i))
            .map(|(i, _)| i)?;
        Some(self.entries.remove(position))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SlideIndex;

    fn token() -> SlideToken {
        SlideToken {
            generation: 1,
            epoch: 1,
            index: SlideIndex::new(0),
        }
    }

    fn ts(us: u64) -> Timestamp {
        Timestamp::from_micros(us)
    }

    #[test]
    fn rescheduling_replaces_pending_timer() {
        let mut queue = TimerQueue::new();
        queue.schedule(token(), TimerKind::AutoAdvance, ts(100));
        queue.schedule(token(), TimerKind::AutoAdvance, ts(500));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.due_of(TimerKind::AutoAdvance), Some(ts(500)));
        assert!(queue.pop_due(ts(100)).is_none());
    }

    #[test]
    fn pops_in_deadline_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(token(), TimerKind::AutoAdvance, ts(300));
        queue.schedule(token(), TimerKind::Viewer(ViewerTimer::Reveal), ts(100));
        queue.schedule(token(), TimerKind::Viewer(ViewerTimer::LoadFallback), ts(200));

        assert_eq!(queue.next_due(), Some(ts(100)));
        let order: Vec<_> = std::iter::from_fn(|| queue.pop_due(ts(1_000)))
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            order,
            vec![
                TimerKind::Viewer(ViewerTimer::Reveal),
                TimerKind::Viewer(ViewerTimer::LoadFallback),
                TimerKind::AutoAdvance,
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn cancel_all_empties_queue() {
        let mut queue = TimerQueue::new();
        queue.schedule(token(), TimerKind::AutoAdvance, ts(10));
        queue.schedule(token(), TimerKind::Viewer(ViewerTimer::CameraRetry), ts(20));

        assert_eq!(queue.cancel_all(), 2);
        assert!(queue.pop_due(ts(u64::MAX)).is_none());
        assert_eq!(queue.next_due(), None);
    }
}
