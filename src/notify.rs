//! User-facing confirmation notices.
//!
//! Immediate notices are queued as they happen. Debounced notices share a
//! single slot: each new one replaces the pending one and restarts its delay,
//! so a burst of edits produces one notice once the edits stop.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default delay before a debounced notice fires (1s)
pub const DEFAULT_NOTICE_DELAY_MS: u64 = 1000;

struct Pending {
    message: String,
    due: Instant,
}

pub struct Notifier {
    delay: Duration,
    ready: VecDeque<String>,
    pending: Option<Pending>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(DEFAULT_NOTICE_DELAY_MS))
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ready: VecDeque::new(),
            pending: None,
        }
    }

    /// Queue a notice to be shown right away.
    pub fn notify(&mut self, message: impl Into<String>) {
        self.ready.push_back(message.into());
    }

    /// Put a notice in the debounce slot, cancelling whatever was there.
    pub fn notify_debounced(&mut self, message: impl Into<String>, now: Instant) {
        self.pending = Some(Pending {
            message: message.into(),
            due: now + self.delay,
        });
    }

    /// Take every notice that is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<String> {
        if self.pending.as_ref().is_some_and(|p| now >= p.due) {
            if let Some(pending) = self.pending.take() {
                self.ready.push_back(pending.message);
            }
        }
        self.ready.drain(..).collect()
    }

    /// Take every notice, firing the debounced one early. Used on shutdown.
    pub fn flush(&mut self) -> Vec<String> {
        if let Some(pending) = self.pending.take() {
            self.ready.push_back(pending.message);
        }
        self.ready.drain(..).collect()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_notices_are_returned_in_order() {
        let mut notifier = Notifier::new();
        notifier.notify("Period marked");
        notifier.notify("Mood cleared");
        assert_eq!(notifier.poll(Instant::now()), vec!["Period marked", "Mood cleared"]);
        assert!(notifier.poll(Instant::now()).is_empty());
    }

    #[test]
    fn debounced_notice_waits_for_delay() {
        let start = Instant::now();
        let mut notifier = Notifier::with_delay(Duration::from_millis(500));
        notifier.notify_debounced("Notes saved", start);

        assert!(notifier.poll(start + Duration::from_millis(499)).is_empty());
        assert_eq!(
            notifier.poll(start + Duration::from_millis(500)),
            vec!["Notes saved"]
        );
        assert!(notifier.poll(start + Duration::from_millis(5000)).is_empty());
    }

    #[test]
    fn new_debounced_notice_restarts_the_timer() {
        let start = Instant::now();
        let mut notifier = Notifier::with_delay(Duration::from_millis(500));
        notifier.notify_debounced("Notes saved", start);
        notifier.notify_debounced("Notes cleared", start + Duration::from_millis(400));

        assert!(notifier.poll(start + Duration::from_millis(600)).is_empty());
        assert_eq!(
            notifier.poll(start + Duration::from_millis(900)),
            vec!["Notes cleared"]
        );
    }

    #[test]
    fn flush_fires_pending_early() {
        let mut notifier = Notifier::new();
        notifier.notify("Flow updated: Light");
        notifier.notify_debounced("Notes saved", Instant::now());
        assert_eq!(notifier.flush(), vec!["Flow updated: Light", "Notes saved"]);
        assert!(notifier.poll(Instant::now() + Duration::from_secs(60)).is_empty());
    }
}
