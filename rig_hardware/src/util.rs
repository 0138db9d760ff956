use std::time::{Duration, Instant};

/// Level filter for a mechanical switch: a raw transition must hold for the
/// whole window before the reported state follows it.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    stable: bool,
    changed_at: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration, initial: bool) -> Self {
        Self {
            window,
            stable: initial,
            changed_at: None,
        }
    }

    /// Feed one raw sample taken at `now`; returns the debounced state.
    pub fn update(&mut self, raw: bool, now: Instant) -> bool {
        if raw == self.stable {
            self.changed_at = None;
        } else {
            let since = *self.changed_at.get_or_insert(now);
            if now.saturating_duration_since(since) >= self.window {
                self.stable = raw;
                self.changed_at = None;
            }
        }
        self.stable
    }

    pub fn state(&self) -> bool {
        self.stable
    }
}
