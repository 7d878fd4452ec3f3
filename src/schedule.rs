//! Clocks and frame scheduling.
//!
//! The frame loop never sleeps on its own: it asks a `FrameScheduler` for the
//! next frame and gets back a handle that can be cancelled. The run loop
//! waits until the handle is due; tests instead drive a `ManualClock` and
//! step frames one at a time.

#[cfg(test)]
use std::cell::Cell;
#[cfg(test)]
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock {
    /// Time elapsed since the clock was created
    fn now(&self) -> Duration;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to; clones share the same time
#[cfg(test)]
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Identifies one requested frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Hands out at most one pending frame at a fixed interval
#[derive(Debug)]
pub struct FrameScheduler {
    interval: Duration,
    next_id: u64,
    pending: Option<(FrameHandle, Duration)>,
    last_due: Option<Duration>,
}

impl FrameScheduler {
    pub fn new(interval: Duration) -> Self {
        FrameScheduler {
            interval,
            next_id: 0,
            pending: None,
            last_due: None,
        }
    }

    pub fn with_fps(fps: u32) -> Self {
        FrameScheduler::new(Duration::from_secs_f64(1.0 / fps.max(1) as f64))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Requests the next frame, replacing any pending request.
    ///
    /// The first frame is due immediately; later frames keep a steady cadence
    /// from the previous deadline, or from `now` after falling behind.
    pub fn request_frame(&mut self, now: Duration) -> FrameHandle {
        let due = match self.last_due {
            Some(last) => (last + self.interval).max(now),
            None => now,
        };
        let handle = FrameHandle(self.next_id);
        self.next_id += 1;
        self.pending = Some((handle, due));
        handle
    }

    /// Cancels a pending frame; returns false if it was not pending
    pub fn cancel(&mut self, handle: FrameHandle) -> bool {
        match self.pending {
            Some((pending, _)) if pending == handle => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self, handle: FrameHandle) -> bool {
        matches!(self.pending, Some((pending, _)) if pending == handle)
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.pending.map(|(_, due)| due)
    }

    /// Takes the pending frame if its deadline has passed
    pub fn take_due(&mut self, now: Duration) -> Option<FrameHandle> {
        match self.pending {
            Some((handle, due)) if due <= now => {
                self.pending = None;
                self.last_due = Some(due);
                Some(handle)
            }
            _ => None,
        }
    }
}
