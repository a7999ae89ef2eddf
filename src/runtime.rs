//! Cooperative event loop for the viewer
//!
//! Everything the viewer does asynchronously is either a timer or an
//! animation-frame callback. Both are modelled as plain task values queued
//! here; the host drives time forward with [`EventLoop::pop_due`] and
//! [`EventLoop::take_frame_tasks`], so the controller never blocks and all
//! state mutation stays on one thread.

use instant::Instant;
use serde::{Deserialize, Serialize};

/// Wall-clock milliseconds since construction, for hosts that drive the
/// loop in real time (works on wasm too)
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to an armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(u64);

/// Handle to a requested animation frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(u64);

#[derive(Debug)]
struct Timer<T> {
    id: TimerId,
    due_ms: f64,
    task: T,
}

/// Virtual-clock timer and frame queue
#[derive(Debug)]
pub struct EventLoop<T> {
    now_ms: f64,
    next_id: u64,
    timers: Vec<Timer<T>>,
    frames: Vec<(FrameId, T)>,
}

impl<T> EventLoop<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0.0,
            next_id: 1,
            timers: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Current virtual time in milliseconds
    pub fn now(&self) -> f64 {
        self.now_ms
    }

    /// Moves the clock forward; it never runs backwards
    pub fn set_now(&mut self, now_ms: f64) {
        if now_ms > self.now_ms {
            self.now_ms = now_ms;
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Arms a timer firing `delay_ms` from now
    pub fn set_timeout(&mut self, delay_ms: f64, task: T) -> TimerId {
        let id = TimerId(self.allocate_id());
        let delay = if delay_ms.is_finite() { delay_ms.max(0.0) } else { 0.0 };
        self.timers.push(Timer { id, due_ms: self.now_ms + delay, task });
        id
    }

    /// Disarms a timer; returns whether it was still pending
    pub fn clear_timeout(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        before != self.timers.len()
    }

    /// When a pending timer will fire
    pub fn due_at(&self, id: TimerId) -> Option<f64> {
        self.timers.iter().find(|timer| timer.id == id).map(|timer| timer.due_ms)
    }

    /// Queues a task for the next rendered frame
    pub fn request_frame(&mut self, task: T) -> FrameId {
        let id = FrameId(self.allocate_id());
        self.frames.push((id, task));
        id
    }

    pub fn cancel_frame(&mut self, id: FrameId) -> bool {
        let before = self.frames.len();
        self.frames.retain(|(frame, _)| *frame != id);
        before != self.frames.len()
    }

    /// Removes and returns the earliest timer due at or before `until_ms`,
    /// advancing the clock to its due time. Equal due times fire in arming order.
    pub fn pop_due(&mut self, until_ms: f64) -> Option<T> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.due_ms <= until_ms)
            .min_by(|(_, a), (_, b)| {
                a.due_ms
                    .partial_cmp(&b.due_ms)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.0.cmp(&b.id.0))
            })
            .map(|(index, _)| index)?;
        let timer = self.timers.remove(index);
        self.set_now(timer.due_ms);
        Some(timer.task)
    }

    /// Everything requested for this frame. Tasks requested while these run
    /// land in the following frame.
    pub fn take_frame_tasks(&mut self) -> Vec<T> {
        std::mem::take(&mut self.frames)
            .into_iter()
            .map(|(_, task)| task)
            .collect()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    /// Iterates over pending timer tasks
    pub fn timer_tasks(&self) -> impl Iterator<Item = &T> {
        self.timers.iter().map(|timer| &timer.task)
    }

    /// Iterates over tasks waiting for the next frame
    pub fn frame_tasks(&self) -> impl Iterator<Item = &T> {
        self.frames.iter().map(|(_, task)| task)
    }
}

impl<T> Default for EventLoop<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timers_fire_in_due_order() {
        let mut events = EventLoop::new();
        events.set_timeout(50.0, "late");
        events.set_timeout(10.0, "early");
        events.set_timeout(10.0, "early-second");

        assert_eq!(events.pop_due(5.0), None);
        assert_eq!(events.pop_due(100.0), Some("early"));
        assert_eq!(events.now(), 10.0);
        assert_eq!(events.pop_due(100.0), Some("early-second"));
        assert_eq!(events.pop_due(100.0), Some("late"));
        assert_eq!(events.pop_due(100.0), None);
    }

    #[test]
    fn test_cleared_timer_never_fires() {
        let mut events = EventLoop::new();
        let id = events.set_timeout(0.0, 1);
        assert_eq!(events.due_at(id), Some(0.0));
        assert!(events.clear_timeout(id));
        assert!(!events.clear_timeout(id));
        assert_eq!(events.pop_due(1000.0), None);
    }

    #[test]
    fn test_delays_are_relative_to_now() {
        let mut events = EventLoop::new();
        events.set_now(100.0);
        let id = events.set_timeout(16.0, ());
        assert_eq!(events.due_at(id), Some(116.0));
        events.set_now(50.0);
        assert_eq!(events.now(), 100.0);
    }

    #[test]
    fn test_monotonic_clock_never_goes_back() {
        let clock = MonotonicClock::new();
        let first = clock.elapsed_ms();
        assert!(first >= 0.0);
        assert!(clock.elapsed_ms() >= first);
    }

    #[test]
    fn test_frames_are_batched() {
        let mut events = EventLoop::new();
        let first = events.request_frame('a');
        events.request_frame('b');
        assert!(events.cancel_frame(first));
        assert_eq!(events.take_frame_tasks(), vec!['b']);
        assert_eq!(events.pending_frames(), 0);
    }
}
