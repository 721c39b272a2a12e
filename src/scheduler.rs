use crate::command::Event;
use crate::session::Session;
use crate::surface::Surface;
use std::time::{Duration, Instant};

/// Fixed-interval timer driven by the caller's clock.
///
/// Missed deadlines coalesce into a single firing.
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl PeriodicTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arms the timer so it first fires one interval after `now`.
    pub fn arm(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    pub fn disarm(&mut self) {
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    /// Returns true and schedules the next deadline when the timer is due.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }

    /// Time left until the next firing, if armed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }
}

/// Runs one pass of the event loop: every pending user command in order, then
/// at most one timer tick. Returns how long the caller may sleep before the
/// next pass is needed.
pub fn pump(session: &mut Session, surface: &mut dyn Surface, now: Instant) -> Option<Duration> {
    while let Some(command) = surface.next_command() {
        dispatch(session, Event::Command(command), surface, now);
    }
    if session.timer_mut().fire(now) {
        dispatch(session, Event::Tick, surface, now);
    }
    session.timer().remaining(now)
}

fn dispatch(session: &mut Session, event: Event, surface: &mut dyn Surface, now: Instant) {
    log::trace!("Dispatching {:?}", event);
    if let Err(e) = session.handle(event, surface, now) {
        log::error!("{}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(30);

    #[test]
    fn test_timer_fires_after_interval() {
        let start = Instant::now();
        let mut timer = PeriodicTimer::new(INTERVAL);
        assert!(!timer.fire(start + INTERVAL));

        timer.arm(start);
        assert!(!timer.fire(start + Duration::from_millis(10)));
        assert!(timer.fire(start + INTERVAL));
        assert!(!timer.fire(start + INTERVAL));
        assert!(timer.fire(start + INTERVAL * 2));
    }

    #[test]
    fn test_late_pump_fires_once() {
        let start = Instant::now();
        let mut timer = PeriodicTimer::new(INTERVAL);
        timer.arm(start);
        let late = start + INTERVAL * 5;
        assert!(timer.fire(late));
        assert!(!timer.fire(late));
        assert_eq!(timer.remaining(late), Some(INTERVAL));
    }

    #[test]
    fn test_disarmed_timer_never_fires() {
        let start = Instant::now();
        let mut timer = PeriodicTimer::new(INTERVAL);
        timer.arm(start);
        timer.disarm();
        assert!(!timer.is_armed());
        assert!(!timer.fire(start + INTERVAL * 10));
        assert_eq!(timer.remaining(start), None);
    }
}
