//! Cancellable deadline used to tell a click from a press-and-hold.
//!
//! Time is whatever clock the host drives the view with, in seconds
//! (egui reports `InputState::time` this way).

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ClickTimer {
    deadline: Option<f64>,
}

impl ClickTimer {
    pub fn start(&mut self, now: f64, timeout: f64) {
        self.deadline = Some(now + timeout.max(0.0));
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns whether a pending deadline was dropped.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Consume the timer on release. `true` means the release beat the deadline.
    pub fn release(&mut self, now: f64) -> bool {
        match self.deadline.take() {
            Some(deadline) => now <= deadline,
            None => false,
        }
    }

    /// Drop the deadline once it has passed. Returns `true` if it expired now.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.deadline {
            Some(deadline) if now > deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
