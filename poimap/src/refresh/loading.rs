//! Saturating loading indicator.
//!
//! Several fetches can overlap (a cancelled one still unwinding while its
//! replacement runs). The indicator therefore counts in-flight fetches rather
//! than flipping a boolean, and only reports a change on 0→1 and 1→0.

/// Counts in-flight fetches and derives a single loading flag.
///
/// Every method returns the flag transition it caused, if any, so the owner
/// can publish it in order with its other notifications.
#[derive(Debug, Default)]
pub struct LoadingTracker {
    in_flight: usize,
    reported: bool,
}

impl LoadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A network fetch started.
    pub fn begin(&mut self) -> Option<bool> {
        self.in_flight += 1;
        if self.reported {
            return None;
        }
        self.reported = true;
        Some(true)
    }

    /// A network fetch finished, whatever its outcome.
    pub fn end(&mut self) -> Option<bool> {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.settle()
    }

    /// Clear the indicator if nothing is outstanding.
    ///
    /// Called after a cache hit; a no-op while any fetch is in flight.
    pub fn settle(&mut self) -> Option<bool> {
        if self.in_flight == 0 && self.reported {
            self.reported = false;
            Some(false)
        } else {
            None
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }
}
