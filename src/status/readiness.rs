//! Readiness signaling for an external health-check surface.

use std::sync::Mutex;

/// Receives readiness transitions from runners.
pub trait ReadinessSignal: Send + Sync {
    /// Called before client and engine setup.
    fn raise_not_ready(&self);

    /// Called after setup, before the test loop starts.
    fn raise_ready(&self);
}

#[derive(Debug, Default)]
struct ReadinessState {
    pending: u32,
    raised: bool,
}

/// Tracks readiness across all runners.
///
/// Up once at least one runner raised readiness and every
/// `raise_not_ready` has been matched by a `raise_ready`.
#[derive(Debug, Default)]
pub struct Readiness {
    state: Mutex<ReadinessState>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_up(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.raised && state.pending == 0
    }
}

impl ReadinessSignal for Readiness {
    fn raise_not_ready(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.pending += 1;
    }

    fn raise_ready(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.pending == 0 {
            log::warn!("Readiness raised without preceding not-ready signal");
        }
        state.pending = state.pending.saturating_sub(1);
        state.raised = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initially_not_up() {
        assert!(!Readiness::new().is_up());
    }

    #[test]
    fn test_not_ready_then_ready() {
        let readiness = Readiness::new();
        readiness.raise_not_ready();
        assert!(!readiness.is_up());
        readiness.raise_ready();
        assert!(readiness.is_up());
    }

    #[test]
    fn test_waits_for_all_runners() {
        let readiness = Readiness::new();
        readiness.raise_not_ready();
        readiness.raise_not_ready();
        readiness.raise_ready();
        assert!(!readiness.is_up());
        readiness.raise_ready();
        assert!(readiness.is_up());
    }

    #[test]
    fn test_unmatched_ready_does_not_underflow() {
        let readiness = Readiness::new();
        readiness.raise_ready();
        readiness.raise_ready();
        assert!(readiness.is_up());
        readiness.raise_not_ready();
        assert!(!readiness.is_up());
    }
}
