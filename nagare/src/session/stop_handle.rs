use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::backends::CancellationToken;

/// Cooperative stop flag for a running generation.
///
/// Clones share state and may be moved to other threads. Stopping takes
/// effect at the next token boundary and also cancels the inference call
/// in flight.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    cancellation: CancellationToken,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.cancellation.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
        self.cancellation.reset();
    }

    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_shared_between_clones() {
        let handle = StopHandle::new();
        let remote = handle.clone();
        let cancellation = handle.cancellation();

        std::thread::spawn(move || remote.stop()).join().unwrap();
        assert!(handle.is_stopped());
        assert!(cancellation.is_cancelled());

        handle.reset();
        assert!(!handle.is_stopped());
        assert!(!cancellation.is_cancelled());
    }
}
