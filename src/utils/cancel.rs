//! Cooperative cancellation and progress reporting for the
//! slice loops. Neither touches the numbers being computed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shared flag that long-running slice loops poll between
/// slices. Cloning hands out another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag : Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    /// Requests that every computation holding this token stop
    /// at its next checkpoint.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Emitted after each slice finishes fitting. With parallel
/// fitting `completed` counts finished slices, not the index
/// of the slice that just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceProgress {
    pub slice : usize,
    pub completed : usize,
    pub total : usize,
}

pub type ProgressFn = dyn Fn(SliceProgress) + Send + Sync;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_flag() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
