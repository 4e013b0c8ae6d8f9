//! Shared atomic helpers for parallel nonce distribution and early-stop coordination.
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Hands out contiguous nonce ranges in increasing order.
#[derive(Debug)]
pub struct NonceSource {
    next: AtomicU64,
    end: u64,
}

impl NonceSource {
    /// Source covering `[start, end)`.
    pub const fn new(start: u64, end: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
            end,
        }
    }

    /// Reserve the next range of at most `len` nonces; `None` once the space is used up.
    #[inline]
    pub fn claim(&self, len: u64) -> Option<Range<u64>> {
        let end = self.end;
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                (cur < end).then(|| cur.saturating_add(len).min(end))
            })
            .ok()
            .map(|start| start..start.saturating_add(len).min(end))
    }
}

/// Smallest qualifying nonce seen so far, shared by every worker of a run.
#[derive(Debug)]
pub struct Watermark {
    best: AtomicU64,
}

impl Watermark {
    const UNSET: u64 = u64::MAX;

    pub const fn new() -> Self {
        Self {
            best: AtomicU64::new(Self::UNSET),
        }
    }

    /// Record a hit; returns `true` if it lowered the watermark.
    pub fn offer(&self, nonce: u64) -> bool {
        self.best.fetch_min(nonce, Ordering::SeqCst) > nonce
    }

    /// Current bound: nonces at or above it cannot improve the result.
    #[inline]
    pub fn bound(&self) -> u64 {
        self.best.load(Ordering::Relaxed)
    }

    /// The best nonce, if any hit was recorded.
    pub fn get(&self) -> Option<u64> {
        match self.best.load(Ordering::SeqCst) {
            Self::UNSET => None,
            nonce => Some(nonce),
        }
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::new()
    }
}

/// Session-internal stop signal (deadline, spawn failure).
#[derive(Debug)]
pub struct StopFlag {
    stop: AtomicBool,
}

impl StopFlag {
    pub const fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn force_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle used to cancel a running session from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_source_claims_contiguous_ranges() {
        let ns = NonceSource::new(5, 100);
        assert_eq!(ns.claim(10), Some(5..15));
        assert_eq!(ns.claim(10), Some(15..25));
    }

    #[test]
    fn nonce_source_clamps_to_end() {
        let ns = NonceSource::new(0, 12);
        assert_eq!(ns.claim(10), Some(0..10));
        assert_eq!(ns.claim(10), Some(10..12));
        assert_eq!(ns.claim(10), None);
    }

    #[test]
    fn nonce_source_does_not_wrap_near_max() {
        let ns = NonceSource::new(u64::MAX - 3, u64::MAX);
        assert_eq!(ns.claim(10), Some(u64::MAX - 3..u64::MAX));
        assert_eq!(ns.claim(10), None);
    }

    #[test]
    fn watermark_keeps_minimum() {
        let wm = Watermark::new();
        assert_eq!(wm.get(), None);
        assert!(wm.offer(40));
        assert!(!wm.offer(90));
        assert!(wm.offer(12));
        assert_eq!(wm.get(), Some(12));
        assert_eq!(wm.bound(), 12);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn stop_flag_latches() {
        let stop = StopFlag::new();
        assert!(!stop.should_stop());
        stop.force_stop();
        assert!(stop.should_stop());
    }
}
