use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Caps the number of concurrently streaming sessions.
///
/// Cloning shares the same counter.
#[derive(Debug, Clone)]
pub struct SessionLimiter {
    active: Arc<AtomicUsize>,
    max: usize,
}

impl SessionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            max,
        }
    }

    /// Claims a slot, or returns `None` if the cap is reached.
    ///
    /// The counter is incremented first and rolled back on rejection, so
    /// concurrent callers never admit more than `max` sessions.
    pub fn try_acquire(&self) -> Option<SessionSlot> {
        let now_active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        if now_active > self.max {
            self.active.fetch_sub(1, Ordering::AcqRel);
            return None;
        }
        Some(SessionSlot {
            active: Arc::clone(&self.active),
        })
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// An admitted session's claim on the limiter. Released exactly once, on drop.
#[derive(Debug)]
#[must_use = "dropping the slot releases it immediately"]
pub struct SessionSlot {
    active: Arc<AtomicUsize>,
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_over_capacity() {
        let limiter = SessionLimiter::new(2);
        let a = limiter.try_acquire();
        let b = limiter.try_acquire();
        let c = limiter.try_acquire();
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(c.is_none());
        assert_eq!(limiter.active(), 2);
    }

    #[test]
    fn test_drop_releases_slot() {
        let limiter = SessionLimiter::new(1);
        let slot = limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_none());
        drop(slot);
        assert_eq!(limiter.active(), 0);
        assert!(limiter.try_acquire().is_some());
    }

    #[test]
    fn test_clones_share_counter() {
        let limiter = SessionLimiter::new(1);
        let other = limiter.clone();
        let _slot = limiter.try_acquire().unwrap();
        assert!(other.try_acquire().is_none());
        assert_eq!(other.active(), 1);
    }

    #[test]
    fn test_slot_released_on_panic() {
        let limiter = SessionLimiter::new(1);
        let cloned = limiter.clone();
        let result = std::thread::spawn(move || {
            let _slot = cloned.try_acquire().unwrap();
            panic!("session blew up");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(limiter.active(), 0);
    }
}
