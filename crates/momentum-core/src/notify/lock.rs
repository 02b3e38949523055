use std::sync::atomic::{AtomicBool, Ordering};

/// At-most-once guard for one challenge's failure notification.
///
/// `try_acquire` checks and sets in a single atomic step, so two callers
/// racing on the same lock can never both proceed. Once a guard has been
/// handed out the lock is spent: dropping the guard (on success, error or
/// unwinding) releases the in-flight flag and marks the notification sent.
#[derive(Debug, Default)]
pub struct NotificationLock {
    sending: AtomicBool,
    sent: AtomicBool,
}

impl NotificationLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock unless it is held or already spent.
    pub fn try_acquire(&self) -> Option<LockGuard<'_>> {
        if self.sent.load(Ordering::Acquire) {
            return None;
        }
        if self
            .sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        // A previous holder may have finished between the two loads.
        if self.sent.load(Ordering::Acquire) {
            self.sending.store(false, Ordering::Release);
            return None;
        }
        Some(LockGuard { lock: self })
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::Acquire)
    }
}

/// Proof of holding a [`NotificationLock`].
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a NotificationLock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.sent.store(true, Ordering::Release);
        self.lock.sending.store(false, Ordering::Release);
    }
}
