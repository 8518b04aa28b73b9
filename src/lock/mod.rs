
use std::marker::PhantomData;

use parking_lot::lock_api::RawRwLock as _;
use parking_lot::RawRwLock;

/// Read/write lock with a non-blocking exclusive-acquire primitive.
///
/// The monitor uses this to elect exactly one initializer among racing
/// threads: the winner takes [`start_exclusive`][Self::start_exclusive]
/// with `no_wait` and performs the expensive first sample, the losers take
/// a momentary shared lease through [`sharing`][Self::sharing] as a cheap
/// barrier that stalls them until the winner has finished.
pub struct ShareLock {
    raw: RawRwLock,
}

impl ShareLock {
    pub const fn new() -> Self {
        Self { raw: RawRwLock::INIT }
    }

    /// Attempts to acquire exclusive access.
    ///
    /// With `no_wait`, returns `None` immediately if any holder (shared or
    /// exclusive) is present; otherwise blocks until exclusive access is
    /// granted. Dropping the returned guard releases the lock.
    pub fn start_exclusive(&self, no_wait: bool) -> Option<ExclusiveGuard<'_>> {
        if no_wait {
            if !self.raw.try_lock_exclusive() {
                return None;
            }
        } else {
            self.raw.lock_exclusive();
        }
        Some(ExclusiveGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// Runs `thunk` under a shared lease.
    ///
    /// Shared leases may coexist with each other; a shared lease is blocked
    /// while exclusive access is held and vice versa.
    pub fn sharing<R>(&self, thunk: impl FnOnce() -> R) -> R {
        self.raw.lock_shared();
        let _lease = SharedLease(&self.raw);
        thunk()
    }
}

impl Default for ShareLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to a [`ShareLock`]; released on drop.
pub struct ExclusiveGuard<'a> {
    lock: &'a ShareLock,
    // The raw lock must be released from the acquiring context.
    _not_send: PhantomData<*mut ()>,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        // The guard is only constructed after a successful acquire.
        unsafe { self.lock.raw.unlock_exclusive() }
    }
}

// Releases the lease even if the thunk panics.
struct SharedLease<'a>(&'a RawRwLock);

impl Drop for SharedLease<'_> {
    fn drop(&mut self) {
        // Only constructed after a successful `lock_shared`.
        unsafe { self.0.unlock_shared() }
    }
}
