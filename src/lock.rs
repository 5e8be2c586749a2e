//! Lock Discipline Module
//!
//! Scoped mutual exclusion around the cache state. Public cache operations
//! acquire a real guard; nested internal calls receive a no-op guard that
//! reborrows the already locked state instead of locking again, which would
//! deadlock on the non-reentrant mutex.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{CacheError, Result};

// == Lock Kind ==
/// How a [`CacheLock`] acquires its mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LockKind {
    /// Wait as long as it takes.
    #[default]
    Blocking,
    /// Give up with [`CacheError::LockTimeout`] after the given duration.
    Timeout(Duration),
}

// == Cache Lock ==
/// A mutex over `T` whose acquisition policy is fixed at construction.
#[derive(Debug)]
pub struct CacheLock<T> {
    inner: Mutex<T>,
    kind: LockKind,
}

impl<T> CacheLock<T> {
    /// Wraps `value` in a lock of the given kind.
    pub fn new(value: T, kind: LockKind) -> Self {
        Self {
            inner: Mutex::new(value),
            kind,
        }
    }

    /// Returns the acquisition policy.
    pub fn kind(&self) -> LockKind {
        self.kind
    }

    // == Acquire ==
    /// Acquires the real lock.
    ///
    /// With [`LockKind::Timeout`] this fails instead of blocking forever,
    /// including when the calling thread already holds the lock.
    pub fn acquire(&self) -> Result<Guard<'_, T>> {
        match self.kind {
            LockKind::Blocking => Ok(Guard::Locked(self.inner.lock())),
            LockKind::Timeout(timeout) => self
                .inner
                .try_lock_for(timeout)
                .map(Guard::Locked)
                .ok_or(CacheError::LockTimeout(timeout)),
        }
    }
}

// == Guard ==
/// Access to locked state, either owning the mutex guard or borrowing from
/// an outer guard that does.
pub enum Guard<'a, T> {
    /// Holds the real mutex until dropped.
    Locked(MutexGuard<'a, T>),
    /// Performs no synchronization; the caller's outer guard is still held.
    NoOp(&'a mut T),
}

impl<T> Guard<'_, T> {
    /// Hands out a no-op guard for a nested call made under this guard.
    pub fn nested(&mut self) -> Guard<'_, T> {
        trace!("passing no-op guard to nested call");
        Guard::NoOp(&mut **self)
    }

    /// Returns true if this guard performs no synchronization itself.
    pub fn is_no_op(&self) -> bool {
        matches!(self, Guard::NoOp(_))
    }
}

impl<T> Deref for Guard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Guard::Locked(guard) => &**guard,
            Guard::NoOp(state) => &**state,
        }
    }
}

impl<T> DerefMut for Guard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match self {
            Guard::Locked(guard) => &mut **guard,
            Guard::NoOp(state) => &mut **state,
        }
    }
}
