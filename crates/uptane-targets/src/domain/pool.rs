//! # Session Pools
//!
//! Sources of [`VerificationSession`]s for the service layer.
//!
//! - [`FixedSessionPool`]: `N` sessions stored inline, no allocation after construction.
//!   A session's mutex doubles as its occupancy flag.
//! - [`HeapSessionPool`]: one boxed session per acquire, never exhausted.
//!
//! Handles reset their session when dropped, so a recycled session never carries
//! keys, contexts or outputs from its previous user.

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use parking_lot::{Mutex, MutexGuard};

use super::session::VerificationSession;
use crate::ports::outbound::VerifyContext;

/// Provider of verification sessions.
pub trait SessionPool<C: VerifyContext> {
    /// Exclusive access to one session.
    type Handle<'a>: DerefMut<Target = VerificationSession<C>>
    where
        Self: 'a;

    /// Take an idle session, or `None` if every session is in use.
    fn acquire(&self) -> Option<Self::Handle<'_>>;

    /// Return a session. Equivalent to dropping the handle.
    fn release(&self, handle: Self::Handle<'_>) {
        drop(handle);
    }

    /// Total sessions, `None` when unbounded.
    fn capacity(&self) -> Option<usize>;

    /// Idle sessions, `None` when unbounded.
    fn available(&self) -> Option<usize>;
}

// =============================================================================
// Fixed pool
// =============================================================================

/// `N` inline sessions.
pub struct FixedSessionPool<C: VerifyContext, const N: usize> {
    sessions: [Mutex<VerificationSession<C>>; N],
}

impl<C: VerifyContext, const N: usize> FixedSessionPool<C, N> {
    /// Create a pool of `N` empty sessions.
    pub fn new() -> Self {
        Self {
            sessions: std::array::from_fn(|_| Mutex::new(VerificationSession::new())),
        }
    }
}

impl<C: VerifyContext, const N: usize> Default for FixedSessionPool<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: VerifyContext, const N: usize> SessionPool<C> for FixedSessionPool<C, N> {
    type Handle<'a> = PooledSession<'a, C> where Self: 'a;

    fn acquire(&self) -> Option<Self::Handle<'_>> {
        self.sessions
            .iter()
            .find_map(|session| session.try_lock())
            .map(|guard| PooledSession { guard })
    }

    fn capacity(&self) -> Option<usize> {
        Some(N)
    }

    fn available(&self) -> Option<usize> {
        Some(self.sessions.iter().filter(|s| !s.is_locked()).count())
    }
}

/// A session checked out of a [`FixedSessionPool`].
pub struct PooledSession<'a, C: VerifyContext> {
    guard: MutexGuard<'a, VerificationSession<C>>,
}

impl<C: VerifyContext> Deref for PooledSession<'_, C> {
    type Target = VerificationSession<C>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<C: VerifyContext> DerefMut for PooledSession<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl<C: VerifyContext> Drop for PooledSession<'_, C> {
    fn drop(&mut self) {
        self.guard.reset();
    }
}

// =============================================================================
// Heap pool
// =============================================================================

/// Allocates a fresh session for every acquire.
pub struct HeapSessionPool<C> {
    _context: PhantomData<fn() -> C>,
}

impl<C: VerifyContext> HeapSessionPool<C> {
    /// Create the pool.
    pub fn new() -> Self {
        Self {
            _context: PhantomData,
        }
    }
}

impl<C: VerifyContext> Default for HeapSessionPool<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: VerifyContext> SessionPool<C> for HeapSessionPool<C> {
    type Handle<'a> = Box<VerificationSession<C>> where Self: 'a;

    fn acquire(&self) -> Option<Self::Handle<'_>> {
        Some(Box::new(VerificationSession::new()))
    }

    fn capacity(&self) -> Option<usize> {
        None
    }

    fn available(&self) -> Option<usize> {
        None
    }
}
