//! Reference-counted request handles.
//!
//! A transport wraps each decoded request in a [`RefCounted`] with a count of
//! one. Every stage that needs the payload beyond the current call takes its
//! own unit with [`RefCounted::retain`] and gives it back with
//! [`RefCounted::release`]. The release action runs exactly once, on the
//! decrement that brings the count to zero.
//!
//! # Ownership
//!
//! ```text
//! transport: RefCounted::new(req)        count = 1
//! endpoint:  let h = req.retain()        count = 2
//! endpoint:  h.release()                 count = 1
//! transport: req.release()               count = 0 → release action
//! ```
//!
//! Each handle owns exactly one unit. `release` consumes the handle, so a
//! handle cannot be released twice. Dropping a handle that was never
//! released gives its unit back, which keeps error and panic paths balanced.

use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type ReleaseAction<T> = Box<dyn FnOnce(&T) + Send>;

struct Shared<T> {
    value: T,
    count: AtomicUsize,
    on_release: Mutex<Option<ReleaseAction<T>>>,
}

/// One unit of shared ownership over a request payload.
///
/// Handles alias the same payload; retaining never copies `T`.
/// Thread-safe: handles may be retained and released from any thread.
pub struct RefCounted<T> {
    // `None` only after the unit has been given back (inside `release`/`drop`).
    shared: Option<Arc<Shared<T>>>,
}

impl<T> RefCounted<T> {
    /// Wrap `value` with a count of one and no release action.
    pub fn new(value: T) -> Self {
        Self::from_parts(value, None)
    }

    /// Wrap `value` with a count of one.
    ///
    /// `action` runs exactly once, when the last unit is released. Use it to
    /// return buffers to a pool or to record that processing finished.
    pub fn with_release<F>(value: T, action: F) -> Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        Self::from_parts(value, Some(Box::new(action)))
    }

    fn from_parts(value: T, on_release: Option<ReleaseAction<T>>) -> Self {
        Self {
            shared: Some(Arc::new(Shared {
                value,
                count: AtomicUsize::new(1),
                on_release: Mutex::new(on_release),
            })),
        }
    }

    fn shared(&self) -> &Arc<Shared<T>> {
        match &self.shared {
            Some(shared) => shared,
            None => unreachable!("RefCounted handle used after release"),
        }
    }

    /// Payload access, valid for as long as this handle lives.
    pub fn get(&self) -> &T {
        &self.shared().value
    }

    /// Take an additional unit of ownership.
    ///
    /// The returned handle is an independent owner and must itself be
    /// released (or dropped).
    pub fn retain(&self) -> RefCounted<T> {
        let shared = self.shared();
        // A live handle always owns a unit, so the count is at least one here.
        let prev = shared.count.fetch_add(1, Ordering::Relaxed);
        assert!(prev > 0, "retain() on a fully released object");
        RefCounted {
            shared: Some(Arc::clone(shared)),
        }
    }

    /// Give this handle's unit back.
    ///
    /// Returns `true` if this call released the last unit (and ran the
    /// release action).
    pub fn release(mut self) -> bool {
        self.give_back()
    }

    /// Snapshot of the current count. Racy by nature; for diagnostics and tests.
    pub fn ref_count(&self) -> usize {
        self.shared().count.load(Ordering::Acquire)
    }

    fn give_back(&mut self) -> bool {
        let Some(shared) = self.shared.take() else {
            return false;
        };

        let prev = shared.count.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "release() without a matching retain()");
        if prev != 1 {
            return false;
        }

        // Run the action after the guard is gone; it may touch other handles.
        let action = shared.on_release.lock().take();
        if let Some(action) = action {
            action(&shared.value);
        }
        tracing::trace!("reference-counted request fully released");
        true
    }
}

impl<T> Drop for RefCounted<T> {
    fn drop(&mut self) {
        self.give_back();
    }
}

impl<T> Deref for RefCounted<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T: fmt::Debug> fmt::Debug for RefCounted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shared {
            Some(shared) => f
                .debug_struct("RefCounted")
                .field("count", &shared.count.load(Ordering::Relaxed))
                .field("value", &shared.value)
                .finish(),
            None => f.write_str("RefCounted(<released>)"),
        }
    }
}
