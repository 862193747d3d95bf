#![forbid(unsafe_code)]

//! The coalescing render scheduler.
//!
//! One render may be in flight at a time. [`RenderScheduler::request`] sets
//! a pending flag; further requests before the next scheduling opportunity
//! are coalesced, so N mutations within one quantum produce exactly one
//! render. The host's call to [`RenderScheduler::run_if_pending`] *is* the
//! scheduling opportunity (the frame-boundary equivalent of the cooperative
//! model).
//!
//! # Invariants
//!
//! 1. The pending guard clears only after the render closure completes.
//! 2. Requests made *during* a render are deferred into the next cycle,
//!    never lost and never run re-entrantly.
//! 3. A nested `run_if_pending` during a render is a no-op.
//!
//! # Failure Modes
//!
//! If the render closure panics, the in-render flag stays set and the
//! scheduler goes inert; this is deliberate, since the single-threaded host
//! is unwinding anyway.

use std::cell::Cell;

#[derive(Debug, Default)]
pub struct RenderScheduler {
    pending: Cell<bool>,
    in_render: Cell<bool>,
    deferred: Cell<bool>,
}

impl RenderScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a render at the next scheduling opportunity. Returns whether
    /// this request newly scheduled one (`false` means it was coalesced).
    pub fn request(&self) -> bool {
        if self.in_render.get() {
            self.deferred.set(true);
            return false;
        }
        if self.pending.get() {
            return false;
        }
        self.pending.set(true);
        true
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.get() || self.deferred.get()
    }

    /// Run `render` if a render is pending. Returns whether it ran.
    ///
    /// Requests arriving while `render` executes are folded into the next
    /// cycle: after this returns, [`is_pending`](Self::is_pending) reports
    /// whether another call is needed.
    pub fn run_if_pending(&self, render: impl FnOnce()) -> bool {
        if self.in_render.get() || !self.pending.get() {
            return false;
        }
        self.in_render.set(true);
        render();
        self.in_render.set(false);
        self.pending.set(self.deferred.replace(false));
        true
    }

    /// Drop any pending or deferred request (registry teardown).
    pub fn reset(&self) {
        self.pending.set(false);
        self.deferred.set(false);
    }
}
