//! Single-element latest-wins frame exchange.
//!
//! The slot owns at most one strong reference to a [`Frame`], stored as a raw
//! pointer obtained from [`Arc::into_raw`]. Both `publish` and `take` are
//! compare-and-swap loops, so the capture thread never waits on a consumer.
//! A consumer that loses a race simply sees a newer frame or none.

#![allow(unsafe_code)]

use crate::capture::{Frame, SharedFrame};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

/// Holds the most recently published frame.
#[derive(Debug)]
pub struct FrameSlot {
    latest: AtomicPtr<Frame>,
}

impl FrameSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self {
            latest: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Replaces the current frame with `frame`.
    ///
    /// The previous occupant's slot reference is released; consumers that
    /// already hold it keep it alive.
    pub fn publish(&self, frame: SharedFrame) {
        let new = Arc::into_raw(frame) as *mut Frame;
        let mut current = self.latest.load(Ordering::Acquire);
        loop {
            match self
                .latest
                .compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(previous) => {
                    Self::release(previous);
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Removes and returns the current frame, leaving the slot empty.
    pub fn take(&self) -> Option<SharedFrame> {
        let mut current = self.latest.load(Ordering::Acquire);
        loop {
            if current.is_null() {
                return None;
            }
            match self.latest.compare_exchange_weak(
                current,
                ptr::null_mut(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                // SAFETY: the pointer came from `Arc::into_raw` in `publish` and
                // the successful exchange transfers the slot's reference to us.
                Ok(taken) => return Some(unsafe { Arc::from_raw(taken) }),
                Err(actual) => current = actual,
            }
        }
    }

    /// Drops the current frame, if any.
    pub fn clear(&self) {
        drop(self.take());
    }

    /// True if no frame is held.
    pub fn is_empty(&self) -> bool {
        self.latest.load(Ordering::Acquire).is_null()
    }

    fn release(raw: *mut Frame) {
        if !raw.is_null() {
            // SAFETY: every non-null pointer stored in the slot was produced by
            // `Arc::into_raw` and is released exactly once by whoever swapped it out.
            drop(unsafe { Arc::from_raw(raw) });
        }
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FrameSlot {
    fn drop(&mut self) {
        Self::release(*self.latest.get_mut());
    }
}
