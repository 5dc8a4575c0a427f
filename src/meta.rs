//! The per-object control block shared by every [`Gc`][`crate::Gc`] and [`Weak`][`crate::Weak`]
//! handle pointing at the same allocation.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Strong and weak reference counts, plus the collector's scratch field.
///
/// `weak` is born at 1: the object itself holds the "birth" weak slot for as long as its strong
/// count is live, and that slot is released the moment the strong count reaches zero. This is
/// what keeps the [`Meta`] allocation from being freed out from under a strong handle that is
/// still running its destructor.
pub(crate) struct Meta {
    strong: AtomicUsize,
    weak: AtomicUsize,
    /// Set once the collector has condemned this object, before any destructor in its group
    /// runs. Kept separate from `strong` because destroying a condemned group runs the group
    /// members' destructors through ordinary `Gc` drop glue, which keeps decrementing `strong`
    /// for every internal edge even after it has been forced to zero — `strong` alone would
    /// underflow and start reporting "alive" again partway through teardown.
    condemned: AtomicBool,
    /// Number of strong references from outside the set currently being collected. Only ever
    /// read or written while the collector mutex is held, so a plain `Cell` is sufficient despite
    /// [`Meta`] being reachable from multiple threads.
    out_ref: Cell<isize>,
}

// SAFETY: `out_ref` is only ever touched by the thread that currently holds the collector's
// mutex, so no two threads can observe or mutate it concurrently.
unsafe impl Sync for Meta {}

impl Meta {
    #[inline]
    pub(crate) fn new() -> Meta {
        Meta {
            strong: AtomicUsize::new(1),
            weak: AtomicUsize::new(1),
            condemned: AtomicBool::new(false),
            out_ref: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn strong(&self) -> usize {
        self.strong.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn weak(&self) -> usize {
        self.weak.load(Ordering::Relaxed)
    }

    /// The handle being cloned has already synchronized with whatever published the object, so
    /// the increment itself needs no ordering beyond atomicity.
    #[inline]
    pub(crate) fn inc_strong(&self) {
        self.strong.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the count observed *before* the decrement. A decrement that reaches zero is
    /// acquire-release so the destroyer observes every write made through every other handle.
    #[inline]
    pub(crate) fn dec_strong(&self) -> usize {
        self.strong.fetch_sub(1, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn inc_weak(&self) {
        self.weak.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn dec_weak(&self) -> usize {
        self.weak.fetch_sub(1, Ordering::AcqRel)
    }

    /// Unconditionally zeroes the strong count and marks the object condemned. Used only by the
    /// collector once it has decided an object is unreachable, before running any destructor in
    /// its group.
    #[inline]
    pub(crate) fn zero_strong(&self) {
        self.strong.store(0, Ordering::Release);
        self.condemned.store(true, Ordering::Release);
    }

    /// `true` once the collector has condemned this object. Sticky for the rest of the
    /// allocation's life, independent of whatever `strong` drifts to as the group's destructors
    /// cascade through ordinary `Gc` drop glue.
    #[inline]
    pub(crate) fn is_condemned(&self) -> bool {
        self.condemned.load(Ordering::Acquire)
    }

    /// Attempts to atomically turn a weak reference into a strong one. Fails if the strong count
    /// has already reached zero, succeeds otherwise by incrementing it.
    ///
    /// This is the only place a strong count is allowed to move away from zero.
    pub(crate) fn upgrade(&self) -> bool {
        if self.is_condemned() {
            return false;
        }
        let mut current = self.strong.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            match self.strong.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    #[inline]
    pub(crate) fn out_ref(&self) -> isize {
        self.out_ref.get()
    }

    #[inline]
    pub(crate) fn set_out_ref(&self, value: isize) {
        self.out_ref.set(value);
    }

    #[inline]
    pub(crate) fn dec_out_ref(&self) {
        self.out_ref.set(self.out_ref.get() - 1);
    }
}
