//! A reference-counted smart pointer with a trial-deletion cycle collector.
//!
//! [`Gc<T>`] behaves like an ordinary reference-counted pointer: cloning it is cheap and shares
//! the allocation, and the value is dropped as soon as the last clone goes away. Unlike a plain
//! `Rc`, a group of [`Gc`]s that only reference each other — a cycle — is still reclaimed,
//! because periodically (or on request) the collector runs a trial-deletion pass over recently
//! allocated objects and frees whichever groups turn out to have no references from outside the
//! group.
//!
//! Any type stored in a [`Gc`] must implement [`Trace`], which reports the [`Gc`] fields it owns
//! directly. In the common case this is generated with `#[derive(Trace)]`:
//!
//! ```
//! use cycle_rc::{Gc, Trace};
//! use std::cell::RefCell;
//!
//! #[derive(Trace)]
//! struct Node {
//!     next: RefCell<Option<Gc<Node>>>,
//! }
//!
//! let a = Gc::new(Node { next: RefCell::new(None) });
//! let b = Gc::new(Node { next: RefCell::new(None) });
//! *a.next.borrow_mut() = Some(b.clone());
//! *b.next.borrow_mut() = Some(a.clone());
//! drop(a);
//! drop(b);
//! cycle_rc::collect();
//! ```

mod collector;
mod config;
mod gc;
mod header;
mod meta;
mod threshold;
pub mod trace;
mod weak;

pub use config::{configure, CollectorConfig, ConfigError};
pub use gc::Gc;
pub use trace::{Context, Trace};
pub use weak::Weak;

#[cfg(feature = "derive")]
pub use cycle_rc_derive::Trace;

/// Runs one trial-deletion pass over the young generation: objects that have not yet survived a
/// collection. Returns the number of objects reclaimed.
///
/// This is also what [`Gc::new`] triggers automatically (when the `auto-collect` feature and
/// [`CollectorConfig::auto_collect`] are both enabled) once the young generation's adaptive
/// threshold is exceeded. A call made re-entrantly from within a destructor this very collection
/// is running returns `0` without collecting anything.
pub fn collect() -> usize {
    collector::collect(collector::Generation::Young)
}

/// Runs one trial-deletion pass over the whole heap (both generations). Returns the number of
/// objects reclaimed.
///
/// More expensive than [`collect`], since it re-scans every object that has already survived a
/// prior collection, but necessary to reclaim a cycle that spans both generations.
pub fn collect_old() -> usize {
    collector::collect(collector::Generation::Old)
}

/// Reclaims every remaining tracked object, ignoring cycles and external references.
///
/// Intended to be called once, near the end of `main`, in programs that want deterministic
/// teardown of managed objects rather than leaving them for the allocator to leak at exit.
pub fn shutdown() {
    collector::shutdown();
}

/// Suspends automatic collection triggers until a matching [`resume`]. Calls nest: collection
/// only resumes once every [`pause`] has been matched. [`collect`] and [`collect_old`] still run
/// normally while paused.
pub fn pause() {
    collector::pause();
}

/// Reverses one [`pause`].
pub fn resume() {
    collector::resume();
}

/// Runs `f` with automatic collection suspended, then resumes regardless of whether `f` panics.
pub fn paused<R>(f: impl FnOnce() -> R) -> R {
    pause();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    resume();
    match result {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// Point-in-time counts and adaptive thresholds for both generations, for diagnostics and tests.
#[derive(Clone, Copy, Debug)]
pub struct Stats {
    pub young_count: usize,
    pub old_count: usize,
    pub young_threshold: usize,
    pub old_threshold: usize,
}

/// Returns a snapshot of the collector's current bookkeeping.
pub fn stats() -> Stats {
    let collector::Stats { young_count, old_count, young_threshold, old_threshold } = collector::stats();
    Stats { young_count, old_count, young_threshold, old_threshold }
}
