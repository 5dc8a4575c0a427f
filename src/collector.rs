//! The global trial-deletion cycle collector.
//!
//! Every [`Gc`][`crate::Gc`] allocated with [`Gc::new`][`crate::Gc::new`] is registered here. The
//! collector never runs on its own background thread; it only ever runs synchronously, either
//! because an allocation tripped a generation's adaptive threshold or because the mutator asked
//! for a collection directly. A single global [`Mutex`] serializes every collection regardless of
//! which thread triggers it — the algorithm itself is not designed to run concurrently with
//! itself, only concurrently with ordinary [`Gc`]/[`Weak`] clone and drop traffic on other
//! objects.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;
use std::sync::{Mutex, OnceLock};

use log::{debug, trace};

use crate::config;
use crate::gc::dealloc_gc;
use crate::header::GcHeader;
use crate::threshold::ThresholdEstimator;
use crate::trace::Context;

#[derive(Clone, Copy)]
struct TrackedPtr(NonNull<GcHeader>);

// SAFETY: a TrackedPtr is only ever read or written while `STATE`'s mutex is held, and is used
// purely as an opaque identity token plus a dispatch point through the object's own vtable.
unsafe impl Send for TrackedPtr {}

impl PartialEq for TrackedPtr {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for TrackedPtr {}

impl Hash for TrackedPtr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Which generation(s) a collection considers. Collecting the old generation sweeps the whole
/// heap; collecting the young generation only considers objects that have not yet survived a
/// collection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Generation {
    Young,
    Old,
}

struct CollectorState {
    young: HashSet<TrackedPtr>,
    old: HashSet<TrackedPtr>,
    young_threshold: ThresholdEstimator,
    old_threshold: ThresholdEstimator,
    pause_depth: u32,
    collecting: bool,
}

impl CollectorState {
    fn new() -> CollectorState {
        let config = config::current();
        CollectorState {
            young: HashSet::new(),
            old: HashSet::new(),
            young_threshold: ThresholdEstimator::new(config.young_min_threshold as f64),
            old_threshold: ThresholdEstimator::new(config.old_min_threshold as f64),
            pause_depth: 0,
            collecting: false,
        }
    }
}

fn state() -> &'static Mutex<CollectorState> {
    static STATE: OnceLock<Mutex<CollectorState>> = OnceLock::new();
    STATE.get_or_init(|| Mutex::new(CollectorState::new()))
}

/// Registers a freshly allocated object with the young generation, then, if the `auto-collect`
/// feature and [`CollectorConfig::auto_collect`][`crate::CollectorConfig::auto_collect`] both
/// allow it and not [`pause`]d, runs a collection when a generation's threshold has been
/// exceeded: young takes priority over old, matching the order an allocation path would notice
/// them in.
///
/// Compiled away entirely (to a no-op) when the `cycle-detection` feature is disabled, leaving
/// plain reference counting with no registration overhead.
#[cfg(feature = "cycle-detection")]
pub(crate) fn track(header: NonNull<GcHeader>) {
    let generation = {
        let mut guard = state().lock().unwrap();
        guard.young.insert(TrackedPtr(header));
        decide_auto_collect(&guard)
    };
    if let Some(generation) = generation {
        collect(generation);
    }
}

#[cfg(not(feature = "cycle-detection"))]
pub(crate) fn track(_header: NonNull<GcHeader>) {}

#[cfg(feature = "auto-collect")]
fn decide_auto_collect(guard: &CollectorState) -> Option<Generation> {
    if !config::current().auto_collect || guard.collecting || guard.pause_depth != 0 {
        return None;
    }
    if guard.young.len() >= guard.young_threshold.threshold() {
        Some(Generation::Young)
    } else if guard.old.len() >= guard.old_threshold.threshold() {
        Some(Generation::Old)
    } else {
        None
    }
}

#[cfg(not(feature = "auto-collect"))]
fn decide_auto_collect(_guard: &CollectorState) -> Option<Generation> {
    None
}

/// Removes an object from whichever generation set currently holds it. Called by `Gc::drop` when
/// an ordinary (non-cyclic) reference count reaches zero, so the collector never has to trace a
/// dangling pointer.
#[cfg(feature = "cycle-detection")]
pub(crate) fn untrack(header: NonNull<GcHeader>) {
    let mut guard = state().lock().unwrap();
    let key = TrackedPtr(header);
    guard.young.remove(&key);
    guard.old.remove(&key);
}

#[cfg(not(feature = "cycle-detection"))]
pub(crate) fn untrack(_header: NonNull<GcHeader>) {}

/// Suspends automatic collection triggers. Nestable; collection resumes once every [`pause`] has
/// a matching [`resume`]. Manual [`collect`] calls still run while paused.
pub(crate) fn pause() {
    state().lock().unwrap().pause_depth += 1;
}

/// Reverses one [`pause`].
pub(crate) fn resume() {
    let mut guard = state().lock().unwrap();
    guard.pause_depth = guard.pause_depth.saturating_sub(1);
}

/// Snapshot of collector bookkeeping, exposed for introspection and tests.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Stats {
    pub(crate) young_count: usize,
    pub(crate) old_count: usize,
    pub(crate) young_threshold: usize,
    pub(crate) old_threshold: usize,
}

pub(crate) fn stats() -> Stats {
    let guard = state().lock().unwrap();
    Stats {
        young_count: guard.young.len(),
        old_count: guard.old.len(),
        young_threshold: guard.young_threshold.threshold(),
        old_threshold: guard.old_threshold.threshold(),
    }
}

/// Runs one trial-deletion pass over `generation`, unconditionally, and returns the number of
/// objects reclaimed.
///
/// A re-entrant call — made from within a destructor this very collection is running, via an
/// allocation that immediately trips its own threshold — returns `0` immediately without
/// collecting anything, per the state check in step 1 of the algorithm.
pub(crate) fn collect(generation: Generation) -> usize {
    let mut guard = state().lock().unwrap();
    if guard.collecting {
        return 0;
    }
    guard.collecting = true;

    let candidates: Vec<TrackedPtr> = match generation {
        Generation::Young => guard.young.iter().copied().collect(),
        Generation::Old => guard.young.iter().chain(guard.old.iter()).copied().collect(),
    };
    trace!("collecting {} candidates ({:?} generation)", candidates.len(), generation);

    let candidate_set: HashSet<TrackedPtr> = candidates.iter().copied().collect();

    // Step 1: snapshot every candidate's current strong count into its scratch field.
    for &TrackedPtr(header) in &candidates {
        // SAFETY: candidates are all currently-tracked, live allocations.
        unsafe {
            let meta = &header.as_ref().meta;
            meta.set_out_ref(meta.strong() as isize);
        }
    }

    // Step 2: subtract every internal edge from its target's scratch field. An edge pointing
    // outside the candidate set is left untouched — it is a real external root that this pass
    // has no way to verify the lifetime of.
    for &TrackedPtr(header) in &candidates {
        let mut visitor = |child: NonNull<GcHeader>| {
            if candidate_set.contains(&TrackedPtr(child)) {
                // SAFETY: `child` is a member of the candidate set, so it is live.
                unsafe { child.as_ref().meta.dec_out_ref() };
            }
        };
        let mut ctx = Context::new(&mut visitor);
        // SAFETY: `header` is a member of the candidate set, so it is live.
        unsafe { GcHeader::trace(header, &mut ctx) };
    }

    // Steps 3-4: objects whose scratch field is still positive after subtracting internal edges
    // have a real external owner and seed the reachability worklist; everything transitively
    // reachable from them (staying inside the candidate set) is live too.
    let mut reachable: HashSet<TrackedPtr> = HashSet::new();
    let mut worklist: Vec<TrackedPtr> = Vec::new();
    for &tp @ TrackedPtr(header) in &candidates {
        // SAFETY: candidate, therefore live.
        if unsafe { header.as_ref().meta.out_ref() } > 0 && reachable.insert(tp) {
            worklist.push(tp);
        }
    }
    while let Some(TrackedPtr(header)) = worklist.pop() {
        let mut visitor = |child: NonNull<GcHeader>| {
            let child_tp = TrackedPtr(child);
            if candidate_set.contains(&child_tp) && reachable.insert(child_tp) {
                worklist.push(child_tp);
            }
        };
        let mut ctx = Context::new(&mut visitor);
        // SAFETY: `header` was itself inserted into `reachable`/`worklist` as a candidate.
        unsafe { GcHeader::trace(header, &mut ctx) };
    }

    // Step 5: every unreached candidate is garbage. Condemn it now, before any destructor in the
    // group runs, so that a sibling's destructor observing it through `Gc::is_live` sees `false`.
    let mut garbage: Vec<TrackedPtr> = Vec::new();
    for &tp @ TrackedPtr(header) in &candidates {
        if !reachable.contains(&tp) {
            // SAFETY: candidate, therefore live (for now).
            unsafe { header.as_ref().meta.zero_strong() };
            garbage.push(tp);
        }
    }

    // Step 6: drop garbage from the generation sets; promote every survivor that was a young
    // candidate into the old generation, since it has now outlived a collection.
    for &tp in &garbage {
        guard.young.remove(&tp);
        guard.old.remove(&tp);
    }
    for &tp in &candidates {
        if reachable.contains(&tp) {
            guard.old.insert(tp);
            guard.young.remove(&tp);
        }
    }

    // Step 7: feed the post-collection survivor count back into the adaptive estimator, not the
    // pre-collection candidate count — garbage that gets reclaimed must not inflate the estimate.
    let survivors = (candidates.len() - garbage.len()) as f64;
    match generation {
        Generation::Young => guard.young_threshold.update(survivors),
        Generation::Old => guard.old_threshold.update(survivors),
    }

    debug!(
        "collected {} garbage of {} candidates ({:?} generation)",
        garbage.len(),
        candidates.len(),
        generation
    );

    // Step 8: release the mutex before destroying anything, so that other threads' ordinary
    // Gc/Weak traffic on unrelated objects is never blocked behind destructor execution.
    // `collecting` stays true across the whole deletion loop below and is only reset once every
    // destructor has run, so a re-entrant collect() (including one tripped by an allocation made
    // from inside a destructor) still sees the collector busy and returns 0 instead of tracing a
    // graph whose destructors are still mutating it out from under the lock.
    drop(guard);

    let reclaimed = garbage.len();
    for TrackedPtr(header) in garbage {
        // SAFETY: the object was condemned above and removed from every tracked set; nothing
        // else can reach it.
        unsafe {
            GcHeader::drop_value(header);
            if header.as_ref().meta.dec_weak() == 1 {
                dealloc_gc(header);
            }
        }
    }

    state().lock().unwrap().collecting = false;
    reclaimed
}

/// Walks both generations, zeroing every remaining object's strong count, destroying every
/// object, and then freeing every remaining `Meta`. Ignores cycles and external references,
/// since the process is ending; intended to be called once, near the end of `main`.
pub(crate) fn shutdown() {
    let all: Vec<TrackedPtr> = {
        let mut guard = state().lock().unwrap();
        let young: Vec<_> = guard.young.drain().collect();
        let old: Vec<_> = guard.old.drain().collect();
        young.into_iter().chain(old).collect()
    };

    for &TrackedPtr(header) in &all {
        // SAFETY: every object in `all` was tracked (hence live) until this pass.
        unsafe { header.as_ref().meta.zero_strong() };
    }
    for &TrackedPtr(header) in &all {
        // SAFETY: this object has not been destroyed yet; destroying it now is the first and
        // only time any code will do so.
        unsafe { GcHeader::drop_value(header) };
    }
    for TrackedPtr(header) in all {
        // SAFETY: the value was just destroyed above; only the backing memory remains.
        unsafe {
            if header.as_ref().meta.dec_weak() == 1 {
                dealloc_gc(header);
            }
        }
    }
}
