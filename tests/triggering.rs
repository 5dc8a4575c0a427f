#![cfg(feature = "auto-collect")]

use std::cell::RefCell;

use cycle_rc::{stats, Context, Gc, Trace};

struct Big {
    _array: [i64; 4096],
}

impl Default for Big {
    fn default() -> Self {
        Big { _array: [0; 4096] }
    }
}

struct Traceable {
    inner: RefCell<Option<Gc<Traceable>>>,
    _big: Big,
}

unsafe impl Trace for Traceable {
    fn trace(&self, ctx: &mut Context<'_>) {
        self.inner.trace(ctx);
    }
}

fn new_self_cycle() -> Gc<Traceable> {
    let node = Gc::new(Traceable { inner: RefCell::new(None), _big: Default::default() });
    *node.inner.borrow_mut() = Some(node.clone());
    node
}

/// A self-cycle with no external handle sits in the young generation forever under pure
/// refcounting. Allocating enough further objects should trip the adaptive threshold and trigger
/// an automatic collection that reclaims it, without any explicit call to `collect`.
#[test]
fn enough_allocations_trigger_an_automatic_collection() {
    let before = stats().young_count;
    drop(new_self_cycle());
    let after_leak = stats().young_count;
    assert!(after_leak > before, "a leaked self-cycle should still be tracked");

    for _ in 0..200_000 {
        let _ = Gc::new(Traceable { inner: RefCell::new(None), _big: Default::default() });
    }

    // Every allocation in the loop above was acyclic and immediately dropped, so it cannot have
    // contributed to young_count itself; if it shrank below after_leak, an automatic collection
    // must have run and reclaimed the earlier self-cycle.
    assert!(stats().young_count < after_leak);
}

/// A cycle that is still externally referenced is never collected, no matter how many further
/// allocations trip the threshold.
#[test]
fn a_referenced_cycle_survives_automatic_collection() {
    let kept = new_self_cycle();

    for _ in 0..200_000 {
        let _ = Gc::new(Traceable { inner: RefCell::new(None), _big: Default::default() });
    }

    assert!(kept.is_live());
    assert!(kept.inner.borrow().is_some());
}
