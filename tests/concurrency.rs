use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use cycle_rc::{Context, Gc, Trace};

struct Payload(u64);

unsafe impl Trace for Payload {
    fn trace(&self, _ctx: &mut Context<'_>) {}
}

/// One thread holds the only strong handle and eventually drops it; a second thread repeatedly
/// tries to upgrade a weak handle. Every upgrade that succeeds must observe a fully-initialized
/// value, and once the owning thread has dropped its handle no later upgrade may succeed again.
#[test]
fn concurrent_upgrade_never_observes_a_torn_value() {
    let gc = Gc::new(Payload(0xdead_beef));
    let weak = gc.downgrade();
    let owner_done = Arc::new(AtomicBool::new(false));

    let upgrader = {
        let weak = weak.clone();
        let owner_done = Arc::clone(&owner_done);
        thread::spawn(move || {
            let mut saw_success = false;
            loop {
                match weak.upgrade() {
                    Some(upgraded) => {
                        assert_eq!(upgraded.0, 0xdead_beef);
                        saw_success = true;
                    }
                    None => {
                        if owner_done.load(Ordering::Acquire) {
                            break;
                        }
                    }
                }
            }
            saw_success
        })
    };

    thread::sleep(std::time::Duration::from_millis(1));
    drop(gc);
    owner_done.store(true, Ordering::Release);

    let saw_success = upgrader.join().expect("upgrader thread panicked");
    assert!(saw_success, "the upgrader should have observed at least one live window");
    assert!(weak.upgrade().is_none());
}

/// `Gc<T>` and `Weak<T>` are usable from multiple threads whenever `T: Send + Sync`, matching
/// `Arc`'s bound rather than `Rc`'s single-threaded restriction.
#[test]
fn gc_is_shareable_across_threads() {
    let gc = Gc::new(Payload(7));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gc = gc.clone();
            thread::spawn(move || {
                assert_eq!(gc.0, 7);
                gc.strong_count()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().expect("worker thread panicked") >= 1);
    }
}
