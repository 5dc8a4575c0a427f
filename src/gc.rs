use std::alloc::{self, Layout};
use std::any::TypeId;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter, Pointer};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::sync::OnceLock;

use crate::header::{GcHeader, GcVTable};
use crate::meta::Meta;
use crate::trace::{Context, Trace};
use crate::weak::Weak;

/// The allocation backing every [`Gc`]: a [`GcHeader`] (control block + vtable) directly
/// followed by the value. A single allocation hosts both, so freeing the value (on last strong
/// release) and freeing the allocation (on last weak release) are two distinct, separately
/// timed events against the same block of memory.
#[repr(C)]
pub(crate) struct GcBox<T: ?Sized> {
    header: GcHeader,
    value: T,
}

fn vtable_for<T: Trace + 'static>() -> &'static GcVTable {
    unsafe fn trace_fn<T: Trace + 'static>(this: NonNull<GcHeader>, ctx: &mut Context<'_>) {
        let typed = this.cast::<GcBox<T>>();
        Trace::trace(&typed.as_ref().value, ctx);
    }

    unsafe fn drop_value_fn<T>(this: NonNull<GcHeader>) {
        let typed = this.cast::<GcBox<T>>();
        ptr::drop_in_place(ptr::addr_of_mut!((*typed.as_ptr()).value));
    }

    // One instance of this OnceLock per monomorphization of `vtable_for`, so every distinct `T`
    // gets its own statically-allocated vtable computed (and cached) on first use.
    static VTABLE: OnceLock<GcVTable> = OnceLock::new();
    VTABLE.get_or_init(|| GcVTable {
        trace: trace_fn::<T>,
        drop_value: drop_value_fn::<T>,
        layout: Layout::new::<GcBox<T>>(),
        type_id: TypeId::of::<T>(),
    })
}

impl<T: Trace + 'static> GcBox<T> {
    fn alloc(value: T) -> NonNull<GcBox<T>> {
        let layout = Layout::new::<GcBox<T>>();
        unsafe {
            let raw = alloc::alloc(layout) as *mut GcBox<T>;
            let Some(ptr) = NonNull::new(raw) else {
                alloc::handle_alloc_error(layout);
            };
            ptr.as_ptr().write(GcBox {
                header: GcHeader { meta: Meta::new(), vtable: vtable_for::<T>() },
                value,
            });
            ptr
        }
    }
}

/// An owning, reference-counted handle to a cycle-collectable allocation.
///
/// Cloning a [`Gc`] shares the allocation and increments the strong count; dropping the last
/// clone runs the value's destructor. If the value participates in a reference cycle, plain
/// reference counting alone can never reach zero — [`crate::collect`] (or an automatic
/// collection triggered from [`Gc::new`]) is what reclaims it.
pub struct Gc<T: ?Sized + 'static> {
    ptr: NonNull<GcBox<T>>,
    _marker: PhantomData<GcBox<T>>,
}

// SAFETY: Gc<T> forwards all synchronization to Meta's atomics; the value itself is only ever
// accessed through `&T`, so Gc<T> can cross threads whenever T itself allows shared access.
unsafe impl<T: ?Sized + Sync + Send> Send for Gc<T> {}
unsafe impl<T: ?Sized + Sync + Send> Sync for Gc<T> {}

impl<T: Trace + 'static> Gc<T> {
    /// Allocates `value`, registers it with the collector's young generation, and returns a
    /// handle with a strong count of 1.
    ///
    /// # Collection
    /// This may synchronously run a young (or old) collection when the `auto-collect` feature
    /// is enabled and the relevant generation's adaptive threshold has been exceeded. The newly
    /// allocated object surviving such a collection is guaranteed, since its strong count is
    /// already 1 by the time it could be considered.
    #[must_use]
    pub fn new(value: T) -> Gc<T> {
        let ptr = GcBox::alloc(value);
        crate::collector::track(ptr.cast());
        Gc { ptr, _marker: PhantomData }
    }

    /// Allocates `value` without registering it with the collector.
    ///
    /// The result is still reference-counted and will be dropped once its last strong handle
    /// goes away, but it is never considered by trial deletion. Use this only for data that is
    /// statically known to be acyclic — putting a cycle inside a `Gc` created this way leaks it.
    #[must_use]
    pub fn new_acyclic(value: T) -> Gc<T> {
        let ptr = GcBox::alloc(value);
        Gc { ptr, _marker: PhantomData }
    }
}

impl<T: Trace + 'static> Gc<T> {
    /// Upcasts to a type-erased `Gc<dyn Trace>`, from which the original type can later be
    /// recovered with [`Gc::downcast`].
    #[must_use]
    pub fn into_dyn(self) -> Gc<dyn Trace> {
        let this = ManuallyDrop::new(self);
        let raw: *mut GcBox<T> = this.ptr.as_ptr();
        let dyn_raw: *mut GcBox<dyn Trace> = raw;
        // SAFETY: `raw` came from a live `NonNull`.
        Gc { ptr: unsafe { NonNull::new_unchecked(dyn_raw) }, _marker: PhantomData }
    }
}

impl Gc<dyn Trace> {
    /// Attempts to downcast a type-erased handle back to its concrete type.
    ///
    /// Returns the original handle unchanged on mismatch, mirroring `Box<dyn Any>::downcast`.
    pub fn downcast<U: Trace + 'static>(self) -> Result<Gc<U>, Gc<dyn Trace>> {
        if self.is::<U>() {
            let this = ManuallyDrop::new(self);
            let ptr = this.ptr.cast::<GcBox<U>>();
            Ok(Gc { ptr, _marker: PhantomData })
        } else {
            Err(self)
        }
    }
}

impl<T: ?Sized + 'static> Gc<T> {
    /// Wraps a raw allocation pointer as a `Gc`. The caller must already have accounted for the
    /// strong count this handle represents.
    pub(crate) fn from_raw(ptr: NonNull<GcBox<T>>) -> Gc<T> {
        Gc { ptr, _marker: PhantomData }
    }

    #[inline]
    fn header_ptr(&self) -> NonNull<GcHeader> {
        self.ptr.cast()
    }

    #[inline]
    fn meta(&self) -> &Meta {
        // SAFETY: the allocation is kept alive by this handle's own strong count.
        unsafe { &self.header_ptr().as_ref().meta }
    }

    /// Returns `true` if the erased allocation is actually storing a `U`.
    pub fn is<U: 'static>(&self) -> bool {
        // SAFETY: the allocation is kept alive by this handle's own strong count.
        unsafe { self.header_ptr().as_ref().vtable.type_id == TypeId::of::<U>() }
    }

    /// Returns `true` if `this` and `other` point to the same allocation.
    pub fn ptr_eq(this: &Gc<T>, other: &Gc<T>) -> bool {
        ptr::eq(this.header_ptr().as_ptr(), other.header_ptr().as_ptr())
    }

    /// Number of [`Gc`] handles currently sharing this allocation.
    pub fn strong_count(&self) -> usize {
        self.meta().strong()
    }

    /// Number of [`Weak`] handles currently referring to this allocation (not counting the
    /// allocation's own birth slot).
    pub fn weak_count(&self) -> usize {
        self.meta().weak() - 1
    }

    /// `true` if this is the only strong handle to the allocation.
    pub fn is_unique(&self) -> bool {
        self.strong_count() == 1
    }

    /// The truth-test used throughout the collector's contract: `false` whenever the strong
    /// count has already been zeroed, even though `self` still holds a pointer to the (not yet
    /// destroyed, or already destroyed but not yet deallocated) object.
    ///
    /// This is what makes a destructor observe `false` when it inspects a sibling cycle member's
    /// [`Gc`] field: the collector zeroes every condemned object's strong count *before* running
    /// any of their destructors.
    pub fn is_live(&self) -> bool {
        let meta = self.meta();
        !meta.is_condemned() && meta.strong() != 0
    }

    /// Creates a new [`Weak`] pointer to this allocation.
    pub fn downgrade(&self) -> Weak<T> {
        self.meta().inc_weak();
        Weak::from_raw(self.ptr)
    }
}

impl<T: ?Sized + 'static> Clone for Gc<T> {
    /// Shares the allocation, incrementing the strong count.
    fn clone(&self) -> Self {
        self.meta().inc_strong();
        Gc { ptr: self.ptr, _marker: PhantomData }
    }
}

impl<T: ?Sized + 'static> Drop for Gc<T> {
    fn drop(&mut self) {
        let header = self.header_ptr();
        // SAFETY: `header` stays valid until we deallocate it below.
        let meta = unsafe { &header.as_ref().meta };

        if meta.dec_strong() == 1 {
            // The AcqRel decrement above already synchronizes-with every prior use of the
            // object made through any other handle.
            crate::collector::untrack(header);
            // SAFETY: we were the last strong handle, so the value is still live and nobody else
            // can be reading it.
            unsafe {
                GcHeader::drop_value(header);
            }
            if meta.dec_weak() == 1 {
                // SAFETY: no strong or weak handle remains; the allocation is ours to free.
                unsafe {
                    dealloc_gc(header);
                }
            }
        }
    }
}

/// Deallocates the backing memory of a `GcBox`. The value must already have been dropped in
/// place; this only releases the memory.
pub(crate) unsafe fn dealloc_gc(header: NonNull<GcHeader>) {
    let layout = GcHeader::layout(header);
    alloc::dealloc(header.as_ptr() as *mut u8, layout);
}

// SAFETY: a Gc<T> field reports itself (not its pointee's children) to the visitor; the
// collector's own traversal is what recurses into the pointee's `Trace` impl.
unsafe impl<T: ?Sized + 'static> Trace for Gc<T> {
    #[inline]
    fn trace(&self, ctx: &mut Context<'_>) {
        ctx.visit_child(self.header_ptr());
    }
}

impl<T: ?Sized + 'static> Deref for Gc<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: dereferencing an empty/expired handle is documented as a programmer error.
        unsafe { &self.ptr.as_ref().value }
    }
}

impl<T: ?Sized + 'static> Borrow<T> for Gc<T> {
    fn borrow(&self) -> &T {
        self
    }
}

impl<T: ?Sized + 'static + Debug> Debug for Gc<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + 'static + Display> Display for Gc<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&**self, f)
    }
}

impl<T: ?Sized + 'static> Pointer for Gc<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Pointer::fmt(&ptr::addr_of!(**self), f)
    }
}

impl<T: ?Sized + 'static + PartialEq> PartialEq for Gc<T> {
    /// Structural equality of the referents, *not* pointer identity — use [`Gc::ptr_eq`] for that.
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl<T: ?Sized + 'static + Eq> Eq for Gc<T> {}

impl<T: ?Sized + 'static + PartialOrd> PartialOrd for Gc<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (**self).partial_cmp(&**other)
    }
}

impl<T: ?Sized + 'static + Ord> Ord for Gc<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (**self).cmp(&**other)
    }
}

impl<T: ?Sized + 'static + Hash> Hash for Gc<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (**self).hash(state);
    }
}
