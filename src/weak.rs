use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::gc::{dealloc_gc, Gc, GcBox};
use crate::header::GcHeader;
use crate::meta::Meta;
use crate::trace::{Context, Trace};

/// A non-owning handle to a [`Gc`] allocation that does not keep the value alive and is never
/// itself traced by the collector.
///
/// A [`Weak`] keeps the allocation's backing memory from being deallocated (via the weak count)
/// but has no bearing on whether the value is destroyed or on cycle detection. Use
/// [`Weak::upgrade`] to attempt to obtain a [`Gc`] and temporarily extend the value's lifetime.
pub struct Weak<T: ?Sized + 'static> {
    ptr: Option<NonNull<GcBox<T>>>,
    _marker: PhantomData<GcBox<T>>,
}

// SAFETY: see the matching impls on Gc<T>; a Weak only ever touches Meta's atomics.
unsafe impl<T: ?Sized + Sync + Send> Send for Weak<T> {}
unsafe impl<T: ?Sized + Sync + Send> Sync for Weak<T> {}

impl<T: 'static> Weak<T> {
    /// Creates a [`Weak`] with no backing allocation. Always fails to upgrade.
    #[must_use]
    pub fn new() -> Weak<T> {
        Weak { ptr: None, _marker: PhantomData }
    }
}

impl<T: 'static> Default for Weak<T> {
    fn default() -> Self {
        Weak::new()
    }
}

impl<T: ?Sized + 'static> Weak<T> {
    /// Wraps a raw allocation pointer as a `Weak`. The caller must already have incremented the
    /// weak count; this does not do so itself.
    pub(crate) fn from_raw(ptr: NonNull<GcBox<T>>) -> Weak<T> {
        Weak { ptr: Some(ptr), _marker: PhantomData }
    }

    fn header_ptr(&self) -> Option<NonNull<GcHeader>> {
        self.ptr.map(NonNull::cast)
    }

    fn meta(&self) -> Option<&Meta> {
        // SAFETY: the allocation is kept alive by this handle's own weak count.
        self.header_ptr().map(|header| unsafe { &header.as_ref().meta })
    }

    /// Attempts to upgrade to a [`Gc`], succeeding only if the strong count has not yet reached
    /// zero. On success the strong count is incremented to account for the returned handle.
    pub fn upgrade(&self) -> Option<Gc<T>> {
        let ptr = self.ptr?;
        let meta = self.meta()?;
        if meta.upgrade() {
            Some(Gc::from_raw(ptr))
        } else {
            None
        }
    }

    /// `true` if the pointee is still alive, i.e. an [`upgrade`][`Weak::upgrade`] would succeed.
    pub fn is_live(&self) -> bool {
        self.meta().is_some_and(|meta| !meta.is_condemned() && meta.strong() != 0)
    }

    /// Returns `true` if `this` and `other` point to the same allocation, or if both are empty.
    pub fn ptr_eq(this: &Weak<T>, other: &Weak<T>) -> bool {
        match (this.header_ptr(), other.header_ptr()) {
            (Some(a), Some(b)) => ptr::eq(a.as_ptr(), b.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }

    /// Number of strong handles to the pointee, or 0 if the `Weak` is empty.
    pub fn strong_count(&self) -> usize {
        self.meta().map_or(0, Meta::strong)
    }

    /// Number of weak handles to the pointee, or 0 if the `Weak` is empty.
    pub fn weak_count(&self) -> usize {
        self.meta().map_or(0, |meta| meta.weak() - 1)
    }
}

impl<T: ?Sized + 'static> Clone for Weak<T> {
    fn clone(&self) -> Self {
        if let Some(meta) = self.meta() {
            meta.inc_weak();
        }
        Weak { ptr: self.ptr, _marker: PhantomData }
    }
}

// A Weak never keeps its pointee alive and is never reported as an ownership edge.
unsafe impl<T: ?Sized + 'static> Trace for Weak<T> {
    #[inline(always)]
    fn trace(&self, _ctx: &mut Context<'_>) {}
}

impl<T: ?Sized + 'static> Drop for Weak<T> {
    fn drop(&mut self) {
        let Some(header) = self.header_ptr() else { return };
        // SAFETY: `header` stays valid until we possibly deallocate it below.
        let meta = unsafe { &header.as_ref().meta };
        if meta.dec_weak() == 1 {
            // SAFETY: no strong or weak handle remains; the value, if any, was already dropped
            // by the last `Gc` to release it.
            unsafe {
                dealloc_gc(header);
            }
        }
    }
}
