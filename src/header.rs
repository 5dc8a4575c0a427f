//! The type-erased allocation header shared by every [`GcBox`][`crate::gc::GcBox`].
//!
//! The collector only ever walks `NonNull<GcHeader>`s: it has no idea what concrete type lives
//! behind any given allocation. Dynamic dispatch of the child visitor is implemented as a static
//! "tag plus function table" rather than a trait object, since a [`GcHeader`] has to be
//! constructible before its pointee type is nameable in generic code that only knows `T: Trace`.

use std::alloc::Layout;
use std::any::TypeId;
use std::ptr::NonNull;

use crate::meta::Meta;
use crate::trace::Context;

/// Per-type operations needed by the collector and by [`Gc`][`crate::Gc`]'s drop glue, resolved
/// once at allocation time and shared by every instance of `T`.
pub(crate) struct GcVTable {
    /// Calls `Trace::trace` on the value following this header, forwarding each discovered child
    /// to the visitor embedded in `ctx`.
    pub(crate) trace: unsafe fn(NonNull<GcHeader>, &mut Context<'_>),
    /// Runs the value's destructor in place, without deallocating the backing memory.
    pub(crate) drop_value: unsafe fn(NonNull<GcHeader>),
    /// Layout of the full allocation (header + value), needed to deallocate it correctly.
    pub(crate) layout: Layout,
    /// Identity of the concrete type `T` this allocation was created with, used by
    /// [`Gc::downcast`][`crate::Gc::downcast`].
    pub(crate) type_id: TypeId,
}

/// The fixed-size part of every managed allocation: the control block plus a pointer to this
/// object's vtable. Lives at offset 0 of every `GcBox<T>`, so a `NonNull<GcBox<T>>` can always be
/// reinterpreted as a `NonNull<GcHeader>`.
#[repr(C)]
pub(crate) struct GcHeader {
    pub(crate) meta: Meta,
    pub(crate) vtable: &'static GcVTable,
}

impl GcHeader {
    #[inline]
    pub(crate) unsafe fn trace(this: NonNull<GcHeader>, ctx: &mut Context<'_>) {
        let vtable = this.as_ref().vtable;
        (vtable.trace)(this, ctx)
    }

    #[inline]
    pub(crate) unsafe fn drop_value(this: NonNull<GcHeader>) {
        let vtable = this.as_ref().vtable;
        (vtable.drop_value)(this)
    }

    #[inline]
    pub(crate) unsafe fn layout(this: NonNull<GcHeader>) -> Layout {
        this.as_ref().vtable.layout
    }
}
