//! Typed handle to a heap object

use super::heap::Heap;
use crate::object::Obj;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// A copyable handle to a GC-managed [`Obj`]
///
/// The handle is one word: the payload address inside an allocation made by
/// [`Heap`]. Identity (equality, hashing) is that address, which is exactly
/// what the language's `is` test observes; two structurally equal objects
/// are still distinct values. `Option<GcPtr>` is also one word thanks to
/// the null niche, which is what keeps the class links in
/// [`crate::object::ObjClass`] compact.
///
/// A handle does not keep its object alive. Holders must keep the object
/// reachable from a root (operand stack, call frame, global, or pin stack)
/// across any operation that can allocate. Mark-flag access lives on
/// [`Heap`], which owns the allocation layout; this type only carries the
/// address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GcPtr(NonNull<Obj>);

impl GcPtr {
    /// Wrap a payload pointer handed out by the allocator
    ///
    /// # Safety
    ///
    /// `payload` must point at a live `Obj`. The mark-flag operations
    /// additionally require it to be the object slot of a [`Heap`]
    /// allocation; a handle over foreign memory may only be dereferenced.
    pub(crate) unsafe fn from_payload(payload: NonNull<Obj>) -> Self {
        Self(payload)
    }

    /// The raw payload pointer
    #[inline]
    pub fn as_ptr(&self) -> *mut Obj {
        self.0.as_ptr()
    }

    /// The payload pointer as `NonNull`
    #[inline]
    pub fn as_non_null(&self) -> NonNull<Obj> {
        self.0
    }

    /// Payload address: the identity that `is` compares
    #[inline]
    pub fn addr(&self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Whether the collector reached this object in the current cycle
    #[inline]
    pub fn is_marked(&self) -> bool {
        Heap::is_marked(*self)
    }

    /// Flag this object as reachable for the current cycle
    #[inline]
    pub fn mark(&self) {
        Heap::mark(*self)
    }
}

impl Deref for GcPtr {
    type Target = Obj;

    #[inline]
    fn deref(&self) -> &Obj {
        // Sound while the object is rooted; see the type docs.
        unsafe { &*self.as_ptr() }
    }
}

impl DerefMut for GcPtr {
    #[inline]
    fn deref_mut(&mut self) -> &mut Obj {
        unsafe { &mut *self.as_ptr() }
    }
}
