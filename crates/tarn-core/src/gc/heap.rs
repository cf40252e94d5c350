//! Heap allocator and all-objects list

use super::header::GcHeader;
use super::ptr::GcPtr;
use crate::object::Obj;
use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

/// Heap allocator for GC-managed objects
///
/// Every live allocation appears exactly once in the all-objects list; the
/// sweep phase walks that list and frees whatever the mark phase did not
/// reach. `allocated_bytes` is the sum of the footprints of the tracked
/// allocations and decreases only when an object is freed.
pub struct Heap {
    /// All-objects list (pointer to each allocation's header)
    allocations: Vec<*mut GcHeader>,

    /// Total accounted bytes
    allocated_bytes: usize,
}

impl Heap {
    /// Create an empty heap
    pub fn new() -> Self {
        Self {
            allocations: Vec::new(),
            allocated_bytes: 0,
        }
    }

    /// Combined header+payload layout and the payload's offset
    fn object_layout() -> (Layout, usize) {
        Layout::new::<GcHeader>()
            .extend(Layout::new::<Obj>())
            .expect("Failed to calculate layout")
    }

    /// Recover an allocation's header from its payload handle
    ///
    /// The header sits at the start of the allocation, one payload offset
    /// below the address the handle carries.
    fn header_of(obj: GcPtr) -> *mut GcHeader {
        let (_, payload_offset) = Self::object_layout();
        unsafe { obj.as_ptr().cast::<u8>().sub(payload_offset).cast::<GcHeader>() }
    }

    /// Whether the collector reached this object in the current cycle
    pub(crate) fn is_marked(obj: GcPtr) -> bool {
        unsafe { (*Self::header_of(obj)).is_marked() }
    }

    /// Flag an object as reachable for the current cycle
    pub(crate) fn mark(obj: GcPtr) {
        unsafe { (*Self::header_of(obj)).mark() }
    }

    /// Accounted footprint of an object: header, payload, and owned buffers
    pub fn footprint(obj: &Obj) -> usize {
        Self::object_layout().0.size() + obj.owned_bytes()
    }

    /// Allocate an object on the heap and link it into the all-objects list
    ///
    /// # Panics
    ///
    /// Panics if the underlying allocation fails.
    pub fn allocate(&mut self, obj: Obj) -> GcPtr {
        let (layout, value_offset) = Self::object_layout();
        let footprint = layout.size() + obj.owned_bytes();

        let ptr = unsafe { alloc(layout) };
        if ptr.is_null() {
            panic!("Out of memory");
        }

        let header_ptr = ptr as *mut GcHeader;
        unsafe {
            header_ptr.write(GcHeader::new(footprint));
        }

        let value_ptr = unsafe { ptr.add(value_offset) as *mut Obj };
        unsafe {
            value_ptr.write(obj);
        }

        self.allocations.push(header_ptr);
        self.allocated_bytes += footprint;

        unsafe { GcPtr::from_payload(NonNull::new_unchecked(value_ptr)) }
    }

    /// Free every unmarked object and clear the mark flag on survivors
    ///
    /// Returns the number of objects freed.
    pub fn sweep(&mut self) -> usize {
        let (layout, value_offset) = Self::object_layout();
        let mut freed_objects = 0;
        let mut freed_bytes = 0;

        self.allocations.retain(|&header_ptr| unsafe {
            if (*header_ptr).is_marked() {
                (*header_ptr).unmark();
                true
            } else {
                freed_bytes += (*header_ptr).size();
                let value_ptr = (header_ptr as *mut u8).add(value_offset) as *mut Obj;
                std::ptr::drop_in_place(value_ptr);
                dealloc(header_ptr as *mut u8, layout);
                freed_objects += 1;
                false
            }
        });

        self.allocated_bytes -= freed_bytes;
        freed_objects
    }

    /// Total accounted bytes
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    /// Number of live allocations
    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        let (layout, value_offset) = Self::object_layout();
        for &header_ptr in &self.allocations {
            unsafe {
                let value_ptr = (header_ptr as *mut u8).add(value_offset) as *mut Obj;
                std::ptr::drop_in_place(value_ptr);
                dealloc(header_ptr as *mut u8, layout);
            }
        }
        self.allocations.clear();
        self.allocated_bytes = 0;
    }
}

/// Heap statistics snapshot
#[derive(Debug, Clone)]
pub struct HeapStats {
    /// Total accounted bytes
    pub allocated_bytes: usize,

    /// Number of live allocations
    pub allocation_count: usize,

    /// Byte threshold that triggers the next collection
    pub next_gc: usize,
}
