//! Virtual machine: heap ownership, roots, and the object-model operations
//!
//! The [`Vm`] is the single owner of all runtime state: the heap, the symbol
//! tables, the global slots, the fiber, the pin stack, and the built-in
//! class handles. It is an ordinary owned value; nothing here is global.
//!
//! Allocation may trigger a collection before returning, so any object
//! reference held across an allocating call must be reachable from a root:
//! a global, an operand-stack slot, an active frame's function, or the pin
//! stack. [`Vm::pin`] / [`Vm::unpin`] are the LIFO escape hatch used while
//! constructing compound objects.

mod core_lib;
mod interpreter;

use crate::fiber::Fiber;
use crate::gc::{GcPtr, Heap, HeapStats};
use crate::object::{display_value, object_to_value, Method, Obj, ObjClass, ObjFn, ObjInstance, ObjString};
use crate::symbol::SymbolTable;
use crate::value::Value;
use crate::{VmError, VmResult};
use tarn_bytecode::limits::MAX_SYMBOLS;

/// Maximum depth of the pin stack
const MAX_PINNED: usize = 32;

/// Default operand-stack limit (in slots)
const DEFAULT_MAX_STACK_SLOTS: usize = 1024 * 16;

/// Default call-depth limit
const DEFAULT_MAX_FRAMES: usize = 256;

/// Initial collection threshold (bytes)
const DEFAULT_GC_THRESHOLD: usize = 1024 * 1024;

/// Construction options for a [`Vm`]
#[derive(Debug, Clone)]
pub struct VmOptions {
    /// Byte threshold of the first collection
    pub initial_gc_threshold: usize,

    /// Operand-stack limit, in slots
    pub max_stack_slots: usize,

    /// Call-depth limit
    pub max_frames: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            initial_gc_threshold: DEFAULT_GC_THRESHOLD,
            max_stack_slots: DEFAULT_MAX_STACK_SLOTS,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

/// The Tarn virtual machine
pub struct Vm {
    /// Heap and all-objects list
    heap: Heap,

    /// Byte threshold that triggers the next collection
    next_gc: usize,

    /// Method selector symbols
    pub(crate) methods: SymbolTable,

    /// Global variable name symbols
    pub(crate) global_symbols: SymbolTable,

    /// Global values, parallel to `global_symbols`
    pub(crate) globals: Vec<Value>,

    /// The one fiber
    pub(crate) fiber: Fiber,

    /// LIFO pin stack: extra roots held by native code across allocations
    pinned: Vec<Value>,

    /// Built-in class handles, installed by the core bootstrap
    pub(crate) object_class: Option<GcPtr>,
    pub(crate) bool_class: Option<GcPtr>,
    pub(crate) null_class: Option<GcPtr>,
    pub(crate) num_class: Option<GcPtr>,
    pub(crate) fn_class: Option<GcPtr>,
    pub(crate) string_class: Option<GcPtr>,
}

impl Vm {
    /// Create a VM with default options and a bootstrapped core library
    pub fn new() -> Self {
        Self::with_options(VmOptions::default())
    }

    /// Create a VM with explicit options
    pub fn with_options(options: VmOptions) -> Self {
        let mut vm = Self {
            heap: Heap::new(),
            next_gc: options.initial_gc_threshold,
            methods: SymbolTable::new(),
            global_symbols: SymbolTable::new(),
            // Null-initialize every global slot so a collection before a
            // slot's STORE_GLOBAL sees no garbage.
            globals: vec![Value::null(); MAX_SYMBOLS],
            fiber: Fiber::new(options.max_stack_slots, options.max_frames),
            pinned: Vec::with_capacity(MAX_PINNED),
            object_class: None,
            bool_class: None,
            null_class: None,
            num_class: None,
            fn_class: None,
            string_class: None,
        };
        core_lib::load_core(&mut vm).expect("core library bootstrap failed");
        vm
    }

    // ===== Allocation & collection =====

    /// Allocate an object, collecting first if the threshold is crossed
    ///
    /// Any other unrooted object reference the caller holds must be pinned
    /// before this call.
    pub(crate) fn allocate(&mut self, obj: Obj) -> GcPtr {
        #[cfg(feature = "gc-stress")]
        self.collect_garbage();

        #[cfg(not(feature = "gc-stress"))]
        if self.heap.allocated_bytes() + Heap::footprint(&obj) > self.next_gc {
            self.collect_garbage();
            self.next_gc = self.heap.allocated_bytes() * 3 / 2;
        }

        self.heap.allocate(obj)
    }

    /// Run a full mark-and-sweep collection
    ///
    /// The collection threshold is retuned only by allocation-triggered
    /// collections, not by explicit ones.
    pub fn collect_garbage(&mut self) {
        // Global variables. The null check skips slots that are defined but
        // not yet initialized.
        for i in 0..self.global_symbols.len() {
            let value = self.globals[i];
            if !value.is_null() {
                mark_value(value);
            }
        }

        // Pinned objects.
        for &value in &self.pinned {
            mark_value(value);
        }

        // Active call frames' functions.
        for frame in self.fiber.frames() {
            mark_obj(frame.function);
        }

        // Operand stack.
        for &value in self.fiber.stack_slots() {
            mark_value(value);
        }

        self.heap.sweep();
    }

    /// Override the byte threshold of the next collection
    pub fn set_gc_threshold(&mut self, bytes: usize) {
        self.next_gc = bytes;
    }

    /// Heap statistics snapshot
    pub fn heap_stats(&self) -> HeapStats {
        HeapStats {
            allocated_bytes: self.heap.allocated_bytes(),
            allocation_count: self.heap.allocation_count(),
            next_gc: self.next_gc,
        }
    }

    // ===== Pinning =====

    /// Push a value onto the pin stack, making it a GC root
    ///
    /// # Panics
    ///
    /// Panics if the pin stack is full.
    pub fn pin(&mut self, value: Value) {
        assert!(self.pinned.len() < MAX_PINNED, "Too many pinned objects");
        self.pinned.push(value);
    }

    /// Pop a value off the pin stack
    ///
    /// # Panics
    ///
    /// Panics if `value` is not the most recently pinned value: pins must be
    /// released in LIFO order.
    pub fn unpin(&mut self, value: Value) {
        let top = self.pinned.pop();
        assert!(
            top == Some(value),
            "Unpinning object out of stack order"
        );
    }

    // ===== Object construction =====

    /// Create a class with an empty method table
    fn new_single_class(
        &mut self,
        metaclass: Option<GcPtr>,
        superclass: Option<GcPtr>,
    ) -> GcPtr {
        self.allocate(Obj::Class(ObjClass::new(metaclass, superclass)))
    }

    /// Create a class and its metaclass, inheriting the superclass's method
    /// slots
    ///
    /// Subclass slots start as a copy of the superclass's table; methods
    /// bound later on either class do not affect the other.
    pub fn new_class(&mut self, superclass: Option<GcPtr>) -> GcPtr {
        // The superclass may be reachable only through the caller's hands
        // (e.g. just popped off the operand stack), so root it across the
        // two allocations below.
        if let Some(superclass) = superclass {
            self.pin(object_to_value(superclass));
        }

        let metaclass = self.new_single_class(None, None);

        // Keep the metaclass alive while the class itself is allocated.
        self.pin(object_to_value(metaclass));
        let mut class = self.new_single_class(Some(metaclass), superclass);
        self.unpin(object_to_value(metaclass));

        if let Some(superclass) = superclass {
            self.unpin(object_to_value(superclass));
            if let (Some(class), Some(superclass)) =
                (class.as_class_mut(), superclass.as_class())
            {
                class.inherit_from(superclass);
            }
        }

        class
    }

    /// Create an empty function with full-capacity code and constant buffers
    ///
    /// The compiler fills the buffers in place; they never grow past the
    /// reserved capacities.
    pub fn new_function(&mut self) -> GcPtr {
        self.allocate(Obj::Fn(ObjFn::new()))
    }

    /// Create an instance of `class`
    pub fn new_instance(&mut self, class: GcPtr) -> Value {
        let instance = self.allocate(Obj::Instance(ObjInstance { class }));
        object_to_value(instance)
    }

    /// Create a heap string with the given contents
    pub fn new_string(&mut self, text: &str) -> Value {
        let string = self.allocate(Obj::Str(ObjString {
            value: text.to_string(),
        }));
        object_to_value(string)
    }

    // ===== Classes of values =====

    /// The class of any value
    ///
    /// This is the only place the built-in class handles are consulted for
    /// dispatch.
    pub fn class_of(&self, value: Value) -> VmResult<GcPtr> {
        if value.is_num() {
            return core_handle(self.num_class, "Num");
        }
        if value.is_bool() {
            return core_handle(self.bool_class, "Bool");
        }
        if value.is_null() || value.is_no_value() {
            return core_handle(self.null_class, "Null");
        }
        let obj = crate::object::value_to_obj(value)
            .ok_or_else(|| VmError::TypeError("value is not an object".to_string()))?;
        match &*obj {
            Obj::Class(class) => class.metaclass.ok_or(VmError::NoMetaclass),
            Obj::Fn(_) => core_handle(self.fn_class, "Fn"),
            Obj::Str(_) => core_handle(self.string_class, "String"),
            Obj::Instance(instance) => Ok(instance.class),
        }
    }

    // ===== Symbols & globals =====

    /// The method-selector symbol table
    pub fn methods_mut(&mut self) -> &mut SymbolTable {
        &mut self.methods
    }

    /// The global-name symbol table
    pub fn global_symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.global_symbols
    }

    /// Look up a global variable by name
    pub fn find_global(&self, name: &str) -> Option<Value> {
        let symbol = self.global_symbols.find(name)?;
        Some(self.globals[symbol as usize])
    }

    /// Bind a global variable, interning its name if needed
    ///
    /// Returns the global's symbol id.
    pub fn define_global(&mut self, name: &str, value: Value) -> VmResult<u16> {
        let symbol = self.global_symbols.ensure(name)?;
        self.globals[symbol as usize] = value;
        Ok(symbol)
    }

    /// Install a primitive method on a class
    pub fn define_primitive(
        &mut self,
        mut class: GcPtr,
        name: &str,
        function: crate::object::PrimitiveFn,
    ) -> VmResult<()> {
        let symbol = self.methods.ensure(name)?;
        let class = class
            .as_class_mut()
            .ok_or_else(|| VmError::TypeError("method receiver must be a class".to_string()))?;
        class.bind_method(symbol, Method::Primitive(function));
        Ok(())
    }

    /// Render a value for diagnostics
    pub fn render(&self, value: Value) -> String {
        display_value(value)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

fn core_handle(handle: Option<GcPtr>, name: &'static str) -> VmResult<GcPtr> {
    handle.ok_or(VmError::CoreClassMissing(name))
}

// ===== Marking =====

/// Mark a value's object, if it has one
fn mark_value(value: Value) {
    if let Some(obj) = crate::object::value_to_obj(value) {
        mark_obj(obj);
    }
}

/// Mark an object and everything reachable from it
fn mark_obj(obj: GcPtr) {
    // Already-marked objects stop the recursion, which is what makes cycles
    // (class <-> metaclass, function constants) terminate.
    if obj.is_marked() {
        return;
    }
    obj.mark();

    match &*obj {
        Obj::Class(class) => {
            if let Some(metaclass) = class.metaclass {
                mark_obj(metaclass);
            }
            // The superclass is deliberately not traced: its method slots
            // were copied into this class at creation time, and the built-in
            // classes stay alive through their global bindings.
            for slot in &class.methods {
                if let Method::Block(body) = slot {
                    mark_obj(*body);
                }
            }
        }
        Obj::Fn(function) => {
            for &constant in &function.constants {
                mark_value(constant);
            }
        }
        // Strings have no outgoing references; instances have no fields yet,
        // and their class is reachable through the binding that names it.
        Obj::Str(_) | Obj::Instance(_) => {}
    }
}
