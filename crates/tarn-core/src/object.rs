//! Object model: classes, functions, strings, instances
//!
//! Every heap object is one [`Obj`] payload; the enum discriminant is the
//! object's type tag. Classes hold a fixed-size method-slot table indexed by
//! method-symbol id, and inherit by copying the superclass's slots at
//! creation time (no chain walk at dispatch).

use crate::gc::GcPtr;
use crate::value::Value;
use crate::vm::Vm;
use crate::VmResult;
use tarn_bytecode::limits::{MAX_CODE, MAX_CONSTANTS, MAX_SYMBOLS};

/// A native method implementation
///
/// Receives the VM and the argument window (`args[0]` is the receiver).
/// Returning [`Value::no_value`] means the primitive pushed a call frame
/// itself and the dispatcher must leave the stack alone.
pub type PrimitiveFn = fn(&mut Vm, &[Value]) -> VmResult<Value>;

/// One entry in a class's method table
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Method {
    /// Not implemented; dispatch fails
    #[default]
    None,
    /// Native function
    Primitive(PrimitiveFn),
    /// User-defined function
    Block(GcPtr),
}

/// A class: metaclass link, superclass link, and method slots
#[derive(Debug)]
pub struct ObjClass {
    /// The class of this class object. `None` only for metaclasses
    /// themselves and transiently during bootstrap.
    pub metaclass: Option<GcPtr>,

    /// Superclass, `None` for `Object` and for metaclasses.
    ///
    /// Retained for identity tests only; method slots were already copied at
    /// creation time, and the collector does not trace this edge.
    pub superclass: Option<GcPtr>,

    /// Method slots, indexed by method-symbol id.
    pub methods: Vec<Method>,
}

impl ObjClass {
    /// Create a class with every slot empty
    pub fn new(metaclass: Option<GcPtr>, superclass: Option<GcPtr>) -> Self {
        Self {
            metaclass,
            superclass,
            methods: vec![Method::None; MAX_SYMBOLS],
        }
    }

    /// Look up a method slot by symbol id
    #[inline]
    pub fn method(&self, symbol: u16) -> Method {
        self.methods
            .get(symbol as usize)
            .copied()
            .unwrap_or(Method::None)
    }

    /// Bind a method slot
    #[inline]
    pub fn bind_method(&mut self, symbol: u16, method: Method) {
        self.methods[symbol as usize] = method;
    }

    /// Copy every method slot from a superclass (flattened inheritance)
    pub fn inherit_from(&mut self, superclass: &ObjClass) {
        self.methods.copy_from_slice(&superclass.methods);
    }
}

/// A bytecode function: instruction stream plus constant table
///
/// The compiler fills both buffers; the interpreter treats them as
/// read-only. Buffers are reserved up front so filling them never
/// reallocates (the accounted footprint stays accurate).
#[derive(Debug)]
pub struct ObjFn {
    /// Bytecode instructions
    pub code: Vec<u8>,

    /// Constant table
    pub constants: Vec<Value>,
}

impl ObjFn {
    /// Create an empty function with full-capacity buffers
    pub fn new() -> Self {
        Self {
            code: Vec::with_capacity(MAX_CODE),
            constants: Vec::with_capacity(MAX_CONSTANTS),
        }
    }

    /// Append a constant, returning its index
    pub fn add_constant(&mut self, value: Value) -> VmResult<u8> {
        if self.constants.len() >= MAX_CONSTANTS {
            return Err(crate::VmError::TooManyConstants);
        }
        let index = self.constants.len() as u8;
        self.constants.push(value);
        Ok(index)
    }
}

impl Default for ObjFn {
    fn default() -> Self {
        Self::new()
    }
}

/// A heap-owned immutable string
#[derive(Debug)]
pub struct ObjString {
    /// String contents
    pub value: String,
}

/// An instance of a user class
///
/// Fields are reserved for a future extension; today an instance is just a
/// typed identity.
#[derive(Debug)]
pub struct ObjInstance {
    /// The instance's class
    pub class: GcPtr,
}

/// A heap object payload
#[derive(Debug)]
pub enum Obj {
    /// A class (or metaclass)
    Class(ObjClass),
    /// A bytecode function
    Fn(ObjFn),
    /// A string
    Str(ObjString),
    /// An instance of a user class
    Instance(ObjInstance),
}

impl Obj {
    /// Narrow to a class
    #[inline]
    pub fn as_class(&self) -> Option<&ObjClass> {
        match self {
            Obj::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Narrow to a mutable class
    #[inline]
    pub fn as_class_mut(&mut self) -> Option<&mut ObjClass> {
        match self {
            Obj::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Narrow to a function
    #[inline]
    pub fn as_fn(&self) -> Option<&ObjFn> {
        match self {
            Obj::Fn(function) => Some(function),
            _ => None,
        }
    }

    /// Narrow to a mutable function
    #[inline]
    pub fn as_fn_mut(&mut self) -> Option<&mut ObjFn> {
        match self {
            Obj::Fn(function) => Some(function),
            _ => None,
        }
    }

    /// Narrow to a string
    #[inline]
    pub fn as_str(&self) -> Option<&ObjString> {
        match self {
            Obj::Str(string) => Some(string),
            _ => None,
        }
    }

    /// Narrow to an instance
    #[inline]
    pub fn as_instance(&self) -> Option<&ObjInstance> {
        match self {
            Obj::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// Bytes owned by this payload outside the enum itself
    pub fn owned_bytes(&self) -> usize {
        match self {
            Obj::Class(class) => class.methods.capacity() * std::mem::size_of::<Method>(),
            Obj::Fn(function) => {
                function.code.capacity()
                    + function.constants.capacity() * std::mem::size_of::<Value>()
            }
            Obj::Str(string) => string.value.capacity(),
            Obj::Instance(_) => 0,
        }
    }

    /// Type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Obj::Class(_) => "class",
            Obj::Fn(_) => "fn",
            Obj::Str(_) => "string",
            Obj::Instance(_) => "instance",
        }
    }
}

/// Wrap an object reference as a value
#[inline]
pub fn object_to_value(obj: GcPtr) -> Value {
    unsafe { Value::from_ptr(obj.as_non_null()) }
}

/// Read an object reference out of a value
#[inline]
pub fn value_to_obj(value: Value) -> Option<GcPtr> {
    unsafe { value.as_ptr::<Obj>().map(|ptr| GcPtr::from_payload(ptr)) }
}

/// Canonical textual rendering of a value
///
/// Heap values are rendered through their live object, so the value must not
/// be dangling.
pub fn display_value(value: Value) -> String {
    if let Some(n) = value.as_num() {
        return format!("{}", n);
    }
    if let Some(b) = value.as_bool() {
        return b.to_string();
    }
    if value.is_null() {
        return "null".to_string();
    }
    if value.is_no_value() {
        return "no-value".to_string();
    }
    match value_to_obj(value) {
        Some(obj) => match &*obj {
            Obj::Class(_) => format!("[class {:#x}]", obj.addr()),
            Obj::Fn(_) => format!("[fn {:#x}]", obj.addr()),
            Obj::Instance(_) => format!("[instance {:#x}]", obj.addr()),
            Obj::Str(string) => string.value.clone(),
        },
        None => "<invalid>".to_string(),
    }
}
