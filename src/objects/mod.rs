//! Object model - the dynamic values bound native code is exposed to
//!
//! Design: A safe, reference-counted value enum:
//! - Immediate values (`None`, `bool`, `int`, `float`) and owned containers
//! - Shared handles for functions, modules, classes and instances, compared
//!   by identity
//! - Attribute access resolves instance properties, then the instance
//!   dictionary, then class attributes (methods come back bound)
//!
//! Architecture:
//! - `function.rs` - Callable objects
//! - `module.rs` - Module namespaces and the `Scope` interface
//! - `class.rs` - Wrapped native classes, properties and instances
//! - `convert.rs` - Native <-> object conversions

mod class;
mod convert;
mod function;
mod module;

pub use class::{class_of, wrap_class, Class, ClassObject, ClassRef, Instance, InstanceRef, Property};
pub use convert::{FromPy, FromPyArgs, IntoPy, IntoPyArgs, IntoPyReturn};
pub use function::PyFunction;
pub use module::{ModuleObject, ModuleRef, Scope};

use std::fmt;
use std::sync::Arc;

use crate::errors::{BindError, BindResult, PyErr};

/// Object type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectType {
    None = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    String = 4,
    List = 5,
    Tuple = 7,
    Function = 8,
    Class = 9,
    Instance = 10,
    Module = 11,
}

impl ObjectType {
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "str",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Function => "function",
            Self::Class => "type",
            Self::Instance => "object",
            Self::Module => "module",
        }
    }
}

/// Universal object reference
#[derive(Clone)]
pub enum PyObject {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PyObject>),
    Tuple(Vec<PyObject>),
    Function(PyFunction),
    Class(ClassRef),
    Instance(InstanceRef),
    Module(ModuleRef),
}

impl PyObject {
    #[inline]
    pub fn get_type(&self) -> ObjectType {
        match self {
            Self::None => ObjectType::None,
            Self::Bool(_) => ObjectType::Bool,
            Self::Int(_) => ObjectType::Int,
            Self::Float(_) => ObjectType::Float,
            Self::Str(_) => ObjectType::String,
            Self::List(_) => ObjectType::List,
            Self::Tuple(_) => ObjectType::Tuple,
            Self::Function(_) => ObjectType::Function,
            Self::Class(_) => ObjectType::Class,
            Self::Instance(_) => ObjectType::Instance,
            Self::Module(_) => ObjectType::Module,
        }
    }

    /// Type name as the object model reports it (class name for instances)
    pub fn type_name(&self) -> String {
        match self {
            Self::Instance(inst) => inst.class().name().to_string(),
            other => other.get_type().name().to_string(),
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    pub fn tuple(items: impl IntoIterator<Item = PyObject>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    /// Namespace view of modules and classes
    pub fn as_scope(&self) -> Option<&dyn Scope> {
        match self {
            Self::Module(module) => Some(&**module),
            Self::Class(class) => Some(&**class),
            _ => None,
        }
    }

    pub fn getattr(&self, name: &str) -> BindResult<PyObject> {
        let found = match self {
            Self::Instance(inst) => return inst.getattr(name),
            Self::Module(module) => module.get_attr(name),
            Self::Class(class) => class.get_attr(name),
            _ => None,
        };
        found.ok_or_else(|| BindError::Attribute {
            type_name: self.type_name(),
            attr: name.to_string(),
        })
    }

    pub fn setattr(&self, name: &str, value: PyObject) -> BindResult<()> {
        match self {
            Self::Instance(inst) => inst.setattr(name, value),
            other => match other.as_scope() {
                Some(scope) => {
                    scope.set_attr(name, value);
                    Ok(())
                }
                None => Err(BindError::NotANamespace {
                    type_name: other.get_type().name(),
                }),
            },
        }
    }

    pub fn call(&self, args: &[PyObject]) -> Result<PyObject, PyErr> {
        match self {
            Self::Function(func) => func.call(args),
            other => Err(BindError::NotCallable {
                type_name: other.get_type().name(),
            }
            .into()),
        }
    }

    /// `obj.name(*args)`
    pub fn call_method(&self, name: &str, args: &[PyObject]) -> Result<PyObject, PyErr> {
        self.getattr(name)?.call(args)
    }
}

impl PartialEq for PyObject {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Class(a), Self::Class(b)) => Arc::ptr_eq(a, b),
            (Self::Instance(a), Self::Instance(b)) => a.ptr_eq(b),
            (Self::Module(a), Self::Module(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{:?}", v),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Tuple(items) => {
                let mut t = f.debug_tuple("");
                for item in items {
                    t.field(item);
                }
                t.finish()
            }
            Self::Function(func) => write!(f, "<function {}>", func.name()),
            Self::Class(class) => write!(f, "<class '{}'>", class.qualified_name()),
            Self::Instance(inst) => write!(f, "<{} object>", inst.class().name()),
            Self::Module(module) => write!(f, "<module '{}'>", module.name()),
        }
    }
}

impl Default for PyObject {
    fn default() -> Self {
        Self::None
    }
}

#[cfg(test)]
mod tests;
