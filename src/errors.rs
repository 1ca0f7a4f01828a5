//! Error types for binding, marshaling and module initialization
//!
//! Design: Two layers:
//! - `BindError` - what the engine itself detects (argument mismatches,
//!   bounds and encoding failures, unresolved aliases)
//! - `PyErr` - the exception value the object model raises and catches;
//!   every `BindError` converts into one at the foreign boundary

use std::fmt;

pub type BindResult<T> = Result<T, BindError>;

#[derive(Debug, Clone, PartialEq)]
pub enum BindError {
    ArgCount { expected: usize, got: usize },
    TypeMismatch { expected: &'static str, found: String },
    IntegerOverflow { value: String, target: &'static str },
    SizeMismatch { capacity: usize, size: usize },
    BufferOverflow { capacity: usize, size: usize },
    Encoding { encoding: &'static str, detail: String },
    UnknownEncoding { label: String },
    InteriorNul { position: usize },
    UnresolvedTarget { name: String, target: String },
    AliasOrder { name: String, target: String },
    AliasCycle { chain: Vec<String> },
    NotANamespace { type_name: &'static str },
    Attribute { type_name: String, attr: String },
    ReadOnly { attr: String },
    NotCallable { type_name: &'static str },
    Argument { index: usize, source: Box<BindError> },
    Foreign(PyErr),
    Config { message: String },
    Dispatcher { message: String },
    CallbackSlots { signature: &'static str, capacity: usize },
}

impl BindError {
    /// Attach the position of the offending argument
    pub fn at_argument(self, index: usize) -> Self {
        match self {
            already @ Self::Argument { .. } => already,
            other => Self::Argument { index, source: Box::new(other) },
        }
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgCount { expected, got } => {
                write!(f, "expected {} arguments, got {}", expected, got)
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            Self::IntegerOverflow { value, target } => {
                write!(f, "integer {} out of range for {}", value, target)
            }
            Self::SizeMismatch { capacity, size } => {
                write!(f, "Array too large, maximum size : {} your size: {}", capacity, size)
            }
            Self::BufferOverflow { capacity, size } => {
                write!(
                    f,
                    "string too long for buffer: capacity {} bytes, needs {} bytes",
                    capacity, size
                )
            }
            Self::Encoding { encoding, detail } => {
                write!(f, "cannot convert text to {}: {}", encoding, detail)
            }
            Self::UnknownEncoding { label } => {
                write!(f, "unknown encoding label '{}'", label)
            }
            Self::InteriorNul { position } => {
                write!(f, "string contains NUL byte at position {}", position)
            }
            Self::UnresolvedTarget { name, target } => {
                write!(f, "cannot assign {}: target {} was never registered", name, target)
            }
            Self::AliasOrder { name, target } => {
                write!(
                    f,
                    "cannot assign {}: target {} is an alias recorded after it and not yet resolved",
                    name, target
                )
            }
            Self::AliasCycle { chain } => {
                write!(f, "alias cycle: {}", chain.join(" -> "))
            }
            Self::NotANamespace { type_name } => {
                write!(f, "'{}' object does not accept attributes", type_name)
            }
            Self::Attribute { type_name, attr } => {
                write!(f, "'{}' object has no attribute '{}'", type_name, attr)
            }
            Self::ReadOnly { attr } => {
                write!(f, "attribute '{}' is read-only", attr)
            }
            Self::NotCallable { type_name } => {
                write!(f, "'{}' object is not callable", type_name)
            }
            Self::Argument { index, source } => {
                write!(f, "argument {}: {}", index, source)
            }
            Self::Foreign(err) => write!(f, "{}", err),
            Self::Config { message } => write!(f, "configuration error: {}", message),
            Self::Dispatcher { message } => write!(f, "dispatcher error: {}", message),
            Self::CallbackSlots { signature, capacity } => {
                write!(
                    f,
                    "all {} trampolines for {} are bound to other closures",
                    capacity, signature
                )
            }
        }
    }
}

impl std::error::Error for BindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Argument { source, .. } => Some(source.as_ref()),
            Self::Foreign(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PyErr> for BindError {
    fn from(err: PyErr) -> Self {
        Self::Foreign(err)
    }
}

/// Exception classes of the object model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyErrKind {
    Exception,
    TypeError,
    ValueError,
    OverflowError,
    AttributeError,
    KeyError,
    RuntimeError,
    UnicodeError,
}

impl PyErrKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Exception => "Exception",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::OverflowError => "OverflowError",
            Self::AttributeError => "AttributeError",
            Self::KeyError => "KeyError",
            Self::RuntimeError => "RuntimeError",
            Self::UnicodeError => "UnicodeError",
        }
    }
}

/// Raised exception
#[derive(Debug, Clone, PartialEq)]
pub struct PyErr {
    pub kind: PyErrKind,
    pub message: String,
}

impl PyErr {
    pub fn new(kind: PyErrKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(PyErrKind::RuntimeError, message)
    }
}

impl fmt::Display for PyErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.message)
    }
}

impl std::error::Error for PyErr {}

impl From<BindError> for PyErr {
    fn from(err: BindError) -> Self {
        let kind = match &err {
            BindError::Foreign(inner) => return inner.clone(),
            BindError::Argument { source, .. } => PyErr::from((**source).clone()).kind,
            BindError::ArgCount { .. }
            | BindError::TypeMismatch { .. }
            | BindError::NotCallable { .. } => PyErrKind::TypeError,
            BindError::IntegerOverflow { .. } => PyErrKind::OverflowError,
            BindError::SizeMismatch { .. }
            | BindError::BufferOverflow { .. }
            | BindError::InteriorNul { .. } => PyErrKind::ValueError,
            BindError::Encoding { .. } | BindError::UnknownEncoding { .. } => {
                PyErrKind::UnicodeError
            }
            BindError::Attribute { .. } | BindError::ReadOnly { .. } => PyErrKind::AttributeError,
            BindError::NotANamespace { .. } => PyErrKind::TypeError,
            BindError::UnresolvedTarget { .. }
            | BindError::AliasOrder { .. }
            | BindError::AliasCycle { .. } => PyErrKind::KeyError,
            BindError::Config { .. }
            | BindError::Dispatcher { .. }
            | BindError::CallbackSlots { .. } => PyErrKind::RuntimeError,
        };
        PyErr::new(kind, err.to_string())
    }
}
