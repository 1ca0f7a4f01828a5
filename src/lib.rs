//! typthon-bind - compile-time signature transforms for exposing C APIs to
//! the Typthon object model
//!
//! A native entry point is wrapped by a chain of transforms, each rewriting
//! one impedance mismatch between C and the object model:
//! - callback + user-data pairs become closures (`Callback<I>`)
//! - output pointers become extra return values (`Output<I>`)
//! - array pointers and C strings become sequences and strings (`Array<I>`, `Str<I>`)
//!
//! ```
//! use typthon_bind::transforms::{Callable, Output};
//!
//! extern "C" fn divmod(a: i32, b: i32, rem: *mut i32) -> i32 {
//!     unsafe { *rem = a % b };
//!     a / b
//! }
//!
//! let wrapped = typthon_bind::transform!(divmod as extern "C" fn(i32, i32, *mut i32) -> i32; Output<2>);
//! assert_eq!(wrapped.invoke((17, 5)).unwrap(), (3, 2));
//! ```
//!
//! Architecture:
//! - `core` - Type sequences, signature introspection, binding resolution
//! - `transforms` - Transform chain engine and transform families
//! - `objects` - In-memory object model the wrappers are exposed to
//! - `registry` - Deferred assignment and module initialization
//! - `dispatch` - Callback delivery and the async dispatcher
//! - `config`, `errors`, `logging` - Ambient configuration, errors, tracing

pub mod config;
pub mod core;
pub mod dispatch;
pub mod errors;
pub mod logging;
pub mod objects;
pub mod registry;
pub mod transforms;

// Re-export commonly used items
pub use config::BindConfig;
pub use crate::core::{Bind, Closure, NativeFn, Signature};
pub use dispatch::{CallbackMode, Dispatcher};
pub use errors::{BindError, BindResult, PyErr, PyErrKind};
pub use objects::{PyFunction, PyObject, Scope};
pub use registry::{CrossAssign, ModuleBuilder, ObjectStore};
pub use transforms::{apply, Array, Bound, Callable, Callback, Method, Native, Output, Str};

/// Host initialization: logging from `TYPTHON_BIND_LOG_*`
#[no_mangle]
pub extern "C" fn typthon_bind_init() {
    logging::init();
}

/// Stop the dispatcher after it drains its queue and wait for it
#[no_mangle]
pub extern "C" fn typthon_bind_shutdown() {
    let dispatcher = dispatch::global();
    dispatcher.stop();
    dispatcher.join();
}
