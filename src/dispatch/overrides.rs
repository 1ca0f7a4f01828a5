//! Calls into foreign overrides of native virtual methods
//!
//! Native interfaces with virtual callbacks (an event sink with `on_*`
//! methods) are implemented on the native side by a shim that calls
//! `call_override` for every method. When the foreign instance defines the
//! method, it is called with converted arguments in the given mode;
//! otherwise the native fallback runs.

use std::panic::{catch_unwind, AssertUnwindSafe};

use super::{global, AsyncDispatchError, CallMode, CallbackMode};
use crate::core::binding::panic_message;
use crate::errors::{PyErr, PyErrKind};
use crate::logging::trace;
use crate::objects::{FromPy, IntoPyArgs, PyFunction, PyObject};

fn lookup(instance: &PyObject, name: &str) -> Option<PyFunction> {
    match instance.getattr(name) {
        Ok(PyObject::Function(method)) => Some(method),
        _ => None,
    }
}

fn call_method<A, R>(method: &PyFunction, args: A) -> Result<R, PyErr>
where
    A: IntoPyArgs,
    R: FromPy,
{
    let result = catch_unwind(AssertUnwindSafe(|| method.call(&args.into_py_args())))
        .map_err(|payload| {
            PyErr::new(
                PyErrKind::RuntimeError,
                format!("override `{}` panicked: {}", method.name(), panic_message(&*payload)),
            )
        })??;
    Ok(R::from_py(&result)?)
}

/// Call `instance.name(*args)` if the instance overrides it, else `fallback`
///
/// In async mode the override runs on the dispatcher and `R::default()` is
/// returned immediately.
pub fn call_override<M, A, R, F>(instance: &PyObject, name: &str, args: A, fallback: F) -> R
where
    M: CallMode,
    A: IntoPyArgs + Send + 'static,
    R: FromPy + Default + Send + 'static,
    F: FnOnce(A) -> R,
{
    let Some(method) = lookup(instance, name) else {
        return fallback(args);
    };
    trace!(event = "override_call", method = name, mode = ?M::MODE, "Calling foreign override");

    match M::MODE {
        CallbackMode::Direct => match call_method::<A, R>(&method, args) {
            Ok(value) => value,
            Err(err) => {
                super::handler::report(AsyncDispatchError::new(name, Some(instance.clone()), err));
                R::default()
            }
        },
        CallbackMode::Async => {
            let instance = instance.clone();
            let name = name.to_string();
            global().add(move || {
                if let Err(err) = call_method::<A, R>(&method, args) {
                    super::handler::report(AsyncDispatchError::new(name, Some(instance), err));
                }
            });
            R::default()
        }
    }
}
