//! Callable objects

use std::fmt;
use std::sync::Arc;

use super::PyObject;
use crate::errors::PyErr;

type NativeCall = dyn Fn(&[PyObject]) -> Result<PyObject, PyErr> + Send + Sync;

/// Function object: a name plus a type-erased call entry
#[derive(Clone)]
pub struct PyFunction {
    name: Arc<str>,
    func: Arc<NativeCall>,
}

impl PyFunction {
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&[PyObject]) -> Result<PyObject, PyErr> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn call(&self, args: &[PyObject]) -> Result<PyObject, PyErr> {
        (self.func)(args)
    }

    /// Bind `receiver` as the first argument
    pub fn bind_self(&self, receiver: PyObject) -> PyFunction {
        let func = Arc::clone(&self.func);
        PyFunction::new(Arc::clone(&self.name), move |args: &[PyObject]| {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(receiver.clone());
            full.extend_from_slice(args);
            func(&full)
        })
    }

    #[inline]
    pub fn ptr_eq(&self, other: &PyFunction) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }

    /// Address of the shared callable, stable while any clone is alive
    #[inline]
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.func) as *const () as usize
    }
}

impl fmt::Debug for PyFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}
