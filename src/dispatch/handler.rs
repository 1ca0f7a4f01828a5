//! Async exception handler hook
//!
//! A callback delivered through the dispatcher has no caller to raise into.
//! Its failure is packaged as an `AsyncDispatchError` and handed to the
//! installed handler, or logged at `error` when none is installed.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::core::binding::panic_message;
use crate::errors::PyErr;
use crate::logging::error;
use crate::objects::PyObject;

/// A callback failure reported outside of any foreign call
#[derive(Debug, Clone)]
pub struct AsyncDispatchError {
    pub function_name: String,
    /// Receiver of a failing override, if any
    pub instance: Option<PyObject>,
    pub error: PyErr,
}

impl AsyncDispatchError {
    pub fn new(function_name: impl Into<String>, instance: Option<PyObject>, error: PyErr) -> Self {
        Self {
            function_name: function_name.into(),
            instance,
            error,
        }
    }

    /// Text of the underlying exception
    pub fn what(&self) -> String {
        self.error.to_string()
    }
}

type Handler = Arc<dyn Fn(&AsyncDispatchError) + Send + Sync>;

static HANDLER: Lazy<RwLock<Option<Handler>>> = Lazy::new(|| RwLock::new(None));

/// Replace the process-wide handler
pub fn set_exception_handler<F>(handler: F)
where
    F: Fn(&AsyncDispatchError) + Send + Sync + 'static,
{
    *HANDLER.write() = Some(Arc::new(handler));
}

pub fn clear_exception_handler() {
    *HANDLER.write() = None;
}

pub fn report(failure: AsyncDispatchError) {
    let handler = HANDLER.read().clone();
    match handler {
        Some(handler) => {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(&failure))) {
                error!(
                    event = "exception_handler_panicked",
                    function = %failure.function_name,
                    message = %panic_message(&*payload),
                    "Async exception handler panicked"
                );
            }
        }
        None => error!(
            event = "async_callback_failed",
            function = %failure.function_name,
            error = %failure.error,
            "Callback raised with no exception handler installed"
        ),
    }
}
