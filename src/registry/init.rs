//! Module initialization
//!
//! `ModuleBuilder` is what generated init code drives: it defines wrapped
//! functions, classes and submodules, records every definition under its
//! qualified name, collects aliases, and resolves them in `finish`. The
//! builder is consumed by `finish`, so one set of alias records serves
//! exactly one initialization.

use std::sync::Arc;

use super::{CrossAssign, ObjectStore};
use crate::config::BindConfig;
use crate::core::BindSeq;
use crate::dispatch::{self, AsyncDispatchError};
use crate::errors::{BindResult, PyErr, PyErrKind};
use crate::logging::{debug, error, info};
use crate::objects::{
    wrap_class, Class, FromPyArgs, Instance, IntoPyReturn, ModuleObject, ModuleRef, Property,
    PyFunction, PyObject, Scope,
};
use crate::transforms::{Bound, Callable};

/// How `finish` orders alias resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasOrder {
    /// Records resolve in the order they were made
    #[default]
    Insertion,
    /// Aliases of aliases resolve after their targets
    Dependency,
}

pub struct ModuleBuilder {
    module: ModuleRef,
    store: ObjectStore,
    pending: CrossAssign,
    config: BindConfig,
    alias_order: AliasOrder,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let module = ModuleObject::root(name);
        info!(event = "module_init_started", module = module.name(), "Initializing module");
        Self {
            module,
            store: ObjectStore::new(),
            pending: CrossAssign::new(),
            config: BindConfig::default(),
            alias_order: AliasOrder::default(),
        }
    }

    /// Apply `config` process-wide and keep it for `finish`
    pub fn with_config(mut self, config: BindConfig) -> BindResult<Self> {
        config.apply()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_alias_order(mut self, order: AliasOrder) -> Self {
        self.alias_order = order;
        self
    }

    /// Root module being built
    #[inline]
    pub fn module(&self) -> &ModuleRef {
        &self.module
    }

    #[inline]
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Define any object in `scope`
    pub fn add_object(&mut self, scope: &dyn Scope, name: &str, object: PyObject) -> &mut Self {
        scope.set_attr(name, object.clone());
        let qualified = scope.member_name(name);
        debug!(event = "symbol_defined", symbol = %qualified, kind = %object.type_name(), "Defined symbol");
        self.store.insert(qualified, object);
        self
    }

    /// Wrap `callable` and define it in the root module
    pub fn def<C>(&mut self, name: &str, callable: C) -> &mut Self
    where
        C: Callable + Send + Sync + 'static,
        C::Args: BindSeq,
        <C::Args as BindSeq>::Bindings: FromPyArgs,
        C::Output: IntoPyReturn,
    {
        let module = Arc::clone(&self.module);
        self.def_in(&*module, name, callable)
    }

    /// Wrap `callable` and define it in `scope`
    pub fn def_in<C>(&mut self, scope: &dyn Scope, name: &str, callable: C) -> &mut Self
    where
        C: Callable + Send + Sync + 'static,
        C::Args: BindSeq,
        <C::Args as BindSeq>::Bindings: FromPyArgs,
        C::Output: IntoPyReturn,
    {
        let function = Bound::new(name, callable).into_function();
        debug!(
            event = "function_wrapped",
            symbol = %scope.member_name(name),
            signature = %C::describe(),
            "Wrapped native function"
        );
        self.add_object(scope, name, PyObject::Function(function))
    }

    /// Wrap a method whose parameter 0 is the receiver
    pub fn def_method<T, C>(&mut self, class: &Class<T>, name: &str, callable: C) -> &mut Self
    where
        T: Send + 'static,
        C: Callable + Send + Sync + 'static,
        C::Args: BindSeq,
        <C::Args as BindSeq>::Bindings: FromPyArgs,
        C::Output: IntoPyReturn,
    {
        let scope: &dyn Scope = &**class.class();
        self.def_in(scope, name, callable)
    }

    /// Wrap native type `T` as a class of the root module
    pub fn class<T: Send + 'static>(&mut self, name: &str) -> Class<T> {
        let module = Arc::clone(&self.module);
        self.class_in(&*module, name)
    }

    pub fn class_in<T: Send + 'static>(&mut self, scope: &dyn Scope, name: &str) -> Class<T> {
        let class = wrap_class::<T>(scope, name);
        self.store.insert(scope.member_name(name), class.object());
        class
    }

    /// Child module of the root
    pub fn submodule(&mut self, name: &str) -> ModuleRef {
        let module = Arc::clone(&self.module);
        self.submodule_in(&*module, name)
    }

    pub fn submodule_in(&mut self, parent: &dyn Scope, name: &str) -> ModuleRef {
        let child = ModuleObject::child(parent, name);
        self.add_object(parent, name, PyObject::Module(Arc::clone(&child)));
        child
    }

    /// Make root attribute `name` refer to `target` once everything is defined
    pub fn alias(&mut self, name: &str, target: &str) -> &mut Self {
        let module: Arc<dyn Scope> = self.module.clone();
        self.alias_in(module, name, target)
    }

    pub fn alias_in(&mut self, scope: Arc<dyn Scope>, name: &str, target: &str) -> &mut Self {
        let qualified = scope.member_name(name);
        self.pending.record(scope, name, qualified, target);
        self
    }

    /// Define `set_async_callback_exception_handler` and the
    /// `AsyncDispatchException` class in the root module
    pub fn install_dispatch_api(&mut self) -> &mut Self {
        let exception = self.class::<AsyncDispatchError>("AsyncDispatchException");
        exception
            .define_property(
                "what",
                Property::new(|e: &AsyncDispatchError| Ok(PyObject::Str(e.what()))),
            )
            .define_property(
                "instance",
                Property::new(|e: &AsyncDispatchError| Ok(e.instance.clone().unwrap_or_default())),
            )
            .define_property(
                "function_name",
                Property::new(|e: &AsyncDispatchError| Ok(PyObject::Str(e.function_name.clone()))),
            );

        let setter = PyFunction::new("set_async_callback_exception_handler", set_handler_from_object);
        let name = setter.name().to_string();
        let module = Arc::clone(&self.module);
        self.add_object(&*module, &name, PyObject::Function(setter))
    }

    /// Resolve aliases, start the dispatcher if configured, and hand over the
    /// module
    pub fn finish(mut self) -> BindResult<ModuleRef> {
        match self.alias_order {
            AliasOrder::Insertion => self.pending.flush(&mut self.store)?,
            AliasOrder::Dependency => self.pending.flush_in_dependency_order(&mut self.store)?,
        }
        let aliases = self.pending.len();
        self.pending.clear();

        if self.config.callbacks.autostart_dispatcher {
            dispatch::global().ensure_started()?;
        }

        info!(
            event = "module_initialized",
            module = self.module.name(),
            symbols = self.store.len(),
            aliases,
            "Module initialized"
        );
        Ok(self.module)
    }
}

/// `set_async_callback_exception_handler(handler)`; `None` removes it
fn set_handler_from_object(args: &[PyObject]) -> Result<PyObject, PyErr> {
    let handler = match args {
        [handler] => handler.clone(),
        _ => {
            return Err(PyErr::new(
                PyErrKind::TypeError,
                format!("expected 1 argument, got {}", args.len()),
            ))
        }
    };

    match handler {
        PyObject::None => dispatch::clear_exception_handler(),
        PyObject::Function(function) => dispatch::set_exception_handler(move |failure| {
            let exception = Instance::new(failure.clone()).into_object();
            if let Err(err) = function.call(&[exception]) {
                error!(
                    event = "exception_handler_raised",
                    function = %failure.function_name,
                    error = %err,
                    "Async exception handler raised"
                );
            }
        }),
        other => {
            return Err(PyErr::new(
                PyErrKind::TypeError,
                format!("'{}' object is not callable", other.type_name()),
            ))
        }
    }
    Ok(PyObject::None)
}
