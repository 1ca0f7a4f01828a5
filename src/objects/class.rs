//! Wrapped native classes and their instances
//!
//! Design: A native struct `T` is exposed as a class object holding
//! type-erased property accessors and methods. Instances are shared
//! `Instance<T>` handles (`Arc<Mutex<T>>`), so a method call, a property
//! access and a native callback all see the same value.
//! - One class object per `TypeId`, kept in a process-wide registry so values
//!   converted from native code find their class
//! - Properties are resolved before the instance dictionary; a property
//!   without a setter is read-only

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{PyFunction, PyObject, Scope};
use crate::errors::{BindError, BindResult};
use crate::logging::debug;

// ============================================================================
// Instances
// ============================================================================

/// Shared handle to a native value owned by the object model
pub struct Instance<T>(Arc<Mutex<T>>);

impl<T> Instance<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the wrapped value, for native APIs that keep a pointer
    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.0.data_ptr()
    }
}

impl<T: Clone> Instance<T> {
    /// Copy of the current value
    pub fn get(&self) -> T {
        self.lock().clone()
    }
}

impl<T: Send + 'static> Instance<T> {
    pub fn into_object(self) -> PyObject {
        PyObject::Instance(InstanceRef::new(class_of::<T>(), self.0))
    }
}

impl<T> Clone for Instance<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Instance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance<{}>({:p})", type_name::<T>(), Arc::as_ptr(&self.0))
    }
}

/// Type-erased instance as stored in a `PyObject`
#[derive(Clone)]
pub struct InstanceRef {
    class: ClassRef,
    cell: Arc<dyn Any + Send + Sync>,
    dict: Arc<RwLock<HashMap<String, PyObject>>>,
}

impl InstanceRef {
    fn new<T: Send + 'static>(class: ClassRef, cell: Arc<Mutex<T>>) -> Self {
        Self {
            class,
            cell,
            dict: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    #[inline]
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Recover the typed handle
    pub fn downcast<T: Send + 'static>(&self) -> Option<Instance<T>> {
        Arc::clone(&self.cell).downcast::<Mutex<T>>().ok().map(Instance)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &InstanceRef) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn getattr(&self, name: &str) -> BindResult<PyObject> {
        if let Some(property) = self.class.property(name) {
            return (property.getter)(self.cell.as_ref());
        }
        if let Some(value) = self.dict.read().get(name) {
            return Ok(value.clone());
        }
        match self.class.get_attr(name) {
            Some(PyObject::Function(method)) => Ok(PyObject::Function(
                method.bind_self(PyObject::Instance(self.clone())),
            )),
            Some(other) => Ok(other),
            None => Err(BindError::Attribute {
                type_name: self.class.name().to_string(),
                attr: name.to_string(),
            }),
        }
    }

    pub fn setattr(&self, name: &str, value: PyObject) -> BindResult<()> {
        match self.class.property(name) {
            Some(ErasedProperty { setter: Some(setter), .. }) => setter(self.cell.as_ref(), &value),
            Some(ErasedProperty { setter: None, .. }) => Err(BindError::ReadOnly {
                attr: name.to_string(),
            }),
            None => {
                self.dict.write().insert(name.to_string(), value);
                Ok(())
            }
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

type Getter<T> = Arc<dyn Fn(&T) -> BindResult<PyObject> + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&mut T, &PyObject) -> BindResult<()> + Send + Sync>;

type ErasedGetter = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> BindResult<PyObject> + Send + Sync>;
type ErasedSetter =
    Arc<dyn Fn(&(dyn Any + Send + Sync), &PyObject) -> BindResult<()> + Send + Sync>;

/// Getter and optional setter over a native struct
pub struct Property<T> {
    getter: Getter<T>,
    setter: Option<Setter<T>>,
}

impl<T> Property<T> {
    /// Read-only until a setter is attached
    pub fn new<G>(getter: G) -> Self
    where
        G: Fn(&T) -> BindResult<PyObject> + Send + Sync + 'static,
    {
        Self {
            getter: Arc::new(getter),
            setter: None,
        }
    }

    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(&mut T, &PyObject) -> BindResult<()> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    #[inline]
    pub fn is_readonly(&self) -> bool {
        self.setter.is_none()
    }

    pub fn get(&self, target: &T) -> BindResult<PyObject> {
        (self.getter)(target)
    }

    pub fn set(&self, target: &mut T, value: &PyObject) -> BindResult<()> {
        match &self.setter {
            Some(setter) => setter(target, value),
            None => Err(BindError::ReadOnly {
                attr: type_name::<T>().to_string(),
            }),
        }
    }
}

#[derive(Clone)]
struct ErasedProperty {
    getter: ErasedGetter,
    setter: Option<ErasedSetter>,
}

fn locate<T: Send + 'static>(cell: &(dyn Any + Send + Sync)) -> BindResult<&Mutex<T>> {
    cell.downcast_ref::<Mutex<T>>().ok_or(BindError::TypeMismatch {
        expected: type_name::<T>(),
        found: "instance of another class".to_string(),
    })
}

impl<T: Send + 'static> Property<T> {
    fn erase(self) -> ErasedProperty {
        let getter = self.getter;
        let erased_getter: ErasedGetter = Arc::new(move |cell: &(dyn Any + Send + Sync)| {
            let value = locate::<T>(cell)?.lock();
            getter(&value)
        });
        let erased_setter = self.setter.map(|setter| -> ErasedSetter {
            Arc::new(move |cell: &(dyn Any + Send + Sync), incoming: &PyObject| {
                let mut value = locate::<T>(cell)?.lock();
                setter(&mut value, incoming)
            })
        });
        ErasedProperty {
            getter: erased_getter,
            setter: erased_setter,
        }
    }
}

// ============================================================================
// Classes
// ============================================================================

pub type ClassRef = Arc<ClassObject>;

pub struct ClassObject {
    name: String,
    qualified: String,
    type_id: TypeId,
    attrs: RwLock<HashMap<String, PyObject>>,
    properties: RwLock<HashMap<String, ErasedProperty>>,
}

impl ClassObject {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    fn property(&self, name: &str) -> Option<ErasedProperty> {
        self.properties.read().get(name).cloned()
    }

    /// Sorted property names
    pub fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.properties.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// `Some(true)` when the property accepts writes
    pub fn is_writable(&self, name: &str) -> Option<bool> {
        self.properties.read().get(name).map(|p| p.setter.is_some())
    }
}

impl Scope for ClassObject {
    fn qualified_name(&self) -> &str {
        &self.qualified
    }

    fn set_attr(&self, name: &str, value: PyObject) {
        self.attrs.write().insert(name.to_string(), value);
    }

    fn get_attr(&self, name: &str) -> Option<PyObject> {
        self.attrs.read().get(name).cloned()
    }
}

static CLASSES: Lazy<DashMap<TypeId, ClassRef>> = Lazy::new(DashMap::new);

fn new_class<T: 'static>(name: String, qualified: String) -> ClassRef {
    Arc::new(ClassObject {
        name,
        qualified,
        type_id: TypeId::of::<T>(),
        attrs: RwLock::new(HashMap::new()),
        properties: RwLock::new(HashMap::new()),
    })
}

/// Class registered for `T`, or an anonymous one named after the type
pub fn class_of<T: 'static>() -> ClassRef {
    CLASSES
        .entry(TypeId::of::<T>())
        .or_insert_with(|| {
            let full = type_name::<T>();
            let short = full.rsplit("::").next().unwrap_or(full).to_string();
            new_class::<T>(short, full.to_string())
        })
        .clone()
}

/// Expose `T` as class `name` inside `scope`
pub fn wrap_class<T: Send + 'static>(scope: &dyn Scope, name: &str) -> Class<T> {
    let class = new_class::<T>(name.to_string(), scope.member_name(name));
    CLASSES.insert(TypeId::of::<T>(), Arc::clone(&class));
    scope.set_attr(name, PyObject::Class(Arc::clone(&class)));
    debug!(
        event = "class_wrapped",
        class = %class.qualified,
        native = type_name::<T>(),
        "Wrapped native class"
    );
    Class {
        class,
        _marker: PhantomData,
    }
}

/// Typed handle used while defining a class
pub struct Class<T> {
    class: ClassRef,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Class<T> {
    pub fn define_property(&self, name: &str, property: Property<T>) -> &Self {
        self.class
            .properties
            .write()
            .insert(name.to_string(), property.erase());
        self
    }

    pub fn define_method(&self, name: &str, method: PyFunction) -> &Self {
        self.class.define_callable(name, method);
        self
    }

    /// Wrap a native value as an instance of this class
    pub fn instantiate(&self, value: T) -> PyObject {
        PyObject::Instance(InstanceRef::new(
            Arc::clone(&self.class),
            Arc::new(Mutex::new(value)),
        ))
    }

    #[inline]
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    pub fn object(&self) -> PyObject {
        PyObject::Class(Arc::clone(&self.class))
    }
}

impl<T> Clone for Class<T> {
    fn clone(&self) -> Self {
        Self {
            class: Arc::clone(&self.class),
            _marker: PhantomData,
        }
    }
}
