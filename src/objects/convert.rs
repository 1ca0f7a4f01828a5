//! Native <-> object conversions
//!
//! Design: Two directions, each a trait implemented by macro for the scalar
//! families:
//! - `FromPy` checks the object type and numeric range before narrowing
//! - `IntoPy` never fails; `IS_VOID` marks `()` so a wrapper with a void
//!   return and output arguments returns just the outputs
//!
//! Tuple-level traits convert whole argument packs and output tuples.

use num_traits::NumCast;
use smallvec::SmallVec;
use std::any::type_name;

use super::{Instance, PyFunction, PyObject};
use crate::core::Closure;
use crate::errors::{BindError, BindResult, PyErr};

/// Object -> native value
pub trait FromPy: Sized {
    fn from_py(obj: &PyObject) -> BindResult<Self>;
}

/// Native value -> object
pub trait IntoPy {
    /// True only for `()`
    const IS_VOID: bool = false;

    fn into_py(self) -> PyObject;
}

/// Argument pack from a call's positional arguments
pub trait FromPyArgs: Sized {
    fn from_py_args(args: &[PyObject]) -> BindResult<Self>;
}

/// Argument pack to positional arguments
pub trait IntoPyArgs {
    fn into_py_args(self) -> SmallVec<[PyObject; 4]>;
}

/// Output tuple `(ret, out_1, .., out_n)` to the value a call returns
pub trait IntoPyReturn {
    fn into_py_return(self) -> PyObject;
}

fn mismatch<T>(obj: &PyObject) -> BindError {
    BindError::TypeMismatch {
        expected: type_name::<T>(),
        found: obj.type_name(),
    }
}

macro_rules! convert_int {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromPy for $t {
                fn from_py(obj: &PyObject) -> BindResult<Self> {
                    match obj {
                        PyObject::Int(v) => <$t as NumCast>::from(*v).ok_or_else(|| {
                            BindError::IntegerOverflow {
                                value: v.to_string(),
                                target: stringify!($t),
                            }
                        }),
                        PyObject::Bool(b) => Ok(*b as $t),
                        other => Err(mismatch::<$t>(other)),
                    }
                }
            }

            impl IntoPy for $t {
                #[inline]
                fn into_py(self) -> PyObject {
                    // Values past i64::MAX degrade to float
                    match <i64 as NumCast>::from(self) {
                        Some(v) => PyObject::Int(v),
                        None => PyObject::Float(self as f64),
                    }
                }
            }
        )*
    };
}

convert_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! convert_float {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromPy for $t {
                fn from_py(obj: &PyObject) -> BindResult<Self> {
                    match obj {
                        PyObject::Float(v) => Ok(*v as $t),
                        PyObject::Int(v) => Ok(*v as $t),
                        other => Err(mismatch::<$t>(other)),
                    }
                }
            }

            impl IntoPy for $t {
                #[inline]
                fn into_py(self) -> PyObject {
                    PyObject::Float(self as f64)
                }
            }
        )*
    };
}

convert_float!(f32, f64);

impl FromPy for bool {
    fn from_py(obj: &PyObject) -> BindResult<Self> {
        match obj {
            PyObject::Bool(b) => Ok(*b),
            other => Err(mismatch::<bool>(other)),
        }
    }
}

impl IntoPy for bool {
    #[inline]
    fn into_py(self) -> PyObject {
        PyObject::Bool(self)
    }
}

impl FromPy for char {
    fn from_py(obj: &PyObject) -> BindResult<Self> {
        if let PyObject::Str(s) = obj {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Ok(c);
            }
        }
        Err(mismatch::<char>(obj))
    }
}

impl IntoPy for char {
    fn into_py(self) -> PyObject {
        PyObject::Str(self.to_string())
    }
}

impl FromPy for String {
    fn from_py(obj: &PyObject) -> BindResult<Self> {
        match obj {
            PyObject::Str(s) => Ok(s.clone()),
            other => Err(mismatch::<String>(other)),
        }
    }
}

impl IntoPy for String {
    #[inline]
    fn into_py(self) -> PyObject {
        PyObject::Str(self)
    }
}

impl IntoPy for &str {
    #[inline]
    fn into_py(self) -> PyObject {
        PyObject::Str(self.to_string())
    }
}

impl FromPy for PyObject {
    #[inline]
    fn from_py(obj: &PyObject) -> BindResult<Self> {
        Ok(obj.clone())
    }
}

impl IntoPy for PyObject {
    #[inline]
    fn into_py(self) -> PyObject {
        self
    }
}

impl IntoPy for PyFunction {
    #[inline]
    fn into_py(self) -> PyObject {
        PyObject::Function(self)
    }
}

/// A void return accepts whatever the callee returned
impl FromPy for () {
    #[inline]
    fn from_py(_obj: &PyObject) -> BindResult<Self> {
        Ok(())
    }
}

impl IntoPy for () {
    const IS_VOID: bool = true;

    #[inline]
    fn into_py(self) -> PyObject {
        PyObject::None
    }
}

impl<T: FromPy> FromPy for Option<T> {
    fn from_py(obj: &PyObject) -> BindResult<Self> {
        match obj {
            PyObject::None => Ok(None),
            other => T::from_py(other).map(Some),
        }
    }
}

impl<T: IntoPy> IntoPy for Option<T> {
    fn into_py(self) -> PyObject {
        match self {
            Some(value) => value.into_py(),
            None => PyObject::None,
        }
    }
}

impl<T: FromPy> FromPy for Vec<T> {
    fn from_py(obj: &PyObject) -> BindResult<Self> {
        match obj {
            PyObject::List(items) | PyObject::Tuple(items) => {
                items.iter().map(T::from_py).collect()
            }
            other => Err(mismatch::<Vec<T>>(other)),
        }
    }
}

impl<T: IntoPy> IntoPy for Vec<T> {
    fn into_py(self) -> PyObject {
        PyObject::List(self.into_iter().map(IntoPy::into_py).collect())
    }
}

// Raw pointers travel as integer addresses; `None` is null
impl<T> FromPy for *const T {
    fn from_py(obj: &PyObject) -> BindResult<Self> {
        match obj {
            PyObject::None => Ok(std::ptr::null()),
            PyObject::Int(addr) => Ok(*addr as usize as *const T),
            other => Err(mismatch::<*const T>(other)),
        }
    }
}

impl<T> FromPy for *mut T {
    fn from_py(obj: &PyObject) -> BindResult<Self> {
        <*const T>::from_py(obj).map(|ptr| ptr as *mut T)
    }
}

impl<T> IntoPy for *const T {
    fn into_py(self) -> PyObject {
        if self.is_null() {
            PyObject::None
        } else {
            (self as usize).into_py()
        }
    }
}

impl<T> IntoPy for *mut T {
    fn into_py(self) -> PyObject {
        (self as *const T).into_py()
    }
}

impl<T: Send + 'static> FromPy for Instance<T> {
    fn from_py(obj: &PyObject) -> BindResult<Self> {
        match obj {
            PyObject::Instance(inst) => inst.downcast::<T>().ok_or_else(|| mismatch::<T>(obj)),
            other => Err(mismatch::<T>(other)),
        }
    }
}

impl<T: Send + 'static> IntoPy for Instance<T> {
    fn into_py(self) -> PyObject {
        self.into_object()
    }
}

/// A function object becomes a closure that converts arguments out and the
/// result back in
impl<A, R> FromPy for Closure<A, R>
where
    A: IntoPyArgs + 'static,
    R: FromPy + 'static,
{
    fn from_py(obj: &PyObject) -> BindResult<Self> {
        match obj {
            PyObject::Function(func) => {
                let identity = func.identity();
                let func = func.clone();
                let closure = Closure::new(func.name().to_string(), move |args: A| {
                    let result = func.call(&args.into_py_args())?;
                    R::from_py(&result).map_err(PyErr::from)
                });
                Ok(closure.with_identity(identity))
            }
            other => Err(mismatch::<Closure<A, R>>(other)),
        }
    }
}

impl<A, R> IntoPy for Closure<A, R>
where
    A: FromPyArgs + 'static,
    R: IntoPy + 'static,
{
    fn into_py(self) -> PyObject {
        let name = self.name().to_string();
        PyObject::Function(PyFunction::new(name, move |args: &[PyObject]| {
            let unpacked = A::from_py_args(args)?;
            Ok(self.call(unpacked)?.into_py())
        }))
    }
}

macro_rules! convert_tuple {
    ($($t:ident $v:ident)*) => {
        impl<$($t: FromPy,)*> FromPyArgs for ($($t,)*) {
            #[allow(unused_variables, unused_mut, unused_assignments, clippy::unused_unit)]
            fn from_py_args(args: &[PyObject]) -> BindResult<Self> {
                let expected = <($($t,)*) as crate::core::TypeSeq>::LEN;
                if args.len() != expected {
                    return Err(BindError::ArgCount {
                        expected,
                        got: args.len(),
                    });
                }
                let mut index = 0usize;
                $(
                    let $v = args
                        .get(index)
                        .ok_or(BindError::ArgCount { expected, got: index })
                        .and_then($t::from_py)
                        .map_err(|e| e.at_argument(index))?;
                    index += 1;
                )*
                Ok(($($v,)*))
            }
        }

        impl<$($t: IntoPy,)*> IntoPyArgs for ($($t,)*) {
            #[allow(unused_mut)]
            fn into_py_args(self) -> SmallVec<[PyObject; 4]> {
                let ($($v,)*) = self;
                let mut args = SmallVec::new();
                $(args.push($v.into_py());)*
                args
            }
        }

        impl<Ret: IntoPy, $($t: IntoPy,)*> IntoPyReturn for (Ret, $($t,)*) {
            #[allow(unused_mut)]
            fn into_py_return(self) -> PyObject {
                let (ret, $($v,)*) = self;
                let mut outputs: Vec<PyObject> = Vec::new();
                $(outputs.push($v.into_py());)*
                if outputs.is_empty() {
                    return ret.into_py();
                }
                if Ret::IS_VOID {
                    if outputs.len() == 1 {
                        return outputs.remove(0);
                    }
                    return PyObject::Tuple(outputs);
                }
                outputs.insert(0, ret.into_py());
                PyObject::Tuple(outputs)
            }
        }
    };
}

convert_tuple!();
convert_tuple!(T0 v0);
convert_tuple!(T0 v0 T1 v1);
convert_tuple!(T0 v0 T1 v1 T2 v2);
convert_tuple!(T0 v0 T1 v1 T2 v2 T3 v3);
convert_tuple!(T0 v0 T1 v1 T2 v2 T3 v3 T4 v4);
convert_tuple!(T0 v0 T1 v1 T2 v2 T3 v3 T4 v4 T5 v5);
convert_tuple!(T0 v0 T1 v1 T2 v2 T3 v3 T4 v4 T5 v5 T6 v6);
convert_tuple!(T0 v0 T1 v1 T2 v2 T3 v3 T4 v4 T5 v5 T6 v6 T7 v7);
convert_tuple!(T0 v0 T1 v1 T2 v2 T3 v3 T4 v4 T5 v5 T6 v6 T7 v7 T8 v8);
convert_tuple!(T0 v0 T1 v1 T2 v2 T3 v3 T4 v4 T5 v5 T6 v6 T7 v7 T8 v8 T9 v9);

/// Convert a `Clone` struct by value through its wrapped class
///
/// ```
/// #[derive(Clone, Default)]
/// struct Tick { price: f64 }
/// typthon_bind::py_value!(Tick);
///
/// use typthon_bind::objects::{FromPy, IntoPy};
/// let obj = Tick { price: 1.5 }.into_py();
/// assert_eq!(Tick::from_py(&obj).unwrap().price, 1.5);
/// ```
#[macro_export]
macro_rules! py_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl $crate::objects::IntoPy for $t {
                fn into_py(self) -> $crate::objects::PyObject {
                    $crate::objects::Instance::new(self).into_object()
                }
            }

            impl $crate::objects::FromPy for $t {
                fn from_py(obj: &$crate::objects::PyObject) -> $crate::errors::BindResult<Self> {
                    let handle = <$crate::objects::Instance<$t> as $crate::objects::FromPy>::from_py(obj)?;
                    Ok(handle.get())
                }
            }
        )*
    };
}
