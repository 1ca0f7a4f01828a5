//! Signature transforms - rewrite native signatures into object-model ones
//!
//! Design: A transform is a type (`Output<1>`, `Callback<0, Direct>`) that
//! wraps one `Callable` in another with a different parameter list or output
//! tuple. A chain is a tuple of transforms folded left to right, so every
//! index refers to the signature produced by the transforms before it.
//! Everything about the shape is decided at compile time:
//! - an index past the end has no `Remove` impl
//! - a parameter of the wrong kind has no `OutArg` / `UserDataCallback` impl
//! - a parameter type without a `Bind` impl cannot be exposed
//!
//! ```compile_fail
//! use typthon_bind::transforms::{apply, Native, Output};
//!
//! extern "C" fn get(handle: i32, out: *mut i32) -> i32 { 0 }
//! // index 2 does not exist in a two-parameter signature
//! let _ = apply::<(Output<2>,), _>(Native::new(get as extern "C" fn(i32, *mut i32) -> i32));
//! ```
//!
//! Architecture:
//! - `output.rs` - Output arguments become extra return values
//! - `callback.rs` - Callback + user-data pairs become closures
//! - `sequence.rs` - Array and C-string parameters become sequences/strings
//! - `fields.rs` - Struct fields become properties
//! - `strings.rs` - Native encoding conversion for character buffers

pub mod callback;
pub mod fields;
pub mod output;
pub mod sequence;
pub mod strings;

pub use callback::{Callback, UserDataCallback};
pub use fields::{Field, FieldValue};
pub use output::{OutArg, Output};
pub use sequence::{Array, Str};
pub use strings::{OverflowPolicy, StringCodec};

use std::any::type_name;
use std::sync::Arc;

use crate::core::{BindSeq, MemberFn, NativeFn, Signature, TypeSeq};
use crate::errors::{BindResult, PyErr};
use crate::logging::trace;
use crate::objects::{FromPyArgs, IntoPyReturn, PyFunction, PyObject};

/// Anything with a typed parameter list and output tuple
pub trait Callable {
    type Args: TypeSeq;
    /// `(ret, out_1, .., out_n)`
    type Output;

    fn invoke(&self, args: Self::Args) -> BindResult<Self::Output>;

    /// `(A, B) -> (R, O)` rendering for logs
    fn describe() -> String
    where
        Self: Sized,
    {
        format!("{} -> {}", Self::Args::describe(), type_name::<Self::Output>())
    }
}

/// Rewrites a callable's signature
pub trait Transform<C: Callable> {
    type Output: Callable;
    fn transform(inner: C) -> Self::Output;
}

/// Tuple of transforms applied left to right
pub trait TransformList<C: Callable> {
    type Output: Callable;
    fn apply(inner: C) -> Self::Output;
}

impl<C: Callable> TransformList<C> for () {
    type Output = C;

    #[inline]
    fn apply(inner: C) -> C {
        inner
    }
}

macro_rules! transform_list {
    ($first:ident $($rest:ident)*) => {
        impl<C, $first, $($rest,)*> TransformList<C> for ($first, $($rest,)*)
        where
            C: Callable,
            $first: Transform<C>,
            ($($rest,)*): TransformList<<$first as Transform<C>>::Output>,
        {
            type Output = <($($rest,)*) as TransformList<<$first as Transform<C>>::Output>>::Output;

            #[inline]
            fn apply(inner: C) -> Self::Output {
                <($($rest,)*)>::apply($first::transform(inner))
            }
        }
    };
}

transform_list!(X0);
transform_list!(X0 X1);
transform_list!(X0 X1 X2);
transform_list!(X0 X1 X2 X3);
transform_list!(X0 X1 X2 X3 X4);
transform_list!(X0 X1 X2 X3 X4 X5);
transform_list!(X0 X1 X2 X3 X4 X5 X6);
transform_list!(X0 X1 X2 X3 X4 X5 X6 X7);

/// Instantiate a transform chain over an entry point
#[inline]
pub fn apply<L, C>(entry: C) -> L::Output
where
    C: Callable,
    L: TransformList<C>,
{
    L::apply(entry)
}

/// `transform!(func as extern "C" fn(i32, *mut i32) -> i32; Output<1>)`
///
/// The entry ends at `;`, so void entry types such as
/// `extern "C" fn(i32, *mut i32)` need no return arrow.
#[macro_export]
macro_rules! transform {
    ($entry:expr; $($t:ty),* $(,)?) => {
        $crate::transforms::apply::<($($t,)*), _>($crate::transforms::Native::new($entry))
    };
}

// ============================================================================
// Entry points
// ============================================================================

/// Free function entry point
#[derive(Clone, Copy)]
pub struct Native<F> {
    func: F,
}

impl<F: NativeFn> Native<F> {
    pub const fn new(func: F) -> Self {
        Self { func }
    }

    pub fn signature(&self) -> Signature {
        Signature::of(self.func)
    }
}

impl<F: NativeFn> Callable for Native<F> {
    type Args = F::Args;
    type Output = (F::Ret,);

    #[inline]
    fn invoke(&self, args: F::Args) -> BindResult<(F::Ret,)> {
        Ok((self.func.call_native(args),))
    }
}

/// Method entry point; parameter 0 is the receiver
#[derive(Clone, Copy)]
pub struct Method<F> {
    func: F,
}

impl<F: MemberFn> Method<F> {
    pub const fn new(func: F) -> Self {
        Self { func }
    }

    pub fn signature(&self) -> Signature {
        Signature::of_method(self.func)
    }
}

impl<F: MemberFn> Callable for Method<F> {
    type Args = F::Args;
    type Output = (F::Ret,);

    #[inline]
    fn invoke(&self, args: F::Args) -> BindResult<(F::Ret,)> {
        Ok((self.func.call_member(args),))
    }
}

// ============================================================================
// Object-model surface
// ============================================================================

/// A transformed callable reachable from the object model: converts
/// positional arguments through each parameter's binding type, invokes, and
/// shapes the return value
pub struct Bound<C> {
    name: Arc<str>,
    inner: C,
}

impl<C> Bound<C>
where
    C: Callable,
    C::Args: BindSeq,
    <C::Args as BindSeq>::Bindings: FromPyArgs,
    C::Output: IntoPyReturn,
{
    pub fn new(name: impl Into<Arc<str>>, inner: C) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[PyObject]) -> BindResult<PyObject> {
        let bindings = <<C::Args as BindSeq>::Bindings as FromPyArgs>::from_py_args(args)?;
        let native = <C::Args as BindSeq>::resolve_all(bindings)?;
        trace!(event = "native_call", name = %self.name, "Calling native entry point");
        let output = self.inner.invoke(native)?;
        Ok(output.into_py_return())
    }

    pub fn into_function(self) -> PyFunction
    where
        C: Send + Sync + 'static,
    {
        let name = Arc::clone(&self.name);
        PyFunction::new(name, move |args: &[PyObject]| {
            self.call(args).map_err(PyErr::from)
        })
    }
}

#[cfg(test)]
mod tests;
