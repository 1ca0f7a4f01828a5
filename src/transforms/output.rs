//! Output arguments become extra return values
//!
//! `Output<I>` drops pointer parameter `I` from the outer signature, passes
//! the address of a default-initialized local instead, and appends the
//! local's final value to the output tuple. Several outputs accumulate in
//! the order the transforms are applied:
//!
//! ```
//! use typthon_bind::transforms::{apply, Callable, Native, Output};
//!
//! extern "C" fn split(value: f64, whole: *mut i64, frac: *mut f64) -> bool {
//!     unsafe {
//!         *whole = value.trunc() as i64;
//!         *frac = value.fract();
//!     }
//!     true
//! }
//!
//! // `frac` sits at index 2 originally but at index 1 once `whole` is gone
//! let wrapped = apply::<(Output<1>, Output<1>), _>(Native::new(
//!     split as extern "C" fn(f64, *mut i64, *mut f64) -> bool,
//! ));
//! assert_eq!(wrapped.invoke((2.5,)).unwrap(), (true, 2, 0.5));
//! ```

use super::{Callable, Transform};
use crate::core::{Append, Insert, Remove, Removed, Taken, TypeSeq};
use crate::errors::BindResult;

/// Parameter kinds that can be turned into an output value
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be wrapped as an output argument",
    note = "only `*mut T` parameters with `T: Default` are supported; reference parameters are not"
)]
pub trait OutArg {
    type Value: Default;

    fn point_at(slot: &mut Self::Value) -> Self;
}

impl<T: Default> OutArg for *mut T {
    type Value = T;

    #[inline(always)]
    fn point_at(slot: &mut T) -> *mut T {
        slot as *mut T
    }
}

/// Value produced by the output parameter at `I`
pub type OutValue<S, const I: usize> = <Taken<S, I> as OutArg>::Value;

/// Turn pointer parameter `I` into a trailing return value
pub struct Output<const I: usize>;

pub struct WithOutput<C, const I: usize> {
    inner: C,
}

impl<C, const I: usize> Callable for WithOutput<C, I>
where
    C: Callable,
    C::Args: Remove<I>,
    Taken<C::Args, I>: OutArg,
    Removed<C::Args, I>: TypeSeq + Insert<I, Taken<C::Args, I>, Output = C::Args>,
    C::Output: Append<OutValue<C::Args, I>>,
{
    type Args = Removed<C::Args, I>;
    type Output = <C::Output as Append<OutValue<C::Args, I>>>::Output;

    fn invoke(&self, args: Self::Args) -> BindResult<Self::Output> {
        let mut slot = <OutValue<C::Args, I> as Default>::default();
        let pointer = <Taken<C::Args, I> as OutArg>::point_at(&mut slot);
        let native = <Removed<C::Args, I> as Insert<I, Taken<C::Args, I>>>::insert(args, pointer);
        let output = self.inner.invoke(native)?;
        Ok(output.append(slot))
    }
}

impl<C, const I: usize> Transform<C> for Output<I>
where
    C: Callable,
    WithOutput<C, I>: Callable,
{
    type Output = WithOutput<C, I>;

    #[inline]
    fn transform(inner: C) -> WithOutput<C, I> {
        WithOutput { inner }
    }
}
