//! Array and C-string parameters become sequences and strings
//!
//! Design: Both transforms replace one pointer parameter with an owned
//! value and keep the native storage on the wrapper's stack for the duration
//! of the inner call:
//! - `Array<I>` takes `*const [E; N]` / `*mut [E; N]`; the outer side passes a
//!   `Vec<E>` of at most `N` elements, the missing tail is `E::default()`
//! - `Str<I>` takes `*const c_char`; the outer side passes a `String`, encoded
//!   with the active codec and NUL-terminated
//!
//! Writes the callee makes through a `*mut` array are not reflected back;
//! combine with `Output<I>` when they matter.

use std::ffi::{c_char, CString};

use super::strings::active_codec;
use super::{Callable, Transform};
use crate::core::{Insert, Inserted, Remove, Removed, Taken, TypeSeq};
use crate::errors::{BindError, BindResult};

/// Parameter kinds that accept a sequence
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be wrapped as an array parameter",
    note = "only `*const [E; N]` and `*mut [E; N]` with `E: Copy + Default` are supported"
)]
pub trait ArrayArg {
    type Elem;
    type Storage;
    const CAPACITY: usize;

    /// Copy `values` into native storage, rejecting more than `CAPACITY`
    fn fill(values: Vec<Self::Elem>) -> BindResult<Self::Storage>;

    fn point_at(storage: &mut Self::Storage) -> Self;
}

fn fill_array<E: Copy + Default, const N: usize>(values: Vec<E>) -> BindResult<[E; N]> {
    if values.len() > N {
        return Err(BindError::SizeMismatch {
            capacity: N,
            size: values.len(),
        });
    }
    let mut storage = [E::default(); N];
    storage[..values.len()].copy_from_slice(&values);
    Ok(storage)
}

impl<E: Copy + Default, const N: usize> ArrayArg for *const [E; N] {
    type Elem = E;
    type Storage = [E; N];
    const CAPACITY: usize = N;

    #[inline]
    fn fill(values: Vec<E>) -> BindResult<[E; N]> {
        fill_array(values)
    }

    #[inline(always)]
    fn point_at(storage: &mut [E; N]) -> Self {
        storage as *const [E; N]
    }
}

impl<E: Copy + Default, const N: usize> ArrayArg for *mut [E; N] {
    type Elem = E;
    type Storage = [E; N];
    const CAPACITY: usize = N;

    #[inline]
    fn fill(values: Vec<E>) -> BindResult<[E; N]> {
        fill_array(values)
    }

    #[inline(always)]
    fn point_at(storage: &mut [E; N]) -> Self {
        storage as *mut [E; N]
    }
}

type ElemAt<S, const I: usize> = <Taken<S, I> as ArrayArg>::Elem;
type ArrayArgs<S, const I: usize> = Inserted<Removed<S, I>, I, Vec<ElemAt<S, I>>>;

/// Turn array-pointer parameter `I` into a sequence
pub struct Array<const I: usize>;

pub struct WithArray<C, const I: usize> {
    inner: C,
}

impl<C, const I: usize> Callable for WithArray<C, I>
where
    C: Callable,
    C::Args: Remove<I>,
    Taken<C::Args, I>: ArrayArg,
    Removed<C::Args, I>:
        Insert<I, Taken<C::Args, I>, Output = C::Args> + Insert<I, Vec<ElemAt<C::Args, I>>>,
    ArrayArgs<C::Args, I>:
        TypeSeq + Remove<I, Item = Vec<ElemAt<C::Args, I>>, Rest = Removed<C::Args, I>>,
{
    type Args = ArrayArgs<C::Args, I>;
    type Output = C::Output;

    fn invoke(&self, args: Self::Args) -> BindResult<C::Output> {
        let (values, rest) = <ArrayArgs<C::Args, I> as Remove<I>>::remove(args);
        let mut storage = <Taken<C::Args, I> as ArrayArg>::fill(values).map_err(|e| e.at_argument(I))?;
        let pointer = <Taken<C::Args, I> as ArrayArg>::point_at(&mut storage);
        let native = <Removed<C::Args, I> as Insert<I, Taken<C::Args, I>>>::insert(rest, pointer);
        self.inner.invoke(native)
    }
}

impl<C, const I: usize> Transform<C> for Array<I>
where
    C: Callable,
    WithArray<C, I>: Callable,
{
    type Output = WithArray<C, I>;

    #[inline]
    fn transform(inner: C) -> WithArray<C, I> {
        WithArray { inner }
    }
}

/// Parameter kinds that accept a string
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be wrapped as a string parameter",
    note = "only `*const c_char` is supported"
)]
pub trait CStrArg {
    fn point_at(storage: &CString) -> Self;
}

impl CStrArg for *const c_char {
    #[inline(always)]
    fn point_at(storage: &CString) -> Self {
        storage.as_ptr()
    }
}

/// Encode with the active codec into a NUL-terminated buffer
pub fn encode_c_string(text: &str) -> BindResult<CString> {
    let bytes = active_codec().encode(text)?;
    CString::new(bytes).map_err(|e| BindError::InteriorNul {
        position: e.nul_position(),
    })
}

type StrArgs<S, const I: usize> = Inserted<Removed<S, I>, I, String>;

/// Turn C-string parameter `I` into a string
pub struct Str<const I: usize>;

pub struct WithStr<C, const I: usize> {
    inner: C,
}

impl<C, const I: usize> Callable for WithStr<C, I>
where
    C: Callable,
    C::Args: Remove<I>,
    Taken<C::Args, I>: CStrArg,
    Removed<C::Args, I>: Insert<I, Taken<C::Args, I>, Output = C::Args> + Insert<I, String>,
    StrArgs<C::Args, I>: TypeSeq + Remove<I, Item = String, Rest = Removed<C::Args, I>>,
{
    type Args = StrArgs<C::Args, I>;
    type Output = C::Output;

    fn invoke(&self, args: Self::Args) -> BindResult<C::Output> {
        let (text, rest) = <StrArgs<C::Args, I> as Remove<I>>::remove(args);
        let storage = encode_c_string(&text).map_err(|e| e.at_argument(I))?;
        let pointer = <Taken<C::Args, I> as CStrArg>::point_at(&storage);
        let native = <Removed<C::Args, I> as Insert<I, Taken<C::Args, I>>>::insert(rest, pointer);
        // storage outlives the call
        let output = self.inner.invoke(native);
        drop(storage);
        output
    }
}

impl<C, const I: usize> Transform<C> for Str<I>
where
    C: Callable,
    WithStr<C, I>: Callable,
{
    type Output = WithStr<C, I>;

    #[inline]
    fn transform(inner: C) -> WithStr<C, I> {
        WithStr { inner }
    }
}
