//! Signature introspection for native entry points
//!
//! Design: Function-pointer types carry their whole signature, so
//! introspection is a trait implemented per arity and calling convention:
//! - `NativeFn` for free functions (`fn`, `extern "C" fn`, `unsafe extern "C" fn`)
//! - `MemberFn` for methods taking `&mut C` or `&C`; the receiver becomes an
//!   `Instance<C>` at parameter index 0
//!
//! Passing anything that is not a function pointer fails to compile.

use std::any::type_name;
use std::fmt;

use super::seq::TypeSeq;
use crate::objects::Instance;

/// Calling convention of a native entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abi {
    Rust,
    C,
}

/// Free function pointer with a statically known signature
pub trait NativeFn: Copy + Send + Sync {
    /// Ordered parameter types
    type Args: TypeSeq;
    /// Return type
    type Ret;

    const ABI: Abi;

    /// Call through the pointer
    fn call_native(self, args: Self::Args) -> Self::Ret;
}

/// Method pointer whose first parameter is the receiver
pub trait MemberFn: Copy + Send + Sync {
    /// Owner class
    type Class;
    /// Parameters after the receiver
    type Params: TypeSeq;
    /// Receiver handle followed by `Params`
    type Args: TypeSeq;
    type Ret;

    /// Lock the receiver and call
    fn call_member(self, args: Self::Args) -> Self::Ret;
}

macro_rules! impl_native_fn {
    ($($a:ident)*) => {
        impl<$($a,)* R> NativeFn for fn($($a),*) -> R {
            type Args = ($($a,)*);
            type Ret = R;
            const ABI: Abi = Abi::Rust;

            #[inline]
            #[allow(non_snake_case)]
            fn call_native(self, ($($a,)*): Self::Args) -> R {
                (self)($($a),*)
            }
        }

        impl<$($a,)* R> NativeFn for extern "C" fn($($a),*) -> R {
            type Args = ($($a,)*);
            type Ret = R;
            const ABI: Abi = Abi::C;

            #[inline]
            #[allow(non_snake_case)]
            fn call_native(self, ($($a,)*): Self::Args) -> R {
                (self)($($a),*)
            }
        }

        impl<$($a,)* R> NativeFn for unsafe extern "C" fn($($a),*) -> R {
            type Args = ($($a,)*);
            type Ret = R;
            const ABI: Abi = Abi::C;

            #[inline]
            #[allow(non_snake_case)]
            fn call_native(self, ($($a,)*): Self::Args) -> R {
                // SAFETY: the binding declares this exact signature for the
                // symbol, and argument validity is the native API's contract.
                unsafe { (self)($($a),*) }
            }
        }

        impl<C, $($a,)* R> MemberFn for fn(&mut C, $($a),*) -> R {
            type Class = C;
            type Params = ($($a,)*);
            type Args = (Instance<C>, $($a,)*);
            type Ret = R;

            #[inline]
            #[allow(non_snake_case)]
            fn call_member(self, (this, $($a,)*): Self::Args) -> R {
                // SAFETY: `this` keeps the instance alive for the call. The
                // lock is not held, so callbacks into the same instance run;
                // the method must not use its receiver across such a call.
                let receiver = unsafe { &mut *this.as_ptr() };
                (self)(receiver, $($a),*)
            }
        }

        impl<C, $($a,)* R> MemberFn for fn(&C, $($a),*) -> R {
            type Class = C;
            type Params = ($($a,)*);
            type Args = (Instance<C>, $($a,)*);
            type Ret = R;

            #[inline]
            #[allow(non_snake_case)]
            fn call_member(self, (this, $($a,)*): Self::Args) -> R {
                // SAFETY: as above, the receiver is the instance's storage.
                let receiver = unsafe { &*this.as_ptr() };
                (self)(receiver, $($a),*)
            }
        }
    };
}

impl_native_fn!();
impl_native_fn!(A0);
impl_native_fn!(A0 A1);
impl_native_fn!(A0 A1 A2);
impl_native_fn!(A0 A1 A2 A3);
impl_native_fn!(A0 A1 A2 A3 A4);
impl_native_fn!(A0 A1 A2 A3 A4 A5);
impl_native_fn!(A0 A1 A2 A3 A4 A5 A6);
impl_native_fn!(A0 A1 A2 A3 A4 A5 A6 A7);
impl_native_fn!(A0 A1 A2 A3 A4 A5 A6 A7 A8);

// Full ten-parameter arity is only available to free functions; a method's
// receiver already occupies one slot.
impl<A0, A1, A2, A3, A4, A5, A6, A7, A8, A9, R> NativeFn
    for extern "C" fn(A0, A1, A2, A3, A4, A5, A6, A7, A8, A9) -> R
{
    type Args = (A0, A1, A2, A3, A4, A5, A6, A7, A8, A9);
    type Ret = R;
    const ABI: Abi = Abi::C;

    #[inline]
    #[allow(non_snake_case)]
    fn call_native(self, (A0, A1, A2, A3, A4, A5, A6, A7, A8, A9): Self::Args) -> R {
        (self)(A0, A1, A2, A3, A4, A5, A6, A7, A8, A9)
    }
}

/// Printable description of an entry point, used in logs and errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub abi: Abi,
    pub class: Option<&'static str>,
    pub params: Vec<&'static str>,
    pub ret: &'static str,
}

impl Signature {
    /// Describe a free function
    pub fn of<F: NativeFn>(_entry: F) -> Self {
        Self {
            abi: F::ABI,
            class: None,
            params: F::Args::type_names().into_vec(),
            ret: type_name::<F::Ret>(),
        }
    }

    /// Describe a method; `params` excludes the receiver
    pub fn of_method<F: MemberFn>(_entry: F) -> Self {
        Self {
            abi: Abi::Rust,
            class: Some(type_name::<F::Class>()),
            params: F::Params::type_names().into_vec(),
            ret: type_name::<F::Ret>(),
        }
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.abi == Abi::C {
            write!(f, "extern \"C\" ")?;
        }
        match self.class {
            Some(class) => write!(f, "fn({}::self", class)?,
            None => write!(f, "fn(")?,
        }
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 || self.class.is_some() {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}
