//! Callback + user-data pairs become closures
//!
//! Design: A C API that takes `void (*cb)(A.., void *user), void *user`
//! cannot accept a closure directly. `Callback<I, M>` replaces the pair at
//! `I`, `I + 1` with one `Closure`:
//! - the closure is boxed and its address passed as the user-data pointer
//! - a capture-free `extern "C"` trampoline, generic over the callback's
//!   signature and the call mode, rebuilds the closure from that pointer
//! - arguments are value-copied before delivery (`Capture`)
//!
//! The box is never freed: the native side may call the callback for as long
//! as it keeps the registration, and it never says when that ends.

use std::ffi::c_void;
use std::marker::PhantomData;

use super::{Callable, Transform};
use crate::core::{Capture, Closure, Insert, Inserted, Remove, Removed, Taken, TypeSeq};
use crate::dispatch::{Async, CallMode};
use crate::errors::BindResult;
use crate::logging::{trace, warn};

/// C callback whose last parameter is the opaque user-data pointer
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a C callback taking user data as its last parameter",
    note = "expected `extern \"C\" fn(.., *mut c_void) -> R` (optionally `unsafe` or wrapped in `Option`)"
)]
pub trait UserDataCallback: Sized {
    /// Captured argument tuple handed to the closure
    type Args: Send + 'static;
    type Ret: Default + Send + 'static;

    /// Capture-free entry point that forwards to the closure behind the
    /// user-data pointer
    fn trampoline<M: CallMode>() -> Self;
}

/// Closure type a callback parameter is replaced with
pub type ClosureOf<F> = Closure<<F as UserDataCallback>::Args, <F as UserDataCallback>::Ret>;

macro_rules! user_data_callback {
    ($($a:ident $v:ident)*) => {
        impl<$($a,)* R> UserDataCallback for extern "C" fn($($a,)* *mut c_void) -> R
        where
            $($a: Capture + 'static,)*
            R: Default + Send + 'static,
        {
            type Args = ($(<$a as Capture>::Owned,)*);
            type Ret = R;

            fn trampoline<M: CallMode>() -> Self {
                extern "C" fn forward<M: CallMode, $($a,)* R>($($v: $a,)* user_data: *mut c_void) -> R
                where
                    $($a: Capture + 'static,)*
                    R: Default + Send + 'static,
                {
                    if user_data.is_null() {
                        warn!(event = "callback_null_user_data", "Callback invoked without user data");
                        return R::default();
                    }
                    // SAFETY: user_data is the boxed closure leaked by
                    // `WithCallback::invoke` for exactly this signature.
                    let closure = unsafe { &*(user_data as *const Closure<($(<$a as Capture>::Owned,)*), R>) };
                    // SAFETY: arguments come straight from the native caller.
                    #[allow(unused_unsafe)]
                    let args = unsafe { ($($v.capture(),)*) };
                    M::deliver(closure, args)
                }

                forward::<M, $($a,)* R>
            }
        }

        impl<$($a,)* R> UserDataCallback for unsafe extern "C" fn($($a,)* *mut c_void) -> R
        where
            $($a: Capture + 'static,)*
            R: Default + Send + 'static,
        {
            type Args = ($(<$a as Capture>::Owned,)*);
            type Ret = R;

            fn trampoline<M: CallMode>() -> Self {
                let safe = <extern "C" fn($($a,)* *mut c_void) -> R as UserDataCallback>::trampoline::<M>();
                safe as unsafe extern "C" fn($($a,)* *mut c_void) -> R
            }
        }
    };
}

user_data_callback!();
user_data_callback!(A0 a0);
user_data_callback!(A0 a0 A1 a1);
user_data_callback!(A0 a0 A1 a1 A2 a2);
user_data_callback!(A0 a0 A1 a1 A2 a2 A3 a3);
user_data_callback!(A0 a0 A1 a1 A2 a2 A3 a3 A4 a4);
user_data_callback!(A0 a0 A1 a1 A2 a2 A3 a3 A4 a4 A5 a5);

/// Nullable callback pointers as emitted for C headers
impl<F: UserDataCallback> UserDataCallback for Option<F> {
    type Args = F::Args;
    type Ret = F::Ret;

    #[inline]
    fn trampoline<M: CallMode>() -> Self {
        Some(F::trampoline::<M>())
    }
}

/// Replace the callback at `I` and the user data at `I + 1` with a closure
pub struct Callback<const I: usize, M = Async>(PhantomData<fn() -> M>);

pub struct WithCallback<C, const I: usize, M> {
    inner: C,
    _mode: PhantomData<fn() -> M>,
}

type CallbackAt<S, const I: usize> = Taken<S, I>;
type WithoutPair<S, const I: usize> = Removed<Removed<S, I>, I>;
type OuterArgs<S, const I: usize> = Inserted<WithoutPair<S, I>, I, ClosureOf<CallbackAt<S, I>>>;

impl<C, const I: usize, M> Callable for WithCallback<C, I, M>
where
    C: Callable,
    M: CallMode,
    C::Args: Remove<I>,
    CallbackAt<C::Args, I>: UserDataCallback,
    Removed<C::Args, I>: Remove<I, Item = *mut c_void>
        + Insert<I, CallbackAt<C::Args, I>, Output = C::Args>,
    WithoutPair<C::Args, I>: Insert<I, ClosureOf<CallbackAt<C::Args, I>>>
        + Insert<I, *mut c_void, Output = Removed<C::Args, I>>,
    OuterArgs<C::Args, I>: TypeSeq
        + Remove<I, Item = ClosureOf<CallbackAt<C::Args, I>>, Rest = WithoutPair<C::Args, I>>,
{
    type Args = OuterArgs<C::Args, I>;
    type Output = C::Output;

    fn invoke(&self, args: Self::Args) -> BindResult<C::Output> {
        let (closure, rest) = <OuterArgs<C::Args, I> as Remove<I>>::remove(args);
        trace!(
            event = "callback_leaked",
            callback = closure.name(),
            mode = ?M::MODE,
            "Boxed closure handed to native code"
        );
        let user_data = Box::into_raw(Box::new(closure)) as *mut c_void;

        let with_user_data =
            <WithoutPair<C::Args, I> as Insert<I, *mut c_void>>::insert(rest, user_data);
        let trampoline = <CallbackAt<C::Args, I> as UserDataCallback>::trampoline::<M>();
        let native = <Removed<C::Args, I> as Insert<I, CallbackAt<C::Args, I>>>::insert(
            with_user_data,
            trampoline,
        );
        self.inner.invoke(native)
    }
}

impl<C, const I: usize, M> Transform<C> for Callback<I, M>
where
    C: Callable,
    WithCallback<C, I, M>: Callable,
{
    type Output = WithCallback<C, I, M>;

    #[inline]
    fn transform(inner: C) -> WithCallback<C, I, M> {
        WithCallback {
            inner,
            _mode: PhantomData,
        }
    }
}
