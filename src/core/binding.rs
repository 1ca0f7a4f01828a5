//! Binding-type resolution
//!
//! Design: Each native parameter type names the type the object model hands
//! over for it (its *binding*), and how to turn that value back into the
//! native one:
//! - Scalars, pointers, strings, vectors, closures and instances bind to
//!   themselves
//! - C function pointers bind to a [`Closure`]; resolving claims one of a
//!   fixed pool of per-signature slots and returns the capture-free
//!   trampoline that reads it, so each resolved pointer keeps calling the
//!   closure it was resolved from
//! - Anything else has no `Bind` impl and is rejected at compile time
//!
//! ```compile_fail
//! use typthon_bind::core::Bind;
//!
//! struct Opaque;
//! fn needs_binding<T: Bind>() {}
//! needs_binding::<Opaque>(); // error: no resolver for type `Opaque`
//! ```

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::{Any, TypeId};
use std::ffi::{c_char, CStr};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::dispatch;
use crate::errors::{BindError, BindResult, PyErr, PyErrKind};
use crate::logging::{trace, warn};
use crate::objects::{Instance, PyObject};
use crate::transforms::strings;

/// Maps a native type to its binding type
#[diagnostic::on_unimplemented(
    message = "no resolver for type `{Self}`",
    label = "this parameter type cannot be bound",
    note = "implement `Bind` for `{Self}` or wrap the parameter with a transform"
)]
pub trait Bind: Sized {
    /// Value the object model supplies for this parameter
    type Binding;

    /// Recover the native value
    fn resolve(binding: Self::Binding) -> BindResult<Self>;
}

/// `Bind` lifted over a parameter tuple
pub trait BindSeq: Sized {
    type Bindings;
    fn resolve_all(bindings: Self::Bindings) -> BindResult<Self>;
}

macro_rules! bind_identity {
    ($($t:ty),* $(,)?) => {
        $(
            impl Bind for $t {
                type Binding = $t;

                #[inline(always)]
                fn resolve(binding: $t) -> BindResult<$t> {
                    Ok(binding)
                }
            }
        )*
    };
}

bind_identity!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, char, String, PyObject,
);

impl<T> Bind for Vec<T> {
    type Binding = Vec<T>;

    #[inline(always)]
    fn resolve(binding: Self) -> BindResult<Self> {
        Ok(binding)
    }
}

impl<T> Bind for *const T {
    type Binding = *const T;

    #[inline(always)]
    fn resolve(binding: Self) -> BindResult<Self> {
        Ok(binding)
    }
}

impl<T> Bind for *mut T {
    type Binding = *mut T;

    #[inline(always)]
    fn resolve(binding: Self) -> BindResult<Self> {
        Ok(binding)
    }
}

impl<C> Bind for Instance<C> {
    type Binding = Instance<C>;

    #[inline(always)]
    fn resolve(binding: Self) -> BindResult<Self> {
        Ok(binding)
    }
}

impl<A, R> Bind for Closure<A, R> {
    type Binding = Closure<A, R>;

    #[inline(always)]
    fn resolve(binding: Self) -> BindResult<Self> {
        Ok(binding)
    }
}

/// Nullable function pointers bind to an optional closure
impl<T: Bind> Bind for Option<T> {
    type Binding = Option<T::Binding>;

    #[inline]
    fn resolve(binding: Self::Binding) -> BindResult<Self> {
        binding.map(T::resolve).transpose()
    }
}

macro_rules! bind_seq {
    ($($t:ident $v:ident)*) => {
        impl<$($t: Bind,)*> BindSeq for ($($t,)*) {
            type Bindings = ($($t::Binding,)*);

            #[inline]
            #[allow(clippy::unused_unit)]
            fn resolve_all(($($v,)*): Self::Bindings) -> BindResult<Self> {
                Ok(($($t::resolve($v)?,)*))
            }
        }
    };
}

bind_seq!();
bind_seq!(T0 v0);
bind_seq!(T0 v0 T1 v1);
bind_seq!(T0 v0 T1 v1 T2 v2);
bind_seq!(T0 v0 T1 v1 T2 v2 T3 v3);
bind_seq!(T0 v0 T1 v1 T2 v2 T3 v3 T4 v4);
bind_seq!(T0 v0 T1 v1 T2 v2 T3 v3 T4 v4 T5 v5);
bind_seq!(T0 v0 T1 v1 T2 v2 T3 v3 T4 v4 T5 v5 T6 v6);
bind_seq!(T0 v0 T1 v1 T2 v2 T3 v3 T4 v4 T5 v5 T6 v6 T7 v7);
bind_seq!(T0 v0 T1 v1 T2 v2 T3 v3 T4 v4 T5 v5 T6 v6 T7 v7 T8 v8);
bind_seq!(T0 v0 T1 v1 T2 v2 T3 v3 T4 v4 T5 v5 T6 v6 T7 v7 T8 v8 T9 v9);

// ============================================================================
// Closures
// ============================================================================

type ClosureFn<A, R> = dyn Fn(A) -> Result<R, PyErr> + Send + Sync;

/// Foreign callable seen from native code: takes the captured argument
/// tuple, may raise
pub struct Closure<A, R> {
    name: Arc<str>,
    func: Arc<ClosureFn<A, R>>,
    /// Address of the callable this closure stands for
    identity: usize,
}

impl<A, R> Closure<A, R> {
    /// Wrap a fallible callable
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(A) -> Result<R, PyErr> + Send + Sync + 'static,
    {
        let func: Arc<ClosureFn<A, R>> = Arc::new(func);
        Self {
            name: name.into(),
            identity: Arc::as_ptr(&func) as *const () as usize,
            func,
        }
    }

    /// Wrap an infallible callable
    pub fn from_fn<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self::new(name, move |args| Ok(func(args)))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stand for another object's callable, e.g. the function object a
    /// closure was converted from
    pub(crate) fn with_identity(mut self, identity: usize) -> Self {
        self.identity = identity;
        self
    }

    /// Same underlying callable
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }

    #[inline]
    pub fn call(&self, args: A) -> Result<R, PyErr> {
        (self.func)(args)
    }

    /// Call, turning a panic into a `RuntimeError`
    pub fn call_guarded(&self, args: A) -> Result<R, PyErr> {
        match catch_unwind(AssertUnwindSafe(|| (self.func)(args))) {
            Ok(result) => result,
            Err(payload) => Err(PyErr::new(
                PyErrKind::RuntimeError,
                format!("callback `{}` panicked: {}", self.name, panic_message(&*payload)),
            )),
        }
    }
}

impl<A, R> Clone for Closure<A, R> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            func: Arc::clone(&self.func),
            identity: self.identity,
        }
    }
}

impl<A, R> fmt::Debug for Closure<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure").field("name", &self.name).finish()
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ============================================================================
// Callback argument capture
// ============================================================================

/// Converts a native callback argument into an owned value that can outlive
/// the native call
pub trait Capture {
    type Owned: Send + 'static;

    /// # Safety
    /// Pointer arguments must be null or valid for reads for the duration of
    /// the call.
    unsafe fn capture(self) -> Self::Owned;
}

macro_rules! capture_copy {
    ($($t:ty),* $(,)?) => {
        $(
            impl Capture for $t {
                type Owned = $t;

                #[inline(always)]
                unsafe fn capture(self) -> $t {
                    self
                }
            }
        )*
    };
}

capture_copy!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, char);

/// Plain values a callback may receive by pointer; the pointee is cloned at
/// trampoline time. `c_char` is left out so C strings decode whole.
pub trait Pointee: Clone + Send + 'static {}

macro_rules! pointee {
    ($($t:ty),* $(,)?) => {
        $(impl Pointee for $t {})*
    };
}

pointee!(i16, i32, i64, isize, u16, u32, u64, usize, f32, f64, bool);

/// Null becomes `None`
impl<T: Pointee> Capture for *const T {
    type Owned = Option<T>;

    #[inline]
    unsafe fn capture(self) -> Option<T> {
        self.as_ref().cloned()
    }
}

impl<T: Pointee> Capture for *mut T {
    type Owned = Option<T>;

    #[inline]
    unsafe fn capture(self) -> Option<T> {
        self.as_ref().cloned()
    }
}

/// NUL-terminated text, decoded with the active native encoding
impl Capture for *const c_char {
    type Owned = Option<String>;

    unsafe fn capture(self) -> Option<String> {
        if self.is_null() {
            return None;
        }
        let bytes = CStr::from_ptr(self).to_bytes();
        Some(strings::active_codec().decode(bytes))
    }
}

impl Capture for *mut c_char {
    type Owned = Option<String>;

    #[inline]
    unsafe fn capture(self) -> Option<String> {
        (self as *const c_char).capture()
    }
}

// ============================================================================
// Slot-backed function pointers
// ============================================================================

/// Trampolines available per callback signature
pub const TRAMPOLINES_PER_SIGNATURE: usize = 16;

type SlotKey = (TypeId, usize);

/// Each trampoline is bound to one closure for as long as its slot is held
static SLOTS: Lazy<DashMap<SlotKey, Arc<dyn Any + Send + Sync>>> = Lazy::new(DashMap::new);

/// Claim a slot for `closure`: the slot already holding this closure, or the
/// first free one
fn claim_slot<A, R>(closure: Closure<A, R>) -> Result<usize, BindError>
where
    A: 'static,
    R: 'static,
{
    let signature = TypeId::of::<Closure<A, R>>();
    for index in 0..TRAMPOLINES_PER_SIGNATURE {
        let held = SLOTS.get(&(signature, index));
        if let Some(entry) = held {
            if let Some(existing) = entry.value().downcast_ref::<Closure<A, R>>() {
                if existing.ptr_eq(&closure) {
                    return Ok(index);
                }
            }
        }
    }
    for index in 0..TRAMPOLINES_PER_SIGNATURE {
        if let Entry::Vacant(vacant) = SLOTS.entry((signature, index)) {
            trace!(
                event = "slot_claimed",
                signature = std::any::type_name::<Closure<A, R>>(),
                index,
                closure = closure.name(),
                "Callback slot claimed"
            );
            vacant.insert(Arc::new(closure));
            return Ok(index);
        }
    }
    Err(BindError::CallbackSlots {
        signature: std::any::type_name::<Closure<A, R>>(),
        capacity: TRAMPOLINES_PER_SIGNATURE,
    })
}

fn slot<A: 'static, R: 'static>(index: usize) -> Option<Closure<A, R>> {
    SLOTS
        .get(&(TypeId::of::<Closure<A, R>>(), index))
        .and_then(|entry| entry.value().downcast_ref::<Closure<A, R>>().cloned())
}

fn deliver_from_slot<const K: usize, A, R>(args: A) -> R
where
    A: Send + 'static,
    R: Default + Send + 'static,
{
    match slot::<A, R>(K) {
        Some(closure) => dispatch::deliver(dispatch::default_mode(), &closure, args),
        None => {
            warn!(
                event = "slot_empty",
                signature = std::any::type_name::<Closure<A, R>>(),
                index = K,
                "Native code invoked a released callback"
            );
            R::default()
        }
    }
}

/// C function pointer types backed by a pool of slot trampolines
pub trait SlotTrampoline: Sized {
    /// Closure the trampolines forward to
    type Target: Any + Send + Sync;

    /// Trampoline reading slot `K`
    fn entry<const K: usize>() -> Self;

    /// Slot index served by `self`, if it is one of the pool's trampolines
    fn slot_index(self) -> Option<usize>;
}

macro_rules! pool_match {
    ($k:expr, $f:ty; $($n:literal)*) => {
        match $k {
            $($n => Some(<$f as SlotTrampoline>::entry::<$n>()),)*
            _ => None,
        }
    };
}

fn pool_entry<F: SlotTrampoline>(index: usize) -> Option<F> {
    pool_match!(index, F; 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15)
}

/// Free the slot behind a trampoline returned by `Bind::resolve`. Native
/// code still holding the pointer gets `R::default()` afterwards. Returns
/// false for pointers the pool did not hand out.
pub fn release_trampoline<F: SlotTrampoline>(trampoline: F) -> bool {
    let Some(index) = trampoline.slot_index() else {
        return false;
    };
    let released = SLOTS
        .remove(&(TypeId::of::<F::Target>(), index))
        .is_some();
    trace!(
        event = "slot_released",
        signature = std::any::type_name::<F::Target>(),
        index,
        released,
        "Callback slot released"
    );
    released
}

macro_rules! bind_fn_pointer {
    ($($a:ident $v:ident)*) => {
        impl<$($a,)* R> SlotTrampoline for extern "C" fn($($a),*) -> R
        where
            $($a: Capture + 'static,)*
            R: Default + Send + 'static,
        {
            type Target = Closure<($(<$a as Capture>::Owned,)*), R>;

            fn entry<const K: usize>() -> Self {
                extern "C" fn trampoline<const K: usize, $($a,)* R>($($v: $a),*) -> R
                where
                    $($a: Capture + 'static,)*
                    R: Default + Send + 'static,
                {
                    // SAFETY: native code passes arguments valid for this call.
                    #[allow(unused_unsafe)]
                    let args = unsafe { ($($v.capture(),)*) };
                    deliver_from_slot::<K, _, R>(args)
                }

                trampoline::<K, $($a,)* R>
            }

            fn slot_index(self) -> Option<usize> {
                let address = self as usize;
                (0..TRAMPOLINES_PER_SIGNATURE).find(|&index| {
                    pool_entry::<Self>(index).map(|entry| entry as usize) == Some(address)
                })
            }
        }

        impl<$($a,)* R> Bind for extern "C" fn($($a),*) -> R
        where
            $($a: Capture + 'static,)*
            R: Default + Send + 'static,
        {
            type Binding = Closure<($(<$a as Capture>::Owned,)*), R>;

            fn resolve(binding: Self::Binding) -> BindResult<Self> {
                let index = claim_slot(binding)?;
                pool_entry::<Self>(index).ok_or(BindError::CallbackSlots {
                    signature: std::any::type_name::<Self::Binding>(),
                    capacity: TRAMPOLINES_PER_SIGNATURE,
                })
            }
        }

        impl<$($a,)* R> Bind for unsafe extern "C" fn($($a),*) -> R
        where
            $($a: Capture + 'static,)*
            R: Default + Send + 'static,
        {
            type Binding = Closure<($(<$a as Capture>::Owned,)*), R>;

            fn resolve(binding: Self::Binding) -> BindResult<Self> {
                let safe = <extern "C" fn($($a),*) -> R as Bind>::resolve(binding)?;
                Ok(safe as unsafe extern "C" fn($($a),*) -> R)
            }
        }
    };
}

bind_fn_pointer!();
bind_fn_pointer!(A0 a0);
bind_fn_pointer!(A0 a0 A1 a1);
bind_fn_pointer!(A0 a0 A1 a1 A2 a2);
bind_fn_pointer!(A0 a0 A1 a1 A2 a2 A3 a3);
bind_fn_pointer!(A0 a0 A1 a1 A2 a2 A3 a3 A4 a4);
bind_fn_pointer!(A0 a0 A1 a1 A2 a2 A3 a3 A4 a4 A5 a5);
