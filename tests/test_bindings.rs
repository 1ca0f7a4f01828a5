use proptest::prelude::*;

use typthon_bind::core::BindSeq;
use typthon_bind::dispatch::{self, CallbackMode};
use typthon_bind::objects::{FromPy, FromPyArgs, IntoPy, PyObject};
use typthon_bind::transforms::{Bound, Native};
use typthon_bind::{Bind, PyFunction};

extern "C" fn echo(value: i64) -> i64 {
    value
}

extern "C" fn apply_twice(f: extern "C" fn(i32) -> i32, x: i32) -> i32 {
    f(f(x))
}

fn round_trip<T: IntoPy + FromPy>(value: T) -> T {
    T::from_py(&value.into_py()).unwrap()
}

proptest! {
    #[test]
    fn prop_integers_bind_to_themselves(a in any::<i64>(), b in any::<i32>(), c in any::<u32>(), d in any::<u8>()) {
        prop_assert_eq!(<i64 as Bind>::resolve(a), Ok(a));
        prop_assert_eq!(<(i32, u32, u8) as BindSeq>::resolve_all((b, c, d)), Ok((b, c, d)));
        prop_assert_eq!(round_trip(a), a);
        prop_assert_eq!(round_trip(b), b);
        prop_assert_eq!(round_trip(c), c);
    }

    #[test]
    fn prop_floats_and_flags(x in proptest::num::f64::NORMAL, flag in any::<bool>()) {
        prop_assert_eq!(<f64 as Bind>::resolve(x), Ok(x));
        prop_assert_eq!(round_trip(x), x);
        prop_assert_eq!(round_trip(flag), flag);
    }

    #[test]
    fn prop_strings_bind_to_themselves(text in ".*") {
        prop_assert_eq!(<String as Bind>::resolve(text.clone()), Ok(text.clone()));
        prop_assert_eq!(round_trip(text.clone()), text);
    }

    #[test]
    fn prop_sequences_round_trip(values in proptest::collection::vec(any::<i32>(), 0..32)) {
        prop_assert_eq!(<Vec<i32> as Bind>::resolve(values.clone()), Ok(values.clone()));
        prop_assert_eq!(round_trip(values.clone()), values);
    }

    #[test]
    fn prop_bound_identity_call(value in any::<i64>()) {
        let bound = Bound::new("echo", Native::new(echo as extern "C" fn(i64) -> i64));
        prop_assert_eq!(bound.call(&[PyObject::Int(value)]).unwrap(), PyObject::Int(value));
    }
}

#[test]
fn test_out_of_range_integer_is_rejected() {
    assert!(u8::from_py(&PyObject::Int(-1)).is_err());
    assert!(i32::from_py(&PyObject::Int(i64::from(i32::MAX) + 1)).is_err());
}

#[test]
fn test_function_pointer_parameter_binds_to_closure() {
    dispatch::set_default_mode(CallbackMode::Direct);
    let bound = Bound::new(
        "apply_twice",
        Native::new(apply_twice as extern "C" fn(extern "C" fn(i32) -> i32, i32) -> i32),
    );
    let add_three = PyFunction::new("add_three", |args: &[PyObject]| {
        let (x,) = <(i64,)>::from_py_args(args)?;
        Ok(PyObject::Int(x + 3))
    });
    assert_eq!(
        bound.call(&[PyObject::Function(add_three), PyObject::Int(1)]).unwrap(),
        PyObject::Int(7)
    );
}

extern "C" fn apply_once(f: extern "C" fn(i64) -> i64, x: i64) -> i64 {
    f(x)
}

#[test]
fn test_function_pointer_arguments_do_not_share_a_trampoline() {
    dispatch::set_default_mode(CallbackMode::Direct);
    let bound = Bound::new(
        "apply_once",
        Native::new(apply_once as extern "C" fn(extern "C" fn(i64) -> i64, i64) -> i64),
    );
    let double = PyFunction::new("double", |args: &[PyObject]| {
        let (x,) = <(i64,)>::from_py_args(args)?;
        Ok(PyObject::Int(x * 2))
    });
    let negate = PyFunction::new("negate", |args: &[PyObject]| {
        let (x,) = <(i64,)>::from_py_args(args)?;
        Ok(PyObject::Int(-x))
    });

    // the same function object keeps reusing one trampoline
    for round in 0..40 {
        assert_eq!(
            bound.call(&[PyObject::Function(double.clone()), PyObject::Int(round)]).unwrap(),
            PyObject::Int(round * 2)
        );
        assert_eq!(
            bound.call(&[PyObject::Function(negate.clone()), PyObject::Int(round)]).unwrap(),
            PyObject::Int(-round)
        );
    }
}
