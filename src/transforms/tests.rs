use super::*;
use crate::core::{Closure, SeqIds};
use crate::dispatch::{self, Direct};
use crate::objects::Instance;
use crossbeam::channel::unbounded;
use std::ffi::c_void;
use std::time::Duration;

type Notify = extern "C" fn(i32, *mut c_void) -> i32;
type Sink = extern "C" fn(i32, *mut c_void);

extern "C" fn divmod(a: i32, b: i32, rem: *mut i32) -> i32 {
    unsafe { *rem = a % b };
    a / b
}

extern "C" fn fill(seed: i32, first: *mut i32, second: *mut i32) {
    unsafe {
        *first = seed;
        *second = seed * 2;
    }
}

extern "C" fn subscribe(id: i32, cb: Notify, user: *mut c_void) -> i32 {
    cb(id * 2, user)
}

extern "C" fn query(
    handle: i32,
    status: *mut i32,
    cb: Sink,
    user: *mut c_void,
    ratio: *mut f64,
) -> i32 {
    cb(handle, user);
    unsafe {
        *status = 200;
        *ratio = 0.25;
    }
    handle + 1
}

struct Gauge {
    level: i64,
}

impl Gauge {
    fn scaled(&self, factor: i64, out: *mut i64) -> bool {
        unsafe { *out = self.level * factor };
        true
    }
}

#[test]
fn test_empty_chain_is_identity() {
    let entry = Native::new(divmod as extern "C" fn(i32, i32, *mut i32) -> i32);
    let wrapped = apply::<(), _>(entry);
    let mut rem = 0;
    assert_eq!(wrapped.invoke((7, 2, &mut rem as *mut i32)).unwrap(), (3,));
    assert_eq!(rem, 1);
}

#[test]
fn test_output_appends_value() {
    let wrapped = transform!(divmod as extern "C" fn(i32, i32, *mut i32) -> i32; Output<2>);
    assert_eq!(wrapped.invoke((17, 5)).unwrap(), (3, 2));
}

#[test]
fn test_void_with_two_outputs() {
    let wrapped = transform!(fill as extern "C" fn(i32, *mut i32, *mut i32); Output<1>, Output<1>);
    assert_eq!(wrapped.invoke((4,)).unwrap(), ((), 4, 8));

    let bound = Bound::new("fill", wrapped);
    assert_eq!(
        bound.call(&[PyObject::Int(4)]).unwrap(),
        PyObject::tuple([PyObject::Int(4), PyObject::Int(8)])
    );
}

#[test]
fn test_index_shift_across_transforms() {
    // (handle, status, cb, user, ratio)
    //   Output<1>           -> (handle, cb, user, ratio)
    //   Callback<1, Direct> -> (handle, closure, ratio)
    //   Output<2>           -> (handle, closure)
    let wrapped = apply::<(Output<1>, Callback<1, Direct>, Output<2>), _>(Native::new(
        query as extern "C" fn(i32, *mut i32, Sink, *mut c_void, *mut f64) -> i32,
    ));
    type Outer = <<(Output<1>, Callback<1, Direct>, Output<2>) as TransformList<
        Native<extern "C" fn(i32, *mut i32, Sink, *mut c_void, *mut f64) -> i32>,
    >>::Output as Callable>::Args;
    assert_eq!(<Outer as TypeSeq>::LEN, 2);
    assert_eq!(<Outer as SeqIds>::index_of::<i32>(), Some(0));

    let (tx, rx) = unbounded();
    let closure = Closure::from_fn("sink", move |(handle,): (i32,)| {
        tx.send(handle).unwrap();
    });
    assert_eq!(wrapped.invoke((41, closure)).unwrap(), (42, 200, 0.25));
    assert_eq!(rx.try_recv().unwrap(), 41);
}

#[test]
fn test_direct_callback_returns_closure_result() {
    let wrapped = apply::<(Callback<1, Direct>,), _>(Native::new(
        subscribe as extern "C" fn(i32, Notify, *mut c_void) -> i32,
    ));
    let closure = Closure::from_fn("plus_one", |(x,): (i32,)| x + 1);
    assert_eq!(wrapped.invoke((5, closure)).unwrap(), (11,));
}

#[test]
fn test_async_callback_returns_default_and_runs_later() {
    dispatch::global().ensure_started().unwrap();
    let wrapped = apply::<(Callback<1>,), _>(Native::new(
        subscribe as extern "C" fn(i32, Notify, *mut c_void) -> i32,
    ));
    let (tx, rx) = unbounded();
    let closure = Closure::from_fn("record", move |(x,): (i32,)| {
        tx.send(x).unwrap();
        x
    });
    assert_eq!(wrapped.invoke((3, closure)).unwrap(), (0,));
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 6);
}

#[test]
fn test_bound_converts_foreign_closure() {
    let wrapped = apply::<(Callback<1, Direct>,), _>(Native::new(
        subscribe as extern "C" fn(i32, Notify, *mut c_void) -> i32,
    ));
    let bound = Bound::new("subscribe", wrapped);
    let handler = PyFunction::new("handler", |args: &[PyObject]| match args {
        [PyObject::Int(x)] => Ok(PyObject::Int(x * 10)),
        _ => Err(PyErr::runtime("bad arguments")),
    });
    assert_eq!(
        bound.call(&[PyObject::Int(2), PyObject::Function(handler)]).unwrap(),
        PyObject::Int(40)
    );
}

#[test]
fn test_bound_reports_bad_arguments() {
    let bound = Bound::new(
        "divmod",
        transform!(divmod as extern "C" fn(i32, i32, *mut i32) -> i32; Output<2>),
    );
    assert_eq!(
        bound.call(&[PyObject::Int(9), PyObject::Int(4)]).unwrap(),
        PyObject::tuple([PyObject::Int(2), PyObject::Int(1)])
    );
    assert!(matches!(
        bound.call(&[PyObject::Int(9)]),
        Err(crate::errors::BindError::ArgCount { expected: 2, got: 1 })
    ));
    let function = bound.into_function();
    let err = function.call(&[PyObject::Int(1), PyObject::str("x")]).unwrap_err();
    assert_eq!(err.kind, crate::errors::PyErrKind::TypeError);
}

#[test]
fn test_method_indices_count_receiver() {
    let wrapped = apply::<(Output<2>,), _>(Method::new(
        Gauge::scaled as fn(&Gauge, i64, *mut i64) -> bool,
    ));
    let gauge = Instance::new(Gauge { level: 7 });
    assert_eq!(wrapped.invoke((gauge, 3)).unwrap(), (true, 21));
}

#[test]
fn test_describe_mentions_outer_params() {
    type Wrapped = <(Output<2>,) as TransformList<
        Native<extern "C" fn(i32, i32, *mut i32) -> i32>,
    >>::Output;
    let text = <Wrapped as Callable>::describe();
    assert!(text.starts_with("(i32, i32)"), "{}", text);
}
