use std::ffi::{c_char, c_void, CStr};
use std::time::Duration;

use crossbeam::channel::unbounded;

use typthon_bind::dispatch::Direct;
use typthon_bind::objects::{Instance, PyObject, Scope};
use typthon_bind::transforms::{apply, Array, Callable, Callback, Method, Native, Output, Str};
use typthon_bind::core::TypeSeq;
use typthon_bind::{BindError, Closure, ModuleBuilder};

type Progress = extern "C" fn(u32, *mut c_void) -> bool;

/// Native API: run `steps` steps, report progress, write the total cost and
/// the name length to output pointers
extern "C" fn run_job(
    name: *const c_char,
    weights: *const [u32; 3],
    cost: *mut u64,
    progress: Progress,
    user: *mut c_void,
    name_len: *mut usize,
) -> i32 {
    let name = unsafe { CStr::from_ptr(name) };
    let weights = unsafe { &*weights };
    let mut total = 0u64;
    for (step, weight) in weights.iter().enumerate() {
        total += u64::from(*weight);
        if !progress(step as u32, user) {
            return -1;
        }
    }
    unsafe {
        *cost = total;
        *name_len = name.to_bytes().len();
    }
    0
}

type RunJob =
    extern "C" fn(*const c_char, *const [u32; 3], *mut u64, Progress, *mut c_void, *mut usize) -> i32;

// (name, weights, cost, progress, user, name_len)
//   Str<0>              -> (String, weights, cost, progress, user, name_len)
//   Array<1>            -> (String, Vec<u32>, cost, progress, user, name_len)
//   Output<2>           -> (String, Vec<u32>, progress, user, name_len)
//   Callback<2, Direct> -> (String, Vec<u32>, Closure, name_len)
//   Output<3>           -> (String, Vec<u32>, Closure)
type Chain = (Str<0>, Array<1>, Output<2>, Callback<2, Direct>, Output<3>);

#[test]
fn test_five_transforms_shift_indices() {
    let wrapped = apply::<Chain, _>(Native::new(run_job as RunJob));
    let steps = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen = steps.clone();
    let progress = Closure::from_fn("progress", move |(step,): (u32,)| {
        seen.lock().push(step);
        true
    });

    let (status, cost, name_len) = wrapped
        .invoke(("nightly".to_string(), vec![5, 7], progress))
        .unwrap();
    assert_eq!((status, cost, name_len), (0, 12, 7));
    assert_eq!(*steps.lock(), vec![0, 1, 2]);
}

#[test]
fn test_chain_exposed_through_module() {
    let mut builder = ModuleBuilder::new("jobs");
    builder.def("run_job", apply::<Chain, _>(Native::new(run_job as RunJob)));
    let module = builder.finish().unwrap();

    let run = module.get_attr("run_job").unwrap();
    let stop_after_first = typthon_bind::PyFunction::new("progress", |args: &[PyObject]| {
        Ok(PyObject::Bool(matches!(args, [PyObject::Int(0)])))
    });
    let result = run
        .call(&[
            PyObject::str("x"),
            PyObject::List(vec![PyObject::Int(1)]),
            PyObject::Function(stop_after_first),
        ])
        .unwrap();
    // the job aborts at step 1; outputs keep their defaults
    assert_eq!(
        result,
        PyObject::tuple([PyObject::Int(-1), PyObject::Int(0), PyObject::Int(0)])
    );
}

#[test]
fn test_array_bounds_surface_to_caller() {
    let wrapped = apply::<Chain, _>(Native::new(run_job as RunJob));
    let progress = Closure::from_fn("progress", |_: (u32,)| true);
    let err = wrapped
        .invoke(("x".to_string(), vec![1, 2, 3, 4], progress))
        .unwrap_err();
    assert_eq!(
        err,
        BindError::SizeMismatch { capacity: 3, size: 4 }.at_argument(1)
    );
}

struct Meter {
    readings: Vec<f64>,
}

impl Meter {
    fn record(&mut self, value: f64, count: *mut usize) -> f64 {
        self.readings.push(value);
        unsafe { *count = self.readings.len() };
        self.readings.iter().sum()
    }
}

#[test]
fn test_method_chain_through_class() {
    let mut builder = ModuleBuilder::new("meters");
    let class = builder.class::<Meter>("Meter");
    builder.def_method(
        &class,
        "record",
        apply::<(Output<2>,), _>(Method::new(
            Meter::record as fn(&mut Meter, f64, *mut usize) -> f64,
        )),
    );
    assert!(builder.store().contains("::Meter::record"));
    builder.finish().unwrap();

    let meter = Instance::new(Meter { readings: vec![] });
    let object = class.instantiate(Meter { readings: vec![1.0] });
    assert_eq!(
        object.call_method("record", &[PyObject::Float(2.5)]).unwrap(),
        PyObject::tuple([PyObject::Float(3.5), PyObject::Int(2)])
    );

    let direct = apply::<(Output<2>,), _>(Method::new(
        Meter::record as fn(&mut Meter, f64, *mut usize) -> f64,
    ));
    assert_eq!(direct.invoke((meter.clone(), 4.0)).unwrap(), (4.0, 1));
    assert_eq!(meter.lock().readings, vec![4.0]);
}

type OnCount = extern "C" fn(u32, *mut c_void) -> u32;

struct Feed {
    subscribers: u32,
}

impl Feed {
    /// Registers a subscriber and reports the new count synchronously
    fn subscribe(&mut self, notify: OnCount, user: *mut c_void) -> u32 {
        self.subscribers += 1;
        notify(self.subscribers, user)
    }
}

#[test]
fn test_method_callback_may_touch_its_receiver() {
    let feed = Instance::new(Feed { subscribers: 0 });
    let (tx, rx) = unbounded();

    let receiver = feed.clone();
    std::thread::spawn(move || {
        let wrapped = apply::<(Callback<1, Direct>,), _>(Method::new(
            Feed::subscribe as fn(&mut Feed, OnCount, *mut c_void) -> u32,
        ));
        let again = receiver.clone();
        let notify = Closure::from_fn("notify", move |(count,): (u32,)| {
            again.lock().subscribers + count
        });
        tx.send(wrapped.invoke((receiver, notify)).unwrap()).unwrap();
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), (2,));
    assert_eq!(feed.lock().subscribers, 1);
}

/// Writes three outputs around two inputs
extern "C" fn split(value: i32, low: *mut i32, shift: i32, wide: *mut i64, tag: *mut u8) -> bool {
    unsafe {
        *low = value & 0xff;
        *wide = i64::from(value) << shift;
        *tag = (value % 251) as u8;
    }
    true
}

type Split = extern "C" fn(i32, *mut i32, i32, *mut i64, *mut u8) -> bool;

// (value, low, shift, wide, tag)
//   Output<1> -> (value, shift, wide, tag)
//   Output<2> -> (value, shift, tag)
//   Output<2> -> (value, shift)
type SplitChain = (Output<1>, Output<2>, Output<2>);

#[test]
fn test_three_outputs_in_parameter_order() {
    let wrapped = apply::<SplitChain, _>(Native::new(split as Split));

    fn arity<C: Callable>(_: &C) -> usize
    where
        C::Args: TypeSeq,
    {
        <C::Args as TypeSeq>::LEN
    }
    assert_eq!(arity(&wrapped), 2);

    assert_eq!(wrapped.invoke((258, 3)).unwrap(), (true, 2, 2064, 7));
    assert_eq!(wrapped.invoke((-1, 0)).unwrap(), (true, 255, -1, 255));
}
