use std::ffi::{c_char, c_void, CStr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::unbounded;
use typthon_bind::core::Pointee;
use typthon_bind::dispatch::{self, Direct};
use typthon_bind::transforms::{apply, Callable, Callback, Native};
use typthon_bind::{Closure, Dispatcher};

#[derive(Clone, Debug, PartialEq)]
struct Tick {
    price: f64,
    volume: u32,
}

impl Pointee for Tick {}

type OnTick = extern "C" fn(*const Tick, *mut c_void);

/// Emits one tick on a stack buffer, then reuses the buffer
extern "C" fn emit(cb: OnTick, user: *mut c_void) -> i32 {
    let mut tick = Tick { price: 1.5, volume: 10 };
    cb(&tick, user);
    tick.price = -1.0;
    tick.volume = 0;
    std::hint::black_box(&tick);
    1
}

#[test]
fn test_async_callback_sees_copy_of_pointed_value() {
    dispatch::global().ensure_started().unwrap();
    let wrapped = apply::<(Callback<0>,), _>(Native::new(emit as extern "C" fn(OnTick, *mut c_void) -> i32));

    let (tx, rx) = unbounded();
    let on_tick = Closure::from_fn("on_tick", move |(tick,): (Option<Tick>,)| {
        tx.send(tick).unwrap();
    });
    assert_eq!(wrapped.invoke((on_tick,)).unwrap(), (1,));

    let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(received, Some(Tick { price: 1.5, volume: 10 }));
}

type OnLine = extern "C" fn(*const c_char, *mut c_void);

/// Emits one line from a stack buffer, then scribbles over it
extern "C" fn emit_line(cb: OnLine, user: *mut c_void) {
    let mut line = *b"hello\0";
    cb(CStr::from_bytes_with_nul(&line).unwrap().as_ptr(), user);
    line.fill(b'x');
    std::hint::black_box(&line);
}

#[test]
fn test_c_string_callback_argument_arrives_whole() {
    let wrapped = apply::<(Callback<0, Direct>,), _>(Native::new(
        emit_line as extern "C" fn(OnLine, *mut c_void),
    ));

    let (tx, rx) = unbounded();
    let on_line = Closure::from_fn("on_line", move |(line,): (Option<String>,)| {
        tx.send(line).unwrap();
    });
    wrapped.invoke((on_line,)).unwrap();
    assert_eq!(rx.try_recv().unwrap(), Some("hello".to_string()));
}

#[test]
fn test_stop_drains_queue_before_exit() {
    let dispatcher = Dispatcher::new("drain");
    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..100 {
        let done = done.clone();
        dispatcher.add(move || {
            std::thread::sleep(Duration::from_micros(50));
            done.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(dispatcher.pending(), 100);

    dispatcher.start().unwrap();
    dispatcher.stop();
    dispatcher.join();
    assert_eq!(done.load(Ordering::SeqCst), 100);
    assert!(!dispatcher.is_running());
}

#[test]
fn test_tasks_added_while_draining_still_run() {
    let dispatcher = Arc::new(Dispatcher::new("chained"));
    let (tx, rx) = unbounded();

    let inner = Arc::clone(&dispatcher);
    let first_tx = tx.clone();
    dispatcher.add(move || {
        first_tx.send("first").unwrap();
        let second_tx = first_tx.clone();
        inner.add(move || second_tx.send("second").unwrap());
    });
    dispatcher.start().unwrap();
    dispatcher.stop();
    dispatcher.join();
    drop(tx);

    let order: Vec<&str> = rx.iter().collect();
    assert_eq!(order, vec!["first", "second"]);
}

#[test]
fn test_producers_on_many_threads() {
    let dispatcher = Arc::new(Dispatcher::new("producers"));
    dispatcher.start().unwrap();
    let done = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                for _ in 0..250 {
                    let done = Arc::clone(&done);
                    dispatcher.add(move || {
                        done.fetch_add(1, Ordering::Relaxed);
                    });
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    dispatcher.stop();
    dispatcher.join();
    assert_eq!(done.load(Ordering::Relaxed), 1000);
}
