extern crate deferred;
extern crate env_logger;
extern crate rand;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use rand::Rng;

use deferred::{Context, Error, Future, Priority, Promise, Queue};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_concurrent_resolve_exactly_once() {
    init_logger();

    for _ in 0..50 {
        let (resolver, promise) = Promise::<usize, ()>::pair(&Context::global());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let resolver = resolver.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    if resolver.resolve_value(i) { Some(i) } else { None }
                })
            })
            .collect();

        let winners: Vec<usize> = handles.into_iter().filter_map(|h| h.join().unwrap()).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(promise.peek(), Some(Ok(winners[0])));
        assert_eq!(promise.wait(), Ok(winners[0]));
    }
}

#[test]
fn test_every_continuation_fires_once() {
    init_logger();

    let (resolver, promise) = Promise::<u32, ()>::pair(&Context::global());
    let fired = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    let registrars: Vec<_> = (0..4)
        .map(|_| {
            let future = promise.future().clone();
            let fired = fired.clone();
            let tx = tx.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    let fired = fired.clone();
                    let tx = tx.clone();
                    future.on_result(move |result| {
                        assert_eq!(result, Ok(3));
                        fired.fetch_add(1, Ordering::SeqCst);
                        tx.send(()).unwrap();
                    });
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(rand::thread_rng().gen_range(0..3)));
    resolver.resolve_value(3);

    for h in registrars {
        h.join().unwrap();
    }
    for _ in 0..1000 {
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    thread::sleep(Duration::from_millis(20));
    assert_eq!(fired.load(Ordering::SeqCst), 1000);
}

#[test]
fn test_cancel_races_resolve() {
    init_logger();

    for _ in 0..100 {
        let (resolver, promise) = Promise::<u32, ()>::pair(&Context::global());
        let barrier = Arc::new(Barrier::new(2));

        let resolving = {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                resolver.resolve_value(1)
            })
        };

        barrier.wait();
        let canceled = promise.cancel("race");
        let resolved = resolving.join().unwrap();

        assert!(canceled != resolved);
        match promise.wait() {
            Ok(1) => assert!(resolved),
            Err(Error::Canceled(ref reason)) if reason == "race" => assert!(canceled),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}

#[test]
fn test_wait_on_serial_queue_does_not_deadlock() {
    init_logger();

    let queue = Queue::serial("serial wait").unwrap();
    let context = queue.context(Priority::Normal);

    let (tx, rx) = mpsc::channel();
    let outer_context = context.clone();
    queue.spawn(move || {
        // Its production job sits behind us on the same serial queue.
        let inner: Future<u32, ()> = Future::spawn(&outer_context, || Ok(11));
        tx.send(inner.wait()).unwrap();
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(11));
}

#[test]
fn test_wait_on_serial_queue_for_derived_future() {
    init_logger();

    let queue = Queue::serial("serial derived wait").unwrap();
    let context = queue.context(Priority::Normal);

    let (tx, rx) = mpsc::channel();
    let outer_context = context.clone();
    queue.spawn(move || {
        // The task, the transform and the chained step all queue up behind us.
        let derived: Future<u32, ()> = Future::spawn(&outer_context, || Ok(11))
            .map(|v| v + 1)
            .flat_map(|v| Future::value(v * 2));
        tx.send(derived.wait()).unwrap();
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(24));
}

#[test]
fn test_wait_on_serial_queue_for_deadlines() {
    init_logger();

    let queue = Queue::serial("serial deadline wait").unwrap();
    let context = queue.context(Priority::Normal);

    let (tx, rx) = mpsc::channel();
    let outer_context = context.clone();
    queue.spawn(move || {
        let delayed: Future<u32, ()> = Future::spawn(&outer_context, || Ok(5))
            .delay_for(Duration::from_millis(20));
        let (_resolver, stuck) = Promise::<u32, ()>::pair(&outer_context);
        let bounded = stuck.timeout_after(Duration::from_millis(20), "stuck");
        tx.send((delayed.wait(), bounded.wait())).unwrap();
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(),
               (Ok(5), Err(Error::TimedOut("stuck".to_owned()))));
}

#[test]
fn test_wait_off_queue_leaves_jobs_to_the_queue() {
    init_logger();

    let queue = Queue::serial("serial off-queue wait").unwrap();
    let worker = Arc::new(Mutex::new(None));

    let ran_on = worker.clone();
    let future: Future<u32, ()> = Future::spawn(&queue.context(Priority::Normal), move || {
        *ran_on.lock().unwrap() = Some(thread::current().id());
        Ok(1)
    });

    assert_eq!(future.map(|v| v + 1).wait(), Ok(2));
    let ran_on = worker.lock().unwrap().clone();
    assert!(ran_on.is_some());
    assert!(ran_on != Some(thread::current().id()));
}

#[test]
fn test_needs_resolution_spares_work() {
    init_logger();

    let started = Arc::new(AtomicUsize::new(0));
    let (resolver, promise) = Promise::<u32, ()>::pair(&Context::global());
    promise.cancel("user left");

    let counter = started.clone();
    let worker = thread::spawn(move || {
        if resolver.needs_resolution() {
            counter.fetch_add(1, Ordering::SeqCst);
            resolver.resolve_value(1);
        }
    });
    worker.join().unwrap();

    assert_eq!(started.load(Ordering::SeqCst), 0);
    assert!(promise.wait().unwrap_err().is_canceled());
}
