// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Futures and promises
//!
//! A `Shared` is the state behind a `Future`, its `Promise` and the `Resolver`
//! that settles it:
//!
//! * `state`: an atomic tag. Whoever moves it to `DETERMINING` owns the one
//!   and only transition and must finish it.
//! * `cell`: the result slot and the continuation registry, guarded by a
//!   spinlock. The winner writes the result, drains the registry and
//!   publishes `DETERMINED` in one critical section, so a registration racing
//!   with the transition is either drained or sees the result. Never both.
//!
//! Derived futures keep their sources in `upstream` until determined. Both
//! directions of that graph (interrupting sources, releasing them) are walked
//! with explicit worklists, so chains of any length are safe to cancel and to
//! drop.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, Thread, ThreadId};
use std::time::Instant;

use crate::error::{Error, Interruption, Outcome};
use crate::runtime::{self, Context, Job};
use crate::sync::Spinlock;

pub use self::cores::DEFAULT_TIMEOUT_REASON;
pub use self::future::{Future, WeakFuture};
pub use self::promise::{Promise, Resolver};

pub mod future;
pub mod promise;
mod cores;

/// Anything a future can carry as its value or failure.
///
/// Results are handed out by clone, once per registered continuation.
pub trait Payload: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> Payload for T {}

/// Observable lifecycle of a future
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Pending,
    Executing,
    Determined,
}

const PENDING: u8 = 0;
const EXECUTING: u8 = 1;
const DETERMINING: u8 = 2;
const DETERMINED: u8 = 3;

/// Reason attached to a promise determined because its last owner went away.
pub const UNREFERENCED_REASON: &str = "unreferenced";

pub(crate) type Callback<T, E> = Box<dyn FnOnce(Outcome<T, E>) + Send + 'static>;

/// A submitted job that has not been picked up yet.
///
/// Shared between the trampoline queued on the job's context and the future
/// the job works towards, so that whoever gets there first runs it.
pub(crate) type JobSlot = Arc<Spinlock<Option<Job>>>;

struct Parked {
    context: Context,
    slot: JobSlot,
}

/// A future as seen from the futures derived from it, whatever its types.
pub(crate) trait Node: Send + Sync {
    /// Determine with the interruption's failure, holding back delivery.
    fn interrupt_node(&self, interruption: &Interruption) -> Option<Interrupted>;

    /// Make `slot` visible to threads waiting on this node until it runs.
    fn park(&self, context: Context, slot: JobSlot);

    /// Take a parked job bound for the queue the calling thread works for.
    fn steal(&self) -> Option<Job>;

    /// Register `thread` for a wake-up and list the sources, unless
    /// determined.
    fn watch(&self, thread: &Thread) -> Option<Vec<Arc<dyn Node>>>;

    fn unwatch(&self, thread: ThreadId);
}

/// What an interrupted node leaves to its caller: the sources it retained,
/// and the delivery of its own result.
pub(crate) struct Interrupted {
    sources: Vec<Arc<dyn Node>>,
    deliver: Box<dyn FnOnce()>,
}

enum Waiter<T, E> {
    Notify(Context, Callback<T, E>, Option<Weak<dyn Node>>),
    Thread(Thread),
}

struct Cell<T, E> {
    result: Option<Outcome<T, E>>,
    waiters: Vec<Waiter<T, E>>,
    upstream: Vec<Arc<dyn Node>>,
    retained: Vec<Box<dyn Any + Send>>,
    parked: Vec<Parked>,
}

// Everything released by the winning transition, dropped outside of the lock.
struct Released<T, E> {
    result: Outcome<T, E>,
    waiters: Vec<Waiter<T, E>>,
    upstream: Vec<Arc<dyn Node>>,
    _retained: Vec<Box<dyn Any + Send>>,
    _parked: Vec<Parked>,
}

enum Scan<T, E> {
    Determined(Outcome<T, E>),
    Ran,
    Idle,
}

/// Submit `job` to `context`. While it is queued, a thread waiting on
/// `target` from inside the same queue may take it and run it itself.
pub(crate) fn submit(context: &Context, job: Job, target: Option<&Weak<dyn Node>>) {
    let target = match target.filter(|_| context.is_queue()).and_then(|target| target.upgrade()) {
        Some(target) => target,
        None => return context.submit(job),
    };

    let slot: JobSlot = Arc::new(Spinlock::new(Some(job)));
    target.park(context.clone(), slot.clone());
    context.submit(Box::new(move || {
        let job = slot.lock().take();
        if let Some(job) = job {
            job();
        }
    }));
}

thread_local! {
    static RELEASING: RefCell<Option<Vec<Arc<dyn Node>>>> = RefCell::new(None);
}

/// Drop sources released by a determined future.
///
/// Dropping the last handle to a pending source determines it, which releases
/// its own sources in turn. Those are queued on the outermost call instead of
/// being dropped recursively.
fn release(mut sources: Vec<Arc<dyn Node>>) {
    if sources.is_empty() {
        return;
    }

    let outermost = RELEASING.with(|releasing| {
        let mut releasing = releasing.borrow_mut();
        if let Some(ref mut queued) = *releasing {
            queued.append(&mut sources);
            return false;
        }
        *releasing = Some(Vec::new());
        true
    });
    if !outermost {
        return;
    }

    let mut batch = sources;
    while !batch.is_empty() {
        drop(batch);
        batch = RELEASING.with(|releasing| {
            releasing.borrow_mut().as_mut().map(mem::take).unwrap_or_default()
        });
    }
    RELEASING.with(|releasing| *releasing.borrow_mut() = None);
}

#[inline]
fn address(node: &Arc<dyn Node>) -> usize {
    Arc::as_ptr(node) as *const () as usize
}

pub(crate) struct Shared<T: Payload, E: Payload> {
    state: AtomicU8,
    context: Context,
    cell: Spinlock<Cell<T, E>>,
}

impl<T: Payload, E: Payload> Shared<T, E> {
    pub(crate) fn new(context: Context) -> Arc<Shared<T, E>> {
        Shared::with_state(context, PENDING, None)
    }

    pub(crate) fn determined(context: Context, result: Outcome<T, E>) -> Arc<Shared<T, E>> {
        Shared::with_state(context, DETERMINED, Some(result))
    }

    fn with_state(context: Context, state: u8, result: Option<Outcome<T, E>>) -> Arc<Shared<T, E>> {
        Arc::new(Shared {
            state: AtomicU8::new(state),
            context: context,
            cell: Spinlock::new(Cell {
                result: result,
                waiters: Vec::new(),
                upstream: Vec::new(),
                retained: Vec::new(),
                parked: Vec::new(),
            }),
        })
    }

    #[inline]
    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) fn state(&self) -> State {
        match self.state.load(Ordering::Acquire) {
            PENDING => State::Pending,
            // The result is being published but cannot be observed yet.
            EXECUTING | DETERMINING => State::Executing,
            _ => State::Determined,
        }
    }

    #[inline]
    pub(crate) fn is_determined(&self) -> bool {
        self.state.load(Ordering::Acquire) == DETERMINED
    }

    #[inline]
    pub(crate) fn needs_resolution(&self) -> bool {
        self.state.load(Ordering::Acquire) < DETERMINING
    }

    /// `Pending -> Executing`, returns whether this call made the move.
    pub(crate) fn begin_execution(&self) -> bool {
        self.state
            .compare_exchange(PENDING, EXECUTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn peek(&self) -> Option<Outcome<T, E>> {
        if !self.is_determined() {
            return None;
        }
        self.cell.lock().result.clone()
    }

    /// Settle with `result`. Returns whether this call performed the transition.
    pub(crate) fn determine(&self, result: Outcome<T, E>) -> bool {
        match self.transition(result) {
            Some(mut released) => {
                let sources = mem::take(&mut released.upstream);
                Shared::dispatch(released);
                release(sources);
                true
            }
            None => false,
        }
    }

    fn transition(&self, result: Outcome<T, E>) -> Option<Released<T, E>> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current >= DETERMINING {
                return None;
            }
            match self.state.compare_exchange_weak(current,
                                                   DETERMINING,
                                                   Ordering::AcqRel,
                                                   Ordering::Acquire) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        let mut cell = self.cell.lock();
        cell.result = Some(result.clone());
        let released = Released {
            result: result,
            waiters: mem::take(&mut cell.waiters),
            upstream: mem::take(&mut cell.upstream),
            _retained: mem::take(&mut cell.retained),
            _parked: mem::take(&mut cell.parked),
        };
        self.state.store(DETERMINED, Ordering::Release);
        drop(cell);

        Some(released)
    }

    fn dispatch(released: Released<T, E>) {
        trace!("Future determined ({} waiter(s)), ok: {}",
               released.waiters.len(),
               released.result.is_ok());

        let Released { result, waiters, .. } = released;
        for waiter in waiters {
            match waiter {
                Waiter::Notify(context, callback, target) => {
                    let result = result.clone();
                    submit(&context, Box::new(move || callback(result)), target.as_ref());
                }
                Waiter::Thread(thread) => thread.unpark(),
            }
        }
    }

    /// Determine with the interruption's failure and pass it on to every
    /// source this future still depends on, transitively.
    ///
    /// The result is published right away, but waiters are only woken once
    /// every source has been interrupted.
    pub(crate) fn interrupt(&self, interruption: &Interruption) -> bool {
        let first = match self.interrupt_node(interruption) {
            Some(first) => first,
            None => return false,
        };

        let mut deliveries = Vec::new();
        let mut released = Vec::new();
        let mut pending = vec![first];
        while let Some(Interrupted { sources, deliver }) = pending.pop() {
            deliveries.push(deliver);
            for source in sources {
                if let Some(next) = source.interrupt_node(interruption) {
                    pending.push(next);
                }
                released.push(source);
            }
        }

        for deliver in deliveries.into_iter().rev() {
            deliver();
        }
        release(released);
        true
    }

    /// Run `callback` on `context` once determined.
    ///
    /// The callback is always submitted to `context`, even when the result is
    /// already known. With a `target`, the callback drives that future and a
    /// thread waiting on it may run the callback itself.
    pub(crate) fn notify(&self, context: &Context, callback: Callback<T, E>, target: Option<Weak<dyn Node>>) {
        let mut cell = self.cell.lock();
        if let Some(result) = cell.result.clone() {
            drop(cell);
            submit(context, Box::new(move || callback(result)), target.as_ref());
            return;
        }
        cell.waiters.push(Waiter::Notify(context.clone(), callback, target));
    }

    /// Keep `source` alive, and interruptible from here, until determined.
    pub(crate) fn retain_upstream(&self, source: Arc<dyn Node>) {
        let mut cell = self.cell.lock();
        if cell.result.is_none() {
            cell.upstream.push(source);
        }
        // Otherwise `source` is released after the guard, outside of the lock.
    }

    pub(crate) fn retain(&self, resource: Box<dyn Any + Send>) {
        let mut cell = self.cell.lock();
        if cell.result.is_none() {
            cell.retained.push(resource);
        }
    }

    // Registers `thread` unless determined. Hands out the sources only when
    // asked, for a waiter that may steal from them.
    fn watch_cell(&self, thread: &Thread, sources: bool) -> Result<Vec<Arc<dyn Node>>, Outcome<T, E>> {
        let mut cell = self.cell.lock();
        if let Some(result) = cell.result.clone() {
            return Err(result);
        }

        let id = thread.id();
        let watching = cell.waiters.iter().any(|waiter| match *waiter {
            Waiter::Thread(ref waiting) => waiting.id() == id,
            _ => false,
        });
        if !watching {
            cell.waiters.push(Waiter::Thread(thread.clone()));
        }

        if sources {
            Ok(cell.upstream.clone())
        } else {
            Ok(Vec::new())
        }
    }

    /// Block the calling thread until determined.
    pub(crate) fn wait(&self) -> Outcome<T, E> {
        loop {
            if let Some(result) = self.block(None) {
                return result;
            }
        }
    }

    pub(crate) fn wait_until(&self, deadline: Instant) -> Option<Outcome<T, E>> {
        self.block(Some(deadline))
    }

    fn block(&self, deadline: Option<Instant>) -> Option<Outcome<T, E>> {
        let current = thread::current();
        // Only a queue worker can be sitting in front of the jobs it waits for.
        let stealing = runtime::on_worker();
        let mut watched = HashMap::new();

        let result = loop {
            match self.scan(&current, stealing, &mut watched) {
                Scan::Determined(result) => break Some(result),
                Scan::Ran => continue,
                Scan::Idle => {}
            }

            match deadline {
                None => thread::park(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break None;
                    }
                    thread::park_timeout(deadline - now);
                }
            }
        };

        self.unwatch(current.id());
        for node in watched.values().filter_map(Weak::upgrade) {
            node.unwatch(current.id());
        }
        result
    }

    // Registers the waiter on this future and, on a queue worker, on every
    // pending source upstream, then runs the first job found on the way that
    // is bound for the worker's own queue.
    fn scan(&self,
            current: &Thread,
            stealing: bool,
            watched: &mut HashMap<usize, Weak<dyn Node>>)
            -> Scan<T, E> {
        let mut pending = match self.watch_cell(current, stealing) {
            Ok(sources) => sources,
            Err(result) => return Scan::Determined(result),
        };
        if !stealing {
            return Scan::Idle;
        }

        if let Some(job) = self.steal() {
            debug!("Running a queued job on the waiting worker");
            job();
            return Scan::Ran;
        }

        let mut visited = HashSet::new();
        while let Some(node) = pending.pop() {
            let key = address(&node);
            if !visited.insert(key) {
                continue;
            }

            let sources = match node.watch(current) {
                Some(sources) => sources,
                None => continue,
            };
            watched.entry(key).or_insert_with(|| Arc::downgrade(&node));

            if let Some(job) = node.steal() {
                debug!("Running a queued upstream job on the waiting worker");
                drop(node);
                job();
                return Scan::Ran;
            }
            pending.extend(sources);
        }

        Scan::Idle
    }
}

impl<T: Payload, E: Payload> Node for Shared<T, E> {
    fn interrupt_node(&self, interruption: &Interruption) -> Option<Interrupted> {
        let mut released = self.transition(Err(interruption.to_error()))?;
        let sources = mem::take(&mut released.upstream);
        Some(Interrupted {
            sources: sources,
            deliver: Box::new(move || Shared::dispatch(released)),
        })
    }

    fn park(&self, context: Context, slot: JobSlot) {
        let watchers: Vec<Thread> = {
            let mut cell = self.cell.lock();
            if cell.result.is_some() {
                return;
            }

            cell.parked.retain(|parked| parked.slot.lock().is_some());
            cell.parked.push(Parked {
                context: context,
                slot: slot,
            });
            cell.waiters
                .iter()
                .filter_map(|waiter| match *waiter {
                    Waiter::Thread(ref thread) => Some(thread.clone()),
                    _ => None,
                })
                .collect()
        };

        for thread in watchers {
            thread.unpark();
        }
    }

    fn steal(&self) -> Option<Job> {
        let mut cell = self.cell.lock();
        while let Some(index) = cell.parked.iter().position(|parked| parked.context.is_current()) {
            let parked = cell.parked.swap_remove(index);
            let job = parked.slot.lock().take();
            if job.is_some() {
                return job;
            }
        }
        None
    }

    fn watch(&self, thread: &Thread) -> Option<Vec<Arc<dyn Node>>> {
        self.watch_cell(thread, true).ok()
    }

    fn unwatch(&self, thread: ThreadId) {
        self.cell.lock().waiters.retain(|waiter| match *waiter {
            Waiter::Thread(ref waiting) => waiting.id() != thread,
            _ => true,
        });
    }
}

impl<T: Payload, E: Payload> Drop for Shared<T, E> {
    fn drop(&mut self) {
        if self.needs_resolution() && self.determine(Err(Error::Canceled(UNREFERENCED_REASON.to_owned()))) {
            debug!("Pending future dropped by its last owner, canceled");
        }
    }
}
