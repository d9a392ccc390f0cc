// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Dispatch queues backed by named worker threads

use std::cell::Cell;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};
use std::thread;

use crate::options::Options;

use super::context::{Context, Executor, Job, Priority};
use super::describe;

thread_local! {
    // The queue this thread works for, zero outside of any worker.
    static CURRENT: Cell<usize> = Cell::new(0);
}

/// Identity of the queue the calling thread is a worker of.
pub(crate) fn current() -> Option<usize> {
    match CURRENT.with(Cell::get) {
        0 => None,
        id => Some(id),
    }
}

struct Queued {
    priority: Priority,
    seq: usize,
    job: Job,
}

// Higher priority first, then FIFO by submission order.
impl Ord for Queued {
    fn cmp(&self, other: &Queued) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Queued) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Queued) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Queued {}

struct Handle {
    name: String,
    workers: usize,
    jobs: Mutex<BinaryHeap<Queued>>,
    starving: Condvar,
    seq: AtomicUsize,
    closing: AtomicBool,
}

impl Handle {
    fn jobs(&self) -> MutexGuard<BinaryHeap<Queued>> {
        // A job never panics while the lock is held, but recover anyway.
        match self.jobs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn next(&self) -> Option<Job> {
        let mut jobs = self.jobs();
        loop {
            if let Some(queued) = jobs.pop() {
                return Some(queued.job);
            }
            if self.closing.load(Ordering::Acquire) {
                return None;
            }
            jobs = match self.starving.wait(jobs) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    #[inline]
    fn id(&self) -> usize {
        self as *const Handle as usize
    }

    fn run(&self) {
        trace!("Queue `{}` worker started", self.name);
        CURRENT.with(|current| current.set(self.id()));

        while let Some(job) = self.next() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                error!("Job on queue `{}` panicked: {}", self.name, describe(&*payload));
            }
        }

        trace!("Queue `{}` worker exited", self.name);
    }
}

// Workers own the `Handle` directly. Closing is signalled once the last
// `Queue` clone goes away.
struct Shutdown(Arc<Handle>);

impl Drop for Shutdown {
    fn drop(&mut self) {
        self.0.closing.store(true, Ordering::Release);
        let _guard = self.0.jobs();
        self.0.starving.notify_all();
    }
}

/// A dispatch queue
///
/// Jobs are taken in priority order and, within a priority, in submission
/// order. A queue with a single worker is serial: its jobs never overlap.
/// Workers exit once every clone of the queue is dropped and the remaining
/// jobs have drained.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<Shutdown>,
}

impl Queue {
    /// Spawn the worker threads described by `opts`.
    pub fn new(opts: Options) -> io::Result<Queue> {
        static QUEUE_ID: AtomicUsize = AtomicUsize::new(0);

        let name = opts.name
            .clone()
            .unwrap_or_else(|| format!("Queue #{}", QUEUE_ID.fetch_add(1, Ordering::Relaxed)));
        let workers = if opts.workers == 0 { 1 } else { opts.workers };

        let handle = Arc::new(Handle {
            name: name,
            workers: workers,
            jobs: Mutex::new(BinaryHeap::new()),
            starving: Condvar::new(),
            seq: AtomicUsize::new(0),
            closing: AtomicBool::new(false),
        });

        for id in 0..workers {
            let handle = handle.clone();
            thread::Builder::new()
                .name(format!("{} worker #{}", handle.name, id))
                .stack_size(opts.stack_size)
                .spawn(move || handle.run())?;
        }

        debug!("Queue `{}` started with {} worker(s)", handle.name, workers);

        Ok(Queue { inner: Arc::new(Shutdown(handle)) })
    }

    /// A queue with exactly one worker.
    pub fn serial<S: Into<String>>(name: S) -> io::Result<Queue> {
        let mut opts = Options::new();
        opts.name(name.into()).workers(1);
        Queue::new(opts)
    }

    /// A queue with `workers` threads, one per CPU when `workers` is zero.
    pub fn concurrent<S: Into<String>>(name: S, workers: usize) -> io::Result<Queue> {
        let workers = if workers == 0 { num_cpus::get() } else { workers };
        let mut opts = Options::new();
        opts.name(name.into()).workers(workers);
        Queue::new(opts)
    }

    /// The process-wide queue behind `Context::global` and `Context::background`.
    pub fn global() -> &'static Queue {
        static GLOBAL: OnceLock<Queue> = OnceLock::new();

        GLOBAL.get_or_init(|| {
            let mut opts = Options::new();
            opts.name("deferred global".to_owned())
                .workers(::std::cmp::max(2, num_cpus::get()));

            match Queue::new(opts) {
                Ok(queue) => queue,
                Err(err) => panic!("failed to spawn the global queue: {}", err),
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.handle().name
    }

    pub fn workers(&self) -> usize {
        self.handle().workers
    }

    /// Jobs submitted but not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.handle().jobs().len()
    }

    /// A context that submits to this queue at `priority`.
    ///
    /// A worker of this queue that blocks in `Future::wait` runs the jobs
    /// submitted through such contexts for the awaited future itself, instead
    /// of waiting for the queue to reach them.
    pub fn context(&self, priority: Priority) -> Context {
        Context::on_queue(self.clone(), self.handle().id(), priority)
    }

    /// Submit `f` at `Normal` priority.
    pub fn spawn<F>(&self, f: F)
        where F: FnOnce() + Send + 'static
    {
        self.execute(Priority::Normal, Box::new(f))
    }

    #[inline]
    fn handle(&self) -> &Handle {
        &(self.inner).0
    }
}

impl Executor for Queue {
    fn execute(&self, priority: Priority, job: Job) {
        let handle = self.handle();
        let seq = handle.seq.fetch_add(1, Ordering::Relaxed);

        handle.jobs().push(Queued {
            priority: priority,
            seq: seq,
            job: job,
        });
        handle.starving.notify_one();
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f,
               "Queue {{ name: {:?}, workers: {} }}",
               self.name(),
               self.workers())
    }
}

/// Queue configuration builder
pub struct Builder {
    opts: Options,
}

impl Builder {
    pub fn new() -> Builder {
        Builder { opts: Options::new() }
    }

    #[inline]
    pub fn name(mut self, name: String) -> Builder {
        self.opts.name(name);
        self
    }

    /// Number of worker threads
    #[inline]
    pub fn workers(mut self, workers: usize) -> Builder {
        self.opts.workers(workers);
        self
    }

    /// Stack size of each worker thread
    #[inline]
    pub fn stack_size(mut self, size: usize) -> Builder {
        self.opts.stack_size(size);
        self
    }

    pub fn build(self) -> io::Result<Queue> {
        Queue::new(self.opts)
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}
