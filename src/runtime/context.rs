// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution contexts
//!
//! The engine never decides where code runs. Task bodies, transforms and
//! notifications are all handed to a `Context`: an `Executor` supplied by the
//! host plus a priority hint.

use std::fmt;
use std::sync::Arc;

use super::queue::{self, Queue};

/// A unit of work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling hint attached to every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Background,
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Priority {
        Priority::Normal
    }
}

/// Something that runs closures: a serial queue, a thread pool, an event loop.
///
/// Implementations must run the job asynchronously, never on the caller's
/// stack; the engine relies on that to deliver notifications outside of its
/// own critical sections.
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, priority: Priority, job: Job);
}

impl<F> Executor for F
    where F: Fn(Priority, Job) + Send + Sync + 'static
{
    fn execute(&self, priority: Priority, job: Job) {
        self(priority, job)
    }
}

/// An executor together with the priority its jobs run at.
#[derive(Clone)]
pub struct Context {
    executor: Arc<dyn Executor>,
    priority: Priority,
    queue: Option<usize>,
}

impl Context {
    pub fn new<X: Executor>(executor: X, priority: Priority) -> Context {
        Context::with_executor(Arc::new(executor), priority)
    }

    pub fn with_executor(executor: Arc<dyn Executor>, priority: Priority) -> Context {
        Context {
            executor: executor,
            priority: priority,
            queue: None,
        }
    }

    pub(crate) fn on_queue(queue: Queue, id: usize, priority: Priority) -> Context {
        Context {
            executor: Arc::new(queue),
            priority: priority,
            queue: Some(id),
        }
    }

    /// The global concurrent queue at `Normal` priority
    pub fn global() -> Context {
        Queue::global().context(Priority::Normal)
    }

    /// The global concurrent queue at `Background` priority
    pub fn background() -> Context {
        Queue::global().context(Priority::Background)
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Same executor, different priority.
    pub fn with_priority(&self, priority: Priority) -> Context {
        Context {
            executor: self.executor.clone(),
            priority: priority,
            queue: self.queue,
        }
    }

    /// Run `f` on this context.
    #[inline]
    pub fn execute<F>(&self, f: F)
        where F: FnOnce() + Send + 'static
    {
        self.executor.execute(self.priority, Box::new(f))
    }

    #[inline]
    pub(crate) fn submit(&self, job: Job) {
        self.executor.execute(self.priority, job)
    }

    /// Whether jobs go to one of the crate's own queues.
    #[inline]
    pub(crate) fn is_queue(&self) -> bool {
        self.queue.is_some()
    }

    /// Whether the calling thread is a worker of this context's queue.
    pub(crate) fn is_current(&self) -> bool {
        self.queue.is_some() && self.queue == queue::current()
    }
}

impl Default for Context {
    fn default() -> Context {
        Context::global()
    }
}

impl From<Queue> for Context {
    fn from(queue: Queue) -> Context {
        queue.context(Priority::Normal)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Context {{ priority: {:?} }}", self.priority)
    }
}
