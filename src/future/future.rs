// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crate::error::{Error, Interruption, Outcome};
use crate::runtime::{Context, Job};

use super::cores::guarded;
use super::promise::{Promise, Resolver};
use super::{submit, Payload, Shared, State};

/// A read-only handle to a result that will be determined at most once.
///
/// Handles are cheap to clone; all clones observe the same result. The
/// underlying promise lives as long as its longest holder, and one that is
/// dropped while still undetermined is canceled so no continuation is left
/// behind.
pub struct Future<T: Payload, E: Payload> {
    pub(crate) shared: Arc<Shared<T, E>>,
}

impl<T: Payload, E: Payload> Future<T, E> {
    pub(crate) fn from_shared(shared: Arc<Shared<T, E>>) -> Future<T, E> {
        Future { shared: shared }
    }

    /// An already determined future.
    pub fn determined(context: &Context, result: Outcome<T, E>) -> Future<T, E> {
        Future::from_shared(Shared::determined(context.clone(), result))
    }

    /// A future holding `value`, on the default context.
    pub fn value(value: T) -> Future<T, E> {
        Future::determined(&Context::default(), Ok(value))
    }

    /// A future failed with the caller's own `error`.
    pub fn error(error: E) -> Future<T, E> {
        Future::failure(Error::Failed(error))
    }

    /// A future failed with any `Error`.
    pub fn failure(error: Error<E>) -> Future<T, E> {
        Future::determined(&Context::default(), Err(error))
    }

    /// Run `body` on `context`. The body receives the resolver and must
    /// settle it, possibly later from another thread.
    ///
    /// The body is skipped if the future is determined (canceled, for
    /// instance) before it gets to run. A panicking body determines the future
    /// with `Error::Panicked`.
    pub fn task<F>(context: &Context, body: F) -> Future<T, E>
        where F: FnOnce(Resolver<T, E>) + Send + 'static
    {
        let (resolver, promise) = Promise::pair(context);
        let target = resolver.target();

        let job: Job = Box::new(move || {
            if !resolver.begin_execution() {
                trace!("Task skipped, its future was determined before it started");
                return;
            }

            let inner = resolver.clone();
            if let Err(err) = guarded::<(), E, _>(move || Ok(body(inner))) {
                resolver.resolve(Err(err));
            }
        });

        submit(context, job, Some(&target));
        promise.into_future()
    }

    /// Run `f` on `context` and determine with what it returns.
    pub fn spawn<F>(context: &Context, f: F) -> Future<T, E>
        where F: FnOnce() -> Outcome<T, E> + Send + 'static
    {
        Future::task(context, move |resolver| {
            resolver.resolve(f());
        })
    }

    /// Run `f(0)` up to `f(count - 1)` as independent tasks on `context`.
    pub fn in_parallel<F>(context: &Context, count: usize, f: F) -> Vec<Future<T, E>>
        where F: Fn(usize) -> Outcome<T, E> + Send + Sync + 'static
    {
        let f = Arc::new(f);
        (0..count)
            .map(|index| {
                let f = f.clone();
                Future::spawn(context, move || f(index))
            })
            .collect()
    }

    /// The result, if already determined. Never blocks.
    pub fn peek(&self) -> Option<Outcome<T, E>> {
        self.shared.peek()
    }

    /// Block the current thread until determined.
    ///
    /// On a worker of a `Queue`, jobs still queued on that same queue for this
    /// future or the futures it derives from are run right here instead of
    /// waiting for the queue to get to them.
    pub fn wait(&self) -> Outcome<T, E> {
        self.shared.wait()
    }

    /// Like `wait`, giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome<T, E>> {
        self.shared.wait_until(Instant::now() + timeout)
    }

    /// Run `callback` on `context` with the result, exactly once.
    ///
    /// The callback is always submitted to `context`, never run on the
    /// caller's stack, even when the result is already known.
    pub fn notify<F>(&self, context: &Context, callback: F)
        where F: FnOnce(Outcome<T, E>) + Send + 'static
    {
        self.shared.notify(context, Box::new(callback), None)
    }

    /// `notify` on this future's own context.
    pub fn on_result<F>(&self, callback: F)
        where F: FnOnce(Outcome<T, E>) + Send + 'static
    {
        self.notify(self.context(), callback)
    }

    pub fn on_value<F>(&self, callback: F)
        where F: FnOnce(T) + Send + 'static
    {
        self.on_result(move |result| {
            if let Ok(value) = result {
                callback(value);
            }
        })
    }

    pub fn on_error<F>(&self, callback: F)
        where F: FnOnce(Error<E>) + Send + 'static
    {
        self.on_result(move |result| {
            if let Err(err) = result {
                callback(err);
            }
        })
    }

    /// Cancel with `reason`. Returns whether this call determined the future.
    ///
    /// The cancellation is passed on to the sources a derived future still
    /// depends on. A future that already has a result keeps it.
    pub fn cancel<S: Into<String>>(&self, reason: S) -> bool {
        self.interrupt(&Interruption::Canceled(reason.into()))
    }

    pub(crate) fn interrupt(&self, interruption: &Interruption) -> bool {
        self.shared.interrupt(interruption)
    }

    pub fn state(&self) -> State {
        self.shared.state()
    }

    pub fn is_determined(&self) -> bool {
        self.shared.is_determined()
    }

    /// Where this future's task and, by default, its continuations run.
    pub fn context(&self) -> &Context {
        self.shared.context()
    }

    /// Whether both handles observe the same promise.
    pub fn ptr_eq(&self, other: &Future<T, E>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// A handle that does not keep the promise alive.
    pub fn downgrade(&self) -> WeakFuture<T, E> {
        WeakFuture { shared: Arc::downgrade(&self.shared) }
    }
}

impl<T: Payload, E: Payload> Clone for Future<T, E> {
    fn clone(&self) -> Future<T, E> {
        Future { shared: self.shared.clone() }
    }
}

impl<T, E> fmt::Debug for Future<T, E>
    where T: Payload + fmt::Debug,
          E: Payload + fmt::Debug
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.peek() {
            Some(result) => write!(f, "Future {{ {:?} }}", result),
            None => write!(f, "Future {{ <{:?}> }}", self.state()),
        }
    }
}

/// A `Future` that does not own its promise.
pub struct WeakFuture<T: Payload, E: Payload> {
    shared: Weak<Shared<T, E>>,
}

impl<T: Payload, E: Payload> WeakFuture<T, E> {
    pub fn upgrade(&self) -> Option<Future<T, E>> {
        self.shared.upgrade().map(Future::from_shared)
    }
}

impl<T: Payload, E: Payload> Clone for WeakFuture<T, E> {
    fn clone(&self) -> WeakFuture<T, E> {
        WeakFuture { shared: self.shared.clone() }
    }
}
