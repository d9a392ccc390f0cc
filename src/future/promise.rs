// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};
use std::time::Instant;

use crate::error::{Error, Interruption, Outcome};
use crate::runtime::timer::{Timer, TimerEntry};
use crate::runtime::Context;

use super::future::Future;
use super::{submit, Node, Payload, Shared, UNREFERENCED_REASON};

/// The owning side of a future, created together with its `Resolver`.
pub struct Promise<T: Payload, E: Payload> {
    future: Future<T, E>,
}

impl<T: Payload, E: Payload> Promise<T, E> {
    /// A pending promise on `context` and the resolver that settles it.
    pub fn pair(context: &Context) -> (Resolver<T, E>, Promise<T, E>) {
        let shared = Shared::new(context.clone());
        let resolver = Resolver {
            shared: Arc::downgrade(&shared),
            context: context.clone(),
        };
        (resolver, Promise { future: Future::from_shared(shared) })
    }

    #[inline]
    pub fn future(&self) -> &Future<T, E> {
        &self.future
    }

    #[inline]
    pub fn into_future(self) -> Future<T, E> {
        self.future
    }
}

impl<T: Payload, E: Payload> Deref for Promise<T, E> {
    type Target = Future<T, E>;

    fn deref(&self) -> &Future<T, E> {
        &self.future
    }
}

impl<T: Payload, E: Payload> From<Promise<T, E>> for Future<T, E> {
    fn from(promise: Promise<T, E>) -> Future<T, E> {
        promise.into_future()
    }
}

impl<T, E> fmt::Debug for Promise<T, E>
    where T: Payload + fmt::Debug,
          E: Payload + fmt::Debug
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Promise {{ {:?} }}", self.future)
    }
}

/// The capability to settle a promise.
///
/// A resolver never keeps its promise alive. Once every `Future` and
/// `Promise` handle is gone the resolver turns inert: every attempt to settle
/// is a no-op and `needs_resolution` is `false`.
pub struct Resolver<T: Payload, E: Payload> {
    shared: Weak<Shared<T, E>>,
    context: Context,
}

impl<T: Payload, E: Payload> Resolver<T, E> {
    /// Settle the promise. Only the first attempt wins, returns whether this
    /// was it.
    pub fn resolve(&self, result: Outcome<T, E>) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.determine(result),
            None => false,
        }
    }

    /// `resolve`, reporting a lost race as `Error::AlreadyDetermined`.
    pub fn try_resolve(&self, result: Outcome<T, E>) -> Result<(), Error<E>> {
        if self.resolve(result) {
            Ok(())
        } else {
            Err(Error::AlreadyDetermined)
        }
    }

    pub fn resolve_value(&self, value: T) -> bool {
        self.resolve(Ok(value))
    }

    pub fn resolve_error(&self, error: E) -> bool {
        self.resolve(Err(Error::Failed(error)))
    }

    /// Cancel the promise from the producer side.
    pub fn cancel<S: Into<String>>(&self, reason: S) -> bool {
        self.interrupt(&Interruption::Canceled(reason.into()))
    }

    /// Whether the promise still waits for a result.
    ///
    /// Check it before starting expensive work: a promise canceled in the
    /// meantime no longer needs it.
    pub fn needs_resolution(&self) -> bool {
        self.shared.upgrade().map_or(false, |shared| shared.needs_resolution())
    }

    /// Mark production as started, `Pending -> Executing`.
    pub fn begin_execution(&self) -> bool {
        self.shared.upgrade().map_or(false, |shared| shared.begin_execution())
    }

    /// Keep `resource` alive until the promise is determined.
    ///
    /// Use it for handles an operation still refers to. If the promise is
    /// already determined, or gone, `resource` is dropped right away.
    pub fn retain_source<R: Send + 'static>(&self, resource: R) {
        if let Some(shared) = self.shared.upgrade() {
            shared.retain(Box::new(resource));
        }
    }

    /// Run `callback` on the promise's context once it is determined.
    ///
    /// Lets a producer hear about a cancellation and abandon its work. A
    /// promise that is already gone was canceled as unreferenced.
    pub fn notify<F>(&self, callback: F)
        where F: FnOnce(Outcome<T, E>) + Send + 'static
    {
        match self.shared.upgrade() {
            Some(shared) => shared.notify(&self.context, Box::new(callback), None),
            None => {
                let err = Error::Canceled(UNREFERENCED_REASON.to_owned());
                self.context.execute(move || callback(Err(err)));
            }
        }
    }

    /// The context of the promise this resolver settles.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Keep `source` alive until determined, and pass interruptions on to it.
    pub(crate) fn retain_upstream<U: Payload, F: Payload>(&self, source: &Future<U, F>) {
        if let Some(shared) = self.shared.upgrade() {
            shared.retain_upstream(source.shared.clone());
        }
    }

    /// Adopt `source`'s result once it is known.
    pub(crate) fn forward(&self, source: &Future<T, E>) {
        self.retain_upstream(source);
        self.clone().follow(source, &self.context, |resolver, result| {
            resolver.resolve(result);
        });
    }

    // The promise as a job target, see `submit`.
    pub(crate) fn target(&self) -> Weak<dyn Node> {
        self.shared.clone()
    }

    /// Run `callback` on `context` with `source`'s result and this resolver.
    ///
    /// Until it runs, the job is parked on this resolver's promise, so a queue
    /// worker blocked waiting on the promise can run it itself.
    pub(crate) fn follow<U, F, C>(self, source: &Future<U, F>, context: &Context, callback: C)
        where U: Payload,
              F: Payload,
              C: FnOnce(Resolver<T, E>, Outcome<U, F>) + Send + 'static
    {
        let target = self.target();
        source.shared.notify(context,
                             Box::new(move |result| callback(self, result)),
                             Some(target));
    }

    /// Run `f` on the promise's context once `deadline` has passed, parked
    /// on the promise like `follow`.
    pub(crate) fn schedule_at<F>(self, deadline: Instant, f: F) -> TimerEntry
        where F: FnOnce(Resolver<T, E>) + Send + 'static
    {
        let context = self.context.clone();
        let target = self.target();
        Timer::global().schedule(deadline,
                                 Box::new(move || {
                                     submit(&context, Box::new(move || f(self)), Some(&target));
                                 }))
    }

    pub(crate) fn interrupt(&self, interruption: &Interruption) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.interrupt(interruption),
            None => false,
        }
    }

    pub(crate) fn time_out(&self, reason: String) -> bool {
        self.interrupt(&Interruption::TimedOut(reason))
    }
}

impl<T: Payload, E: Payload> Clone for Resolver<T, E> {
    fn clone(&self) -> Resolver<T, E> {
        Resolver {
            shared: self.shared.clone(),
            context: self.context.clone(),
        }
    }
}

impl<T: Payload, E: Payload> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f,
               "Resolver {{ needs_resolution: {} }}",
               self.needs_resolution())
    }
}
