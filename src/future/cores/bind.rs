// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::error::{Error, Outcome};
use crate::future::{Future, Payload, Promise, Resolver};
use crate::runtime::Context;

use super::catch;

// Adopt the future `f` builds, or fail with its panic.
fn adopt<T, E, F>(resolver: &Resolver<T, E>, f: F)
    where T: Payload,
          E: Payload,
          F: FnOnce() -> Future<T, E>
{
    match catch(f) {
        Ok(next) => resolver.forward(&next),
        Err(msg) => {
            resolver.resolve(Err(Error::Panicked(msg)));
        }
    }
}

impl<T: Payload, E: Payload> Future<T, E> {
    pub fn flat_map<U, F>(&self, f: F) -> Future<U, E>
        where U: Payload,
              F: FnOnce(T) -> Future<U, E> + Send + 'static
    {
        self.flat_map_on(self.context(), f)
    }

    /// Chain the future `f` returns for the value. A failure passes through
    /// and `f` is never called.
    pub fn flat_map_on<U, F>(&self, context: &Context, f: F) -> Future<U, E>
        where U: Payload,
              F: FnOnce(T) -> Future<U, E> + Send + 'static
    {
        let (resolver, promise) = Promise::pair(context);
        resolver.retain_upstream(self);

        resolver.follow(self, context, move |resolver, result: Outcome<T, E>| {
            if !resolver.needs_resolution() {
                return;
            }

            match result {
                Ok(value) => adopt(&resolver, move || f(value)),
                Err(err) => {
                    resolver.resolve(Err(err));
                }
            }
        });

        promise.into_future()
    }

    pub fn recover<F>(&self, f: F) -> Future<T, E>
        where F: FnOnce(Error<E>) -> Future<T, E> + Send + 'static
    {
        self.recover_on(self.context(), f)
    }

    /// Replace a failure with the future `f` returns for it. A value passes
    /// through and `f` is never called.
    pub fn recover_on<F>(&self, context: &Context, f: F) -> Future<T, E>
        where F: FnOnce(Error<E>) -> Future<T, E> + Send + 'static
    {
        let (resolver, promise) = Promise::pair(context);
        resolver.retain_upstream(self);

        resolver.follow(self, context, move |resolver, result: Outcome<T, E>| {
            if !resolver.needs_resolution() {
                return;
            }

            match result {
                Ok(value) => {
                    resolver.resolve(Ok(value));
                }
                Err(err) => adopt(&resolver, move || f(err)),
            }
        });

        promise.into_future()
    }
}

impl<T: Payload, E: Payload> Future<Future<T, E>, E> {
    /// Collapse a future of a future.
    pub fn flatten(&self) -> Future<T, E> {
        self.flat_map(|inner| inner)
    }
}

#[cfg(test)]
mod test {
    use std::sync::mpsc;
    use std::time::Duration;

    use crate::error::Error;
    use crate::future::{Future, Promise};
    use crate::runtime::{Context, Priority, Queue};

    #[test]
    fn test_flat_map_chains() {
        let future: Future<u32, ()> = Future::value(2);
        let chained = future.flat_map(|v| Future::spawn(&Context::global(), move || Ok(v * 10)));
        assert_eq!(chained.wait(), Ok(20));
    }

    #[test]
    fn test_flat_map_inner_failure() {
        let future: Future<u32, &'static str> = Future::value(2);
        let chained = future.flat_map(|_| Future::<u32, _>::error("inner"));
        assert_eq!(chained.wait(), Err(Error::Failed("inner")));
    }

    #[test]
    fn test_recover() {
        let failed: Future<u32, &'static str> = Future::error("boom");
        assert_eq!(failed.recover(|_| Future::value(0)).wait(), Ok(0));

        let ok: Future<u32, &'static str> = Future::value(1);
        assert_eq!(ok.recover(|_| Future::value(0)).wait(), Ok(1));
    }

    #[test]
    fn test_recover_from_cancellation() {
        let (_resolver, source) = Promise::<u32, ()>::pair(&Context::global());
        let recovered = source.recover(|err| {
            assert!(err.is_canceled());
            Future::value(42)
        });

        source.cancel("retry with a default");
        assert_eq!(recovered.wait_timeout(Duration::from_secs(5)), Some(Ok(42)));
    }

    #[test]
    fn test_cancel_reaches_inner() {
        let queue = Queue::serial("test bind cancel").unwrap();
        let context = queue.context(Priority::Normal);

        let outer: Future<u32, ()> = Future::value(1);
        let (_resolver, inner) = Promise::<u32, ()>::pair(&context);
        let inner_future = inner.future().clone();
        let chained = outer.flat_map_on(&context, move |_| inner_future);

        // Once this runs the chain has adopted `inner`.
        let (tx, rx) = mpsc::channel();
        queue.spawn(move || tx.send(()).unwrap());
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(chained.cancel("stop"));
        assert_eq!(inner.wait(), Err(Error::Canceled("stop".to_owned())));
        assert_eq!(outer.wait(), Ok(1));
    }

    #[test]
    fn test_flatten() {
        let nested: Future<Future<&'static str, ()>, ()> = Future::value(Future::value("inside"));
        assert_eq!(nested.flatten().wait(), Ok("inside"));
    }
}
