// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::error::{Error, Outcome};
use crate::future::{Future, Payload, Promise};
use crate::runtime::Context;

use super::guarded;

impl<T: Payload, E: Payload> Future<T, E> {
    /// Transform the value on this future's context.
    pub fn map<U, F>(&self, f: F) -> Future<U, E>
        where U: Payload,
              F: FnOnce(T) -> U + Send + 'static
    {
        self.map_on(self.context(), f)
    }

    /// Transform the value on `context`. A failure passes through and `f` is
    /// never called.
    pub fn map_on<U, F>(&self, context: &Context, f: F) -> Future<U, E>
        where U: Payload,
              F: FnOnce(T) -> U + Send + 'static
    {
        self.try_map_on(context, move |value| Ok(f(value)))
    }

    pub fn try_map<U, F>(&self, f: F) -> Future<U, E>
        where U: Payload,
              F: FnOnce(T) -> Outcome<U, E> + Send + 'static
    {
        self.try_map_on(self.context(), f)
    }

    /// Like `map_on`, `f` decides between a value and a failure.
    pub fn try_map_on<U, F>(&self, context: &Context, f: F) -> Future<U, E>
        where U: Payload,
              F: FnOnce(T) -> Outcome<U, E> + Send + 'static
    {
        let (resolver, promise) = Promise::pair(context);
        resolver.retain_upstream(self);

        resolver.follow(self, context, move |resolver, result| {
            if !resolver.needs_resolution() {
                return;
            }

            let result = match result {
                Ok(value) => guarded(move || f(value)),
                Err(err) => Err(err),
            };
            resolver.resolve(result);
        });

        promise.into_future()
    }

    /// Fail with `Error::Invalid(message)` unless the value satisfies
    /// `predicate`.
    pub fn validate<P, S>(&self, predicate: P, message: S) -> Future<T, E>
        where P: FnOnce(&T) -> bool + Send + 'static,
              S: Into<String>
    {
        let message = message.into();
        self.try_map(move |value| {
            if predicate(&value) {
                Ok(value)
            } else {
                Err(Error::Invalid(message))
            }
        })
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::error::Error;
    use crate::future::{Future, Promise};
    use crate::runtime::Context;

    #[test]
    fn test_map_value() {
        let future: Future<u32, ()> = Future::value(20);
        assert_eq!(future.map(|v| v + 1).map(|v| v.to_string()).wait(),
                   Ok("21".to_owned()));
    }

    #[test]
    fn test_map_skips_failure() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();

        let future: Future<u32, &'static str> = Future::error("broken");
        let mapped = future.map(move |v| {
            flag.store(true, Ordering::SeqCst);
            v
        });

        assert_eq!(mapped.wait(), Err(Error::Failed("broken")));
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_try_map_redirects_to_failure() {
        let future: Future<i32, String> = Future::value(-1);
        let checked = future.try_map(|v| {
            if v < 0 {
                Err(Error::Failed(format!("negative: {}", v)))
            } else {
                Ok(v as u32)
            }
        });
        assert_eq!(checked.wait(), Err(Error::Failed("negative: -1".to_owned())));
    }

    #[test]
    fn test_map_panic() {
        let future: Future<u32, ()> = Future::value(0);
        let mapped = future.map(|v| 10 / v);
        assert!(matches!(mapped.wait(), Err(Error::Panicked(_))));
    }

    #[test]
    fn test_validate() {
        let even: Future<u32, ()> = Future::value(4);
        assert_eq!(even.validate(|v| v % 2 == 0, "odd").wait(), Ok(4));

        let odd: Future<u32, ()> = Future::value(5);
        assert_eq!(odd.validate(|v| v % 2 == 0, "odd").wait(),
                   Err(Error::Invalid("odd".to_owned())));
    }

    #[test]
    fn test_cancel_mapped_cancels_source() {
        let (_resolver, source) = Promise::<u32, ()>::pair(&Context::global());
        let mapped = source.map(|v| v * 2);

        assert!(mapped.cancel("stop"));
        assert_eq!(source.wait(), Err(Error::Canceled("stop".to_owned())));
        assert_eq!(mapped.wait(), Err(Error::Canceled("stop".to_owned())));
    }
}
