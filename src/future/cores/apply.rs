// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::Arc;

use crate::error::Outcome;
use crate::future::{Future, Payload, Promise, Resolver};
use crate::runtime::Context;
use crate::sync::Spinlock;

use super::guarded;

// Whichever side arrives second finds the other one here and runs the
// transform.
struct Pair<T, F> {
    value: Option<T>,
    transform: Option<F>,
}

impl<T, F> Pair<T, F> {
    fn take(&mut self) -> Option<(T, F)> {
        if self.value.is_some() && self.transform.is_some() {
            self.value.take().and_then(|value| self.transform.take().map(|f| (value, f)))
        } else {
            None
        }
    }
}

fn complete<T, U, E, F>(resolver: &Resolver<U, E>, ready: Option<(T, F)>)
    where U: Payload,
          E: Payload,
          F: FnOnce(T) -> Outcome<U, E>
{
    if let Some((value, f)) = ready {
        resolver.resolve(guarded(move || f(value)));
    }
}

impl<T: Payload, E: Payload> Future<T, E> {
    pub fn apply<U, F>(&self, transform: &Future<F, E>) -> Future<U, E>
        where U: Payload,
              F: FnOnce(T) -> Outcome<U, E> + Payload
    {
        self.apply_on(self.context(), transform)
    }

    /// Apply the function `transform` yields to this future's value, once
    /// both are known.
    ///
    /// Whichever side fails first determines the result, and the function is
    /// never run.
    pub fn apply_on<U, F>(&self, context: &Context, transform: &Future<F, E>) -> Future<U, E>
        where U: Payload,
              F: FnOnce(T) -> Outcome<U, E> + Payload
    {
        let (resolver, promise) = Promise::pair(context);
        resolver.retain_upstream(self);
        resolver.retain_upstream(transform);

        let pair = Arc::new(Spinlock::new(Pair {
            value: None,
            transform: None,
        }));

        {
            let pair = pair.clone();
            resolver.clone().follow(self, context, move |resolver, result| {
                match result {
                    Ok(value) => {
                        let ready = {
                            let mut pair = pair.lock();
                            pair.value = Some(value);
                            pair.take()
                        };
                        complete(&resolver, ready);
                    }
                    Err(err) => {
                        resolver.resolve(Err(err));
                    }
                }
            });
        }

        resolver.follow(transform, context, move |resolver, result| {
            match result {
                Ok(f) => {
                    let ready = {
                        let mut pair = pair.lock();
                        pair.transform = Some(f);
                        pair.take()
                    };
                    complete(&resolver, ready);
                }
                Err(err) => {
                    resolver.resolve(Err(err));
                }
            }
        });

        promise.into_future()
    }
}
