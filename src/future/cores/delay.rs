// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::time::{Duration, Instant};

use crate::future::{Future, Payload, Promise};

impl<T: Payload, E: Payload> Future<T, E> {
    /// Hold a value back until `deadline`.
    ///
    /// A failure is passed on as soon as it is known. With a deadline in the
    /// past this is the future itself.
    pub fn delay(&self, deadline: Instant) -> Future<T, E> {
        if deadline <= Instant::now() {
            return self.clone();
        }

        let context = self.context().clone();
        let (resolver, promise) = Promise::pair(&context);
        resolver.retain_upstream(self);

        resolver.follow(self, &context, move |resolver, result| {
            let value = match result {
                Ok(value) => value,
                Err(err) => {
                    resolver.resolve(Err(err));
                    return;
                }
            };

            if Instant::now() >= deadline || !resolver.needs_resolution() {
                resolver.resolve(Ok(value));
                return;
            }

            let entry = resolver.clone().schedule_at(deadline, move |resolver| {
                resolver.resolve(Ok(value));
            });
            // Drop the pending value early if the delayed future is settled
            // some other way.
            resolver.notify(move |_| {
                entry.cancel();
            });
        });

        promise.into_future()
    }

    pub fn delay_for(&self, duration: Duration) -> Future<T, E> {
        self.delay(Instant::now() + duration)
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use crate::error::Error;
    use crate::future::{Future, Promise};
    use crate::runtime::Context;

    #[test]
    fn test_delay_holds_value() {
        let start = Instant::now();
        let future: Future<u8, ()> = Future::value(1);
        let delayed = future.delay_for(Duration::from_millis(50));

        assert!(delayed.peek().is_none());
        assert_eq!(delayed.wait(), Ok(1));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_delay_past_deadline_is_identity() {
        let future: Future<u8, ()> = Future::value(1);
        let delayed = future.delay(Instant::now() - Duration::from_millis(10));
        assert!(delayed.ptr_eq(&future));
        assert_eq!(delayed.peek(), Some(Ok(1)));
    }

    #[test]
    fn test_delay_error_is_immediate() {
        let (resolver, source) = Promise::<u8, &'static str>::pair(&Context::global());
        let delayed = source.delay_for(Duration::from_secs(3600));

        resolver.resolve_error("failed early");
        assert_eq!(delayed.wait_timeout(Duration::from_secs(5)),
                   Some(Err(Error::Failed("failed early"))));
    }

    #[test]
    fn test_cancel_delayed() {
        let future: Future<u8, ()> = Future::value(1);
        let delayed = future.delay_for(Duration::from_secs(3600));

        assert!(delayed.cancel("no need"));
        assert_eq!(delayed.wait(), Err(Error::Canceled("no need".to_owned())));
    }
}
