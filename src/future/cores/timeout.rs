// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::time::{Duration, Instant};

use crate::error::Interruption;
use crate::future::{Future, Payload, Promise};

/// Reason used by callers that have nothing more specific to say.
pub const DEFAULT_TIMEOUT_REASON: &str = "operation timed out";

impl<T: Payload, E: Payload> Future<T, E> {
    /// Fail with `Error::TimedOut(reason)` if still undetermined at
    /// `deadline`. The source is timed out along with it.
    ///
    /// A source that is already determined is returned as is. So is one whose
    /// deadline has already passed, after being timed out on the spot.
    pub fn timeout<S: Into<String>>(&self, deadline: Instant, reason: S) -> Future<T, E> {
        if self.is_determined() {
            return self.clone();
        }

        let reason = reason.into();
        if deadline <= Instant::now() {
            self.interrupt(&Interruption::TimedOut(reason));
            return self.clone();
        }

        let context = self.context().clone();
        let (resolver, promise) = Promise::pair(&context);
        resolver.forward(self);

        let entry = resolver.clone().schedule_at(deadline, move |resolver| {
            if resolver.needs_resolution() {
                debug!("Deadline passed, timing out: {}", reason);
                resolver.time_out(reason);
            }
        });
        resolver.notify(move |_| {
            entry.cancel();
        });

        promise.into_future()
    }

    pub fn timeout_after<S: Into<String>>(&self, timeout: Duration, reason: S) -> Future<T, E> {
        self.timeout(Instant::now() + timeout, reason)
    }
}
