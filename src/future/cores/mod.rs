// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Derived futures
//!
//! Every combinator follows the same recipe: make a fresh promise on the
//! target context, let it retain its source(s) so cancellation can travel
//! upstream, and drive its resolver from a continuation registered on the
//! source. Each module adds its combinators as inherent methods of `Future`.

use std::panic::{self, AssertUnwindSafe};

use crate::error::{Error, Outcome};
use crate::runtime::describe;

mod apply;
mod bind;
mod delay;
mod map;
mod timeout;

pub use self::timeout::DEFAULT_TIMEOUT_REASON;

/// Run user code, turning a panic into its message.
pub(crate) fn catch<R, F>(f: F) -> Result<R, String>
    where F: FnOnce() -> R
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let msg = describe(&*payload);
        warn!("Captured a panic in a future's continuation: {}", msg);
        msg
    })
}

/// `catch` for code that already produces an `Outcome`.
pub(crate) fn guarded<T, E, F>(f: F) -> Outcome<T, E>
    where F: FnOnce() -> Outcome<T, E>
{
    match catch(f) {
        Ok(result) => result,
        Err(msg) => Err(Error::Panicked(msg)),
    }
}
