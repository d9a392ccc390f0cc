// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Futures and promises that are determined exactly once
//!
//! A producer obtains a `Resolver` and a `Promise` with [`pair`], does its work
//! on some execution context and settles the resolver. Consumers observe the
//! promise through `Future` handles: they peek, wait, register continuations,
//! derive new futures with `map`, `flat_map`, `recover` or `apply`, bound them
//! in time with `delay` and `timeout`, and join or race collections of them
//! with the functions of the [`combine`] module.
//!
//! ```
//! use deferred::{Context, Future};
//!
//! let answer: Future<u32, ()> = Future::spawn(&Context::global(), || Ok(6u32))
//!     .map(|v| v * 7);
//! assert_eq!(answer.wait(), Ok(42));
//! ```
//!
//! Task bodies and continuations run on a `Context`, any `Executor` plus a
//! priority. The crate ships `Queue`, a small set of worker threads, for hosts
//! that do not bring their own. Deadlines for `delay` and `timeout` are kept by
//! a single timer thread started on first use.

#[macro_use]
extern crate log;

pub use crate::combine::{combine, combine2, combine3, combine4, combine_sequence, first_determined,
                         first_determined_sequence, first_resolved, first_resolved_sequence,
                         first_value, first_value_sequence, reduce, reduce_sequence};
pub use crate::error::{Error, Outcome};
pub use crate::future::{Future, Payload, Promise, Resolver, State, WeakFuture,
                        DEFAULT_TIMEOUT_REASON, UNREFERENCED_REASON};
pub use crate::options::Options;
pub use crate::runtime::{Builder, Context, Executor, Job, Priority, Queue};

pub mod combine;
pub mod error;
pub mod future;
pub mod options;
pub mod runtime;
pub mod sync;

/// A pending promise on `context` and the resolver that settles it.
#[inline]
pub fn pair<T: Payload, E: Payload>(context: &Context) -> (Resolver<T, E>, Promise<T, E>) {
    Promise::pair(context)
}
