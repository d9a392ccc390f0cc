// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Joining and racing collections of futures
//!
//! Joins (`combine`, `reduce`) are chains: step `i` only starts once step
//! `i - 1` has a value, so the output follows input order and the leftmost
//! failure wins no matter when later inputs settle.
//!
//! Races (`first_*`) register on every input and let the exactly-once
//! resolution of their own promise pick the single winner.
//!
//! The `_sequence` forms iterate their input on the background context, for
//! iterators that may block.

use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Outcome};
use crate::future::{Future, Payload, Promise};
use crate::runtime::Context;
use crate::sync::Spinlock;

/// Reason given to the inputs a race cancels once it has a winner.
pub const RACE_LOST_REASON: &str = "another input determined first";

/// All values, in input order. The first failure by input position wins.
///
/// An empty input gives an empty vector.
pub fn combine<T, E, I>(futures: I) -> Future<Vec<T>, E>
    where T: Payload,
          E: Payload,
          I: IntoIterator<Item = Future<T, E>>
{
    let values = Arc::new(Spinlock::new(Vec::new()));

    let mut chain: Future<(), E> = Future::value(());
    for future in futures {
        let values = values.clone();
        chain = chain.flat_map(move |()| {
            future.map(move |value| {
                values.lock().push(value);
            })
        });
    }

    chain.map(move |()| {
        let mut values = values.lock();
        mem::take(&mut *values)
    })
}

pub fn combine_sequence<T, E, I>(futures: I) -> Future<Vec<T>, E>
    where T: Payload,
          E: Payload,
          I: IntoIterator<Item = Future<T, E>> + Send + 'static
{
    Future::spawn(&Context::background(), move || Ok(combine(futures))).flatten()
}

pub fn combine2<A, B, E>(a: &Future<A, E>, b: &Future<B, E>) -> Future<(A, B), E>
    where A: Payload,
          B: Payload,
          E: Payload
{
    let b = b.clone();
    a.flat_map(move |a| b.map(move |b| (a, b)))
}

pub fn combine3<A, B, C, E>(a: &Future<A, E>,
                            b: &Future<B, E>,
                            c: &Future<C, E>)
                            -> Future<(A, B, C), E>
    where A: Payload,
          B: Payload,
          C: Payload,
          E: Payload
{
    let c = c.clone();
    combine2(a, b).flat_map(move |(a, b)| c.map(move |c| (a, b, c)))
}

pub fn combine4<A, B, C, D, E>(a: &Future<A, E>,
                               b: &Future<B, E>,
                               c: &Future<C, E>,
                               d: &Future<D, E>)
                               -> Future<(A, B, C, D), E>
    where A: Payload,
          B: Payload,
          C: Payload,
          D: Payload,
          E: Payload
{
    let d = d.clone();
    combine3(a, b, c).flat_map(move |(a, b, c)| d.map(move |d| (a, b, c, d)))
}

/// Fold the values in input order.
///
/// `f` runs for input `i` only once everything before it has been folded. A
/// failure, from an input or from `f`, stops the fold and later inputs are
/// never looked at.
pub fn reduce<T, U, E, I, F>(futures: I, initial: U, f: F) -> Future<U, E>
    where T: Payload,
          U: Payload,
          E: Payload,
          I: IntoIterator<Item = Future<T, E>>,
          F: Fn(U, T) -> Outcome<U, E> + Send + Sync + 'static
{
    let f = Arc::new(f);

    let mut acc: Future<U, E> = Future::value(initial);
    for future in futures {
        let f = f.clone();
        acc = acc.flat_map(move |acc| future.try_map(move |value| f(acc, value)));
    }
    acc
}

pub fn reduce_sequence<T, U, E, I, F>(futures: I, initial: U, f: F) -> Future<U, E>
    where T: Payload,
          U: Payload,
          E: Payload,
          I: IntoIterator<Item = Future<T, E>> + Send + 'static,
          F: Fn(U, T) -> Outcome<U, E> + Send + Sync + 'static
{
    Future::spawn(&Context::background(),
                  move || Ok(reduce(futures, initial, f)))
        .flatten()
}

// `accept` decides whether an outcome may win. When nothing is accepted, the
// last input to settle wins.
fn race<T, E, I>(futures: I, cancel_others: bool, accept: fn(&Outcome<T, E>) -> bool) -> Future<Future<T, E>, E>
    where T: Payload,
          E: Payload,
          I: IntoIterator<Item = Future<T, E>>
{
    let inputs: Vec<Future<T, E>> = futures.into_iter().collect();
    if inputs.is_empty() {
        debug!("Racing an empty collection");
        return Future::failure(Error::Invalid("cannot race an empty collection".to_owned()));
    }

    let context = Context::default();
    let (resolver, promise) = Promise::pair(&context);
    let total = inputs.len();
    let rejected = Arc::new(AtomicUsize::new(0));

    for input in &inputs {
        resolver.retain_upstream(input);

        let rejected = rejected.clone();
        let weak = input.downgrade();
        resolver.clone().follow(input, input.context(), move |resolver, result| {
            if !resolver.needs_resolution() {
                return;
            }
            let input = match weak.upgrade() {
                Some(input) => input,
                None => return,
            };

            if accept(&result) || rejected.fetch_add(1, Ordering::SeqCst) + 1 == total {
                resolver.resolve(Ok(input));
            }
        });
    }

    if cancel_others {
        resolver.notify(move |result| {
            if let Ok(winner) = result {
                for input in inputs.iter().filter(|input| !input.ptr_eq(&winner)) {
                    input.cancel(RACE_LOST_REASON);
                }
            }
        });
    }

    promise.into_future()
}

/// The first input to be determined, whatever its outcome.
///
/// An empty input fails with `Error::Invalid`.
pub fn first_determined<T, E, I>(futures: I, cancel_others: bool) -> Future<Future<T, E>, E>
    where T: Payload,
          E: Payload,
          I: IntoIterator<Item = Future<T, E>>
{
    race(futures, cancel_others, |_| true)
}

pub fn first_determined_sequence<T, E, I>(futures: I, cancel_others: bool) -> Future<Future<T, E>, E>
    where T: Payload,
          E: Payload,
          I: IntoIterator<Item = Future<T, E>> + Send + 'static
{
    Future::spawn(&Context::background(),
                  move || Ok(first_determined(futures, cancel_others)))
        .flatten()
}

/// The first input to be determined with a value.
///
/// When every input fails, the last one to fail is the result. An empty input
/// fails with `Error::Invalid`.
pub fn first_resolved<T, E, I>(futures: I, cancel_others: bool) -> Future<Future<T, E>, E>
    where T: Payload,
          E: Payload,
          I: IntoIterator<Item = Future<T, E>>
{
    race(futures, cancel_others, |result| result.is_ok())
}

pub fn first_resolved_sequence<T, E, I>(futures: I, cancel_others: bool) -> Future<Future<T, E>, E>
    where T: Payload,
          E: Payload,
          I: IntoIterator<Item = Future<T, E>> + Send + 'static
{
    Future::spawn(&Context::background(),
                  move || Ok(first_resolved(futures, cancel_others)))
        .flatten()
}

/// The value of `first_resolved`'s winner.
pub fn first_value<T, E, I>(futures: I, cancel_others: bool) -> Future<T, E>
    where T: Payload,
          E: Payload,
          I: IntoIterator<Item = Future<T, E>>
{
    first_resolved(futures, cancel_others).flatten()
}

pub fn first_value_sequence<T, E, I>(futures: I, cancel_others: bool) -> Future<T, E>
    where T: Payload,
          E: Payload,
          I: IntoIterator<Item = Future<T, E>> + Send + 'static
{
    first_resolved_sequence(futures, cancel_others).flatten()
}

#[cfg(test)]
mod test {
    use super::*;

    use std::time::Duration;

    #[test]
    fn test_combine_order() {
        let (first, promise) = Promise::<u32, ()>::pair(&Context::global());
        let futures = vec![promise.into_future(), Future::value(2), Future::value(3)];

        let combined = combine(futures);
        assert!(combined.wait_timeout(Duration::from_millis(20)).is_none());

        first.resolve_value(1);
        assert_eq!(combined.wait(), Ok(vec![1, 2, 3]));
    }

    #[test]
    fn test_combine_empty() {
        let combined = combine(Vec::<Future<u32, ()>>::new());
        assert_eq!(combined.wait(), Ok(vec![]));
    }

    #[test]
    fn test_race_empty() {
        let raced = first_determined(Vec::<Future<u32, ()>>::new(), false);
        assert!(matches!(raced.wait(), Err(Error::Invalid(_))));
    }

    #[test]
    fn test_first_resolved_skips_failures() {
        let (slow, slow_future) = Promise::<u32, &'static str>::pair(&Context::global());
        let failed: Future<u32, &'static str> = Future::error("first");
        let raced = first_resolved(vec![failed, slow_future.future().clone()], false);

        assert!(raced.wait_timeout(Duration::from_millis(20)).is_none());
        slow.resolve_value(5);

        let winner = raced.wait().unwrap();
        assert!(winner.ptr_eq(&slow_future));
        assert_eq!(winner.peek(), Some(Ok(5)));
    }
}
