// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Failures carried by a determined future

use thiserror::Error;

/// The determined result of a future.
pub type Outcome<T, E> = Result<T, Error<E>>;

/// Why a future was determined without a value.
///
/// `E` is the caller's own failure type. It travels through `map`, `flat_map`,
/// `combine` and `reduce` untouched, wrapped in `Error::Failed`. The other
/// variants are produced by the engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error<E> {
    /// Explicit or propagated cancellation
    #[error("canceled: {0}")]
    Canceled(String),

    /// Produced by `Future::timeout`
    #[error("timed out: {0}")]
    TimedOut(String),

    /// A structurally invalid request, such as racing an empty collection
    #[error("invalid: {0}")]
    Invalid(String),

    /// A second resolution attempt, reported by `Resolver::try_resolve`
    #[error("already determined")]
    AlreadyDetermined,

    /// A task body or transform panicked
    #[error("panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(E),
}

impl<E> Error<E> {
    pub fn is_canceled(&self) -> bool {
        matches!(*self, Error::Canceled(..))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(*self, Error::TimedOut(..))
    }

    /// Either kind of cooperative interruption, `Canceled` or `TimedOut`.
    pub fn is_cancellation(&self) -> bool {
        self.is_canceled() || self.is_timed_out()
    }

    /// The caller's failure, if this is one.
    pub fn failure(&self) -> Option<&E> {
        match *self {
            Error::Failed(ref e) => Some(e),
            _ => None,
        }
    }

    pub fn into_failure(self) -> Option<E> {
        match self {
            Error::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Kind of interruption pushed from a derived future to its sources.
#[derive(Debug, Clone)]
pub(crate) enum Interruption {
    Canceled(String),
    TimedOut(String),
}

impl Interruption {
    pub(crate) fn to_error<E>(&self) -> Error<E> {
        match *self {
            Interruption::Canceled(ref reason) => Error::Canceled(reason.clone()),
            Interruption::TimedOut(ref reason) => Error::TimedOut(reason.clone()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_display() {
        let e: Error<String> = Error::Canceled("stop".to_owned());
        assert_eq!(e.to_string(), "canceled: stop");

        let e: Error<String> = Error::Failed("disk full".to_owned());
        assert_eq!(e.to_string(), "disk full");

        let e: Error<String> = Error::AlreadyDetermined;
        assert_eq!(e.to_string(), "already determined");
    }

    #[test]
    fn test_error_kinds() {
        let timed_out: Error<()> = Error::TimedOut("slow".to_owned());
        assert!(timed_out.is_timed_out());
        assert!(timed_out.is_cancellation());
        assert!(!timed_out.is_canceled());

        let failed: Error<u8> = Error::Failed(7);
        assert!(!failed.is_cancellation());
        assert_eq!(failed.failure(), Some(&7));
        assert_eq!(failed.into_failure(), Some(7));
    }

    #[test]
    fn test_interruption_to_error() {
        let e: Error<()> = Interruption::TimedOut("late".to_owned()).to_error();
        assert_eq!(e, Error::TimedOut("late".to_owned()));
    }
}
