// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Where futures run: execution contexts, dispatch queues and the deadline timer

use std::any::Any;

pub use self::context::{Context, Executor, Job, Priority};
pub use self::queue::{Builder, Queue};

pub mod context;
pub mod queue;
pub(crate) mod timer;

/// Whether the calling thread is a worker of one of the crate's queues.
pub(crate) fn on_worker() -> bool {
    queue::current().is_some()
}

/// Render a panic payload for logs and `Error::Panicked`.
pub(crate) fn describe(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Box<Any>".to_owned()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::panic;

    #[test]
    fn test_describe_panic_payload() {
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(describe(&*payload), "static");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(describe(&*payload), "formatted 42");
    }
}
