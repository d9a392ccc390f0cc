// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Queue options

use std::default::Default;

/// Queue options
#[derive(Debug, Clone)]
pub struct Options {
    pub name: Option<String>,
    pub workers: usize,
    pub stack_size: usize,
}

/// Default worker stack size, 2MB
pub const DEFAULT_STACK: usize = 2 * 1024 * 1024; // 2MB

impl Options {
    /// A serial queue: one worker, default stack.
    pub fn new() -> Options {
        Options {
            name: None,
            workers: 1,
            stack_size: DEFAULT_STACK,
        }
    }

    pub fn name(&mut self, name: String) -> &mut Options {
        self.name = Some(name);
        self
    }

    pub fn workers(&mut self, workers: usize) -> &mut Options {
        self.workers = workers;
        self
    }

    pub fn stack_size(&mut self, size: usize) -> &mut Options {
        self.stack_size = size;
        self
    }
}

impl Default for Options {
    fn default() -> Options {
        Options::new()
    }
}
