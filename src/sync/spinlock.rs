// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A simple Spinlock
//!
//! Guards the tiny critical sections of a future (result slot, continuation
//! registry, retained sources). None of them ever block or call back into user
//! code while the lock is held.

use std::cell::UnsafeCell;
use std::fmt;
use std::hint;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

// Number of busy spins before the waiter starts yielding its time slice.
const SPIN_LIMIT: u32 = 6;

/// A simple, unfair spinlock.
///
/// Contention is expected to be rare and short, so waiters spin with an
/// exponential backoff and fall back to `thread::yield_now` once the backoff
/// reaches its ceiling.
pub struct Spinlock<T: ?Sized> {
    lock: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Spinlock<T> {}
unsafe impl<T: ?Sized + Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    pub fn new(data: T) -> Spinlock<T> {
        Spinlock {
            lock: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> Spinlock<T> {
    pub fn try_lock(&self) -> Option<SpinlockGuard<T>> {
        const SUCCESS: Ordering = Ordering::Acquire;
        const FAILURE: Ordering = Ordering::Relaxed;

        match self.lock.compare_exchange(false, true, SUCCESS, FAILURE) {
            Ok(_) => Some(SpinlockGuard {
                lock: &self.lock,
                data: unsafe { &mut *self.data.get() },
            }),
            Err(_) => None,
        }
    }

    pub fn lock(&self) -> SpinlockGuard<T> {
        const SUCCESS: Ordering = Ordering::Acquire;
        const FAILURE: Ordering = Ordering::Relaxed;

        let mut step = 0;

        while self.lock.compare_exchange_weak(false, true, SUCCESS, FAILURE).is_err() {
            while self.lock.load(FAILURE) {
                if step <= SPIN_LIMIT {
                    for _ in 0..(1 << step) {
                        hint::spin_loop();
                    }
                    step += 1;
                } else {
                    thread::yield_now();
                }
            }
        }

        SpinlockGuard {
            lock: &self.lock,
            data: unsafe { &mut *self.data.get() },
        }
    }
}

impl<T: Default> Default for Spinlock<T> {
    fn default() -> Spinlock<T> {
        Spinlock::new(Default::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Spinlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => write!(f, "Spinlock {{ data: {:?} }}", &*guard),
            None => write!(f, "Spinlock {{ <locked> }}"),
        }
    }
}

pub struct SpinlockGuard<'a, T: ?Sized + 'a> {
    lock: &'a AtomicBool,
    data: &'a mut T,
}

impl<'a, T: ?Sized> Drop for SpinlockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.store(false, Ordering::Release);
    }
}

impl<'a, T: ?Sized> Deref for SpinlockGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl<'a, T: ?Sized> DerefMut for SpinlockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data
    }
}
