// Copyright 2015 The coio Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Deadline timer
//!
//! A single background thread sleeps until the earliest deadline, then fires
//! the due entries. Firing only hands work over to an execution context, no
//! user code runs on the timer thread. Entries can be withdrawn before they
//! fire.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, Weak};
use std::thread;
use std::time::Instant;

use slab::Slab;

use super::context::Job;
use super::describe;

// Below this many records the heap is never compacted.
const COMPACT_THRESHOLD: usize = 64;

#[derive(Eq, PartialEq)]
struct Sleeping {
    deadline: Instant,
    key: usize,
    generation: u64,
}

// `BinaryHeap` is a max-heap, the earliest deadline must come out first.
impl PartialOrd<Sleeping> for Sleeping {
    fn partial_cmp(&self, other: &Sleeping) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Sleeping {
    fn cmp(&self, other: &Sleeping) -> Ordering {
        other.deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

struct Scheduled {
    generation: u64,
    fire: Job,
}

#[derive(Default)]
struct Wheel {
    sleeping: BinaryHeap<Sleeping>,
    scheduled: Slab<Scheduled>,
    generation: u64,
}

impl Wheel {
    // Returns the key and generation of the entry, and whether it is now the
    // earliest one.
    fn insert(&mut self, deadline: Instant, fire: Job) -> (usize, u64, bool) {
        self.generation += 1;
        let generation = self.generation;
        let key = self.scheduled.insert(Scheduled {
            generation: generation,
            fire: fire,
        });

        let earliest = self.sleeping.peek().map_or(true, |top| deadline < top.deadline);
        self.sleeping.push(Sleeping {
            deadline: deadline,
            key: key,
            generation: generation,
        });

        (key, generation, earliest)
    }

    fn is_live(&self, key: usize, generation: u64) -> bool {
        self.scheduled
            .get(key)
            .map_or(false, |s| s.generation == generation)
    }

    // Withdrawn entries leave their `Sleeping` record behind. The heap is
    // rebuilt once those outnumber the live ones.
    fn withdraw(&mut self, key: usize, generation: u64) -> Option<Scheduled> {
        if !self.is_live(key, generation) {
            return None;
        }
        let withdrawn = self.scheduled.remove(key);

        let stale = self.sleeping.len() - self.scheduled.len();
        if self.sleeping.len() > COMPACT_THRESHOLD && stale > self.scheduled.len() {
            let scheduled = &self.scheduled;
            self.sleeping.retain(|s| scheduled.get(s.key).map_or(false, |live| live.generation == s.generation));
            trace!("Timer heap compacted, {} stale record(s) dropped", stale);
        }

        Some(withdrawn)
    }

    // Pop every entry whose deadline has passed, skipping withdrawn ones.
    fn expire(&mut self, now: Instant, due: &mut Vec<Scheduled>) {
        while let Some(top) = self.sleeping.peek() {
            if top.deadline > now {
                break;
            }

            let Sleeping { key, generation, .. } = match self.sleeping.pop() {
                Some(top) => top,
                None => break,
            };

            if self.is_live(key, generation) {
                due.push(self.scheduled.remove(key));
            }
        }
    }
}

pub(crate) struct Timer {
    wheel: Mutex<Wheel>,
    wakeup: Condvar,
}

impl Timer {
    /// The process-wide timer, its thread is spawned on first use.
    pub(crate) fn global() -> &'static Arc<Timer> {
        static GLOBAL: OnceLock<Arc<Timer>> = OnceLock::new();

        GLOBAL.get_or_init(|| {
            let timer = Arc::new(Timer {
                wheel: Mutex::new(Wheel::default()),
                wakeup: Condvar::new(),
            });

            let weak = Arc::downgrade(&timer);
            let spawned = thread::Builder::new()
                .name("deferred-timer".to_owned())
                .spawn(move || Timer::run(weak));
            if let Err(err) = spawned {
                error!("Failed to spawn the timer thread: {}", err);
            }

            timer
        })
    }

    fn wheel(&self) -> MutexGuard<Wheel> {
        match self.wheel.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Call `fire` on the timer thread once `deadline` has passed. `fire` must
    /// only hand work over, never run it.
    pub(crate) fn schedule(self: &Arc<Self>, deadline: Instant, fire: Job) -> TimerEntry {
        let (key, generation, earliest) = self.wheel().insert(deadline, fire);
        if earliest {
            self.wakeup.notify_one();
        }

        TimerEntry {
            timer: Arc::downgrade(self),
            key: key,
            generation: generation,
        }
    }

    fn run(timer: Weak<Timer>) {
        trace!("Timer thread started");

        let mut due = Vec::new();
        loop {
            let timer = match timer.upgrade() {
                Some(timer) => timer,
                None => break,
            };

            {
                let mut wheel = timer.wheel();
                wheel.expire(Instant::now(), &mut due);

                if due.is_empty() {
                    match wheel.sleeping.peek().map(|top| top.deadline) {
                        Some(deadline) => {
                            let timeout = deadline.saturating_duration_since(Instant::now());
                            drop(timer.wakeup.wait_timeout(wheel, timeout));
                        }
                        None => {
                            drop(timer.wakeup.wait(wheel));
                        }
                    }
                    continue;
                }
            }

            for Scheduled { fire, .. } in due.drain(..) {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(fire)) {
                    error!("Timer entry panicked while firing: {}", describe(&*payload));
                }
            }
        }

        trace!("Timer thread exited");
    }
}

/// Handle to a scheduled timer job.
///
/// Dropping the handle does not withdraw the job, call `cancel` for that.
pub(crate) struct TimerEntry {
    timer: Weak<Timer>,
    key: usize,
    generation: u64,
}

impl TimerEntry {
    /// Withdraw the job if it has not fired yet. Returns whether it was
    /// withdrawn.
    pub(crate) fn cancel(&self) -> bool {
        let timer = match self.timer.upgrade() {
            Some(timer) => timer,
            None => return false,
        };

        let withdrawn = timer.wheel().withdraw(self.key, self.generation);
        // The job may own futures, it is released here, outside of the lock.
        withdrawn.is_some()
    }
}
