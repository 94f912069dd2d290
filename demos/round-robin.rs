//! A few producers taking turns, and a consumer awaiting one of them.
//!
//! Run with:
//!
//! ```
//! cargo run --example round-robin
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use coop_task::{from_fn, Body, Builder, Scheduler, Step, Task};

/// Emits `0..count` and then returns the sum of what it emitted.
struct Counter {
    count: u32,
    next: u32,
    sum: u32,
}

impl Body for Counter {
    type Output = u32;

    fn step(&mut self) -> Step<u32> {
        if self.next == self.count {
            return Step::Return(self.sum);
        }
        let n = self.next;
        self.next += 1;
        self.sum += n;
        Step::Emit(n)
    }
}

fn main() {
    let sched = Scheduler::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    // Producers print a line per turn and then yield to whoever is next.
    let producers = (1..=3)
        .map(|id| {
            let log = log.clone();
            let mut turn = 0;
            Task::new(
                &sched,
                from_fn(move || -> Step<()> {
                    turn += 1;
                    log.borrow_mut().push(format!("producer {}: turn {}", id, turn));
                    if turn < id {
                        Step::Yield
                    } else {
                        Step::Done
                    }
                }),
            )
        })
        .collect::<Vec<_>>();

    let counter = Task::new(
        &sched,
        Counter {
            count: 4,
            next: 0,
            sum: 0,
        },
    );

    // The consumer awaits the counter once per value, reading it through the counter's handle.
    let consumer = {
        let (counter, log) = (&counter, log.clone());
        let mut waiting = false;
        let body = from_fn(move || -> Step<()> {
            if waiting {
                if let Some(v) = counter.value() {
                    log.borrow_mut().push(format!("consumer: got {}", *v));
                }
                if counter.is_done() {
                    return Step::Done;
                }
            }
            waiting = true;
            Step::Await(counter.continuation())
        });

        // The consumer is dropped before the counter it borrows.
        unsafe { Builder::new().spawn_unchecked(&sched, body) }
    };

    // Everybody gets a turn until the counter emits its first value nobody awaits yet.
    producers[0].resume();

    while !consumer.is_done() {
        consumer.resume();
    }

    for line in log.borrow().iter() {
        println!("{}", line);
    }
    println!("tasks left: {}", sched.len());
}
