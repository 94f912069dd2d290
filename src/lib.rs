//! Cooperative tasks scheduled round-robin, with symmetric transfer of control.
//!
//! A [`Task`] is a suspendable computation. Its [`Body`] is an explicit state machine: every call
//! to [`Body::step()`] runs until the next suspension point and says what kind of suspension it
//! is by returning a [`Step`]. Tasks never run on their own and there are no threads involved:
//! some driver resumes a task, and control flows from task to task until there is nothing left
//! to do.
//!
//! # Scheduling
//!
//! Every task is bound to a [`Scheduler`] and registers with it as soon as it is created:
//!
//! ```
//! use coop_task::{from_fn, Scheduler, Step, Task};
//!
//! let sched = Scheduler::new();
//!
//! let task = Task::new(&sched, from_fn(|| Step::Return(1 + 2)));
//! assert_eq!(sched.len(), 1);
//! ```
//!
//! The scheduler keeps registered tasks in a cycle, in the order they were created. When a task
//! yields with [`Step::Yield`], the scheduler names the next task in the cycle and control moves
//! there directly. When a task finishes, it leaves the cycle and control moves to the task after
//! it. A task that is alone in the cycle and yields simply continues.
//!
//! # Execution
//!
//! Drivers call [`Task::resume()`] until [`Task::is_done()`]:
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use coop_task::{from_fn, Scheduler, Step, Task};
//!
//! let sched = Scheduler::new();
//! let out = Rc::new(RefCell::new(String::new()));
//!
//! let make = |name: &'static str| {
//!     let out = out.clone();
//!     let mut turns = 0;
//!     from_fn(move || -> Step<()> {
//!         out.borrow_mut().push_str(name);
//!         turns += 1;
//!         if turns < 2 { Step::Yield } else { Step::Done }
//!     })
//! };
//!
//! let a = Task::new(&sched, make("a"));
//! let b = Task::new(&sched, make("b"));
//!
//! while !a.is_done() {
//!     a.resume();
//! }
//!
//! assert_eq!(*out.borrow(), "abab");
//! assert!(b.is_done());
//! ```
//!
//! Each suspension hands back the continuation to run next instead of calling it, and a loop
//! runs the continuations one after another. Arbitrarily long chains of yields, awaits, and
//! completions therefore run in constant stack space.
//!
//! Bodies passed to [`Task::new()`] are `'static`. A body that borrows local variables is created
//! with the unsafe [`Builder::spawn_unchecked()`], whose caller promises not to leak the task.
//!
//! # Awaiting
//!
//! A body can suspend until another task produces a value by returning
//! [`Step::Await`] with that task's [`Continuation`]. Control moves to the awaited task directly,
//! and comes back once it emits a value, returns, or fails. The awaited task does not need to
//! share the awaiter's scheduler.
//!
//! # Teardown
//!
//! Dropping a [`Task`] tears down its body. An unfinished task is removed from its scheduler
//! before anything else is released, so the scheduler never resumes a dead task.
//!
//! # Panics
//!
//! With the `std` feature, a panic raised by a body is caught at the task boundary. By default
//! it is logged and the task completes without a value; see [`Builder::propagate_panic()`] to
//! resume the panic in the driver instead.
//!
//! # Logging
//!
//! Registration, transfers, and failures are reported through the [`log`] facade.

#![no_std]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(test(attr(deny(rust_2018_idioms, warnings))))]
#![doc(test(attr(allow(unused_extern_crates, unused_variables))))]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod builder;
mod continuation;
mod header;
mod raw;
mod scheduler;
mod state;
mod step;
mod task;
mod utils;

pub use crate::builder::Builder;
pub use crate::continuation::Continuation;
pub use crate::scheduler::{RoundRobin, Scheduler, Token};
pub use crate::state::TaskState;
pub use crate::step::{from_fn, Body, FromFn, Step};
pub use crate::task::Task;
