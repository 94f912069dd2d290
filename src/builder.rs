use core::fmt;
use core::marker::PhantomData;

use crate::continuation::Continuation;
use crate::raw::RawTask;
use crate::scheduler::Scheduler;
use crate::step::Body;
use crate::task::Task;

/// A builder that creates a new task.
pub struct Builder<M> {
    /// The metadata associated with the task.
    pub(crate) metadata: M,

    /// Whether or not a panic that occurs in the body should be propagated.
    #[cfg(feature = "std")]
    pub(crate) propagate_panic: bool,
}

impl<M: fmt::Debug> fmt::Debug for Builder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("Builder");
        builder.field("metadata", &self.metadata);

        #[cfg(feature = "std")]
        builder.field("propagate_panic", &self.propagate_panic);

        builder.finish()
    }
}

impl Default for Builder<()> {
    fn default() -> Self {
        Builder::new()
    }
}

impl Builder<()> {
    /// Creates a new task builder.
    ///
    /// By default, this task builder has no metadata and absorbs panics raised by the body.
    ///
    /// # Examples
    ///
    /// ```
    /// use coop_task::{from_fn, Builder, Scheduler, Step};
    ///
    /// let sched = Scheduler::new();
    /// let task = Builder::new().spawn(&sched, from_fn(|| Step::Return(1)));
    /// assert_eq!(task.resume().as_deref(), Some(&1));
    /// ```
    pub fn new() -> Builder<()> {
        Builder {
            metadata: (),
            #[cfg(feature = "std")]
            propagate_panic: false,
        }
    }

    /// Adds metadata to the task.
    ///
    /// The metadata is available through [`Task::metadata()`] for as long as the task lives.
    ///
    /// # Examples
    ///
    /// ```
    /// use coop_task::{from_fn, Builder, Scheduler, Step};
    ///
    /// let sched = Scheduler::new();
    /// let task = Builder::new()
    ///     .metadata("worker")
    ///     .spawn(&sched, from_fn(|| Step::Return(())));
    ///
    /// assert_eq!(*task.metadata(), "worker");
    /// ```
    pub fn metadata<M>(self, metadata: M) -> Builder<M> {
        Builder {
            metadata,
            #[cfg(feature = "std")]
            propagate_panic: self.propagate_panic,
        }
    }
}

impl<M> Builder<M> {
    /// Propagates panics that occur in the body.
    ///
    /// When this is `true`, a panic in the body is resumed out of the [`Task::resume()`] call that
    /// started the chain, after the task has been completed and deregistered and its awaiter
    /// released.
    ///
    /// When this is `false` (the default), the panic is logged and the task completes without a
    /// value. Other tasks keep rotating.
    ///
    /// This is only available when the `std` feature is enabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use coop_task::{from_fn, Builder, Scheduler, Step};
    /// use std::panic::{catch_unwind, AssertUnwindSafe};
    ///
    /// let sched = Scheduler::new();
    /// let task = Builder::new()
    ///     .propagate_panic(true)
    ///     .spawn(&sched, from_fn(|| -> Step<()> { panic!("boom") }));
    ///
    /// assert!(catch_unwind(AssertUnwindSafe(|| task.resume().is_some())).is_err());
    /// assert!(task.is_done());
    /// assert!(sched.is_empty());
    /// ```
    #[cfg(feature = "std")]
    pub fn propagate_panic(self, propagate_panic: bool) -> Builder<M> {
        Builder {
            metadata: self.metadata,
            propagate_panic,
        }
    }

    /// Creates a task and registers it with `scheduler`.
    ///
    /// The body does not run until the task is resumed, either directly by a driver or by
    /// another task yielding, completing, or awaiting.
    ///
    /// If you need a body that borrows local variables, consider using
    /// [`spawn_unchecked()`][`Builder::spawn_unchecked()`] instead.
    ///
    /// # Examples
    ///
    /// A body that borrows from the stack does not compile:
    ///
    /// ```compile_fail
    /// use coop_task::{from_fn, Builder, Scheduler, Step};
    ///
    /// let sched = Scheduler::new();
    /// let data = vec![1, 2, 3];
    /// let task = Builder::new().spawn(&sched, from_fn(|| Step::Return(data.len())));
    /// ```
    pub fn spawn<'a, B>(self, scheduler: &'a Scheduler, body: B) -> Task<'a, B::Output, M>
    where
        B: Body + 'static,
        B::Output: 'static,
        M: 'a,
    {
        unsafe { self.spawn_unchecked(scheduler, body) }
    }

    /// Creates a task without the `'static` bound on its body.
    ///
    /// This is the same as [`spawn()`][`Builder::spawn()`], except the body may borrow variables
    /// that live at least as long as the scheduler borrow.
    ///
    /// Safety requirements:
    ///
    /// - If `body` is not `'static`, the returned [`Task`] must be dropped before the variables it
    ///   borrows. Leaking it, for example with [`mem::forget`](core::mem::forget), leaves the body
    ///   registered and reachable through its continuations after those variables are gone.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::cell::Cell;
    /// use coop_task::{from_fn, Builder, Scheduler, Step};
    ///
    /// let sched = Scheduler::new();
    /// let hits = Cell::new(0);
    ///
    /// // The task is dropped at the end of the scope, before `hits`.
    /// let task = unsafe {
    ///     Builder::new().spawn_unchecked(&sched, from_fn(|| {
    ///         hits.set(hits.get() + 1);
    ///         Step::Return(hits.get())
    ///     }))
    /// };
    ///
    /// assert_eq!(task.resume().as_deref(), Some(&1));
    /// ```
    pub unsafe fn spawn_unchecked<'a, B>(
        self,
        scheduler: &'a Scheduler,
        body: B,
    ) -> Task<'a, B::Output, M>
    where
        B: Body + 'a,
        M: 'a,
    {
        let ptr = RawTask::<B, B::Output, M>::allocate(body, scheduler, self);

        Task {
            continuation: Continuation { ptr },
            _marker: PhantomData,
        }
    }
}
