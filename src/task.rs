use core::cell::Ref;
use core::fmt;
use core::marker::PhantomData;

use crate::builder::Builder;
use crate::continuation::Continuation;
use crate::header::{Header, HeaderWithOutput};
use crate::scheduler::Scheduler;
use crate::state::TaskState;
use crate::step::Body;
use crate::utils::abort_on_panic;

/// A suspendable computation bound to a [`Scheduler`].
///
/// A task registers with its scheduler as soon as it is created and stays registered until its
/// body finishes or the task is dropped. It starts lazily: the body first runs when the task is
/// resumed, either by a driver calling [`resume()`][`Task::resume()`] or by another task handing
/// control to it.
///
/// Dropping a task tears down its body. If the task has not finished, it is removed from the
/// scheduler first.
///
/// # Examples
///
/// ```
/// use coop_task::{from_fn, Scheduler, Step, Task};
///
/// let sched = Scheduler::new();
///
/// let mut n = 0;
/// let task = Task::new(&sched, from_fn(move || {
///     n += 1;
///     if n < 3 { Step::Emit(n) } else { Step::Return(n * 10) }
/// }));
///
/// assert_eq!(task.resume().as_deref(), Some(&1));
/// assert_eq!(task.resume().as_deref(), Some(&2));
/// assert_eq!(task.resume().as_deref(), Some(&30));
/// assert!(task.is_done());
/// ```
#[must_use = "tasks get torn down when dropped"]
pub struct Task<'a, T, M = ()> {
    /// The reference owned by this handle.
    pub(crate) continuation: Continuation,

    /// A marker capturing the scheduler borrow, the output type `T`, and the metadata `M`.
    pub(crate) _marker: PhantomData<(&'a Scheduler, T, M)>,
}

impl<'a, T> Task<'a, T> {
    /// Creates a task with the given body and registers it with `scheduler`.
    ///
    /// This is a shorthand for [`Builder::new().spawn(scheduler, body)`][`Builder::spawn()`].
    /// The body must be `'static`, since a leaked task stays reachable through its
    /// continuations.
    ///
    /// ```compile_fail
    /// use coop_task::{from_fn, Scheduler, Step, Task};
    ///
    /// let sched = Scheduler::new();
    /// let data = vec![1, 2, 3];
    /// let task = Task::new(&sched, from_fn(|| Step::Return(data.len())));
    /// ```
    pub fn new<B>(scheduler: &'a Scheduler, body: B) -> Task<'a, T>
    where
        B: Body<Output = T> + 'static,
        T: 'static,
    {
        Builder::new().spawn(scheduler, body)
    }
}

impl<'a, T, M> Task<'a, T, M> {
    #[inline]
    fn header(&self) -> &Header {
        self.continuation.header()
    }

    #[inline]
    fn head(&self) -> &HeaderWithOutput<T, M> {
        unsafe { &*(self.continuation.ptr.as_ptr() as *const HeaderWithOutput<T, M>) }
    }

    /// Resumes the task and returns its current value.
    ///
    /// The task runs until its next suspension point, and so does every task control is handed
    /// to along the way: the next registered task after a yield or a completion, the awaited task
    /// after an await. The call returns once a task emits a value nobody awaits or the last
    /// registered task completes.
    ///
    /// If the task has completed, it is not resumed and the frozen final value is returned.
    /// `None` means the task has not produced a value yet, or completed without one.
    ///
    /// The returned [`Ref`] borrows the value slot. Drop it before resuming anything else.
    ///
    /// # Panics
    ///
    /// Panics if control reaches a task whose value is still borrowed. That task is left as it
    /// was and can be resumed again once the borrow is gone.
    pub fn resume(&self) -> Option<Ref<'_, T>> {
        if !self.is_done() {
            self.continuation.clone().run();
        }
        self.value()
    }

    /// Returns `true` if the body has finished.
    pub fn is_done(&self) -> bool {
        self.state() == TaskState::Completed
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.header().state.get()
    }

    /// Returns the most recently produced value without resuming the task.
    ///
    /// This is how an awaiting body reads the result of the task it awaited.
    pub fn value(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.head().output.borrow(), |slot| slot.as_ref()).ok()
    }

    /// Takes the most recently produced value out of the task.
    pub fn take(&self) -> Option<T> {
        self.head().output.borrow_mut().take()
    }

    /// Returns `true` if the body panicked.
    pub fn has_panicked(&self) -> bool {
        self.header().panicked.get()
    }

    /// Returns `true` while the task is registered with its scheduler.
    pub fn is_registered(&self) -> bool {
        self.header().token.get().is_some()
    }

    /// Returns a continuation that resumes this task.
    ///
    /// Hand it to [`Step::Await`](crate::Step::Await) to await this task.
    pub fn continuation(&self) -> Continuation {
        self.continuation.clone()
    }

    /// Returns a reference to the metadata.
    pub fn metadata(&self) -> &M {
        &self.head().metadata
    }
}

impl<T, M> Drop for Task<'_, T, M> {
    fn drop(&mut self) {
        let header = self.header();
        header.state.set(TaskState::Destroyed);

        // Deregister before anything backing the body goes away.
        if let Some(token) = header.token.take() {
            unsafe { header.scheduler().erase(token) };
        }

        if let Some(target) = header.awaiting.take() {
            drop(target.header().awaiter.take());
        }
        drop(header.release_awaiter());

        log::trace!("task {:p}: destroyed", self.continuation.ptr);

        // A panic here would leave the task half destroyed.
        abort_on_panic(|| unsafe { (header.vtable.drop_body)(self.continuation.ptr.as_ptr()) });
    }
}

impl<T, M: fmt::Debug> fmt::Debug for Task<'_, T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("header", self.header())
            .field("metadata", self.metadata())
            .finish()
    }
}
