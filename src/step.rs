use core::fmt;

use crate::continuation::Continuation;

/// The outcome of stepping a task body once.
///
/// Every variant except [`Step::Return`] and [`Step::Done`] is a suspension point: the body will
/// be stepped again later and must pick up where it left off.
pub enum Step<T> {
    /// Produces an intermediate value and suspends.
    ///
    /// If another task is awaiting this one, control goes back to it. Otherwise the chain ends
    /// and the driver sees the value.
    Emit(T),

    /// Cedes the turn to the next registered task.
    ///
    /// If this task is the only one registered with its scheduler, it is stepped again right
    /// away.
    Yield,

    /// Suspends until the task behind the continuation produces a value.
    ///
    /// The awaited value is read through the awaited [`Task`](crate::Task) handle once this body
    /// is stepped again.
    Await(Continuation),

    /// Finishes with a final value.
    Return(T),

    /// Finishes without a value.
    Done,
}

impl<T> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Emit(_) => f.write_str("Emit(..)"),
            Step::Yield => f.write_str("Yield"),
            Step::Await(c) => f.debug_tuple("Await").field(c).finish(),
            Step::Return(_) => f.write_str("Return(..)"),
            Step::Done => f.write_str("Done"),
        }
    }
}

/// A suspendable computation driven one step at a time.
///
/// A body is an explicit state machine. Each call to [`step()`][`Body::step()`] runs until the
/// next suspension point and reports it as a [`Step`].
///
/// # Examples
///
/// ```
/// use coop_task::{Body, Scheduler, Step, Task};
///
/// struct Countdown(u32);
///
/// impl Body for Countdown {
///     type Output = u32;
///
///     fn step(&mut self) -> Step<u32> {
///         if self.0 == 0 {
///             return Step::Done;
///         }
///         self.0 -= 1;
///         Step::Emit(self.0)
///     }
/// }
///
/// let sched = Scheduler::new();
/// let task = Task::new(&sched, Countdown(2));
///
/// assert_eq!(task.resume().as_deref(), Some(&1));
/// assert_eq!(task.resume().as_deref(), Some(&0));
/// assert!(task.resume().is_none());
/// assert!(task.is_done());
/// ```
pub trait Body {
    /// The type of values this body emits and returns.
    type Output;

    /// Runs the body until its next suspension point.
    fn step(&mut self) -> Step<Self::Output>;
}

/// Creates a body from a closure.
///
/// The closure is called once per step.
///
/// # Examples
///
/// ```
/// use coop_task::{from_fn, Scheduler, Step, Task};
///
/// let sched = Scheduler::new();
/// let task = Task::new(&sched, from_fn(|| Step::Return(7)));
///
/// assert_eq!(task.resume().as_deref(), Some(&7));
/// ```
pub fn from_fn<T, F>(f: F) -> FromFn<F>
where
    F: FnMut() -> Step<T>,
{
    FromFn(f)
}

/// A body created by [`from_fn()`].
pub struct FromFn<F>(F);

impl<F> fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromFn").finish_non_exhaustive()
    }
}

impl<T, F> Body for FromFn<F>
where
    F: FnMut() -> Step<T>,
{
    type Output = T;

    #[inline]
    fn step(&mut self) -> Step<T> {
        (self.0)()
    }
}
