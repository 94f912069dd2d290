use core::fmt;
use core::ptr::NonNull;

use crate::header::Header;
use crate::raw::{Outcome, Panic};
use crate::state::TaskState;
use crate::utils::abort;

/// A reference to a suspended task that can be resumed.
///
/// Continuations are what a [`Scheduler`] stores and what a body hands over in
/// [`Step::Await`]. Holding one keeps the task's memory alive but not its body: once the owning
/// [`Task`] is dropped, resuming the continuation does nothing.
///
/// [`Scheduler`]: crate::Scheduler
/// [`Step::Await`]: crate::Step::Await
/// [`Task`]: crate::Task
pub struct Continuation {
    /// A pointer to the heap-allocated task.
    pub(crate) ptr: NonNull<()>,
}

/// Where control goes after a task has been stepped.
enum Transfer {
    /// Resume this continuation next.
    To(Continuation),

    /// Resume the awaited task with the current task's turn.
    Forward(Continuation),

    /// No further work, unwind to the driver.
    Halt,

    /// The body panicked and the panic should reach the driver.
    #[allow(dead_code)]
    Unwind(Panic),
}

impl Continuation {
    /// Creates a new reference to the task at `ptr`.
    pub(crate) unsafe fn from_raw(ptr: NonNull<()>) -> Continuation {
        let header = ptr.as_ptr() as *const Header;
        let references = (*header).references.get();

        // If the reference count overflowed, abort.
        if references > isize::MAX as usize {
            abort();
        }
        (*header).references.set(references + 1);

        Continuation { ptr }
    }

    #[inline]
    pub(crate) fn header(&self) -> &Header {
        unsafe { &*(self.ptr.as_ptr() as *const Header) }
    }

    /// Returns `true` if both continuations refer to the same task.
    pub fn ptr_eq(&self, other: &Continuation) -> bool {
        self.ptr == other.ptr
    }

    /// Runs this continuation and every continuation it transfers to.
    ///
    /// Each step returns the next continuation instead of calling into it, so an arbitrarily
    /// long chain of transfers runs in constant stack space.
    pub(crate) fn run(self) {
        // The continuation to resume, and the task whose turn it is using if it was forwarded.
        let mut next = Some((self, None));

        while let Some((current, turn)) = next {
            next = match current.resume_once(turn.as_ref()) {
                Transfer::To(c) => Some((c, None)),
                Transfer::Forward(c) => Some((c, Some(turn.unwrap_or(current)))),
                Transfer::Halt => None,
                #[cfg(feature = "std")]
                Transfer::Unwind(payload) => std::panic::resume_unwind(payload),
                #[cfg(not(feature = "std"))]
                Transfer::Unwind(never) => match never {},
            };
        }
    }

    /// Steps the task once and decides where control goes next.
    ///
    /// `turn` is the awaiting task whose round-robin turn is being spent on this one.
    fn resume_once(&self, turn: Option<&Continuation>) -> Transfer {
        let header = self.header();

        match header.state.get() {
            TaskState::Completed | TaskState::Destroyed => return Transfer::Halt,
            TaskState::Running => {
                // The task is further up the stack, driving another task directly.
                log::debug!("task {:p}: already running, returning to its driver", self.ptr);
                return Transfer::Halt;
            }
            TaskState::Awaiting => {
                if let Some(target) = header.awaiting() {
                    // Spend the turn on the task being awaited.
                    return Transfer::Forward(target);
                }
                header.state.set(TaskState::Yielded);
            }
            TaskState::Unstarted | TaskState::Yielded => {}
        }

        // A step may replace the value, so nothing can be reading it.
        assert!(
            !unsafe { (header.vtable.value_in_use)(self.ptr.as_ptr()) },
            "task {:p} resumed while its value is still borrowed",
            self.ptr
        );

        header.state.set(TaskState::Running);
        log::trace!("task {:p}: running", self.ptr);
        let outcome = unsafe { (header.vtable.poll)(self.ptr.as_ptr()) };

        match outcome {
            Outcome::Emitted => {
                header.state.set(TaskState::Yielded);
                log::trace!("task {:p}: emitted", self.ptr);
                match header.release_awaiter() {
                    Some(awaiter) => Transfer::To(awaiter),
                    None => Transfer::Halt,
                }
            }
            Outcome::Yielded => {
                header.state.set(TaskState::Yielded);
                log::trace!("task {:p}: yielded", self.ptr);

                // Rotation continues after whoever owns the turn.
                let owner = match turn {
                    Some(owner) if owner.header().token.get().is_some() => owner.header(),
                    _ => header,
                };
                match owner.token.get() {
                    Some(token) => {
                        let (next, _) = unsafe { owner.scheduler().resume(token) };
                        Transfer::To(next)
                    }
                    None => Transfer::Halt,
                }
            }
            Outcome::Awaiting(target) => self.await_task(target),
            Outcome::Completed => {
                log::trace!("task {:p}: completed", self.ptr);
                self.complete()
            }
            #[cfg(feature = "std")]
            Outcome::Panicked(payload) => {
                header.panicked.set(true);
                let message = crate::utils::panic_message(&*payload);

                if header.propagate_panic {
                    log::debug!("task {:p}: panicked: {}", self.ptr, message);
                    header.state.set(TaskState::Completed);
                    drop(unsafe { header.deregister() });
                    drop(header.release_awaiter());
                    Transfer::Unwind(payload)
                } else {
                    log::error!("task {:p}: panicked: {}", self.ptr, message);
                    self.complete()
                }
            }
        }
    }

    /// Links this task to `target` and transfers control to it.
    fn await_task(&self, target: Continuation) -> Transfer {
        let header = self.header();
        let target_header = target.header();

        assert!(!self.ptr_eq(&target), "a task cannot await itself");

        if matches!(
            target_header.state.get(),
            TaskState::Completed | TaskState::Destroyed
        ) {
            // Nothing more will come out of the target, so carry on with the frozen value.
            header.state.set(TaskState::Yielded);
            return Transfer::To(self.clone());
        }

        assert!(
            !target_header.has_awaiter(),
            "a task can be awaited by only one task at a time"
        );

        let mut cursor = target_header.awaiting();
        while let Some(c) = cursor {
            assert!(!self.ptr_eq(&c), "await cycle between tasks");
            cursor = c.header().awaiting();
        }

        log::trace!("task {:p}: awaiting {:p}", self.ptr, target.ptr);
        header.state.set(TaskState::Awaiting);
        header.awaiting.set(Some(target.clone()));
        target_header.awaiter.set(Some(self.clone()));

        Transfer::To(target)
    }

    /// Deregisters a finished task and hands control to its awaiter or the next task.
    fn complete(&self) -> Transfer {
        let header = self.header();
        header.state.set(TaskState::Completed);

        let next = unsafe { header.deregister() };

        match header.release_awaiter() {
            Some(awaiter) => Transfer::To(awaiter),
            None => match next {
                Some(next) => Transfer::To(next),
                None => Transfer::Halt,
            },
        }
    }
}

impl Clone for Continuation {
    fn clone(&self) -> Continuation {
        unsafe { Continuation::from_raw(self.ptr) }
    }
}

impl Drop for Continuation {
    fn drop(&mut self) {
        let header = self.header();
        let references = header.references.get() - 1;
        header.references.set(references);

        // If this was the last reference, deallocate the task.
        if references == 0 {
            unsafe { (header.vtable.destroy)(self.ptr.as_ptr()) }
        }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("ptr", &self.ptr)
            .field("state", &self.header().state.get())
            .finish()
    }
}
