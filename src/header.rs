use core::cell::{Cell, RefCell};
use core::fmt;
use core::mem::ManuallyDrop;
use core::ptr::NonNull;

use crate::continuation::Continuation;
use crate::raw::Outcome;
use crate::scheduler::{Scheduler, Token};
use crate::state::TaskState;

/// The vtable for a task.
///
/// These are the operations that need to know the concrete body type.
pub(crate) struct TaskVTable {
    /// Steps the body once and stores any produced value.
    pub(crate) poll: unsafe fn(*const ()) -> Outcome,

    /// Checks whether the value slot is borrowed.
    pub(crate) value_in_use: unsafe fn(*const ()) -> bool,

    /// Drops the body and the stored value.
    pub(crate) drop_body: unsafe fn(*const ()),

    /// Deallocates the task.
    pub(crate) destroy: unsafe fn(*const ()),
}

/// The type-erased part of a task.
///
/// This header is stored in memory at the beginning of the heap-allocated task.
pub(crate) struct Header {
    /// Current lifecycle state.
    pub(crate) state: Cell<TaskState>,

    /// Number of live references: the `Task` handle plus every `Continuation`.
    pub(crate) references: Cell<usize>,

    /// Registration in the scheduler, `None` once erased.
    pub(crate) token: Cell<Option<Token>>,

    /// The task this one is waiting on.
    pub(crate) awaiting: Cell<Option<Continuation>>,

    /// The task waiting on this one.
    pub(crate) awaiter: Cell<Option<Continuation>>,

    /// Set if the body panicked.
    pub(crate) panicked: Cell<bool>,

    /// The scheduler this task is registered with.
    ///
    /// Only valid while `token` is set: a scheduler clears the tokens of the tasks still
    /// registered when it is dropped.
    pub(crate) scheduler: NonNull<Scheduler>,

    /// The virtual table.
    pub(crate) vtable: &'static TaskVTable,

    /// Whether or not a panic that occurs in the body should be propagated.
    #[cfg(feature = "std")]
    pub(crate) propagate_panic: bool,
}

impl Header {
    /// Returns the scheduler of a task that holds a token.
    #[inline]
    pub(crate) unsafe fn scheduler(&self) -> &Scheduler {
        self.scheduler.as_ref()
    }

    /// Returns `true` if another task is waiting on this one.
    pub(crate) fn has_awaiter(&self) -> bool {
        let awaiter = self.awaiter.take();
        let present = awaiter.is_some();
        self.awaiter.set(awaiter);
        present
    }

    /// Returns a new reference to the task this one is waiting on.
    pub(crate) fn awaiting(&self) -> Option<Continuation> {
        let awaiting = self.awaiting.take();
        let target = awaiting.clone();
        self.awaiting.set(awaiting);
        target
    }

    /// Detaches the awaiter blocked on this task and makes it ready again.
    ///
    /// Returns the awaiter so that control can be handed back to it.
    pub(crate) fn release_awaiter(&self) -> Option<Continuation> {
        let awaiter = self.awaiter.take()?;
        let header = awaiter.header();

        drop(header.awaiting.take());
        if header.state.get() == TaskState::Awaiting {
            header.state.set(TaskState::Yielded);
        }

        Some(awaiter)
    }

    /// Removes this task from its scheduler.
    ///
    /// Returns the next registered task, if any other task is registered.
    pub(crate) unsafe fn deregister(&self) -> Option<Continuation> {
        // Clear the token first so that it never dangles.
        let token = self.token.take()?;
        let scheduler = self.scheduler();

        let (next, others) = scheduler.resume(token);
        scheduler.erase(token);

        if others {
            Some(next)
        } else {
            None
        }
    }
}

// SAFETY: repr(C) is explicitly used here so that casts between `Header` and `HeaderWithOutput`
// can be done safely without additional offsets.
//
/// The part of a task whose layout does not depend on the body type.
#[repr(C)]
pub(crate) struct HeaderWithOutput<T, M> {
    pub(crate) header: Header,

    /// Metadata associated with the task.
    pub(crate) metadata: ManuallyDrop<M>,

    /// The most recently produced value.
    pub(crate) output: RefCell<Option<T>>,
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("state", &self.state.get())
            .field("token", &self.token.get())
            .field("awaiter", &self.has_awaiter())
            .field("panicked", &self.panicked.get())
            .field("ref_count", &self.references.get())
            .finish()
    }
}
