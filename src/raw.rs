use alloc::alloc::{dealloc, Layout};
use alloc::boxed::Box;
use core::cell::{Cell, RefCell, UnsafeCell};
use core::mem::ManuallyDrop;
use core::ptr::NonNull;

use crate::builder::Builder;
use crate::continuation::Continuation;
use crate::header::{Header, HeaderWithOutput, TaskVTable};
use crate::scheduler::Scheduler;
use crate::state::TaskState;
use crate::step::{Body, Step};

#[cfg(feature = "std")]
pub(crate) type Panic = alloc::boxed::Box<dyn core::any::Any + Send + 'static>;

#[cfg(not(feature = "std"))]
pub(crate) type Panic = core::convert::Infallible;

/// What a single step of the body amounted to, with the value already stored.
pub(crate) enum Outcome {
    Emitted,
    Yielded,
    Awaiting(Continuation),
    Completed,
    #[cfg(feature = "std")]
    Panicked(Panic),
}

/// The heap-allocated task.
///
/// The header, metadata, and output come first so that they can be reached without knowing the
/// body type.
#[repr(C)]
pub(crate) struct TaskCell<B, T, M> {
    pub(crate) head: HeaderWithOutput<T, M>,

    /// The body, dropped when the task is torn down.
    pub(crate) body: UnsafeCell<ManuallyDrop<B>>,
}

/// Raw pointer to a task.
pub(crate) struct RawTask<B, T, M> {
    pub(crate) cell: *mut TaskCell<B, T, M>,
}

impl<B, T, M> Copy for RawTask<B, T, M> {}

impl<B, T, M> Clone for RawTask<B, T, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B, T, M> RawTask<B, T, M>
where
    B: Body<Output = T>,
{
    /// Allocates a task with the given `body` and registers it with `scheduler`.
    ///
    /// The returned pointer carries one reference, owned by the `Task` handle.
    pub(crate) fn allocate(body: B, scheduler: &Scheduler, builder: Builder<M>) -> NonNull<()> {
        let Builder {
            metadata,
            #[cfg(feature = "std")]
            propagate_panic,
        } = builder;

        let cell: Box<TaskCell<B, T, M>> = Box::new(TaskCell {
            head: HeaderWithOutput {
                header: Header {
                    state: Cell::new(TaskState::Unstarted),
                    references: Cell::new(1),
                    token: Cell::new(None),
                    awaiting: Cell::new(None),
                    awaiter: Cell::new(None),
                    panicked: Cell::new(false),
                    scheduler: NonNull::from(scheduler),
                    vtable: &TaskVTable {
                        poll: Self::poll,
                        value_in_use: Self::value_in_use,
                        drop_body: Self::drop_body,
                        destroy: Self::destroy,
                    },
                    #[cfg(feature = "std")]
                    propagate_panic,
                },
                metadata: ManuallyDrop::new(metadata),
                output: RefCell::new(None),
            },
            body: UnsafeCell::new(ManuallyDrop::new(body)),
        });

        unsafe {
            let ptr = NonNull::new_unchecked(Box::into_raw(cell) as *mut ());

            // Register right away, before the body ever runs.
            let token = scheduler.insert(Continuation::from_raw(ptr));
            (*(ptr.as_ptr() as *const Header)).token.set(Some(token));
            log::trace!("task {:p}: registered as {:?}", ptr, token);

            ptr
        }
    }

    /// Creates a `RawTask` from a raw task pointer.
    #[inline]
    pub(crate) fn from_ptr(ptr: *const ()) -> Self {
        RawTask {
            cell: ptr as *mut TaskCell<B, T, M>,
        }
    }

    /// Steps the body and stores what it produced.
    ///
    /// The caller has marked the task as running, so nothing else touches the body meanwhile.
    unsafe fn poll(ptr: *const ()) -> Outcome {
        let raw = Self::from_ptr(ptr);
        let body: &mut B = &mut *(*raw.cell).body.get();
        let output = &(*raw.cell).head.output;

        let run = move || match body.step() {
            Step::Emit(value) => {
                output.replace(Some(value));
                Outcome::Emitted
            }
            Step::Yield => Outcome::Yielded,
            Step::Await(target) => Outcome::Awaiting(target),
            Step::Return(value) => {
                output.replace(Some(value));
                Outcome::Completed
            }
            Step::Done => {
                output.replace(None);
                Outcome::Completed
            }
        };

        #[cfg(feature = "std")]
        let outcome = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(run)) {
            Ok(outcome) => outcome,
            Err(payload) => {
                // A failed body completes without a value.
                if let Ok(mut slot) = output.try_borrow_mut() {
                    *slot = None;
                }
                Outcome::Panicked(payload)
            }
        };

        #[cfg(not(feature = "std"))]
        let outcome = run();

        outcome
    }

    /// Returns `true` while someone holds a borrow of the value slot.
    unsafe fn value_in_use(ptr: *const ()) -> bool {
        let raw = Self::from_ptr(ptr);
        (*raw.cell).head.output.try_borrow_mut().is_err()
    }

    /// Drops the body, the stored value, and the metadata.
    unsafe fn drop_body(ptr: *const ()) {
        let raw = Self::from_ptr(ptr);

        ManuallyDrop::drop(&mut *(*raw.cell).body.get());
        drop((*raw.cell).head.output.take());
        ManuallyDrop::drop(&mut (*raw.cell).head.metadata);
    }

    /// Deallocates the task.
    ///
    /// Everything inside has been dropped by then, so only the memory is released.
    unsafe fn destroy(ptr: *const ()) {
        dealloc(ptr as *mut u8, Layout::new::<TaskCell<B, T, M>>());
    }
}
