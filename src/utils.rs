use core::mem;

/// Aborts the process.
#[cfg(feature = "std")]
pub(crate) fn abort() -> ! {
    std::process::abort()
}

/// Aborts the process.
///
/// Without `std` there is no abort to call, so this panics while already panicking.
#[cfg(not(feature = "std"))]
pub(crate) fn abort() -> ! {
    struct DoublePanic;

    impl Drop for DoublePanic {
        fn drop(&mut self) {
            panic!("coop-task: aborting after an unrecoverable error");
        }
    }

    let _guard = DoublePanic;
    panic!("coop-task: aborting after an unrecoverable error");
}

/// Runs `f` during teardown, aborting if it panics.
///
/// By then the task has already left its scheduler, so unwinding out of here would leave the
/// allocation with a half-dropped body.
#[inline]
pub(crate) fn abort_on_panic<R>(f: impl FnOnce() -> R) -> R {
    struct AbortOnUnwind;

    impl Drop for AbortOnUnwind {
        fn drop(&mut self) {
            log::error!("task teardown panicked, aborting");
            abort();
        }
    }

    let guard = AbortOnUnwind;
    let result = f();
    mem::forget(guard);
    result
}

/// Renders a panic payload for the log.
#[cfg(feature = "std")]
pub(crate) fn panic_message(payload: &(dyn core::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<std::string::String>() {
        msg.as_str()
    } else {
        "Box<dyn Any>"
    }
}
