/// The lifecycle state of a task.
///
/// A task starts out [`Unstarted`], is [`Running`] while its body steps, and rests in
/// [`Yielded`], [`Awaiting`] or [`Completed`] in between. Dropping the [`Task`] handle moves it
/// to [`Destroyed`].
///
/// [`Unstarted`]: TaskState::Unstarted
/// [`Running`]: TaskState::Running
/// [`Yielded`]: TaskState::Yielded
/// [`Awaiting`]: TaskState::Awaiting
/// [`Completed`]: TaskState::Completed
/// [`Destroyed`]: TaskState::Destroyed
/// [`Task`]: crate::Task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Constructed and registered, never resumed.
    Unstarted,

    /// The body is executing.
    Running,

    /// Suspended by emitting a value or ceding its turn. Ready to run again.
    Yielded,

    /// Suspended until another task produces a value.
    Awaiting,

    /// The body has finished. Terminal for production of values.
    Completed,

    /// The owning handle was dropped and the body torn down.
    Destroyed,
}
