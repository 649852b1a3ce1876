//! Collaborators this core consumes but does not own: the scheduler that
//! decides who runs next, the platform's monotonic clock, and the
//! accessor for "who is running right now".

use core::ptr::NonNull;

use hermit_sync::OnceCell;

use crate::thread::Thread;

/// Ready-queue owner. The thread layer only reports state transitions;
/// `Scheduler` decides what runs next.
pub trait Scheduler {
	/// Called with interrupts masked right after a thread has been marked
	/// not-runnable. A conforming implementation does not return from this
	/// call until the thread is runnable again: it picks another ready
	/// thread and context-switches to it here. That switch is what actually
	/// suspends the caller — `Thread::block`/`block_until` only update
	/// bookkeeping, they never suspend anything on their own.
	fn on_blocked(&self, thread: &Thread);
	/// Called with interrupts masked right after a thread has been marked
	/// runnable again.
	fn on_wokeup(&self, thread: &Thread);
}

/// Monotonic nanosecond clock, supplied by the platform.
pub trait MonotonicClock {
	fn monotonic_nanos(&self) -> u64;
}

/// Identifies the thread presently executing on this core.
pub trait CurrentThread {
	fn current(&self) -> NonNull<Thread>;
}

/// Where [`crate::logging`] writes rendered log lines. Kept separate from
/// `log::Log` itself so that installing this core's logger never forecloses
/// on the embedder supplying (or swapping) the actual sink — e.g. a serial
/// port or an in-memory ring buffer.
pub trait LogSink {
	fn write_log(&self, tag: &str, args: core::fmt::Arguments<'_>);
}

static CLOCK: OnceCell<&'static dyn MonotonicClock> = OnceCell::new();
static CURRENT: OnceCell<&'static dyn CurrentThread> = OnceCell::new();
static LOG_SINK: OnceCell<&'static dyn LogSink> = OnceCell::new();

/// Registers the platform clock. Must be called once before any
/// `block_timeout` use.
pub fn set_clock(clock: &'static dyn MonotonicClock) {
	let _ = CLOCK.set(clock);
}

/// Registers the accessor used to find the running thread. Must be called
/// once before any futex or syscall-shim operation.
pub fn set_current_thread_accessor(accessor: &'static dyn CurrentThread) {
	let _ = CURRENT.set(accessor);
}

/// Registers where [`crate::logging`] writes rendered lines. Without one,
/// logging is enabled (levels still gate) but every line is dropped —
/// there is simply nowhere to put it yet.
pub fn set_log_sink(sink: &'static dyn LogSink) {
	let _ = LOG_SINK.set(sink);
}

pub(crate) fn log_sink() -> Option<&'static dyn LogSink> {
	LOG_SINK.get().copied()
}

/// Current monotonic time in nanoseconds.
///
/// # Panics
/// Panics if no clock has been registered via [`set_clock`].
pub fn monotonic_now() -> u64 {
	CLOCK
		.get()
		.expect("platform monotonic clock not registered")
		.monotonic_nanos()
}

/// The thread presently executing on this core.
///
/// # Panics
/// Panics if no accessor has been registered via
/// [`set_current_thread_accessor`].
pub fn current_thread() -> NonNull<Thread> {
	CURRENT
		.get()
		.expect("current-thread accessor not registered")
		.current()
}
