//! `WAIT` / `WAKE` / `CMP_REQUEUE` over user addresses, built on
//! `Thread::block_timeout`/`wakeup`.
//!
//! Waiters are kept in a process-wide keyed map, the same "parking lot"
//! shape `hermit-kernel`'s own `src/synch/futex.rs` uses
//! (`InterruptTicketMutex<HashMap<addr, Queue>>`), simplified here from a
//! priority queue to a plain FIFO `VecDeque` since `Thread` carries no
//! priority.

use alloc::collections::VecDeque;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, Ordering};

use ahash::RandomState;
use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use hermit_sync::InterruptTicketMutex;

use crate::errno::{EAGAIN, EINVAL, ENOSYS};
use crate::thread::Thread;

pub const FUTEX_WAIT: i32 = 0;
pub const FUTEX_WAKE: i32 = 1;
pub const FUTEX_FD: i32 = 2;
pub const FUTEX_REQUEUE: i32 = 3;
pub const FUTEX_CMP_REQUEUE: i32 = 4;
pub const FUTEX_PRIVATE_FLAG: i32 = 128;
pub const FUTEX_WAIT_PRIVATE: i32 = FUTEX_WAIT | FUTEX_PRIVATE_FLAG;
pub const FUTEX_WAKE_PRIVATE: i32 = FUTEX_WAKE | FUTEX_PRIVATE_FLAG;

type WaiterQueue = VecDeque<NonNull<Thread>>;

static PARKING_LOT: InterruptTicketMutex<HashMap<usize, WaiterQueue, RandomState>> =
	InterruptTicketMutex::new(HashMap::with_hasher(RandomState::with_seeds(0, 0, 0, 0)));

fn addr_of(address: &AtomicU32) -> usize {
	address as *const AtomicU32 as usize
}

/// `WAIT(uaddr, val, timeout_ns)`: blocks while `*uaddr == val`.
///
/// Returns `0` on wakeup (by `WAKE`, `CMP_REQUEUE`, or timeout expiry —
/// this layer does not distinguish the two, see DESIGN.md open question
/// 1), or `-EAGAIN` immediately if the compare fails.
pub fn wait(uaddr: &AtomicU32, val: u32, timeout_ns: Option<u64>) -> i32 {
	let mut lot = PARKING_LOT.lock();
	if uaddr.load(Ordering::Acquire) != val {
		return -EAGAIN;
	}

	let me = crate::platform::current_thread();
	lot.entry(addr_of(uaddr)).or_default().push_back(me);
	drop(lot);

	let thread = unsafe { me.as_ref() };
	match timeout_ns {
		Some(ns) => thread.block_timeout(ns),
		None => thread.block(),
	}

	// Reschedule happens in the embedding kernel's scheduler loop after
	// `block`/`block_timeout` returns; by the time control comes back
	// here the thread has been woken (by WAKE/CMP_REQUEUE, which already
	// dequeued it) or timed out (still enqueued — drop it ourselves).
	let mut lot = PARKING_LOT.lock();
	if let Entry::Occupied(mut entry) = lot.entry(addr_of(uaddr)) {
		entry.get_mut().retain(|&h| h != me);
		if entry.get().is_empty() {
			entry.remove();
		}
	}
	// TODO: distinguish timeout from a real wake here and return
	// `-ETIMEDOUT` in the former case; kept as-is to match the upstream
	// behavior this was ported from.
	0
}

/// `WAKE(uaddr, count)`: wakes up to `count` waiters on `uaddr`, FIFO.
/// Returns the number actually woken. `count == 0` is a no-op returning 0
/// without touching the waiter list.
pub fn wake(uaddr: &AtomicU32, count: i32) -> i32 {
	if count < 0 {
		return -EINVAL;
	}
	if count == 0 {
		return 0;
	}

	let mut lot = PARKING_LOT.lock();
	let mut entry = match lot.entry(addr_of(uaddr)) {
		Entry::Occupied(e) => e,
		Entry::Vacant(_) => return 0,
	};

	let mut woken = 0i32;
	while woken < count {
		let Some(handle) = entry.get_mut().pop_front() else { break };
		unsafe { handle.as_ref().wakeup() };
		woken += 1;
	}
	if entry.get().is_empty() {
		entry.remove();
	}
	woken
}

/// `CMP_REQUEUE(uaddr, val3, count, uaddr2, count2)`: verifies `*uaddr ==
/// val3`, then wakes up to `count` waiters on `uaddr` exactly as [`wake`].
/// Requeuing further waiters onto `uaddr2` (up to `count2`) is deferred —
/// see DESIGN.md open question 2.
pub fn cmp_requeue(uaddr: &AtomicU32, val3: u32, count: i32, _uaddr2: &AtomicU32, _count2: i32) -> i32 {
	if uaddr.load(Ordering::Acquire) != val3 {
		return -EAGAIN;
	}
	wake(uaddr, count)
}

/// Dispatches a Linux-compatible futex op code. `WAIT_PRIVATE`/
/// `WAKE_PRIVATE` are synonyms (this implementation has no notion of
/// shared vs. private futexes). Unimplemented op codes return `-ENOSYS`.
pub fn do_futex(
	op: i32,
	uaddr: &AtomicU32,
	val: u32,
	timeout_ns: Option<u64>,
	uaddr2: Option<&AtomicU32>,
	val3: u32,
) -> i32 {
	match op & !FUTEX_PRIVATE_FLAG {
		FUTEX_WAIT => wait(uaddr, val, timeout_ns),
		FUTEX_WAKE => wake(uaddr, val as i32),
		FUTEX_CMP_REQUEUE => match uaddr2 {
			Some(uaddr2) => cmp_requeue(uaddr, val3, val as i32, uaddr2, 0),
			None => -EINVAL,
		},
		_ => -ENOSYS,
	}
}

/// Entry point a [`crate::syscall`] dispatch table slot can point at
/// directly: `futex(uaddr, op, val, timeout_ns, uaddr2, val3)`.
pub extern "C" fn sys_futex(
	uaddr: u64,
	op: u64,
	val: u64,
	timeout_ns: u64,
	uaddr2: u64,
	val3: u64,
) -> i64 {
	let uaddr = unsafe { &*(uaddr as *const AtomicU32) };
	let timeout = if timeout_ns == 0 { None } else { Some(timeout_ns) };
	let uaddr2 = if uaddr2 == 0 { None } else { Some(unsafe { &*(uaddr2 as *const AtomicU32) }) };
	do_futex(op as i32, uaddr, val as u32, timeout, uaddr2, val3 as u32) as i64
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;
	use std::thread_local;

	use super::*;
	use crate::platform::{self, CurrentThread};

	// No real scheduler is plugged in here, so `Scheduler::on_blocked` is a
	// no-op that returns immediately rather than context-switching away —
	// it exists only so `Thread::block`/`wakeup` bookkeeping has somewhere
	// to report to. Tests therefore exercise the parking-lot mechanics
	// directly rather than a genuine cross-thread suspend/resume.
	struct NoopScheduler;
	impl platform::Scheduler for NoopScheduler {
		fn on_blocked(&self, _thread: &Thread) {}
		fn on_wokeup(&self, _thread: &Thread) {}
	}
	static SCHED: NoopScheduler = NoopScheduler;

	thread_local! {
		static CURRENT: Cell<Option<NonNull<Thread>>> = const { Cell::new(None) };
	}

	struct TestCurrentThread;
	impl CurrentThread for TestCurrentThread {
		fn current(&self) -> NonNull<Thread> {
			CURRENT.with(|c| c.get().expect("no current thread set for this test"))
		}
	}
	static ACCESSOR: TestCurrentThread = TestCurrentThread;

	fn set_current(t: &Thread) {
		CURRENT.with(|c| c.set(NonNull::new(t as *const Thread as *mut Thread)));
	}

	fn setup() {
		platform::set_current_thread_accessor(&ACCESSOR);
	}

	#[test]
	fn wait_mismatch_returns_eagain_without_enqueuing() {
		setup();
		let word = AtomicU32::new(7);
		let t = Thread::init_bare(0, 0);
		t.attach_scheduler(&SCHED);
		set_current(&t);

		assert_eq!(wait(&word, 8, None), -EAGAIN);
		assert!(!PARKING_LOT.lock().contains_key(&addr_of(&word)));
	}

	#[test]
	fn wake_with_zero_is_a_noop() {
		let word = AtomicU32::new(0);
		let t = Thread::init_bare(0, 0);
		t.attach_scheduler(&SCHED);
		t.block();

		{
			let mut lot = PARKING_LOT.lock();
			lot.entry(addr_of(&word)).or_default().push_back(NonNull::from(&t));
		}

		assert_eq!(wake(&word, 0), 0);
		assert!(!t.is_runnable());
		PARKING_LOT.lock().remove(&addr_of(&word));
	}

	#[test]
	fn wake_returns_min_of_count_and_waiters_fifo() {
		let word = AtomicU32::new(0);
		let t1 = Thread::init_bare(0, 0);
		let t2 = Thread::init_bare(0, 0);
		t1.attach_scheduler(&SCHED);
		t2.attach_scheduler(&SCHED);
		t1.block();
		t2.block();
		assert!(!t1.is_runnable() && !t2.is_runnable());

		{
			let mut lot = PARKING_LOT.lock();
			let q = lot.entry(addr_of(&word)).or_default();
			q.push_back(NonNull::from(&t1));
			q.push_back(NonNull::from(&t2));
		}

		// Ask for more than there are waiters: returns the actual count,
		// not the requested one.
		assert_eq!(wake(&word, 5), 2);
		assert!(t1.is_runnable());
		assert!(t2.is_runnable());
		assert!(!PARKING_LOT.lock().contains_key(&addr_of(&word)));
	}

	#[test]
	fn cmp_requeue_checks_val3_before_waking() {
		let word = AtomicU32::new(1);
		let other = AtomicU32::new(0);
		let t = Thread::init_bare(0, 0);
		t.attach_scheduler(&SCHED);
		t.block();

		{
			let mut lot = PARKING_LOT.lock();
			lot.entry(addr_of(&word)).or_default().push_back(NonNull::from(&t));
		}

		assert_eq!(cmp_requeue(&word, 2, 1, &other, 0), -EAGAIN);
		assert!(!t.is_runnable());

		assert_eq!(cmp_requeue(&word, 1, 1, &other, 0), 1);
		assert!(t.is_runnable());
	}
}
