//! Link-time-style ordered init/term table.
//!
//! `hermit-kernel` gathers its syscall table into a single `const fn`-built
//! array (`src/syscalls/table.rs`) rather than a real linker section; this
//! crate borrows that idiom for the `_inittab_start`/`_inittab_end` array
//! spec'd for a freestanding kernel, since a library has no linker script
//! of its own to place symbols in. The embedding kernel supplies its own
//! `&'static [ThreadInitEntry]` built the same way.

use bitflags::bitflags;

use crate::errno::NegErrno;
use crate::thread::{Thread, ThreadFlags};

bitflags! {
	/// Feature bits an [`InitTab`] entry requires of a thread before its
	/// `init`/`term` apply. Declared separately from [`ThreadFlags`] (spec
	/// open question 4) even though the two share bit encodings, so the
	/// mapping is explicit rather than a numeric coincidence.
	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub struct ThreadInitFlags: u32 {
		const UKTLS = 0b0010;
		const ECTX  = 0b0100;
	}
}

impl ThreadInitFlags {
	/// The feature bits a thread currently satisfies, expressed as
	/// [`ThreadInitFlags`].
	pub fn from_thread_flags(flags: ThreadFlags) -> Self {
		let mut out = ThreadInitFlags::empty();
		if flags.contains(ThreadFlags::HAS_UKTLS) {
			out |= ThreadInitFlags::UKTLS;
		}
		if flags.contains(ThreadFlags::HAS_ECTX) {
			out |= ThreadInitFlags::ECTX;
		}
		out
	}
}

/// Called with the child's TLS pointer active. `parent` is `None` during
/// pre-scheduler bootstrap. Must not leave the active TLS pointer changed
/// on return.
pub type InitFn = fn(child: &mut Thread, parent: Option<&Thread>) -> Result<(), NegErrno>;
/// Called with the child's TLS pointer active, during release or init
/// rollback. Cannot fail.
pub type TermFn = fn(child: &mut Thread);

#[derive(Clone, Copy)]
pub struct ThreadInitEntry {
	pub init: Option<InitFn>,
	pub term: Option<TermFn>,
	pub flags: ThreadInitFlags,
}

impl ThreadInitEntry {
	pub const fn new(init: Option<InitFn>, term: Option<TermFn>, flags: ThreadInitFlags) -> Self {
		Self { init, term, flags }
	}

	fn applicable(&self, thread_flags: ThreadFlags) -> bool {
		let have = ThreadInitFlags::from_thread_flags(thread_flags);
		(self.flags & have) == self.flags
	}
}

/// An ordered, address-order table of init/term entries.
pub struct InitTab {
	entries: &'static [ThreadInitEntry],
}

impl InitTab {
	pub const fn new(entries: &'static [ThreadInitEntry]) -> Self {
		Self { entries }
	}

	/// Runs applicable `init`s in forward order with the child's TLS
	/// pointer active. On failure, rolls back (reverse order) exactly the
	/// previously-succeeded applicable entries, restores the caller's
	/// active TLS pointer, and returns the error.
	pub(crate) fn run_init(
		&self,
		child: &mut Thread,
		parent: Option<&Thread>,
	) -> Result<(), NegErrno> {
		let outer_tlsp = self.activate_child_tlsp(child);

		for (i, entry) in self.entries.iter().enumerate() {
			if !entry.applicable(child.flags()) {
				continue;
			}
			let Some(init) = entry.init else { continue };
			match init(child, parent) {
				Ok(()) => {
					if child.flags().contains(ThreadFlags::HAS_UKTLS) {
						debug_assert_eq!(
							crate::arch::current::tlsp_get(),
							child.uktlsp,
							"init entry {i} changed the active TLS pointer"
						);
					}
				}
				Err(e) => {
					self.rollback_locked(child, i);
					crate::arch::current::tlsp_set(outer_tlsp);
					return Err(e);
				}
			}
		}
		crate::arch::current::tlsp_set(outer_tlsp);
		Ok(())
	}

	/// Rolls back applicable, previously-succeeded entries strictly before
	/// index `failed_at`, in reverse order. Assumes the child's TLS
	/// pointer is already active.
	fn rollback_locked(&self, child: &mut Thread, failed_at: usize) {
		for entry in self.entries[..failed_at].iter().rev() {
			if entry.applicable(child.flags()) {
				if let Some(term) = entry.term {
					term(child);
				}
			}
		}
	}

	/// Runs all applicable `term`s in reverse order, regardless of
	/// individual outcome (there isn't one — `TermFn` cannot fail).
	pub(crate) fn run_term(&self, child: &mut Thread) {
		let outer_tlsp = self.activate_child_tlsp(child);
		for entry in self.entries.iter().rev() {
			if entry.applicable(child.flags()) {
				if let Some(term) = entry.term {
					term(child);
				}
			}
		}
		crate::arch::current::tlsp_set(outer_tlsp);
	}

	/// Switches the active TLS pointer to `child`'s (when it has one) and
	/// returns the value to restore afterwards.
	fn activate_child_tlsp(&self, child: &Thread) -> usize {
		let saved = crate::arch::current::tlsp_get();
		if child.flags().contains(ThreadFlags::HAS_UKTLS) {
			crate::arch::current::tlsp_set(child.uktlsp);
		}
		saved
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::thread_local;
	use std::vec::Vec;

	use super::*;
	use crate::errno::ENOMEM;

	thread_local! {
		static LOG: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
	}

	fn record(s: &'static str) {
		LOG.with(|log| log.borrow_mut().push(s));
	}

	fn init_a(_child: &mut Thread, _parent: Option<&Thread>) -> Result<(), NegErrno> {
		record("init_a");
		Ok(())
	}
	fn term_a(_child: &mut Thread) {
		record("term_a");
	}
	fn init_b(_child: &mut Thread, _parent: Option<&Thread>) -> Result<(), NegErrno> {
		record("init_b");
		Ok(())
	}
	fn term_b(_child: &mut Thread) {
		record("term_b");
	}
	fn init_c(_child: &mut Thread, _parent: Option<&Thread>) -> Result<(), NegErrno> {
		record("init_c");
		Err(-ENOMEM)
	}
	fn term_c(_child: &mut Thread) {
		record("term_c");
	}

	#[test]
	fn failure_rolls_back_exactly_the_preceding_successes() {
		LOG.with(|log| log.borrow_mut().clear());
		let entries = [
			ThreadInitEntry::new(Some(init_a), Some(term_a), ThreadInitFlags::empty()),
			ThreadInitEntry::new(Some(init_b), Some(term_b), ThreadInitFlags::empty()),
			ThreadInitEntry::new(Some(init_c), Some(term_c), ThreadInitFlags::empty()),
		];
		let tab = InitTab::new(&entries);
		let mut child = Thread::init_bare(0, 0);

		let result = tab.run_init(&mut child, None);

		assert_eq!(result, Err(-ENOMEM));
		LOG.with(|log| {
			assert_eq!(*log.borrow(), ["init_a", "init_b", "init_c", "term_b", "term_a"]);
		});
	}

	#[test]
	fn entries_gated_by_flags_are_skipped_for_threads_without_them() {
		LOG.with(|log| log.borrow_mut().clear());
		let entries = [ThreadInitEntry::new(Some(init_a), Some(term_a), ThreadInitFlags::UKTLS)];
		let tab = InitTab::new(&entries);
		let mut child = Thread::init_bare(0, 0);

		assert_eq!(tab.run_init(&mut child, None), Ok(()));
		LOG.with(|log| assert!(log.borrow().is_empty()));
	}
}
