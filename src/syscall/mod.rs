//! Linux-ABI binary syscall entry point.
//!
//! Mirrors the shape of a real binary syscall handler: save the extended
//! register state, activate the callee's TLS, record the trapping
//! instruction pointer for introspection, dispatch through a sysno-indexed
//! table, clear the introspection slot, then restore TLS only if the
//! syscall itself left it untouched, and restore the extended register
//! state unconditionally.

use crate::arch::current::ExtCtxScratch;
use crate::errno::ENOSYS;
use crate::synch::futex::sys_futex;
use crate::thread::ThreadFlags;

/// Register frame a platform trap handler hands to [`dispatch`]. Named
/// after the fields a Linux-ABI syscall handler actually reads off the
/// trap frame (`rax` = sysno, `rdi..r9` = args, `rip` = return address).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct SyscallFrame {
	pub sysno: u64,
	pub arg0: u64,
	pub arg1: u64,
	pub arg2: u64,
	pub arg3: u64,
	pub arg4: u64,
	pub arg5: u64,
	pub ret: i64,
	/// The instruction pointer the trap was taken from, recorded into the
	/// current thread's introspection slot for the duration of dispatch.
	pub rip: u64,
}

pub type SyscallFn = extern "C" fn(u64, u64, u64, u64, u64, u64) -> i64;

const SYSNO_FUTEX: usize = 0;
const NO_SYSCALLS: usize = 1;

extern "C" fn sys_invalid(sysno: u64, _a1: u64, _a2: u64, _a3: u64, _a4: u64, _a5: u64) -> i64 {
	log::error!("invalid syscall {sysno}");
	-(ENOSYS as i64)
}

/// A fixed-size, sysno-indexed dispatch table, built the same `const
/// fn`-over-an-array way `hermit-kernel`'s own `src/syscalls/table.rs`
/// builds its table, since neither crate has a linker script to place a
/// real jump table in.
#[repr(align(64))]
pub struct SyscallTable {
	handlers: [SyscallFn; NO_SYSCALLS],
}

impl SyscallTable {
	pub const fn new() -> Self {
		let mut table = SyscallTable { handlers: [sys_invalid; NO_SYSCALLS] };
		table.handlers[SYSNO_FUTEX] = sys_futex;
		table
	}

	fn get(&self, sysno: u64) -> SyscallFn {
		match self.handlers.get(sysno as usize) {
			Some(handler) => *handler,
			None => sys_invalid,
		}
	}
}

impl Default for SyscallTable {
	fn default() -> Self {
		Self::new()
	}
}

pub static TABLE: SyscallTable = SyscallTable::new();

/// Runs one binary syscall through [`TABLE`], bracketing it with the
/// extended-register-state and TLS-pointer save/restore a real trap
/// handler performs around user code.
pub fn dispatch(frame: &mut SyscallFrame) {
	let mut scratch = ExtCtxScratch::new();
	scratch.store();

	let current = crate::platform::current_thread();
	let current = unsafe { current.as_ref() };
	let orig_tlsp = current
		.flags()
		.contains(ThreadFlags::HAS_UKTLS)
		.then(|| {
			let saved = crate::arch::current::tlsp_get();
			crate::arch::current::tlsp_set(current.uktlsp());
			saved
		});

	current.set_syscall_return_addr(frame.rip as usize);
	log::debug!(
		"binary syscall request {} at ip:{:#x} (arg0={:#x}, arg1={:#x})",
		frame.sysno,
		frame.rip,
		frame.arg0,
		frame.arg1
	);

	let handler = TABLE.get(frame.sysno);
	frame.ret = handler(
		frame.arg0,
		frame.arg1,
		frame.arg2,
		frame.arg3,
		frame.arg4,
		frame.arg5,
	);

	current.set_syscall_return_addr(0);

	if let Some(orig_tlsp) = orig_tlsp {
		if crate::arch::current::tlsp_get() == current.uktlsp() {
			crate::arch::current::tlsp_set(orig_tlsp);
		} else {
			log::debug!("syscall left the TLS pointer register changed, not restoring");
		}
	}

	scratch.load();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn table_dispatches_futex_and_falls_back_to_invalid() {
		let table = SyscallTable::new();
		assert_eq!(table.get(SYSNO_FUTEX as u64) as usize, sys_futex as usize);
		assert_eq!(table.get(NO_SYSCALLS as u64) as usize, sys_invalid as usize);
		assert_eq!(table.get(u64::MAX) as usize, sys_invalid as usize);
	}

	#[test]
	fn sys_invalid_reports_enosys() {
		assert_eq!(sys_invalid(999, 0, 0, 0, 0, 0), -(ENOSYS as i64));
	}
}
