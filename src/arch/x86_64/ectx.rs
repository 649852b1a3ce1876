//! Extended CPU state (x87/SSE/AVX) save and restore.
//!
//! Discovery runs once, picking the most capable of `xsaveopt`, `xsave`,
//! `fxsave`, `fsave` that the CPU advertises.

use core::arch::x86_64::{_fxrstor64, _fxsave64, _xrstor64, _xsave64, _xsaveopt64};
use core::mem::MaybeUninit;

use hermit_sync::OnceCell;
use raw_cpuid::CpuId;

/// The save/restore method selected at discovery time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Method {
	None,
	FSave,
	FxSave,
	XSave { compact: bool },
}

#[derive(Copy, Clone, Debug)]
struct Discovery {
	method: Method,
	size: usize,
	align: usize,
}

static DISCOVERY: OnceCell<Discovery> = OnceCell::new();

/// All components, for the xsave feature-set mask passed to `store`/`load`.
const XCR0_ALL: u64 = u64::MAX;

fn discover() -> Discovery {
	let cpuid = CpuId::new();

	let has_xsave = cpuid.get_feature_info().is_some_and(|f| f.has_xsave());
	if has_xsave {
		if let Some(info) = cpuid.get_extended_state_info() {
			let size = info.xsave_area_size_enabled_features() as usize;
			let compact = info.has_xsaveopt();
			return Discovery { method: Method::XSave { compact }, size, align: 64 };
		}
	}

	let has_fxsr = cpuid.get_feature_info().is_some_and(|f| f.has_fxsave_fxstor());
	if has_fxsr {
		return Discovery { method: Method::FxSave, size: 512, align: 16 };
	}

	// Oldest fallback: the CPU has no fxsave either, so only the legacy
	// FSAVE/FRSTOR pair remains. Every x86-64 CPU in practice has fxsr, but
	// the method is kept for completeness and to give `align() == 1` a
	// meaning distinct from "never discovered".
	Discovery { method: Method::FSave, size: 108, align: 1 }
}

fn discovery() -> &'static Discovery {
	DISCOVERY.get_or_init(discover)
}

/// Required buffer size for [`ExtCtx`] on this CPU. Triggers discovery.
pub fn size() -> usize {
	discovery().size
}

/// Required buffer alignment for [`ExtCtx`] on this CPU. Always `>= 1`;
/// `1` is not a sentinel for "no state", it is simply FSAVE's real
/// alignment requirement.
pub fn align() -> usize {
	discovery().align
}

/// An extended-state save area. Owns no memory; the caller supplies an
/// aligned buffer of at least [`size`] bytes.
pub struct ExtCtx;

impl ExtCtx {
	/// Zeroes `state` and then overwrites it with a valid, resumable
	/// layout via [`Self::store`]. A buffer that is merely zeroed is not a
	/// legal FP state on every method (FSAVE's control/tag words in
	/// particular are not zero-valid).
	///
	/// # Safety
	/// `state` must be valid for `size()` bytes and aligned to `align()`.
	pub unsafe fn init(state: *mut u8) {
		let n = size();
		unsafe {
			core::ptr::write_bytes(state, 0, n);
			Self::store(state);
		}
	}

	/// Saves the current extended register state into `state`.
	///
	/// # Safety
	/// `state` must be valid for `size()` bytes and aligned to `align()`.
	pub unsafe fn store(state: *mut u8) {
		debug_assert_eq!(state as usize & (align() - 1), 0, "ExtCtx buffer misaligned");
		match discovery().method {
			Method::None => {}
			Method::FSave => unsafe { fsave(state) },
			Method::FxSave => unsafe {
				_fxsave64(state);
			},
			Method::XSave { compact } => unsafe {
				if compact {
					_xsaveopt64(state, XCR0_ALL);
				} else {
					_xsave64(state, XCR0_ALL);
				}
			},
		}
	}

	/// Restores the extended register state from `state`.
	///
	/// # Safety
	/// `state` must previously have been produced by [`Self::init`] or
	/// [`Self::store`], valid for `size()` bytes and aligned to `align()`.
	pub unsafe fn load(state: *const u8) {
		debug_assert_eq!(state as usize & (align() - 1), 0, "ExtCtx buffer misaligned");
		match discovery().method {
			Method::None => {}
			Method::FSave => unsafe { frstor(state) },
			Method::FxSave => unsafe {
				_fxrstor64(state);
			},
			Method::XSave { .. } => unsafe {
				_xrstor64(state, XCR0_ALL);
			},
		}
	}
}

unsafe fn fsave(state: *mut u8) {
	unsafe {
		core::arch::asm!("fsave [{0}]", "fwait", in(reg) state, options(nostack));
	}
}

unsafe fn frstor(state: *const u8) {
	unsafe {
		core::arch::asm!("frstor [{0}]", in(reg) state, options(nostack));
	}
}

/// Scratch buffer large enough for any discovered method, used by the
/// syscall shim to save/restore extended state around a dispatch without
/// a heap allocation.
pub struct ExtCtxScratch {
	buf: MaybeUninit<[u8; MAX_SCRATCH]>,
}

/// Upper bound on `size()` across all known methods (xsave areas in
/// practice stay well under a few KiB; this generously covers AVX-512).
const MAX_SCRATCH: usize = 4096;

impl ExtCtxScratch {
	pub fn new() -> Self {
		assert!(size() <= MAX_SCRATCH, "ExtCtx state exceeds scratch buffer");
		Self { buf: MaybeUninit::uninit() }
	}

	fn ptr(&mut self) -> *mut u8 {
		let base = self.buf.as_mut_ptr() as usize;
		let aligned = (base + align() - 1) & !(align() - 1);
		aligned as *mut u8
	}

	pub fn store(&mut self) {
		let p = self.ptr();
		unsafe { ExtCtx::store(p) };
	}

	pub fn load(&mut self) {
		let p = self.ptr();
		unsafe { ExtCtx::load(p) };
	}
}

impl Default for ExtCtxScratch {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use alloc::vec;

	use super::*;

	#[test]
	fn size_and_align_are_sane() {
		assert!(size() > 0);
		assert!(align().is_power_of_two());
		assert!(size() <= MAX_SCRATCH);
	}

	#[test]
	fn init_then_store_round_trips_without_corruption() {
		// With no intervening FP/SIMD instructions, storing the state right
		// after `init` must reproduce the same bytes `init` already wrote —
		// a quiescent round trip, not a claim about surviving register
		// mutation (that requires hand-written asm this suite doesn't rely
		// on to stay buildable across CPU feature levels).
		let mut a = vec![0u8; size() + align()];
		let mut b = vec![0u8; size() + align()];
		let pa = align_ptr(a.as_mut_ptr());
		let pb = align_ptr(b.as_mut_ptr());

		unsafe {
			ExtCtx::init(pa);
			ExtCtx::store(pb);
		}

		let sa = unsafe { core::slice::from_raw_parts(pa, size()) };
		let sb = unsafe { core::slice::from_raw_parts(pb, size()) };
		assert_eq!(sa, sb);
	}

	fn align_ptr(p: *mut u8) -> *mut u8 {
		let a = align();
		let addr = p as usize;
		((addr + a - 1) & !(a - 1)) as *mut u8
	}
}
