//! Access to the x86-64 TLS base register (`FS.base`).

use x86_64::VirtAddr;
use x86_64::registers::model_specific::FsBase;
use x86_64::registers::segmentation::{FS, Segment64};

/// Reads the current TLS pointer from `FS.base`.
#[inline]
pub fn tlsp_get() -> usize {
	let base = if cfg!(feature = "fsgsbase") { FS::read_base() } else { FsBase::read() };
	base.as_u64() as usize
}

/// Writes `tlsp` into `FS.base`.
#[inline]
pub fn tlsp_set(tlsp: usize) {
	let base = VirtAddr::new(tlsp as u64);
	if cfg!(feature = "fsgsbase") {
		unsafe {
			FS::write_base(base);
		}
	} else {
		FsBase::write(base);
	}
}
