//! Per-thread TLS area layout, independent of the architecture's TLS
//! register access (see [`crate::arch::current::tlsreg`]).
//!
//! ```text
//! [ template image (.tdata + .tbss) | self-ptr | optional TCB tail ]
//!                                   ^
//!                                   tls_pointer (ABI-visible)
//! ```

use core::alloc::Layout;
use core::mem::size_of;
use core::ptr::NonNull;

use hermit_sync::OnceCell;

use crate::config::TCB_RESERVED;

/// The build-time TLS template an embedding kernel publishes: the initial
/// `.tdata` image plus the total `.tdata + .tbss` size and alignment.
#[derive(Clone, Copy)]
pub struct TlsTemplate {
	pub image: &'static [u8],
	pub mem_size: usize,
	pub align: usize,
}

static TEMPLATE: OnceCell<TlsTemplate> = OnceCell::new();

/// Registers the TLS template. The embedding kernel calls this once during
/// boot, before constructing any thread with TLS.
pub fn set_template(template: TlsTemplate) {
	let _ = TEMPLATE.set(template);
}

fn template() -> &'static TlsTemplate {
	TEMPLATE.get().expect("TLS template not registered")
}

fn align_up(value: usize, align: usize) -> usize {
	(value + align - 1) & !(align - 1)
}

/// Size of the template region (`.tdata + .tbss`), aligned to [`area_align`].
pub fn area_size() -> usize {
	align_up(template().mem_size, area_align())
}

/// Alignment the template requires, never less than a pointer.
pub fn area_align() -> usize {
	template().align.max(size_of::<usize>())
}

/// The ABI-visible TLS pointer within an area starting at `base`: the
/// first byte past the template region, i.e. the self-pointer word.
pub fn tls_pointer(base: *mut u8) -> *mut u8 {
	unsafe { base.add(area_size()) }
}

/// Copies the template image into `base`, zeroes the BSS tail, and writes
/// the self-pointer word so that `*tls_pointer(base) == tls_pointer(base)`.
///
/// # Safety
/// `base` must be valid for `area_size() + size_of::<usize>()` bytes.
pub unsafe fn copy(base: *mut u8) {
	let tmpl = template();
	unsafe {
		core::ptr::copy_nonoverlapping(tmpl.image.as_ptr(), base, tmpl.image.len());
		core::ptr::write_bytes(
			base.add(tmpl.image.len()),
			0,
			area_size() - tmpl.image.len(),
		);
		let tlsp = tls_pointer(base);
		(tlsp as *mut usize).write(tlsp as usize);
	}
}

/// An allocated per-thread TLS area, freed on drop.
pub struct TlsArea {
	base: NonNull<u8>,
	tlsp: usize,
	layout: Layout,
	/// Offset of a co-allocated `ExtCtx` buffer within this allocation, if
	/// one was requested (see spec §4.3's "when TLS is present, an ExtCtx
	/// buffer is placed in the same allocation").
	ectx_offset: Option<usize>,
}

impl TlsArea {
	/// Allocates and initializes a TLS area. When `with_ectx` is set, an
	/// aligned `ExtCtx` buffer is co-allocated in the same tail.
	pub fn new(with_ectx: bool) -> Option<Self> {
		let tcb_extra = TCB_RESERVED - size_of::<usize>();
		let mut total = area_size() + size_of::<usize>() + tcb_extra;
		let mut align = area_align();

		let ectx_offset = if with_ectx {
			let ectx_align = crate::arch::current::ectx_align();
			let ectx_size = crate::arch::current::ectx_size();
			let offset = align_up(total, ectx_align);
			total = offset + ectx_size;
			align = align.max(ectx_align);
			Some(offset)
		} else {
			None
		};

		let layout = Layout::from_size_align(total, align).ok()?;
		let base = unsafe { alloc::alloc::alloc(layout) };
		let base = NonNull::new(base)?;

		unsafe { copy(base.as_ptr()) };
		let tlsp = tls_pointer(base.as_ptr()) as usize;

		if let Some(offset) = ectx_offset {
			let ectx_ptr = unsafe { base.as_ptr().add(offset) };
			unsafe { crate::arch::current::ExtCtx::init(ectx_ptr) };
		}

		Some(Self { base, tlsp, layout, ectx_offset })
	}

	/// The ABI-visible TLS pointer for this area.
	pub fn tlsp(&self) -> usize {
		self.tlsp
	}

	/// Pointer to the co-allocated `ExtCtx` buffer, if any.
	pub fn ectx_ptr(&self) -> Option<*mut u8> {
		self.ectx_offset.map(|off| unsafe { self.base.as_ptr().add(off) })
	}

	pub fn base(&self) -> NonNull<u8> {
		self.base
	}

	pub fn layout(&self) -> Layout {
		self.layout
	}
}

impl Drop for TlsArea {
	fn drop(&mut self) {
		unsafe { alloc::alloc::dealloc(self.base.as_ptr(), self.layout) };
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Once;

	use super::*;

	static TEST_TEMPLATE_IMAGE: [u8; 16] = [0xAB; 16];

	static REGISTER: Once = Once::new();

	fn ensure_template_registered() {
		REGISTER.call_once(|| {
			set_template(TlsTemplate { image: &TEST_TEMPLATE_IMAGE, mem_size: 16, align: 8 });
		});
	}

	#[test]
	fn self_pointer_invariant_holds() {
		ensure_template_registered();
		let area = TlsArea::new(false).expect("TLS area allocation failed");
		let tlsp = area.tlsp();
		assert_ne!(tlsp, 0);
		let stored = unsafe { *(tlsp as *const usize) };
		assert_eq!(stored, tlsp, "the word at tlsp must equal tlsp");
	}

	#[test]
	fn co_allocated_ectx_buffer_is_aligned() {
		ensure_template_registered();
		let area = TlsArea::new(true).expect("TLS area allocation failed");
		let ptr = area.ectx_ptr().expect("ectx buffer requested but absent");
		let align = crate::arch::current::ectx_align();
		assert_eq!(ptr as usize % align, 0);
	}
}
