//! The `Thread` object: stack, TLS, extended context, and arch context
//! tied together behind a small construction matrix, block/wakeup, and
//! release.

pub mod inittab;

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;

use bitflags::bitflags;
use hermit_sync::{InterruptTicketMutex, OnceCell};

use crate::arch::current::{ArchCtx, Entry0, Entry1, Entry2};
use crate::config::DEFAULT_STACK_SIZE;
use crate::errno::{ENOMEM, NegErrno};
use crate::platform::Scheduler;
use crate::tls::TlsArea;
use inittab::InitTab;

bitflags! {
	/// Per-thread state bits. `HAS_UKTLS`/`HAS_ECTX` double as the feature
	/// bits [`inittab::ThreadInitFlags`] matches against — the two types
	/// share bit values by an explicit conversion
	/// ([`inittab::ThreadInitFlags::from_thread_flags`]), not by accident.
	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub struct ThreadFlags: u32 {
		const RUNNABLE  = 0b0001;
		const HAS_UKTLS = 0b0010;
		const HAS_ECTX  = 0b0100;
	}
}

static INITTAB: OnceCell<InitTab> = OnceCell::new();

/// Registers the process-wide init/term table. Must be called once before
/// constructing any thread through the `init_fn*`/`create_*` family.
pub fn set_inittab(tab: InitTab) {
	let _ = INITTAB.set(tab);
}

fn inittab() -> &'static InitTab {
	INITTAB.get().expect("InitTab not registered")
}

/// Allocator handles this core recorded for a thread, each freed exactly
/// once on release (spec invariant 6).
#[derive(Default)]
struct ThreadMem {
	stack: Option<(NonNull<u8>, Layout)>,
	tls: Option<TlsArea>,
	/// Set only when TLS was not requested but an ExtCtx buffer was:
	/// allocated on its own rather than appended to the `Thread` struct's
	/// own allocation (see DESIGN.md for why).
	ectx_owned: Option<(NonNull<u8>, Layout)>,
}

impl Drop for ThreadMem {
	/// Frees whatever is still recorded. `do_release` already takes each
	/// field before freeing it on the normal release path, so this only
	/// fires for real on an early return (e.g. an `InitTab` init failure)
	/// where the `Thread` never reached `release`/`release_boxed` — the
	/// equivalent of the original's `err_free_alloc` rollback label.
	fn drop(&mut self) {
		if let Some((ptr, layout)) = self.stack.take() {
			unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) };
		}
		if let Some((ptr, layout)) = self.ectx_owned.take() {
			unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) };
		}
	}
}

pub struct Thread {
	pub ctx: ArchCtx,
	ectx: Option<NonNull<u8>>,
	tlsp: Cell<usize>,
	uktlsp: usize,
	flags: Cell<ThreadFlags>,
	name: Option<&'static str>,
	priv_data: Cell<Option<NonNull<()>>>,
	dtor: Option<fn(&mut Thread)>,
	mem: ThreadMem,
	wakeup_time: Cell<u64>,
	sched: Cell<Option<NonNull<dyn Scheduler>>>,
	/// The TLS-resident introspection slot a binary syscall dispatch
	/// records the trapping instruction pointer into for the duration of
	/// the call (0 outside of one). Per-thread the same way Unikraft's
	/// `_uk_syscall_return_addr` is a `uk_thread_uktls_var`.
	syscall_return_addr: Cell<usize>,
}

// SAFETY: a `Thread` only ever crosses the single cooperative CPU this
// core targets while interrupts are masked around every mutation of its
// `Cell` fields; there is no real parallelism to race against.
unsafe impl Send for Thread {}
unsafe impl Sync for Thread {}

impl core::fmt::Debug for Thread {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Thread")
			.field("name", &self.name)
			.field("flags", &self.flags.get())
			.field("tlsp", &self.tlsp.get())
			.finish()
	}
}

fn align_down(value: usize, align: usize) -> usize {
	value & !(align - 1)
}

impl Thread {
	fn new_raw(ctx: ArchCtx, flags: ThreadFlags, mem: ThreadMem, tlsp: usize, ectx: Option<NonNull<u8>>) -> Self {
		Self {
			ctx,
			ectx,
			tlsp: Cell::new(tlsp),
			uktlsp: tlsp,
			flags: Cell::new(flags),
			name: None,
			priv_data: Cell::new(None),
			dtor: None,
			mem,
			wakeup_time: Cell::new(0),
			sched: Cell::new(None),
			syscall_return_addr: Cell::new(0),
		}
	}

	// ---- init_* family: caller owns the `Thread` storage -------------

	/// Sets `ip`/`sp` directly with no stack or TLS allocation.
	/// `RUNNABLE` iff `ip != 0`.
	pub fn init_bare(sp: usize, ip: usize) -> Self {
		let mut ctx = ArchCtx::default();
		ctx.init_bare(sp, ip);
		let flags = if ip != 0 { ThreadFlags::RUNNABLE } else { ThreadFlags::empty() };
		Self::new_raw(ctx, flags, ThreadMem::default(), 0, None)
	}

	/// Prepares `ctx` to resume at `entry()` on caller-supplied `sp`.
	///
	/// # Safety
	/// `sp` must be a writable, aligned stack per [`ArchCtx::init_entry0`].
	pub unsafe fn init_bare_fn0(sp: usize, keep_regs: bool, entry: Entry0) -> Self {
		let mut ctx = ArchCtx::default();
		unsafe { ctx.init_entry0(sp, keep_regs, entry) };
		Self::new_raw(ctx, ThreadFlags::RUNNABLE, ThreadMem::default(), 0, None)
	}

	/// Prepares `ctx` to resume at `entry(arg)` on caller-supplied `sp`.
	///
	/// # Safety
	/// Same obligations as [`Self::init_bare_fn0`].
	pub unsafe fn init_bare_fn1(sp: usize, keep_regs: bool, entry: Entry1, arg: usize) -> Self {
		let mut ctx = ArchCtx::default();
		unsafe { ctx.init_entry1(sp, keep_regs, entry, arg) };
		Self::new_raw(ctx, ThreadFlags::RUNNABLE, ThreadMem::default(), 0, None)
	}

	/// Prepares `ctx` to resume at `entry(arg0, arg1)` on caller-supplied
	/// `sp`.
	///
	/// # Safety
	/// Same obligations as [`Self::init_bare_fn0`].
	pub unsafe fn init_bare_fn2(
		sp: usize,
		keep_regs: bool,
		entry: Entry2,
		arg0: usize,
		arg1: usize,
	) -> Self {
		let mut ctx = ArchCtx::default();
		unsafe { ctx.init_entry2(sp, keep_regs, entry, arg0, arg1) };
		Self::new_raw(ctx, ThreadFlags::RUNNABLE, ThreadMem::default(), 0, None)
	}

	fn alloc_stack(stack_size: usize) -> Result<(NonNull<u8>, Layout, usize), NegErrno> {
		let layout = Layout::from_size_align(stack_size, 16).map_err(|_| -ENOMEM)?;
		let base = unsafe { alloc::alloc::alloc(layout) };
		let base = NonNull::new(base).ok_or(-ENOMEM)?;
		let top = align_down(base.as_ptr() as usize + stack_size, 16);
		Ok((base, layout, top))
	}

	fn alloc_ectx_only() -> Result<(NonNull<u8>, Layout), NegErrno> {
		let size = crate::arch::current::ectx_size();
		let align = crate::arch::current::ectx_align();
		let layout = Layout::from_size_align(size, align).map_err(|_| -ENOMEM)?;
		let ptr = unsafe { alloc::alloc::alloc(layout) };
		let ptr = NonNull::new(ptr).ok_or(-ENOMEM)?;
		unsafe { crate::arch::current::ExtCtx::init(ptr.as_ptr()) };
		Ok((ptr, layout))
	}

	/// Allocates a stack (and, optionally, TLS/ExtCtx) for an `init_fn*`
	/// thread; returns `(mem, sp_top, tlsp, ectx)`.
	fn alloc_for_fn(
		stack_size: usize,
		with_tls: bool,
		with_ectx: bool,
	) -> Result<(ThreadMem, usize, usize, Option<NonNull<u8>>), NegErrno> {
		let (stack_base, stack_layout, sp_top) = Self::alloc_stack(stack_size)?;
		let mut mem = ThreadMem { stack: Some((stack_base, stack_layout)), ..Default::default() };

		let (tlsp, ectx) = if with_tls {
			let area = TlsArea::new(with_ectx).ok_or_else(|| {
				if let Some((p, l)) = mem.stack.take() {
					unsafe { alloc::alloc::dealloc(p.as_ptr(), l) };
				}
				-ENOMEM
			})?;
			let tlsp = area.tlsp();
			let ectx = area.ectx_ptr().and_then(NonNull::new);
			mem.tls = Some(area);
			(tlsp, ectx)
		} else if with_ectx {
			match Self::alloc_ectx_only() {
				Ok((ptr, layout)) => {
					mem.ectx_owned = Some((ptr, layout));
					(0, Some(ptr))
				}
				Err(e) => {
					if let Some((p, l)) = mem.stack.take() {
						unsafe { alloc::alloc::dealloc(p.as_ptr(), l) };
					}
					return Err(e);
				}
			}
		} else {
			(0, None)
		};

		Ok((mem, sp_top, tlsp, ectx))
	}

	fn flags_for(with_tls: bool, with_ectx: bool, runnable: bool) -> ThreadFlags {
		let mut flags = ThreadFlags::empty();
		if runnable {
			flags |= ThreadFlags::RUNNABLE;
		}
		if with_tls {
			flags |= ThreadFlags::HAS_UKTLS;
		}
		if with_ectx {
			flags |= ThreadFlags::HAS_ECTX;
		}
		flags
	}

	/// Allocates a stack (and optional TLS/ExtCtx), prepares `ctx` to
	/// resume at `entry()`, and runs `InitTab` init hooks.
	pub fn init_fn0(
		keep_regs: bool,
		entry: Entry0,
		with_tls: bool,
		with_ectx: bool,
		stack_size: Option<usize>,
		parent: Option<&Thread>,
	) -> Result<Self, NegErrno> {
		let (mem, sp, tlsp, ectx) =
			Self::alloc_for_fn(stack_size.unwrap_or(DEFAULT_STACK_SIZE), with_tls, with_ectx)?;
		let mut ctx = ArchCtx::default();
		unsafe { ctx.init_entry0(sp, keep_regs, entry) };
		let flags = Self::flags_for(with_tls, with_ectx, true);
		let mut thread = Self::new_raw(ctx, flags, mem, tlsp, ectx);
		inittab().run_init(&mut thread, parent)?;
		Ok(thread)
	}

	/// Same as [`Self::init_fn0`] for a one-argument entry point.
	pub fn init_fn1(
		keep_regs: bool,
		entry: Entry1,
		arg: usize,
		with_tls: bool,
		with_ectx: bool,
		stack_size: Option<usize>,
		parent: Option<&Thread>,
	) -> Result<Self, NegErrno> {
		let (mem, sp, tlsp, ectx) =
			Self::alloc_for_fn(stack_size.unwrap_or(DEFAULT_STACK_SIZE), with_tls, with_ectx)?;
		let mut ctx = ArchCtx::default();
		unsafe { ctx.init_entry1(sp, keep_regs, entry, arg) };
		let flags = Self::flags_for(with_tls, with_ectx, true);
		let mut thread = Self::new_raw(ctx, flags, mem, tlsp, ectx);
		inittab().run_init(&mut thread, parent)?;
		Ok(thread)
	}

	/// Same as [`Self::init_fn0`] for a two-argument entry point.
	pub fn init_fn2(
		keep_regs: bool,
		entry: Entry2,
		arg0: usize,
		arg1: usize,
		with_tls: bool,
		with_ectx: bool,
		stack_size: Option<usize>,
		parent: Option<&Thread>,
	) -> Result<Self, NegErrno> {
		let (mem, sp, tlsp, ectx) =
			Self::alloc_for_fn(stack_size.unwrap_or(DEFAULT_STACK_SIZE), with_tls, with_ectx)?;
		let mut ctx = ArchCtx::default();
		unsafe { ctx.init_entry2(sp, keep_regs, entry, arg0, arg1) };
		let flags = Self::flags_for(with_tls, with_ectx, true);
		let mut thread = Self::new_raw(ctx, flags, mem, tlsp, ectx);
		inittab().run_init(&mut thread, parent)?;
		Ok(thread)
	}

	// ---- create_* family: this core heap-allocates the struct too ----

	/// Heap-allocates a `Thread` and sets `ip`/`sp` directly, no stack/TLS.
	pub fn create_bare(sp: usize, ip: usize) -> Result<alloc::boxed::Box<Self>, NegErrno> {
		Ok(alloc::boxed::Box::new(Self::init_bare(sp, ip)))
	}

	/// Heap-allocates a `Thread`, a stack, and optional TLS, but sets no
	/// entry function — only `ctx.sp`. Not `RUNNABLE` until the caller
	/// sets an entry point itself.
	pub fn create_container(
		with_tls: bool,
		with_ectx: bool,
		stack_size: Option<usize>,
		parent: Option<&Thread>,
	) -> Result<alloc::boxed::Box<Self>, NegErrno> {
		let (mem, sp, tlsp, ectx) =
			Self::alloc_for_fn(stack_size.unwrap_or(DEFAULT_STACK_SIZE), with_tls, with_ectx)?;
		let mut ctx = ArchCtx::default();
		ctx.init_bare(sp, 0);
		let flags = Self::flags_for(with_tls, with_ectx, false);
		let mut thread = Self::new_raw(ctx, flags, mem, tlsp, ectx);
		inittab().run_init(&mut thread, parent)?;
		Ok(alloc::boxed::Box::new(thread))
	}

	/// Heap-allocates a `Thread`, a stack, optional TLS, and prepares
	/// `ctx` to resume at `entry()`.
	pub fn create_fn0(
		keep_regs: bool,
		entry: Entry0,
		with_tls: bool,
		with_ectx: bool,
		stack_size: Option<usize>,
		parent: Option<&Thread>,
	) -> Result<alloc::boxed::Box<Self>, NegErrno> {
		Ok(alloc::boxed::Box::new(Self::init_fn0(
			keep_regs, entry, with_tls, with_ectx, stack_size, parent,
		)?))
	}

	/// Same as [`Self::create_fn0`] for a one-argument entry point.
	pub fn create_fn1(
		keep_regs: bool,
		entry: Entry1,
		arg: usize,
		with_tls: bool,
		with_ectx: bool,
		stack_size: Option<usize>,
		parent: Option<&Thread>,
	) -> Result<alloc::boxed::Box<Self>, NegErrno> {
		Ok(alloc::boxed::Box::new(Self::init_fn1(
			keep_regs, entry, arg, with_tls, with_ectx, stack_size, parent,
		)?))
	}

	/// Same as [`Self::create_fn0`] for a two-argument entry point.
	pub fn create_fn2(
		keep_regs: bool,
		entry: Entry2,
		arg0: usize,
		arg1: usize,
		with_tls: bool,
		with_ectx: bool,
		stack_size: Option<usize>,
		parent: Option<&Thread>,
	) -> Result<alloc::boxed::Box<Self>, NegErrno> {
		Ok(alloc::boxed::Box::new(Self::init_fn2(
			keep_regs, entry, arg0, arg1, with_tls, with_ectx, stack_size, parent,
		)?))
	}

	// ---- accessors -----------------------------------------------------

	pub fn flags(&self) -> ThreadFlags {
		self.flags.get()
	}

	pub fn is_runnable(&self) -> bool {
		self.flags.get().contains(ThreadFlags::RUNNABLE)
	}

	pub fn tlsp(&self) -> usize {
		self.tlsp.get()
	}

	pub fn uktlsp(&self) -> usize {
		self.uktlsp
	}

	/// Reassigns the active TLS pointer for this thread (a syscall such
	/// as `arch_prctl` may legitimately do this; `uktlsp` is unaffected).
	pub fn set_tlsp(&self, tlsp: usize) {
		self.tlsp.set(tlsp);
	}

	/// The trapping instruction pointer a binary syscall dispatch is
	/// currently running on behalf of this thread, or `0` outside of one.
	pub fn syscall_return_addr(&self) -> usize {
		self.syscall_return_addr.get()
	}

	/// Sets or clears (`0`) the syscall-return-address introspection slot.
	pub fn set_syscall_return_addr(&self, addr: usize) {
		self.syscall_return_addr.set(addr);
	}

	pub fn ectx(&self) -> Option<NonNull<u8>> {
		self.ectx
	}

	pub fn wakeup_time(&self) -> u64 {
		self.wakeup_time.get()
	}

	pub fn name(&self) -> Option<&'static str> {
		self.name
	}

	pub fn set_name(&mut self, name: &'static str) {
		self.name = Some(name);
	}

	pub fn set_dtor(&mut self, dtor: fn(&mut Thread)) {
		self.dtor = Some(dtor);
	}

	pub fn set_priv_data(&self, ptr: Option<NonNull<()>>) {
		self.priv_data.set(ptr);
	}

	pub fn priv_data(&self) -> Option<NonNull<()>> {
		self.priv_data.get()
	}

	/// Attaches this thread to a scheduler; `on_blocked`/`on_wokeup` fire
	/// against it from then on.
	pub fn attach_scheduler(&self, sched: &'static dyn Scheduler) {
		let ptr = sched as *const dyn Scheduler as *mut dyn Scheduler;
		self.sched.set(NonNull::new(ptr));
	}

	/// Clears the scheduler back-reference (spec invariant 3: required
	/// before release).
	pub fn detach_scheduler(&self) {
		self.sched.set(None);
	}

	// ---- blocking --------------------------------------------------

	/// With interrupts masked: sets `wakeup_time`; if runnable, clears
	/// `RUNNABLE` and notifies the attached scheduler. A no-op on an
	/// already-blocked thread beyond overwriting `wakeup_time`.
	pub fn block_until(&self, deadline_ns: u64) {
		hermit_sync::without_interrupts(|| {
			self.wakeup_time.set(deadline_ns);
			let flags = self.flags.get();
			if flags.contains(ThreadFlags::RUNNABLE) {
				self.flags.set(flags - ThreadFlags::RUNNABLE);
				if let Some(sched) = self.sched.get() {
					unsafe { sched.as_ref().on_blocked(self) };
				}
			}
		});
	}

	/// Non-overloaded form of [`Self::block_until`]: `None` blocks
	/// indefinitely, `Some(ns)` blocks until the given absolute deadline,
	/// including a genuine deadline of `0` (spec open question 3).
	pub fn block_deadline_ns(&self, deadline_ns: Option<u64>) {
		self.block_until(deadline_ns.unwrap_or(0));
	}

	/// Blocks for `nsec` nanoseconds from now.
	pub fn block_timeout(&self, nsec: u64) {
		let deadline = crate::platform::monotonic_now().saturating_add(nsec);
		self.block_until(deadline);
	}

	/// Blocks indefinitely (`wakeup_time == 0`).
	pub fn block(&self) {
		self.block_until(0);
	}

	/// With interrupts masked: if not runnable, sets `RUNNABLE`, clears
	/// `wakeup_time`, and notifies the attached scheduler. A true no-op
	/// when already runnable.
	pub fn wakeup(&self) {
		hermit_sync::without_interrupts(|| {
			let flags = self.flags.get();
			if !flags.contains(ThreadFlags::RUNNABLE) {
				self.flags.set(flags | ThreadFlags::RUNNABLE);
				self.wakeup_time.set(0);
				if let Some(sched) = self.sched.get() {
					unsafe { sched.as_ref().on_wokeup(self) };
				}
			}
		});
	}

	// ---- release -----------------------------------------------------

	fn do_release(&mut self) {
		inittab().run_term(self);
		if let Some(dtor) = self.dtor.take() {
			dtor(self);
		}
		self.mem.tls = None;
		if let Some((ptr, layout)) = self.mem.stack.take() {
			unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) };
		}
		if let Some((ptr, layout)) = self.mem.ectx_owned.take() {
			unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) };
		}
	}

	/// Releases a caller-owned thread (`init_*` family). Runs `InitTab`
	/// term hooks in reverse, then the user destructor, then frees TLS
	/// and stack. The `Thread` value itself is reclaimed by Rust's normal
	/// scoping, matching "struct allocator handle is null" for this
	/// family.
	///
	/// # Safety
	/// Must not be called on the thread that is currently executing, nor
	/// on one still attached to a scheduler.
	pub unsafe fn release(mut self) {
		debug_assert!(self.sched.get().is_none(), "release on thread still attached to a scheduler");
		self.do_release();
	}

	/// Releases a core-owned thread (`create_*` family); additionally
	/// frees the `Thread` struct's own allocation.
	///
	/// # Safety
	/// Same obligations as [`Self::release`].
	pub unsafe fn release_boxed(mut self: alloc::boxed::Box<Self>) {
		debug_assert!(self.sched.get().is_none(), "release on thread still attached to a scheduler");
		self.do_release();
	}
}

/// A process-wide mutex guarding a scheduler's ready-queue bookkeeping,
/// provided as a convenience building block for [`Scheduler`]
/// implementations — not used by `Thread` itself.
pub type ThreadMutex<T> = InterruptTicketMutex<T>;

#[cfg(test)]
mod tests {
	use std::sync::Once;

	use super::*;
	use crate::tls::TlsTemplate;

	static TEST_TEMPLATE_IMAGE: [u8; 16] = [0xAB; 16];
	static SETUP: Once = Once::new();
	static NO_INIT_ENTRIES: [inittab::ThreadInitEntry; 0] = [];

	fn setup() {
		SETUP.call_once(|| {
			crate::tls::set_template(TlsTemplate { image: &TEST_TEMPLATE_IMAGE, mem_size: 16, align: 8 });
			set_inittab(InitTab::new(&NO_INIT_ENTRIES));
		});
	}

	struct NoopScheduler;
	impl Scheduler for NoopScheduler {
		fn on_blocked(&self, _thread: &Thread) {}
		fn on_wokeup(&self, _thread: &Thread) {}
	}
	static SCHED: NoopScheduler = NoopScheduler;

	extern "C" fn loop_forever() -> ! {
		loop {}
	}

	extern "C" fn one_arg_entry(arg: usize) -> ! {
		debug_assert_eq!(arg, 0xCAFE);
		loop {}
	}

	#[test]
	fn plain_thread_has_expected_flags_and_tls_self_pointer() {
		setup();
		let t = Thread::init_fn0(false, loop_forever, true, true, Some(0x1_0000), None)
			.expect("construction failed");

		assert!(t.flags().contains(ThreadFlags::HAS_UKTLS));
		assert!(t.flags().contains(ThreadFlags::HAS_ECTX));
		assert!(t.is_runnable());
		assert_ne!(t.tlsp(), 0);

		let stored = unsafe { *(t.tlsp() as *const usize) };
		assert_eq!(stored, t.tlsp());

		unsafe { t.release() };
	}

	#[test]
	fn one_arg_entry_thread_constructs_and_releases() {
		setup();
		let boxed = Thread::create_fn1(false, one_arg_entry, 0xCAFE, false, false, Some(0x1_0000), None)
			.expect("construction failed");
		unsafe { boxed.release_boxed() };
	}

	#[test]
	fn wakeup_on_runnable_thread_is_a_noop() {
		setup();
		let t = Thread::init_bare(0, 1);
		t.attach_scheduler(&SCHED);
		assert!(t.is_runnable());
		let before = t.wakeup_time();

		t.wakeup();

		assert!(t.is_runnable());
		assert_eq!(t.wakeup_time(), before);
		t.detach_scheduler();
	}

	#[test]
	fn block_on_blocked_thread_only_updates_wakeup_time() {
		setup();
		let t = Thread::init_bare(0, 0);
		t.attach_scheduler(&SCHED);
		assert!(!t.is_runnable());

		t.block_until(42);
		assert!(!t.is_runnable());
		assert_eq!(t.wakeup_time(), 42);

		t.block_until(99);
		assert!(!t.is_runnable());
		assert_eq!(t.wakeup_time(), 99);

		t.detach_scheduler();
	}

	#[test]
	fn release_frees_every_recorded_allocation() {
		setup();
		let mut t = Thread::init_fn0(false, loop_forever, true, true, Some(0x1_0000), None)
			.expect("construction failed");
		assert!(t.mem.stack.is_some());
		assert!(t.mem.tls.is_some());

		t.do_release();

		assert!(t.mem.stack.is_none());
		assert!(t.mem.tls.is_none());
		assert!(t.mem.ectx_owned.is_none());
	}
}
