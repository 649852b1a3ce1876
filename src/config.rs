//! Build-time sizing constants.

use core::mem::size_of;

/// Stack size used by the `create_fn*`/`init_fn*` family when the caller
/// does not provide one.
pub const DEFAULT_STACK_SIZE: usize = 0x4_0000;

/// Mask a stack pointer must satisfy before any entry function runs
/// (`sp & !SP_ALIGN_MASK == sp`).
pub const SP_ALIGN_MASK: usize = 0xf;

/// Bytes reserved for the thread control block trailing the TLS
/// self-pointer. A minimal TCB is just the self-pointer; an embedding
/// kernel integrating a libc/pthread TCB would need a larger value, but
/// this core only promises the self-pointer slot.
pub const TCB_RESERVED: usize = size_of::<usize>();
