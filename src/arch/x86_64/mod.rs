pub mod asm;
pub mod ctx;
pub mod ectx;
pub mod tlsreg;

pub use ctx::{ArchCtx, Entry0, Entry1, Entry2};
pub use ectx::{ExtCtx, ExtCtxScratch, align as ectx_align, size as ectx_size};
pub use tlsreg::{tlsp_get, tlsp_set};
