//! Architecture-specific machinery. Only x86-64 is implemented; the rest
//! of this crate is written against this module's surface so a second
//! architecture would only need a sibling module plus a `cfg` switch here.

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(target_arch = "x86_64")]
pub use x86_64 as current;
