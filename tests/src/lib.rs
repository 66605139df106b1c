//! Test support: a full VM with a headless display, plus helpers that
//! issue syscalls the way the guest would: arguments written onto the
//! current thread's stack, the number in EAX, then the SYSENTER entry.

pub mod fixture;

#[cfg(test)]
mod gdi_scenarios;
#[cfg(test)]
mod sync_scenarios;

pub use fixture::VmFixture;
