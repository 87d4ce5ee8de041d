//! # governance-hooks
//!
//! Attaches governance to a host's agent lifecycle. The host supplies a
//! [`HookManager`]; [`ConstitutionalHooks::register_hooks`] wires the
//! eight governance handlers into it.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod constitutional;
mod error;
mod registry;

pub use constitutional::ConstitutionalHooks;
pub use error::{HookError, HookResult};
pub use registry::{
    HookEvent, HookHandler, HookManager, HookOutcome, HookPayload, InMemoryHookManager,
    MemoryOperation,
};
