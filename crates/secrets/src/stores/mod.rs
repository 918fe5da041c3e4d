//! Built-in secret stores
//!
//! Cloud stores live in their own crates (see `secretfill-aws`); only
//! dependency-free stores are kept here.

mod memory;

pub use memory::MemorySecretStore;
