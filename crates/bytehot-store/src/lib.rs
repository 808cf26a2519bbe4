#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **bytehot-store** – Append-only, aggregate-indexed event store for
//! ByteHot Core.
//!
//! Two backends ship: [`memory::MemoryEventStore`] for tests and in-process
//! use, and [`fs::FsEventStore`] for a human-inspectable directory-tree
//! layout on disk. Both implement the same [`store::EventStore`] trait and
//! are exercised by a shared conformance suite in `tests/` asserting the
//! same quantified invariants against either backend identically.

mod error;
mod fs;
mod memory;
mod store;

pub use error::EventStoreError;
pub use fs::FsEventStore;
pub use memory::MemoryEventStore;
pub use store::{AsEventStorePort, EventStore};
