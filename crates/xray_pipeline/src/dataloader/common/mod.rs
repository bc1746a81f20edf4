//! src/dataloader/common/mod.rs
//!
//! Utilities shared by the single-threaded and worker-based iterators.

pub mod thread;
