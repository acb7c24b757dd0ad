//! Atomic filesystem primitives for publishing static site trees.
//!
//! # Architecture
//!
//! - `primitives/` - single-step operations: atomic file write, tree copy,
//!   rename-based directory swap with backup and rollback
//! - `workflow/` - scoped helpers built on the primitives: a staging
//!   [`Workspace`] removed on drop, and a lock-guarded [`Transaction`] file

mod error;
pub mod primitives;
pub mod workflow;

pub use error::{Error, Result};
pub use primitives::{
    AtomicWriteOptions, DirOps, StdDirOps, Swapped, atomic_read, atomic_write, backup_path,
    copy_dir_all, swap_dir, swap_dir_with,
};
pub use workflow::{Transaction, Workspace};
