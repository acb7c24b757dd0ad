pub mod atomic_write;
pub mod copy_dir;
pub mod swap_dir;

pub use atomic_write::{AtomicWriteOptions, atomic_read, atomic_write};
pub use copy_dir::copy_dir_all;
pub use swap_dir::{DirOps, StdDirOps, Swapped, backup_path, swap_dir, swap_dir_with};
