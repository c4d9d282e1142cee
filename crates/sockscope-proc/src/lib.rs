//! Process-table leaves: descriptor scanning, ancestry, identity
//!
//! Everything in this crate reads the kernel's per-process filesystem
//! interface. Processes exit mid-scan routinely, so per-pid and per-fd
//! failures are swallowed, never surfaced; only an unreadable table root is
//! fatal, and only at startup.

pub mod ancestry;
pub mod inode;
pub mod table;
pub mod users;

pub use ancestry::{ancestors, MAX_ANCESTOR_DEPTH};
pub use inode::InodeIndex;
pub use table::ProcTable;
pub use users::UserDirectory;
