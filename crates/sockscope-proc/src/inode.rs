//! Inode index: socket inodes to the pids holding them
//!
//! One scan walks every process directory and stats each open descriptor.
//! The descriptor listing alone does not expose inode numbers, so each
//! entry gets a filesystem status call on its target. This is the dominant
//! per-cycle cost, O(total open fds) across the host.

use crate::table::ProcTable;
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::MetadataExt;
use tracing::trace;

/// Result of one process-table scan: which pids hold each inode, and each
/// pid's parent.
#[derive(Debug, Default)]
pub struct InodeIndex {
    inode_to_pids: HashMap<u64, Vec<i32>>,
    parent_of: HashMap<i32, i32>,
}

impl InodeIndex {
    /// Scan the whole table once. Per-pid and per-fd failures are skipped;
    /// processes exit mid-scan all the time.
    pub fn scan(table: &ProcTable) -> Self {
        let mut index = Self::default();

        for pid in table.pids() {
            if let Some(ppid) = table.parent_pid(pid) {
                if ppid > 0 {
                    index.parent_of.insert(pid, ppid);
                }
            }

            let fd_dir = table.pid_path(pid).join("fd");
            let Ok(entries) = fs::read_dir(&fd_dir) else {
                continue; // permission denied or process exited
            };

            for entry in entries.flatten() {
                // stat follows the descriptor link to its target
                let Ok(meta) = fs::metadata(entry.path()) else {
                    continue;
                };
                index.insert(meta.ino(), pid);
            }
        }

        trace!(
            "inode scan: {} inodes, {} parent links",
            index.inode_to_pids.len(),
            index.parent_of.len()
        );
        index
    }

    /// Inode 0 is the "unresolved" sentinel and is never indexed.
    fn insert(&mut self, inode: u64, pid: i32) {
        if inode == 0 {
            return;
        }
        self.inode_to_pids.entry(inode).or_default().push(pid);
    }

    /// Pids holding the given inode, in scan order.
    pub fn pids_for(&self, inode: u64) -> Option<&[i32]> {
        self.inode_to_pids.get(&inode).map(Vec::as_slice)
    }

    pub fn parent_map(&self) -> &HashMap<i32, i32> {
        &self.parent_of
    }

    pub fn inode_count(&self) -> usize {
        self.inode_to_pids.len()
    }

    #[cfg(test)]
    fn insert_for_test(&mut self, inode: u64, pid: i32) {
        self.insert(inode, pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn fake_proc_with_fd() -> (TempDir, u64) {
        let dir = TempDir::new().unwrap();

        // a real file standing in for a socket; its inode is what the scan
        // must recover through the descriptor link
        let target = dir.path().join("socket-stand-in");
        fs::write(&target, b"x").unwrap();
        let inode = fs::metadata(&target).unwrap().ino();

        let pid_dir = dir.path().join("9");
        fs::create_dir_all(pid_dir.join("fd")).unwrap();
        fs::write(pid_dir.join("stat"), "9 (listener) S 1 9 9 0 -1").unwrap();
        symlink(&target, pid_dir.join("fd").join("3")).unwrap();

        let parent_dir = dir.path().join("1");
        fs::create_dir_all(parent_dir.join("fd")).unwrap();
        fs::write(parent_dir.join("stat"), "1 (init) S 0 1 1 0 -1").unwrap();

        (dir, inode)
    }

    #[test]
    fn scan_resolves_descriptor_inodes() {
        let (dir, inode) = fake_proc_with_fd();
        let table = ProcTable::new(dir.path()).unwrap();
        let index = InodeIndex::scan(&table);

        assert_eq!(index.pids_for(inode), Some(&[9][..]));
    }

    #[test]
    fn scan_records_parent_links() {
        let (dir, _) = fake_proc_with_fd();
        let table = ProcTable::new(dir.path()).unwrap();
        let index = InodeIndex::scan(&table);

        assert_eq!(index.parent_map().get(&9), Some(&1));
        // ppid 0 links are not recorded
        assert_eq!(index.parent_map().get(&1), None);
    }

    #[test]
    fn inode_zero_is_never_indexed() {
        let mut index = InodeIndex::default();
        index.insert_for_test(0, 42);
        index.insert_for_test(55, 42);

        assert_eq!(index.pids_for(0), None);
        assert_eq!(index.pids_for(55), Some(&[42][..]));
    }

    #[test]
    fn broken_descriptor_links_are_skipped() {
        let (dir, inode) = fake_proc_with_fd();
        symlink(
            dir.path().join("no-such-target"),
            dir.path().join("9").join("fd").join("4"),
        )
        .unwrap();

        let table = ProcTable::new(dir.path()).unwrap();
        let index = InodeIndex::scan(&table);
        // the broken link contributes nothing, the good one still resolves
        assert_eq!(index.pids_for(inode), Some(&[9][..]));
    }

    #[test]
    fn shared_inode_fans_out_to_all_pids() {
        let mut index = InodeIndex::default();
        index.insert_for_test(55, 7);
        index.insert_for_test(55, 42);

        assert_eq!(index.pids_for(55), Some(&[7, 42][..]));
    }
}
