//! Bounded ancestor-chain walk

use std::collections::HashMap;

/// Hard bound on the ancestor chain; parent maps can be stale or cyclic.
pub const MAX_ANCESTOR_DEPTH: usize = 20;

/// Walk parent links starting at `pid`'s immediate parent.
///
/// The starting pid is excluded. The walk stops at the first missing link
/// or once the chain holds `MAX_ANCESTOR_DEPTH` entries, so it terminates
/// on any map, including self-referential cycles.
pub fn ancestors(pid: i32, parent_of: &HashMap<i32, i32>) -> Vec<i32> {
    let mut chain = Vec::new();
    let mut current = pid;

    while chain.len() < MAX_ANCESTOR_DEPTH {
        match parent_of.get(&current) {
            Some(&ppid) => {
                chain.push(ppid);
                current = ppid;
            }
            None => break,
        }
    }

    chain
}
