//! uid -> username resolution with a lookup-once memo
//!
//! Identity-service lookups are expensive and uids of ephemeral or
//! sandboxed processes often have no entry at all. Each uid is resolved at
//! most once per directory lifetime; a failed lookup caches the "?"
//! sentinel and is never retried.

use nix::unistd::{Uid, User};
use std::collections::HashMap;

/// Sentinel for uids the identity service cannot resolve.
pub const UNKNOWN_USER: &str = "?";

type Resolver = Box<dyn Fn(u32) -> Option<String> + Send + Sync>;

pub struct UserDirectory {
    cache: HashMap<u32, String>,
    resolver: Resolver,
}

impl UserDirectory {
    /// Directory backed by the system identity service.
    pub fn new() -> Self {
        Self::with_resolver(Box::new(system_username))
    }

    /// Directory backed by a custom resolver (tests).
    pub fn with_resolver(resolver: Resolver) -> Self {
        Self {
            cache: HashMap::new(),
            resolver,
        }
    }

    /// Resolve a uid, consulting the resolver only on the first miss.
    pub fn username(&mut self, uid: u32) -> &str {
        if !self.cache.contains_key(&uid) {
            let name = (self.resolver)(uid)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| UNKNOWN_USER.to_string());
            self.cache.insert(uid, name);
        }
        self.cache.get(&uid).map(String::as_str).unwrap_or(UNKNOWN_USER)
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn system_username(uid: u32) -> Option<String> {
    User::from_uid(Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|user| user.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_directory(counter: Arc<AtomicUsize>) -> UserDirectory {
        UserDirectory::with_resolver(Box::new(move |uid| {
            counter.fetch_add(1, Ordering::SeqCst);
            if uid == 1000 {
                Some("alice".to_string())
            } else {
                None
            }
        }))
    }

    #[test]
    fn resolves_once_per_uid() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut users = counting_directory(counter.clone());

        assert_eq!(users.username(1000), "alice");
        assert_eq!(users.username(1000), "alice");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_caches_the_sentinel() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut users = counting_directory(counter.clone());

        assert_eq!(users.username(60000), UNKNOWN_USER);
        assert_eq!(users.username(60000), UNKNOWN_USER);
        // never retried
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_name_degrades_to_sentinel() {
        let mut users = UserDirectory::with_resolver(Box::new(|_| Some(String::new())));
        assert_eq!(users.username(5), UNKNOWN_USER);
    }
}
