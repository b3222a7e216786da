//! # Group Registry
//!
//! The process-wide directory of groups that a peer RPC server dispatches
//! into — a remote `Get("scores", "alice")` has to find the local `Group`
//! named `"scores"` without the caller threading it through by hand. A
//! lazily initialized global behind a single `RwLock`, written once per
//! group at startup and read once per inbound request.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use meshcache_common::{CacheError, CacheResult};

use crate::group::Group;

fn groups() -> &'static RwLock<HashMap<String, Arc<Group>>> {
    static GROUPS: OnceLock<RwLock<HashMap<String, Arc<Group>>>> = OnceLock::new();
    GROUPS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Registers `group` under its own name. Returns a validation error if a
/// group with that name is already registered — names are unique per
/// process.
pub fn register(group: Group) -> CacheResult<Arc<Group>> {
    let name = group.name().to_string();
    let mut table = groups().write().expect("group registry poisoned");
    if table.contains_key(&name) {
        return Err(CacheError::validation(format!("group {name:?} is already registered")));
    }
    let group = Arc::new(group);
    table.insert(name, group.clone());
    Ok(group)
}

/// Looks up a registered group by name.
pub fn get(name: &str) -> Option<Arc<Group>> {
    groups().read().expect("group registry poisoned").get(name).cloned()
}

/// Removes a group from the registry. Used by tests and by graceful
/// shutdown; does not affect any `Arc<Group>` handles already held.
pub fn unregister(name: &str) {
    groups().write().expect("group registry poisoned").remove(name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshcache_common::GroupConfig;
    use crate::byteview::ByteView;
    use std::sync::Arc as StdArc;

    struct NullGetter;
    impl crate::group::Getter for NullGetter {
        fn load(&self, _key: &str) -> CacheResult<ByteView> {
            Err(CacheError::NotFound)
        }
    }

    fn unique_name(prefix: &str) -> String {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        format!("{prefix}-{}", COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    #[test]
    fn register_then_get_round_trips() {
        let name = unique_name("roundtrip");
        let group = Group::new(&GroupConfig::new(&name, 1024), StdArc::new(NullGetter));
        register(group).unwrap();
        assert!(get(&name).is_some());
        unregister(&name);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let name = unique_name("dup");
        let first = Group::new(&GroupConfig::new(&name, 1024), StdArc::new(NullGetter));
        register(first).unwrap();

        let second = Group::new(&GroupConfig::new(&name, 1024), StdArc::new(NullGetter));
        assert!(register(second).is_err());
        unregister(&name);
    }

    #[test]
    fn unknown_name_returns_none() {
        assert!(get(&unique_name("missing")).is_none());
    }
}
