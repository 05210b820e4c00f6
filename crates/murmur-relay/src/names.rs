//! Display name resolution.
//!
//! A requested name that is free is granted unchanged. On collision the
//! resolver appends a numeric suffix taken from a single process-wide counter
//! and tries again. The counter starts at 1, is bumped on every collision seen
//! by any rename from any client, and is never reset, so suffixes are not the
//! smallest available and unrelated renames consume each other's numbers:
//!
//! ```text
//! "alice" taken            -> "alice1"  (counter now 2)
//! "bob"   taken            -> "bob2"    (counter now 3)
//! "alice", "alice3" taken  -> "alice4"  (counter now 5)
//! ```
//!
//! Termination follows from the counter being unbounded while the set of
//! taken names is finite.

use tracing::debug;

use crate::registry::Registry;

/// Outcome of resolving a requested name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// The name granted to the client
    pub name: String,
    /// Whether `name` differs from what was requested
    pub changed: bool,
}

/// Process-wide name resolver.
#[derive(Debug)]
pub struct NameResolver {
    next_suffix: u64,
}

impl NameResolver {
    /// Create a resolver whose first disambiguation suffix is `1`.
    pub fn new() -> Self {
        Self { next_suffix: 1 }
    }

    /// The suffix the next collision will use.
    pub fn next_suffix(&self) -> u64 {
        self.next_suffix
    }

    /// Derive a name that no live connection currently holds.
    ///
    /// A name held by the requesting connection itself counts as taken.
    pub fn resolve<H>(&mut self, requested: &str, registry: &Registry<H>) -> ResolvedName {
        let mut candidate = requested.to_owned();
        let mut changed = false;

        while registry.is_name_taken(&candidate) {
            candidate = format!("{requested}{}", self.next_suffix);
            self.next_suffix += 1;
            changed = true;
        }

        if changed {
            debug!(requested = %requested, assigned = %candidate, "Disambiguated display name");
        }

        ResolvedName {
            name: candidate,
            changed,
        }
    }
}

impl Default for NameResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ConnectionId;

    fn registry_named(names: &[&str]) -> Registry<()> {
        let mut registry = Registry::new();
        for (i, name) in names.iter().enumerate() {
            let id = ConnectionId::new(i as u64 + 1);
            registry.insert(id, ());
            registry.set_name(id, name.to_string()).unwrap();
        }
        registry
    }

    #[test]
    fn test_free_name_unchanged() {
        let registry = registry_named(&["bob"]);
        let mut resolver = NameResolver::new();
        let resolved = resolver.resolve("alice", &registry);
        assert_eq!(resolved.name, "alice");
        assert!(!resolved.changed);
        assert_eq!(resolver.next_suffix(), 1);
    }

    #[test]
    fn test_collision_appends_counter() {
        let registry = registry_named(&["alice"]);
        let mut resolver = NameResolver::new();
        let resolved = resolver.resolve("alice", &registry);
        assert_eq!(resolved.name, "alice1");
        assert!(resolved.changed);
        assert_eq!(resolver.next_suffix(), 2);
    }

    #[test]
    fn test_counter_is_shared_across_names() {
        let registry = registry_named(&["alice", "bob"]);
        let mut resolver = NameResolver::new();
        assert_eq!(resolver.resolve("alice", &registry).name, "alice1");
        assert_eq!(resolver.resolve("bob", &registry).name, "bob2");
    }

    #[test]
    fn test_counter_skips_taken_suffixes() {
        let registry = registry_named(&["alice", "alice1", "alice2"]);
        let mut resolver = NameResolver::new();
        let resolved = resolver.resolve("alice", &registry);
        assert_eq!(resolved.name, "alice3");
        assert_eq!(resolver.next_suffix(), 4);
    }

    #[test]
    fn test_counter_never_resets() {
        let registry = registry_named(&["alice"]);
        let mut resolver = NameResolver::new();
        resolver.resolve("alice", &registry);
        resolver.resolve("alice", &registry);
        let third = resolver.resolve("alice", &registry);
        assert_eq!(third.name, "alice3");

        let empty: Registry<()> = Registry::new();
        assert!(!resolver.resolve("alice", &empty).changed);
        assert_eq!(resolver.next_suffix(), 4);
    }

    #[test]
    fn test_resolved_name_is_always_free() {
        let registry = registry_named(&["x", "x1", "x2", "x4", "y", "x5"]);
        let mut resolver = NameResolver::new();
        for requested in ["x", "y", "x", "z", "x1"] {
            let resolved = resolver.resolve(requested, &registry);
            assert!(!registry.is_name_taken(&resolved.name));
            assert!(resolved.name.starts_with(requested));
        }
    }
}
