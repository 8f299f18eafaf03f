//! Name → definition mapping with registration invariants.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Collector, CollectorDefinition, CollectorKey};
use crate::error::{ProfilerError, Result};

/// Thread-safe collector registry.
///
/// Mutations are serialized behind the write lock; `by_name` and `all`
/// share the read lock and may run concurrently with each other. A
/// rejected `add` never touches the mapping.
pub struct CollectorRegistry {
    inner: RwLock<Inner>,
}

struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

struct Entry {
    /// Registration order, used to break position ties.
    seq: u64,
    definition: Arc<CollectorDefinition>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
        }
    }

    /// Validate and register the collector type `C`.
    pub fn add<C: Collector>(&self) -> Result<Arc<CollectorDefinition>> {
        self.add_definition(CollectorDefinition::of::<C>()?)
    }

    /// Register an already validated definition.
    pub fn add_definition(
        &self,
        definition: CollectorDefinition,
    ) -> Result<Arc<CollectorDefinition>> {
        let mut inner = self.inner.write();

        if inner
            .entries
            .values()
            .any(|e| e.definition.key == definition.key)
        {
            return Err(ProfilerError::DuplicateRegistration {
                collector: definition.key.short_name().to_owned(),
            });
        }

        if let Some(existing) = inner.entries.get(&definition.name) {
            return Err(ProfilerError::DuplicateName {
                name: definition.name.clone(),
                existing: existing.definition.key.short_name().to_owned(),
            });
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;

        let definition = Arc::new(definition);
        inner.entries.insert(
            definition.name.clone(),
            Entry {
                seq,
                definition: Arc::clone(&definition),
            },
        );

        tracing::info!(
            collector = %definition.name,
            position = definition.position,
            implementation = definition.key.type_name(),
            "Collector registered"
        );
        Ok(definition)
    }

    /// Remove the entry wrapping the collector type `C`.
    pub fn remove<C: Collector>(&self) -> Result<()> {
        self.remove_key(CollectorKey::of::<C>())
    }

    pub fn remove_key(&self, key: CollectorKey) -> Result<()> {
        let mut inner = self.inner.write();

        let name = inner
            .entries
            .iter()
            .find(|(_, e)| e.definition.key == key)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| ProfilerError::NotRegistered {
                collector: key.short_name().to_owned(),
            })?;
        inner.entries.remove(&name);

        tracing::info!(collector = %name, implementation = key.type_name(), "Collector removed");
        Ok(())
    }

    /// Case-insensitive lookup by collector name.
    pub fn by_name(&self, name: &str) -> Option<Arc<CollectorDefinition>> {
        let inner = self.inner.read();
        match inner.entries.get(name) {
            Some(e) => Some(Arc::clone(&e.definition)),
            None => inner
                .entries
                .get(&name.trim().to_lowercase())
                .map(|e| Arc::clone(&e.definition)),
        }
    }

    /// Every definition, ordered by position then registration order.
    pub fn all(&self) -> Vec<Arc<CollectorDefinition>> {
        let inner = self.inner.read();
        let mut entries: Vec<&Entry> = inner.entries.values().collect();
        entries.sort_by_key(|e| (e.definition.position, e.seq));
        entries
            .into_iter()
            .map(|e| Arc::clone(&e.definition))
            .collect()
    }

    pub fn contains<C: Collector>(&self) -> bool {
        let key = CollectorKey::of::<C>();
        self.inner
            .read()
            .entries
            .values()
            .any(|e| e.definition.key == key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CollectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.all().iter().map(|d| d.name.clone()).collect();
        f.debug_struct("CollectorRegistry")
            .field("collectors", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::builtin::TimeCollector;
    use crate::collector::{CollectorSpec, Template};

    struct CustomTime;

    impl Collector for CustomTime {
        fn spec() -> CollectorSpec {
            CollectorSpec::new()
                .name("time")
                .position(3)
                .collect(|req, _res, bag| {
                    bag.store("runtime", req.runtime().as_millis() as u64)?;
                    Ok(())
                })
                .template(Template::data("<%= @data[:runtime] %>"))
        }
    }

    struct Custom;

    impl Collector for Custom {
        fn spec() -> CollectorSpec {
            CollectorSpec::new()
                .name("custom")
                .position(3)
                .collect(|_, _, _| Ok(()))
                .template(Template::data(""))
        }
    }

    struct Early;

    impl Collector for Early {
        fn spec() -> CollectorSpec {
            CollectorSpec::new()
                .name("early")
                .position(-1)
                .collect(|_, _, _| Ok(()))
                .template(Template::data(""))
        }
    }

    /// Has no name, collect routine or template.
    struct NotACollector;

    impl Collector for NotACollector {
        fn spec() -> CollectorSpec {
            CollectorSpec::new()
        }
    }

    #[test]
    fn add_then_lookup_returns_wrapping_definition() {
        let registry = CollectorRegistry::new();
        let added = registry.add::<TimeCollector>().unwrap();

        let found = registry.by_name("time").unwrap();
        assert!(found.wraps::<TimeCollector>());
        assert!(Arc::ptr_eq(&added, &found));
        assert!(registry.contains::<TimeCollector>());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = CollectorRegistry::new();
        registry.add::<TimeCollector>().unwrap();
        assert!(registry.by_name("TIME").is_some());
        assert!(registry.by_name("missing").is_none());
    }

    #[test]
    fn same_type_twice_is_duplicate_registration() {
        let registry = CollectorRegistry::new();
        registry.add::<TimeCollector>().unwrap();

        let err = registry.add::<TimeCollector>().unwrap_err();
        assert!(matches!(err, ProfilerError::DuplicateRegistration { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn different_type_same_name_is_duplicate_name() {
        let registry = CollectorRegistry::new();
        registry.add::<TimeCollector>().unwrap();

        let err = registry.add::<CustomTime>().unwrap_err();
        match err {
            ProfilerError::DuplicateName { name, existing } => {
                assert_eq!(name, "time");
                assert_eq!(existing, "TimeCollector");
            }
            other => panic!("expected DuplicateName, got {other:?}"),
        }

        let all = registry.all();
        assert_eq!(all.len(), 1);
        assert!(all[0].wraps::<TimeCollector>());
        assert!(!registry.contains::<CustomTime>());
    }

    #[test]
    fn invalid_collector_leaves_registry_unchanged() {
        let registry = CollectorRegistry::new();
        registry.add::<Custom>().unwrap();

        let err = registry.add::<NotACollector>().unwrap_err();
        assert!(matches!(err, ProfilerError::InvalidCollector { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_unknown_is_not_registered() {
        let registry = CollectorRegistry::new();
        let err = registry.remove::<Custom>().unwrap_err();
        assert!(matches!(err, ProfilerError::NotRegistered { .. }));
    }

    #[test]
    fn remove_after_add_clears_entry() {
        let registry = CollectorRegistry::new();
        registry.add::<Custom>().unwrap();
        registry.remove::<Custom>().unwrap();

        assert!(registry.by_name("custom").is_none());
        assert!(registry.is_empty());

        // The name is free again.
        registry.add::<Custom>().unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn all_orders_by_position_then_registration() {
        let registry = CollectorRegistry::new();
        registry.add::<Custom>().unwrap(); // position 3
        registry.add::<TimeCollector>().unwrap(); // position 0
        registry.add::<Early>().unwrap(); // position -1
        registry.add::<crate::collector::builtin::ServerCollector>().unwrap(); // position 3

        let names: Vec<String> = registry.all().iter().map(|d| d.name().to_owned()).collect();
        assert_eq!(names, ["early", "time", "custom", "server"]);
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let registry = Arc::new(CollectorRegistry::new());
        registry.add::<TimeCollector>().unwrap();

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        assert!(registry.by_name("time").is_some());
                        assert!(!registry.all().is_empty());
                    }
                })
            })
            .collect();

        for _ in 0..100 {
            registry.add::<Custom>().unwrap();
            registry.remove::<Custom>().unwrap();
        }

        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(registry.len(), 1);
    }
}
